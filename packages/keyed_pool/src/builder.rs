use std::any::type_name;
use std::fmt;
use std::rc::Rc;

use foldhash::{HashSet, HashSetExt};
use tracing::info;

use crate::{ConfigError, DropPolicy, KeyedPool, PoolConfig, Poolable, Scheduler};

/// Builder for creating an instance of [`KeyedPool`].
///
/// Every key the pool will serve is configured here. The key set cannot change after the pool
/// is built.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
///
/// use keyed_pool::{DropPolicy, KeyedPool, Lifecycle, PoolConfig, Poolable, TickScheduler};
///
/// #[derive(Clone, Default)]
/// struct Bullet(Option<u8>);
///
/// impl Poolable for Bullet {
///     type Key = u8;
///
///     fn key(&self) -> Option<&u8> {
///         self.0.as_ref()
///     }
///
///     fn set_key(&mut self, key: u8) {
///         self.0 = Some(key);
///     }
///
///     fn activate(&mut self, _lifecycle: &mut Lifecycle<'_, u8>) {}
///
///     fn deactivate(&mut self) {}
/// }
///
/// let pool = KeyedPool::builder()
///     .key(0, PoolConfig::from_prototype(Bullet::default()).initial_size(32).max_size(128))
///     .key(1, PoolConfig::from_prototype(Bullet::default()).max_size(8))
///     .scheduler(Rc::new(TickScheduler::new()))
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build()
///     .unwrap();
///
/// assert_eq!(pool.len(), 32);
/// ```
#[must_use]
pub struct KeyedPoolBuilder<T: Poolable> {
    keys: Vec<(T::Key, PoolConfig<T>)>,
    scheduler: Option<Rc<dyn Scheduler>>,
    drop_policy: DropPolicy,
}

impl<T: Poolable> KeyedPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            keys: Vec::new(),
            scheduler: None,
            drop_policy: DropPolicy::default(),
        }
    }

    /// Adds a key and describes its inventory.
    ///
    /// Keys keep the order they are added in. This order is used when reporting keys and when
    /// releasing everything at once.
    pub fn key(mut self, key: T::Key, config: PoolConfig<T>) -> Self {
        self.keys.push((key, config));
        self
    }

    /// Sets the scheduler used for delayed release.
    ///
    /// A pool without a scheduler rejects [`release_after()`][KeyedPool::release_after] and
    /// ignores lifetimes that resources request for themselves.
    pub fn scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how
    /// to treat resources still in use when the pool is dropped.
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Validates the configuration and builds the pool, creating the initial resources of
    /// every key.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if no key is configured, a key is configured twice, a key has a
    /// maximum size of zero or a key has an initial size above its maximum size. No resource is
    /// created in that case.
    pub fn build(self) -> Result<KeyedPool<T>, ConfigError> {
        self.validate()?;

        for (key, config) in &self.keys {
            info!(
                resource_type = type_name::<T>(),
                ?key,
                initial_size = config.initial(),
                max_size = config.max(),
                "warming up pool key"
            );
        }

        Ok(KeyedPool::new(self.keys, self.scheduler, self.drop_policy))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.keys.is_empty() {
            return Err(ConfigError::NoKeys);
        }

        let mut seen = HashSet::with_capacity(self.keys.len());

        for (key, config) in &self.keys {
            if !seen.insert(key) {
                return Err(ConfigError::DuplicateKey {
                    key: format!("{key:?}"),
                });
            }

            if config.max() == 0 {
                return Err(ConfigError::ZeroMaxSize {
                    key: format!("{key:?}"),
                });
            }

            if config.initial() > config.max() {
                return Err(ConfigError::InitialExceedsMax {
                    key: format!("{key:?}"),
                    initial_size: config.initial(),
                    max_size: config.max(),
                });
            }
        }

        Ok(())
    }
}

impl<T: Poolable> fmt::Debug for KeyedPoolBuilder<T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedPoolBuilder")
            .field("resource_type", &format_args!("{}", type_name::<T>()))
            .field("keys", &self.keys)
            .field("has_scheduler", &self.scheduler.is_some())
            .field("drop_policy", &self.drop_policy)
            .finish()
    }
}
