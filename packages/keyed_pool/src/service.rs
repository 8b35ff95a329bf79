use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use capability_registry::{CapabilityRegistry, RegistryError};
use foldhash::{HashMap, HashMapExt};
use tracing::debug;

use crate::{ConfigError, KeyedPool, PoolError, Poolable};

/// A named bundle of pools, reachable through a single capability.
///
/// Pools of different resource types can live in the same service. Consumers look the service
/// up in a [`CapabilityRegistry`] and then ask for the pool they need by name and type.
///
/// # Example
///
/// ```rust
/// use capability_registry::CapabilityRegistry;
/// use keyed_pool::{KeyedPool, Lifecycle, PoolConfig, PoolService, Poolable};
///
/// #[derive(Clone, Default)]
/// struct Coin(Option<u8>);
///
/// impl Poolable for Coin {
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
/// let coins = KeyedPool::builder()
///     .key(1, PoolConfig::from_prototype(Coin::default()).max_size(10))
///     .build()
///     .unwrap();
///
/// let mut registry = CapabilityRegistry::new();
///
/// PoolService::builder()
///     .pool("coins", coins)
///     .build()
///     .unwrap()
///     .install(&mut registry)
///     .unwrap();
///
/// // Somewhere else, with only the registry at hand.
/// let service = registry.require::<PoolService>().unwrap();
/// let coins = service.pool::<Coin>("coins").unwrap();
///
/// let coin = coins.acquire(&1).unwrap();
/// assert!(coins.is_in_use(coin));
/// ```
pub struct PoolService {
    // In the order the pools were added.
    pools: Vec<NamedPool>,
    by_name: HashMap<String, usize>,
}

struct NamedPool {
    name: String,
    pool: Box<dyn ErasedPool>,
}

/// What the service needs from a pool without knowing its resource type.
trait ErasedPool {
    fn as_any(&self) -> &dyn Any;

    fn release_all(&self) -> usize;

    fn resource_type(&self) -> &'static str;
}

impl<T: Poolable> ErasedPool for KeyedPool<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn release_all(&self) -> usize {
        Self::release_all(self)
    }

    fn resource_type(&self) -> &'static str {
        type_name::<T>()
    }
}

impl PoolService {
    /// Starts building a service. At least one pool must be added before it is built.
    pub fn builder() -> PoolServiceBuilder {
        PoolServiceBuilder::new()
    }

    /// Returns a handle to the pool named `name`.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownPool`] if the service has no pool with this name.
    ///
    /// [`PoolError::PoolTypeMismatch`] if the pool holds resources of a type other than `T`.
    pub fn pool<T: Poolable>(&self, name: &str) -> Result<KeyedPool<T>, PoolError> {
        let named = self
            .by_name
            .get(name)
            .and_then(|index| self.pools.get(*index))
            .ok_or_else(|| PoolError::UnknownPool {
                name: name.to_string(),
            })?;

        named
            .pool
            .as_any()
            .downcast_ref::<KeyedPool<T>>()
            .cloned()
            .ok_or_else(|| PoolError::PoolTypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
                actual: named.pool.resource_type(),
            })
    }

    /// The names of the pools, in the order they were added.
    pub fn pool_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.pools.iter().map(|named| named.name.as_str())
    }

    /// Returns every resource of every pool, pool by pool in the order the pools were added.
    ///
    /// Returns the number of resources that were reclaimed.
    pub fn release_all(&self) -> usize {
        self.pools
            .iter()
            .map(|named| named.pool.release_all())
            .sum()
    }

    /// Registers the service in `registry` as the provider of the `PoolService` capability.
    ///
    /// Returns the registered instance.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyRegistered`] if another pool service is already registered.
    /// The service is dropped in that case, together with its pools unless other handles to
    /// them exist.
    pub fn install(self, registry: &mut CapabilityRegistry) -> Result<Rc<Self>, RegistryError> {
        let service = Rc::new(self);
        registry.register::<Self>(Rc::clone(&service))?;

        debug!(pools = service.pools.len(), "pool service installed");

        Ok(service)
    }

    /// Removes the service from `registry`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotRegistered`] if this instance is not the registered pool service.
    pub fn uninstall(
        self: &Rc<Self>,
        registry: &mut CapabilityRegistry,
    ) -> Result<(), RegistryError> {
        registry.deregister::<Self>(self)?;

        debug!(pools = self.pools.len(), "pool service uninstalled");

        Ok(())
    }
}

impl fmt::Debug for PoolService {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolService")
            .field("pools", &self.pools)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for NamedPool {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedPool")
            .field("name", &self.name)
            .field("resource_type", &self.pool.resource_type())
            .finish()
    }
}

/// Builder for creating an instance of [`PoolService`].
#[must_use]
pub struct PoolServiceBuilder {
    pools: Vec<NamedPool>,
}

impl PoolServiceBuilder {
    fn new() -> Self {
        Self { pools: Vec::new() }
    }

    /// Adds a pool under `name`.
    ///
    /// The service keeps its own handle to the pool. The caller may keep using the handle it
    /// passed in or clones of it.
    pub fn pool<T: Poolable>(mut self, name: impl Into<String>, pool: KeyedPool<T>) -> Self {
        self.pools.push(NamedPool {
            name: name.into(),
            pool: Box::new(pool),
        });
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoPools`] if no pool was added.
    ///
    /// [`ConfigError::DuplicatePool`] if two pools share a name.
    pub fn build(self) -> Result<PoolService, ConfigError> {
        if self.pools.is_empty() {
            return Err(ConfigError::NoPools);
        }

        let mut by_name = HashMap::with_capacity(self.pools.len());

        for (index, named) in self.pools.iter().enumerate() {
            if by_name.insert(named.name.clone(), index).is_some() {
                return Err(ConfigError::DuplicatePool {
                    name: named.name.clone(),
                });
            }
        }

        debug!(
            pools = ?self.pools.iter().map(|named| named.name.as_str()).collect::<Vec<_>>(),
            "pool service built"
        );

        Ok(PoolService {
            pools: self.pools,
            by_name,
        })
    }
}

impl fmt::Debug for PoolServiceBuilder {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolServiceBuilder")
            .field("pools", &self.pools)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;
    use crate::{Lifecycle, PoolConfig};

    assert_not_impl_any!(PoolService: Send, Sync);

    #[derive(Clone, Default)]
    struct Crate(Option<u8>);

    impl Poolable for Crate {
        type Key = u8;

        fn key(&self) -> Option<&u8> {
            self.0.as_ref()
        }

        fn set_key(&mut self, key: u8) {
            self.0 = Some(key);
        }

        fn activate(&mut self, _lifecycle: &mut Lifecycle<'_, u8>) {}

        fn deactivate(&mut self) {}
    }

    #[derive(Clone, Default)]
    struct Barrel(Option<&'static str>);

    impl Poolable for Barrel {
        type Key = &'static str;

        fn key(&self) -> Option<&&'static str> {
            self.0.as_ref()
        }

        fn set_key(&mut self, key: &'static str) {
            self.0 = Some(key);
        }

        fn activate(&mut self, _lifecycle: &mut Lifecycle<'_, &'static str>) {}

        fn deactivate(&mut self) {}
    }

    fn crates() -> KeyedPool<Crate> {
        KeyedPool::builder()
            .key(0, PoolConfig::from_prototype(Crate::default()).max_size(4))
            .build()
            .unwrap()
    }

    fn barrels() -> KeyedPool<Barrel> {
        KeyedPool::builder()
            .key(
                "oil",
                PoolConfig::from_prototype(Barrel::default()).max_size(4),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn pools_are_found_by_name_and_type() {
        let crates = crates();

        let service = PoolService::builder()
            .pool("crates", crates.clone())
            .pool("barrels", barrels())
            .build()
            .unwrap();

        let lease = crates.acquire(&0).unwrap();

        let from_service = service.pool::<Crate>("crates").unwrap();
        assert!(from_service.is_in_use(lease));

        assert!(service.pool::<Barrel>("barrels").is_ok());
        assert_eq!(
            service.pool_names().collect::<Vec<_>>(),
            vec!["crates", "barrels"]
        );
    }

    #[test]
    fn wrong_name_or_type_is_reported() {
        let service = PoolService::builder()
            .pool("crates", crates())
            .build()
            .unwrap();

        assert!(matches!(
            service.pool::<Crate>("barrels"),
            Err(PoolError::UnknownPool { .. })
        ));
        assert!(matches!(
            service.pool::<Barrel>("crates"),
            Err(PoolError::PoolTypeMismatch { .. })
        ));
    }

    #[test]
    fn release_all_covers_every_pool() {
        let crates = crates();
        let barrels = barrels();

        let service = PoolService::builder()
            .pool("crates", crates.clone())
            .pool("barrels", barrels.clone())
            .build()
            .unwrap();

        crates.acquire(&0).unwrap();
        crates.acquire(&0).unwrap();
        barrels.acquire(&"oil").unwrap();

        assert_eq!(service.release_all(), 3);
        assert_eq!(crates.stats(&0).unwrap().in_use, 0);
        assert_eq!(barrels.stats(&"oil").unwrap().in_use, 0);
    }

    #[test]
    fn build_validation() {
        assert!(matches!(
            PoolService::builder().build(),
            Err(ConfigError::NoPools)
        ));

        assert!(matches!(
            PoolService::builder()
                .pool("crates", crates())
                .pool("crates", crates())
                .build(),
            Err(ConfigError::DuplicatePool { .. })
        ));
    }

    #[test]
    fn install_and_uninstall() {
        let mut registry = CapabilityRegistry::new();

        let service = PoolService::builder()
            .pool("crates", crates())
            .build()
            .unwrap()
            .install(&mut registry)
            .unwrap();

        let found = registry.require::<PoolService>().unwrap();
        assert!(Rc::ptr_eq(&found, &service));

        let second = PoolService::builder()
            .pool("crates", crates())
            .build()
            .unwrap();
        assert!(matches!(
            second.install(&mut registry),
            Err(RegistryError::AlreadyRegistered { .. })
        ));

        service.uninstall(&mut registry).unwrap();
        assert!(!registry.contains::<PoolService>());

        assert!(matches!(
            service.uninstall(&mut registry),
            Err(RegistryError::NotRegistered { .. })
        ));
    }
}
