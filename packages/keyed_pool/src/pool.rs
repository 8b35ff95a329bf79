use std::any::type_name;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::thread;
use std::time::Duration;

use foldhash::{HashMap, HashMapExt};
use rand::Rng;
use tracing::{error, trace, warn};

use crate::inventory::{Inventory, PendingRelease};
use crate::lease::PoolId;
use crate::{
    AcquireOptions, DropPolicy, KeyStats, KeyedPoolBuilder, Lease, Placeable, PoolConfig,
    PoolError, Poolable, Released, ResourceId, Scheduler, TimerCallback,
};

/// A bounded pool of reusable resources, partitioned by key.
///
/// Each key has its own inventory with its own factory, initial size and maximum size. Acquiring
/// for a key issues an available resource of that key (the one returned longest ago first) or
/// creates a new one if the key has not yet reached its maximum size. Resources are never
/// destroyed individually. They live until the pool itself is dropped.
///
/// The caller receives a [`Lease`] for every issued resource. The resource itself stays inside
/// the pool and is reached through [`get()`][Self::get] and [`get_mut()`][Self::get_mut].
/// Returning the lease via [`release()`][Self::release] deactivates the resource and makes it
/// available again.
///
/// # Cloning
///
/// `KeyedPool` is a handle. Clones share the same inventories, so a clone can be handed to every
/// component that spawns or despawns resources.
///
/// # Delayed release
///
/// A pool built with a [`Scheduler`] can reclaim resources after a delay, either on request of
/// the owner ([`release_after()`][Self::release_after]) or of the resource itself (see
/// [`Lifecycle::release_after()`][crate::Lifecycle::release_after]). A resource has at most one
/// pending delayed release. Every new release request for it replaces the pending one.
///
/// # Example
///
/// ```rust
/// use keyed_pool::{KeyedPool, Lifecycle, PoolConfig, Poolable};
///
/// #[derive(Clone, Default)]
/// struct Enemy {
///     kind: Option<&'static str>,
///     health: u32,
/// }
///
/// impl Poolable for Enemy {
///     type Key = &'static str;
///
///     fn key(&self) -> Option<&&'static str> {
///         self.kind.as_ref()
///     }
///
///     fn set_key(&mut self, key: &'static str) {
///         self.kind = Some(key);
///     }
///
///     fn activate(&mut self, _lifecycle: &mut Lifecycle<'_, &'static str>) {
///         self.health = 100;
///     }
///
///     fn deactivate(&mut self) {}
/// }
///
/// let pool = KeyedPool::builder()
///     .key(
///         "goblin",
///         PoolConfig::from_prototype(Enemy::default())
///             .initial_size(4)
///             .max_size(16),
///     )
///     .build()
///     .unwrap();
///
/// let goblin = pool.acquire(&"goblin").unwrap();
/// pool.get_mut(goblin).unwrap().health -= 30;
/// assert_eq!(pool.get(goblin).unwrap().health, 70);
///
/// pool.release(goblin).unwrap();
/// assert!(pool.get(goblin).is_none());
/// ```
///
/// # Thread safety
///
/// The pool is single-threaded and is neither [`Send`] nor [`Sync`]. Resource hooks run while the
/// pool is internally borrowed and must not call back into the pool.
pub struct KeyedPool<T: Poolable> {
    core: Rc<RefCell<PoolCore<T>>>,
}

const REENTRANT_ACCESS: &str = "pool is already borrowed: resource hooks must not call back into \
    the pool and borrows returned by get() or get_mut() must be dropped before any other pool \
    operation";

struct PoolCore<T: Poolable> {
    id: PoolId,

    // In configuration order. Key indexes in leases point into this.
    inventories: Vec<Inventory<T>>,
    key_indexes: HashMap<T::Key, usize>,

    scheduler: Option<Rc<dyn Scheduler>>,
    next_ticket: u64,

    drop_policy: DropPolicy,
}

impl<T: Poolable> KeyedPool<T> {
    /// Starts building a pool. Every key must be configured before the pool is built.
    pub fn builder() -> KeyedPoolBuilder<T> {
        KeyedPoolBuilder::new()
    }

    pub(crate) fn new(
        keys: Vec<(T::Key, PoolConfig<T>)>,
        scheduler: Option<Rc<dyn Scheduler>>,
        drop_policy: DropPolicy,
    ) -> Self {
        let mut key_indexes = HashMap::with_capacity(keys.len());

        let inventories = keys
            .into_iter()
            .enumerate()
            .map(|(index, (key, config))| {
                key_indexes.insert(key.clone(), index);
                Inventory::new(key, config)
            })
            .collect();

        Self {
            core: Rc::new(RefCell::new(PoolCore {
                id: PoolId::next(),
                inventories,
                key_indexes,
                scheduler,
                next_ticket: 0,
                drop_policy,
            })),
        }
    }

    /// Issues a resource of `key` and activates it.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] if every resource of the key is in use and the key has reached
    /// its maximum size. Nothing is created in that case.
    ///
    /// [`PoolError::UnknownKey`] if the key is not configured.
    pub fn acquire(&self, key: &T::Key) -> Result<Lease, PoolError> {
        self.acquire_with(key, AcquireOptions::new())
    }

    /// Issues a resource of `key` as described by `options`.
    ///
    /// # Errors
    ///
    /// Same as [`acquire()`][Self::acquire].
    pub fn acquire_with(&self, key: &T::Key, options: AcquireOptions) -> Result<Lease, PoolError> {
        let key_index = self.core().key_index(key)?;
        self.acquire_at(key_index, options, |_| {})
    }

    /// Issues a resource of `key`, places it and then activates it.
    ///
    /// Activation observes the final placement.
    ///
    /// # Errors
    ///
    /// Same as [`acquire()`][Self::acquire].
    pub fn acquire_placed(
        &self,
        key: &T::Key,
        placement: T::Placement,
        options: AcquireOptions,
    ) -> Result<Lease, PoolError>
    where
        T: Placeable,
    {
        let key_index = self.core().key_index(key)?;
        self.acquire_at(key_index, options, |resource| resource.place(placement))
    }

    /// Issues a resource of a randomly chosen key.
    ///
    /// Every configured key is equally likely to be chosen, regardless of how many resources
    /// each key allows. If the chosen key is exhausted, the call fails even if other keys have
    /// resources available.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] if the chosen key is exhausted.
    pub fn acquire_random(&self, options: AcquireOptions) -> Result<Lease, PoolError> {
        self.acquire_random_with_rng(&mut rand::rng(), options)
    }

    /// Same as [`acquire_random()`][Self::acquire_random] but draws the key from `rng`.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] if the chosen key is exhausted.
    pub fn acquire_random_with_rng<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        options: AcquireOptions,
    ) -> Result<Lease, PoolError> {
        let key_index = self.random_key_index(rng);
        self.acquire_at(key_index, options, |_| {})
    }

    /// Issues a resource of a randomly chosen key, places it and then activates it.
    ///
    /// # Errors
    ///
    /// [`PoolError::Exhausted`] if the chosen key is exhausted.
    pub fn acquire_random_placed(
        &self,
        placement: T::Placement,
        options: AcquireOptions,
    ) -> Result<Lease, PoolError>
    where
        T: Placeable,
    {
        let key_index = self.random_key_index(&mut rand::rng());
        self.acquire_at(key_index, options, |resource| resource.place(placement))
    }

    fn core(&self) -> Ref<'_, PoolCore<T>> {
        self.core.try_borrow().expect(REENTRANT_ACCESS)
    }

    fn core_mut(&self) -> RefMut<'_, PoolCore<T>> {
        self.core.try_borrow_mut().expect(REENTRANT_ACCESS)
    }

    fn random_key_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        // The builder guarantees at least one key.
        rng.random_range(0..self.core().inventories.len())
    }

    fn acquire_at(
        &self,
        key_index: usize,
        options: AcquireOptions,
        prepare: impl FnOnce(&mut T),
    ) -> Result<Lease, PoolError> {
        let mut core = self.core_mut();
        let pool_id = core.id;

        let inventory = core.inventory_mut(key_index);

        let Some((slot, generation)) = inventory.checkout() else {
            warn!(
                key = ?inventory.key(),
                max_size = inventory.max_size(),
                "pool exhausted"
            );

            return Err(PoolError::Exhausted {
                key: format!("{:?}", inventory.key()),
                max_size: inventory.max_size(),
            });
        };

        let lease = Lease::new(ResourceId::new(pool_id, key_index, slot), generation);
        let requested_release = inventory.initialize(slot, lease, options, prepare);

        trace!(?lease, key = ?inventory.key(), "acquired");

        if let Some(delay) = requested_release {
            // Without a scheduler nobody enforces the limit but the caller still gets the resource.
            match core.scheduler.clone() {
                Some(scheduler) => {
                    core.schedule_release(&*scheduler, Rc::downgrade(&self.core), lease, delay);
                }
                None => warn!(
                    ?lease,
                    ?delay,
                    "resource requested a delayed release but the pool has no scheduler"
                ),
            }
        }

        Ok(lease)
    }

    /// Returns the resource to the pool.
    ///
    /// The resource is deactivated and appended to the available queue of its key. A pending
    /// delayed release of the resource is cancelled.
    ///
    /// Releasing is idempotent. Releasing a resource that is already available, or releasing
    /// through a lease that is outdated because the resource has since been issued again,
    /// changes nothing and says so in the returned [`Released`].
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidRelease`] if the lease was not issued by this pool.
    pub fn release(&self, lease: Lease) -> Result<Released, PoolError> {
        let mut core = self.core_mut();
        core.validate(lease)?;

        if core.inventory(lease.id().key_index()).generation(lease.id().slot())
            != lease.generation()
        {
            trace!(?lease, "release of outdated lease ignored");
            return Ok(Released::Stale);
        }

        Ok(core.reclaim(lease.id()))
    }

    /// Returns the resource to the pool once `delay` has elapsed.
    ///
    /// Replaces any delayed release already pending for the resource. An explicit
    /// [`release()`][Self::release] before the delay elapses reclaims the resource immediately
    /// and the scheduled release does nothing.
    ///
    /// # Errors
    ///
    /// [`PoolError::InvalidRelease`] if the lease was not issued by this pool.
    ///
    /// [`PoolError::NoScheduler`] if the pool was built without a scheduler.
    pub fn release_after(&self, lease: Lease, delay: Duration) -> Result<Released, PoolError> {
        let mut core = self.core_mut();
        core.validate(lease)?;

        let inventory = core.inventory(lease.id().key_index());

        if inventory.generation(lease.id().slot()) != lease.generation() {
            trace!(?lease, "delayed release of outdated lease ignored");
            return Ok(Released::Stale);
        }

        if inventory.is_available(lease.id().slot()) {
            return Ok(Released::AlreadyAvailable);
        }

        let Some(scheduler) = core.scheduler.clone() else {
            warn!(?lease, ?delay, "delayed release requested but the pool has no scheduler");
            return Err(PoolError::NoScheduler);
        };

        core.schedule_release(&*scheduler, Rc::downgrade(&self.core), lease, delay);

        Ok(Released::Scheduled)
    }

    /// Returns every resource of every key to the pool, in configuration order of the keys and
    /// materialization order of the resources.
    ///
    /// Returns the number of resources that were reclaimed.
    pub fn release_all(&self) -> usize {
        let mut core = self.core_mut();

        (0..core.inventories.len())
            .map(|key_index| core.reclaim_all(key_index))
            .sum()
    }

    /// Returns every resource of `key` to the pool, in materialization order.
    ///
    /// Returns the number of resources that were reclaimed.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownKey`] if the key is not configured. Nothing is released in that case.
    pub fn release_all_of(&self, key: &T::Key) -> Result<usize, PoolError> {
        let mut core = self.core_mut();
        let key_index = core.key_index(key)?;

        Ok(core.reclaim_all(key_index))
    }

    /// Borrows the resource held through `lease`.
    ///
    /// Returns `None` if the lease is not the current lease of an in-use resource of this pool.
    ///
    /// # Panics
    ///
    /// Panics if the pool is mutably borrowed, e.g. through [`get_mut()`][Self::get_mut]. Drop
    /// the returned borrow before calling any other pool operation.
    #[must_use]
    pub fn get(&self, lease: Lease) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.core(), |core| core.current(lease)).ok()
    }

    /// Mutably borrows the resource held through `lease`.
    ///
    /// Returns `None` if the lease is not the current lease of an in-use resource of this pool.
    ///
    /// # Panics
    ///
    /// Panics if the pool is already borrowed. Drop the returned borrow before calling any other
    /// pool operation.
    #[must_use]
    pub fn get_mut(&self, lease: Lease) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.core_mut(), |core| core.current_mut(lease)).ok()
    }

    /// A snapshot of the inventory of `key`.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownKey`] if the key is not configured.
    pub fn stats(&self, key: &T::Key) -> Result<KeyStats, PoolError> {
        let core = self.core();
        let key_index = core.key_index(key)?;

        Ok(core.inventory(key_index).stats())
    }

    /// The leases of every resource of `key` currently in use, in materialization order.
    ///
    /// # Errors
    ///
    /// [`PoolError::UnknownKey`] if the key is not configured.
    pub fn in_use(&self, key: &T::Key) -> Result<Vec<Lease>, PoolError> {
        let core = self.core();
        let key_index = core.key_index(key)?;

        Ok(core
            .inventory(key_index)
            .in_use_slots()
            .map(|(slot, generation)| {
                Lease::new(ResourceId::new(core.id, key_index, slot), generation)
            })
            .collect())
    }

    /// Whether `lease` is the current lease of an in-use resource of this pool.
    #[must_use]
    pub fn is_in_use(&self, lease: Lease) -> bool {
        self.core().current(lease).is_some()
    }

    /// The configured keys, in configuration order.
    #[must_use]
    pub fn keys(&self) -> Vec<T::Key> {
        self.core()
            .inventories
            .iter()
            .map(|inventory| inventory.key().clone())
            .collect()
    }

    /// The number of resources created so far, over all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core()
            .inventories
            .iter()
            .map(Inventory::materialized)
            .sum()
    }

    /// Whether no resource has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Poolable> PoolCore<T> {
    fn key_index(&self, key: &T::Key) -> Result<usize, PoolError> {
        self.key_indexes
            .get(key)
            .copied()
            .ok_or_else(|| PoolError::UnknownKey {
                key: format!("{key:?}"),
            })
    }

    fn inventory(&self, key_index: usize) -> &Inventory<T> {
        self.inventories
            .get(key_index)
            .expect("key indexes are validated before use and inventories are never removed")
    }

    fn inventory_mut(&mut self, key_index: usize) -> &mut Inventory<T> {
        self.inventories
            .get_mut(key_index)
            .expect("key indexes are validated before use and inventories are never removed")
    }

    /// Checks that the lease was issued by this pool. Says nothing about whether it is current.
    fn validate(&self, lease: Lease) -> Result<(), PoolError> {
        let id = lease.id();

        let issued_here = id.pool() == self.id
            && self
                .inventories
                .get(id.key_index())
                .is_some_and(|inventory| inventory.contains_slot(id.slot()));

        if issued_here {
            Ok(())
        } else {
            error!(?lease, "attempted to release a resource into a pool that did not issue it");
            Err(PoolError::InvalidRelease { lease })
        }
    }

    fn current(&self, lease: Lease) -> Option<&T> {
        let id = lease.id();

        if id.pool() != self.id {
            return None;
        }

        let inventory = self.inventories.get(id.key_index())?;
        inventory
            .is_current(lease)
            .then(|| inventory.resource(id.slot()))
    }

    fn current_mut(&mut self, lease: Lease) -> Option<&mut T> {
        let id = lease.id();

        if id.pool() != self.id {
            return None;
        }

        let inventory = self.inventories.get_mut(id.key_index())?;

        if inventory.is_current(lease) {
            Some(inventory.resource_mut(id.slot()))
        } else {
            None
        }
    }

    /// Reclaims the resource unless it is already available. Cancels its pending delayed release
    /// either way.
    fn reclaim(&mut self, id: ResourceId) -> Released {
        let pending = self
            .inventory_mut(id.key_index())
            .replace_pending_release(id.slot(), None);

        if let Some(pending) = pending {
            self.cancel_timer(pending);
        }

        let inventory = self.inventory_mut(id.key_index());

        if inventory.is_available(id.slot()) {
            return Released::AlreadyAvailable;
        }

        inventory.checkin(id.slot());
        trace!(?id, key = ?inventory.key(), "released");

        Released::Reclaimed
    }

    fn reclaim_all(&mut self, key_index: usize) -> usize {
        let pool_id = self.id;
        let materialized = self.inventory(key_index).materialized();

        (0..materialized)
            .map(|slot| self.reclaim(ResourceId::new(pool_id, key_index, slot)))
            .filter(|released| *released == Released::Reclaimed)
            .count()
    }

    /// Schedules the delayed release of an in-use resource, replacing any pending one.
    fn schedule_release(
        &mut self,
        scheduler: &dyn Scheduler,
        core: Weak<RefCell<Self>>,
        lease: Lease,
        delay: Duration,
    ) {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);

        let id = lease.id();

        let timer = scheduler.schedule_after(
            id,
            delay,
            TimerCallback::new(move || {
                // The pool may be gone by the time the delay elapses.
                if let Some(core) = core.upgrade() {
                    core.try_borrow_mut()
                        .expect(REENTRANT_ACCESS)
                        .release_due(lease, ticket);
                }
            }),
        );

        let replaced = self
            .inventory_mut(id.key_index())
            .replace_pending_release(id.slot(), Some(PendingRelease { timer, ticket }));

        if let Some(replaced) = replaced {
            scheduler.cancel(replaced.timer);
        }

        trace!(?lease, ?delay, timer = timer.raw(), "release scheduled");
    }

    /// Called by the scheduler when a delayed release is due. Does nothing unless the request
    /// is still the latest one for a resource that has not been reissued since.
    fn release_due(&mut self, lease: Lease, ticket: u64) {
        let id = lease.id();
        let inventory = self.inventory(id.key_index());

        let still_expected = inventory.generation(id.slot()) == lease.generation()
            && inventory
                .pending_release(id.slot())
                .is_some_and(|pending| pending.ticket == ticket);

        if !still_expected {
            trace!(?lease, "superseded delayed release ignored");
            return;
        }

        // The timer fired, there is nothing left to cancel.
        self.inventory_mut(id.key_index())
            .replace_pending_release(id.slot(), None);

        let inventory = self.inventory_mut(id.key_index());
        inventory.checkin(id.slot());
        trace!(?lease, key = ?inventory.key(), "released after delay");
    }

    fn cancel_timer(&self, pending: PendingRelease) {
        if let Some(scheduler) = &self.scheduler {
            scheduler.cancel(pending.timer);
        }
    }
}

impl<T: Poolable> Drop for PoolCore<T> {
    fn drop(&mut self) {
        if let Some(scheduler) = &self.scheduler {
            for inventory in &self.inventories {
                for timer in inventory.pending_timers() {
                    scheduler.cancel(timer);
                }
            }
        }

        if matches!(self.drop_policy, DropPolicy::MustNotDropItems) && !thread::panicking() {
            let in_use: usize = self.inventories.iter().map(Inventory::in_use_count).sum();

            assert!(
                in_use == 0,
                "KeyedPool dropped while {in_use} resources are still in use (drop policy is MustNotDropItems)"
            );
        }
    }
}

impl<T: Poolable> Clone for KeyedPool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: Poolable> fmt::Debug for KeyedPool<T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.core.try_borrow() {
            Ok(core) => f
                .debug_struct("KeyedPool")
                .field("resource_type", &format_args!("{}", type_name::<T>()))
                .field("id", &core.id)
                .field("inventories", &core.inventories)
                .field("has_scheduler", &core.scheduler.is_some())
                .field("drop_policy", &core.drop_policy)
                .finish_non_exhaustive(),
            Err(_) => f
                .debug_struct("KeyedPool")
                .field("resource_type", &format_args!("{}", type_name::<T>()))
                .finish_non_exhaustive(),
        }
    }
}
