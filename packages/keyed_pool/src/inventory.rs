use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::{AcquireOptions, KeyStats, Lease, Lifecycle, PoolConfig, Poolable, TimerId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SlotState {
    Available,
    InUse,
}

/// A delayed release waiting on the scheduler. The ticket tells apart successive requests for
/// the same resource, so a late callback of a superseded request does nothing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PendingRelease {
    pub(crate) timer: TimerId,
    pub(crate) ticket: u64,
}

struct Slot<T> {
    resource: T,
    state: SlotState,

    // Incremented every time the resource is issued. Leases carry the value they were issued
    // with, which is how outdated leases are recognized.
    generation: u64,

    pending_release: Option<PendingRelease>,
}

/// Every resource of one key plus the queue of those that are available.
///
/// Slots are never removed, so a slot index identifies the same resource for the lifetime of
/// the inventory. Slot order is materialization order.
pub(crate) struct Inventory<T: Poolable> {
    key: T::Key,
    factory: Box<dyn FnMut() -> T>,
    max_size: usize,

    slots: Vec<Slot<T>>,

    // Slot indexes in the order the resources were returned. Reuse pops from the front.
    available: VecDeque<usize>,

    in_use: usize,
}

impl<T: Poolable> Inventory<T> {
    /// Creates the inventory and materializes the initial resources.
    pub(crate) fn new(key: T::Key, config: PoolConfig<T>) -> Self {
        let initial_size = config.initial();
        let max_size = config.max();

        let mut inventory = Self {
            key,
            factory: config.into_factory(),
            max_size,
            slots: Vec::with_capacity(initial_size),
            available: VecDeque::with_capacity(initial_size),
            in_use: 0,
        };

        for _ in 0..initial_size {
            let index = inventory.materialize(SlotState::Available);
            inventory.available.push_back(index);
        }

        inventory
    }

    pub(crate) fn key(&self) -> &T::Key {
        &self.key
    }

    pub(crate) fn max_size(&self) -> usize {
        self.max_size
    }

    pub(crate) fn materialized(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn contains_slot(&self, index: usize) -> bool {
        index < self.slots.len()
    }

    fn materialize(&mut self, state: SlotState) -> usize {
        let mut resource = (self.factory)();
        resource.set_key(self.key.clone());

        if state == SlotState::Available {
            resource.park();
        }

        let index = self.slots.len();

        self.slots.push(Slot {
            resource,
            state,
            generation: 0,
            pending_release: None,
        });

        index
    }

    /// Takes the next resource to issue and marks it in use.
    ///
    /// Returns the slot index and the new issue generation, or `None` if the key is exhausted.
    pub(crate) fn checkout(&mut self) -> Option<(usize, u64)> {
        let index = if let Some(index) = self.available.pop_front() {
            let slot = self.slot_mut(index);
            debug_assert_eq!(slot.state, SlotState::Available);
            slot.state = SlotState::InUse;
            index
        } else if self.slots.len() < self.max_size {
            self.materialize(SlotState::InUse)
        } else {
            return None;
        };

        // We cannot overflow because every resource in use is a distinct slot.
        self.in_use = self.in_use.wrapping_add(1);

        let slot = self.slot_mut(index);
        slot.generation = slot.generation.wrapping_add(1);

        Some((index, slot.generation))
    }

    /// Prepares a freshly checked out resource and activates it if requested.
    ///
    /// Returns the delayed release the resource requested for itself while activating, if any.
    pub(crate) fn initialize(
        &mut self,
        index: usize,
        lease: Lease,
        options: AcquireOptions,
        prepare: impl FnOnce(&mut T),
    ) -> Option<Duration> {
        let slot = self
            .slots
            .get_mut(index)
            .expect("a checked out slot index always points at an existing slot");

        prepare(&mut slot.resource);

        if !options.activates() {
            return None;
        }

        let mut lifecycle = Lifecycle::new(&self.key, lease);
        slot.resource.activate(&mut lifecycle);

        lifecycle.requested_release()
    }

    /// Deactivates an in-use resource and appends it to the available queue.
    pub(crate) fn checkin(&mut self, index: usize) {
        let slot = self.slot_mut(index);
        debug_assert_eq!(slot.state, SlotState::InUse);
        debug_assert!(slot.pending_release.is_none());

        slot.resource.deactivate();
        slot.resource.park();
        slot.state = SlotState::Available;

        self.available.push_back(index);

        // We cannot underflow because the slot we just returned was in use.
        self.in_use = self.in_use.wrapping_sub(1);
    }

    pub(crate) fn generation(&self, index: usize) -> u64 {
        self.slot(index).generation
    }

    pub(crate) fn is_available(&self, index: usize) -> bool {
        self.slot(index).state == SlotState::Available
    }

    /// Whether `lease` is the current lease of an in-use resource of this inventory.
    pub(crate) fn is_current(&self, lease: Lease) -> bool {
        self.slots.get(lease.id().slot()).is_some_and(|slot| {
            slot.state == SlotState::InUse && slot.generation == lease.generation()
        })
    }

    pub(crate) fn pending_release(&self, index: usize) -> Option<PendingRelease> {
        self.slot(index).pending_release
    }

    /// Replaces the pending release of a resource, returning the one it replaced.
    pub(crate) fn replace_pending_release(
        &mut self,
        index: usize,
        pending: Option<PendingRelease>,
    ) -> Option<PendingRelease> {
        std::mem::replace(&mut self.slot_mut(index).pending_release, pending)
    }

    pub(crate) fn resource(&self, index: usize) -> &T {
        &self.slot(index).resource
    }

    pub(crate) fn resource_mut(&mut self, index: usize) -> &mut T {
        &mut self.slot_mut(index).resource
    }

    /// Slot indexes and generations of every resource in use, in materialization order.
    pub(crate) fn in_use_slots(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == SlotState::InUse)
            .map(|(index, slot)| (index, slot.generation))
    }

    /// Timers of every pending delayed release.
    pub(crate) fn pending_timers(&self) -> impl Iterator<Item = TimerId> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.pending_release.map(|pending| pending.timer))
    }

    pub(crate) fn stats(&self) -> KeyStats {
        KeyStats {
            available: self.available.len(),
            in_use: self.in_use,
            materialized: self.slots.len(),
            max_size: self.max_size,
        }
    }

    pub(crate) fn in_use_count(&self) -> usize {
        self.in_use
    }

    fn slot(&self, index: usize) -> &Slot<T> {
        self.slots
            .get(index)
            .expect("slot indexes are validated before use and slots are never removed")
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        self.slots
            .get_mut(index)
            .expect("slot indexes are validated before use and slots are never removed")
    }
}

impl<T: Poolable> fmt::Debug for Inventory<T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("key", &self.key)
            .field("max_size", &self.max_size)
            .field("materialized", &self.slots.len())
            .field("available", &self.available)
            .field("in_use", &self.in_use)
            .finish_non_exhaustive()
    }
}
