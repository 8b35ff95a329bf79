use std::sync::atomic::{AtomicU64, Ordering};

/// Distinguishes pool instances so that a lease can only be redeemed at the pool that issued it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct PoolId(u64);

impl PoolId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);

        // Relaxed is enough, we only need every value to be unique.
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifies one resource materialized by a pool, for as long as the pool exists.
///
/// Unlike a [`Lease`], the identity does not change when the resource is reissued. It is what
/// a [`Scheduler`][crate::Scheduler] receives as the owner of a delayed release.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ResourceId {
    pool: PoolId,
    key_index: usize,
    slot: usize,
}

impl ResourceId {
    pub(crate) fn new(pool: PoolId, key_index: usize, slot: usize) -> Self {
        Self {
            pool,
            key_index,
            slot,
        }
    }

    pub(crate) fn pool(self) -> PoolId {
        self.pool
    }

    /// Position of the resource's key in the pool configuration.
    #[must_use]
    pub fn key_index(self) -> usize {
        self.key_index
    }

    /// Position of the resource among the resources of its key, in materialization order.
    #[must_use]
    pub fn slot(self) -> usize {
        self.slot
    }
}

/// Proof that the holder was issued a resource by a [`KeyedPool`][crate::KeyedPool].
///
/// A lease is handed out by `acquire` and redeemed by `release`. It is valid from the moment it is
/// issued until the resource returns to the pool. After that, every use of the lease is
/// harmless: a resource that has since been issued to somebody else is never released or exposed
/// through an old lease.
///
/// Leases are small `Copy` values. Copying one does not grant additional ownership.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Lease {
    id: ResourceId,
    generation: u64,
}

impl Lease {
    pub(crate) fn new(id: ResourceId, generation: u64) -> Self {
        Self { id, generation }
    }

    /// The identity of the leased resource.
    #[must_use]
    pub fn id(self) -> ResourceId {
        self.id
    }

    pub(crate) fn generation(self) -> u64 {
        self.generation
    }
}
