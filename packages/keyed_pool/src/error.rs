use thiserror::Error;

use crate::Lease;

/// Errors reported by pool and pool service operations.
///
/// Every error leaves the pool exactly as it was before the call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Every resource of the key is in use and the key has reached its maximum size.
    ///
    /// This is an expected condition under load. The caller decides whether to skip the work,
    /// retry later or release something first.
    #[error("pool exhausted for key {key}: all {max_size} resources are in use")]
    Exhausted {
        /// Debug representation of the key.
        key: String,

        /// The configured maximum size of the key.
        max_size: usize,
    },

    /// The key is not part of the pool configuration.
    #[error("key {key} is not configured in this pool")]
    UnknownKey {
        /// Debug representation of the key.
        key: String,
    },

    /// The lease was not issued by this pool. Pooled resources can only be returned to the pool
    /// that issued them.
    #[error("{lease:?} was not issued by this pool")]
    InvalidRelease {
        /// The rejected lease.
        lease: Lease,
    },

    /// A delayed release was requested from a pool built without a scheduler.
    #[error("delayed release requires a scheduler but the pool has none")]
    NoScheduler,

    /// The pool service has no pool with this name.
    #[error("pool service has no pool named '{name}'")]
    UnknownPool {
        /// The requested pool name.
        name: String,
    },

    /// The named pool exists but holds a different resource type than requested.
    #[error("pool '{name}' holds {actual}, not {expected}")]
    PoolTypeMismatch {
        /// The requested pool name.
        name: String,

        /// The resource type the caller asked for.
        expected: &'static str,

        /// The resource type the pool holds.
        actual: &'static str,
    },
}

impl PoolError {
    /// Whether this is [`PoolError::Exhausted`].
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Errors detected when validating configuration at build time.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A pool needs at least one key.
    #[error("a pool must be configured with at least one key")]
    NoKeys,

    /// The same key was configured twice.
    #[error("key {key} is configured more than once")]
    DuplicateKey {
        /// Debug representation of the key.
        key: String,
    },

    /// A key must allow at least one resource.
    #[error("key {key} has a maximum size of zero")]
    ZeroMaxSize {
        /// Debug representation of the key.
        key: String,
    },

    /// A key cannot start with more resources than it is allowed to have.
    #[error("key {key} has initial size {initial_size} above its maximum size {max_size}")]
    InitialExceedsMax {
        /// Debug representation of the key.
        key: String,

        /// The configured initial size.
        initial_size: usize,

        /// The configured maximum size.
        max_size: usize,
    },

    /// A pool service needs at least one pool.
    #[error("a pool service must contain at least one pool")]
    NoPools,

    /// Two pools in a pool service share a name.
    #[error("pool name '{name}' is used more than once")]
    DuplicatePool {
        /// The duplicated name.
        name: String,
    },
}
