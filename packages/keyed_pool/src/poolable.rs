use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use crate::Lease;

/// Identifies one of the independent sub-inventories of a [`KeyedPool`][crate::KeyedPool].
///
/// Implemented for every type that fits: typically a fieldless enum or an interned string.
pub trait PoolKey: Clone + Eq + Hash + Debug + 'static {}

impl<K> PoolKey for K where K: Clone + Eq + Hash + Debug + 'static {}

/// A resource that can be recycled by a [`KeyedPool`][crate::KeyedPool].
///
/// The pool creates each resource once, tags it with its key and then moves it between two
/// states for the rest of its life:
///
/// * **Available** - waiting in the pool, deactivated, owned by nobody.
/// * **In use** - issued to exactly one caller, activated.
///
/// The hooks are called by the pool while it is internally borrowed. They must not call back into
/// the pool, which panics. A resource that wants to return itself after some time requests it
/// through the [`Lifecycle`] passed to [`activate()`][Self::activate].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
///
/// use keyed_pool::{Lifecycle, Poolable};
///
/// #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
/// enum Effect {
///     Spark,
/// }
///
/// #[derive(Clone, Default)]
/// struct Particle {
///     key: Option<Effect>,
///     velocity: f32,
/// }
///
/// impl Poolable for Particle {
///     type Key = Effect;
///
///     fn key(&self) -> Option<&Effect> {
///         self.key.as_ref()
///     }
///
///     fn set_key(&mut self, key: Effect) {
///         self.key = Some(key);
///     }
///
///     fn activate(&mut self, lifecycle: &mut Lifecycle<'_, Effect>) {
///         self.velocity = 0.0;
///
///         // Sparks burn out on their own.
///         lifecycle.release_after(Duration::from_millis(250));
///     }
///
///     fn deactivate(&mut self) {}
/// }
/// ```
pub trait Poolable: 'static {
    /// The key type of the pools this resource lives in.
    type Key: PoolKey;

    /// The key assigned by the pool, or `None` if the resource has not been tagged yet.
    fn key(&self) -> Option<&Self::Key>;

    /// Tags the resource with its key. Called by the pool once, when the resource is created.
    fn set_key(&mut self, key: Self::Key);

    /// Called when the resource is issued. Must reset any transient state left over from the
    /// previous use.
    fn activate(&mut self, lifecycle: &mut Lifecycle<'_, Self::Key>);

    /// Called when the resource is reclaimed. Must release anything the resource acquired
    /// privately while in use.
    fn deactivate(&mut self);

    /// Moves the resource into a neutral holding state after it has been deactivated,
    /// e.g. detaching it from whatever context it was placed into.
    fn park(&mut self) {}
}

/// A resource that is placed somewhere when it is issued, e.g. at a position in a scene.
///
/// Placement is applied by [`KeyedPool::acquire_placed()`][crate::KeyedPool::acquire_placed]
/// before [`Poolable::activate()`] runs, so activation observes the final placement.
pub trait Placeable {
    /// Describes where the resource goes, for example an absolute transform or a parent
    /// plus a relative offset.
    type Placement;

    /// Applies the placement.
    fn place(&mut self, placement: Self::Placement);
}

/// Context given to [`Poolable::activate()`].
#[derive(Debug)]
pub struct Lifecycle<'a, K> {
    key: &'a K,
    lease: Lease,
    release_after: Option<Duration>,
}

impl<'a, K> Lifecycle<'a, K> {
    pub(crate) fn new(key: &'a K, lease: Lease) -> Self {
        Self {
            key,
            lease,
            release_after: None,
        }
    }

    /// The key of the resource being activated.
    #[must_use]
    pub fn key(&self) -> &K {
        self.key
    }

    /// The lease the caller will receive for the resource being activated.
    #[must_use]
    pub fn lease(&self) -> Lease {
        self.lease
    }

    /// Requests that the pool reclaims this resource once `delay` has elapsed.
    ///
    /// The request is scheduled as soon as activation completes. It behaves exactly like
    /// [`KeyedPool::release_after()`][crate::KeyedPool::release_after] called by the owner,
    /// so a later release by the owner supersedes it. Calling this more than once keeps only
    /// the last delay.
    pub fn release_after(&mut self, delay: Duration) {
        self.release_after = Some(delay);
    }

    pub(crate) fn requested_release(&self) -> Option<Duration> {
        self.release_after
    }
}
