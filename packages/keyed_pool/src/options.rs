/// Adjusts how [`KeyedPool`][crate::KeyedPool] issues a resource.
///
/// # Example
///
/// ```rust
/// use keyed_pool::AcquireOptions;
///
/// // Issue the resource without running its activation hook, e.g. to inspect it first.
/// let options = AcquireOptions::new().activate(false);
/// assert!(!options.activates());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub struct AcquireOptions {
    activate: bool,
}

impl AcquireOptions {
    /// The default options: the resource is activated when issued.
    pub fn new() -> Self {
        Self { activate: true }
    }

    /// Sets whether [`Poolable::activate()`][crate::Poolable::activate] is called on the
    /// issued resource.
    pub fn activate(mut self, activate: bool) -> Self {
        self.activate = activate;
        self
    }

    /// Whether the issued resource will be activated.
    #[must_use]
    pub fn activates(&self) -> bool {
        self.activate
    }
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// What a release request did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Released {
    /// The resource was deactivated and is available for reuse.
    Reclaimed,

    /// The resource will be reclaimed when the scheduled delay elapses, unless another release
    /// request for it comes first.
    Scheduled,

    /// The resource was already available. Nothing changed.
    AlreadyAvailable,

    /// The lease is outdated: the resource was returned and has since been issued again.
    /// Nothing changed.
    Stale,
}
