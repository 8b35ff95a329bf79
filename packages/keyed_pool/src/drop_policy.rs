/// Determines what happens when a pool is dropped while some of its resources are in use.
///
/// # Examples
///
/// ```
/// use keyed_pool::DropPolicy;
///
/// assert_eq!(DropPolicy::default(), DropPolicy::MayDropItems);
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// All resources are dropped together with the pool, including those still in use.
    /// This is the default.
    #[default]
    MayDropItems,

    /// The pool panics if it is dropped while any resource is still in use.
    ///
    /// Use this to catch code that forgets to return what it acquired, e.g. at the end of
    /// a level or a test.
    MustNotDropItems,
}
