use std::any::type_name;
use std::fmt;

/// Describes the inventory of one key: how to create resources and how many of them to have.
///
/// `initial_size` resources are created when the pool is built. More are created one at a time
/// when the key runs out of available resources, until `max_size` resources exist. The maximum
/// counts every resource ever created for the key, not only those in use.
///
/// # Examples
///
/// ```
/// use keyed_pool::PoolConfig;
///
/// // Clone a prototype for every new resource.
/// let bullets = PoolConfig::from_prototype(String::from("bullet"))
///     .initial_size(16)
///     .max_size(64);
///
/// // Or create each resource with a closure.
/// let mut next_id = 0;
/// let numbered = PoolConfig::from_factory(move || {
///     next_id += 1;
///     next_id
/// })
/// .max_size(8);
/// ```
#[must_use]
pub struct PoolConfig<T> {
    factory: Box<dyn FnMut() -> T>,
    initial_size: usize,
    max_size: usize,
}

impl<T: 'static> PoolConfig<T> {
    /// Every resource of the key starts as a clone of `prototype`.
    pub fn from_prototype(prototype: T) -> Self
    where
        T: Clone,
    {
        Self::from_factory(move || prototype.clone())
    }

    /// Every resource of the key is created by calling `factory`.
    pub fn from_factory(factory: impl FnMut() -> T + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            initial_size: 0,
            max_size: 0,
        }
    }
}

impl<T> PoolConfig<T> {
    /// Sets how many resources are created up front, when the pool is built. Defaults to zero.
    pub fn initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    /// Sets the maximum number of resources that may ever exist for the key.
    ///
    /// There is no default: a key configured without a maximum size fails validation.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub(crate) fn initial(&self) -> usize {
        self.initial_size
    }

    pub(crate) fn max(&self) -> usize {
        self.max_size
    }

    pub(crate) fn into_factory(self) -> Box<dyn FnMut() -> T> {
        self.factory
    }
}

impl<T> fmt::Debug for PoolConfig<T> {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("resource_type", &format_args!("{}", type_name::<T>()))
            .field("initial_size", &self.initial_size)
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn sizes_default_to_zero() {
        let config = PoolConfig::from_prototype(5_u32);

        assert_eq!(config.initial(), 0);
        assert_eq!(config.max(), 0);
    }

    #[test]
    fn factory_is_called_per_resource() {
        let mut next = 0;
        let config = PoolConfig::from_factory(move || {
            next += 1;
            next
        })
        .initial_size(1)
        .max_size(2);

        assert_eq!(config.initial(), 1);
        assert_eq!(config.max(), 2);

        let mut factory = config.into_factory();
        assert_eq!(factory(), 1);
        assert_eq!(factory(), 2);
    }

    #[test]
    fn prototype_is_cloned() {
        let mut factory = PoolConfig::from_prototype(String::from("bullet")).into_factory();

        assert_eq!(factory(), "bullet");
        assert_eq!(factory(), "bullet");
    }
}
