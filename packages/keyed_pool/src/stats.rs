/// A snapshot of the inventory of one key.
///
/// `available + in_use == materialized` and `materialized <= max_size` always hold.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct KeyStats {
    /// Resources waiting in the pool.
    pub available: usize,

    /// Resources issued and not yet returned.
    pub in_use: usize,

    /// Resources created so far, whatever their state.
    pub materialized: usize,

    /// The most resources the key may ever have.
    pub max_size: usize,
}

impl KeyStats {
    /// Whether another acquire would fail because the key is exhausted.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.available == 0 && self.materialized >= self.max_size
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn exhausted_only_when_nothing_left_to_give() {
        let full = KeyStats {
            available: 0,
            in_use: 3,
            materialized: 3,
            max_size: 3,
        };
        assert!(full.is_exhausted());

        let can_grow = KeyStats {
            available: 0,
            in_use: 2,
            materialized: 2,
            max_size: 3,
        };
        assert!(!can_grow.is_exhausted());

        let has_spare = KeyStats {
            available: 1,
            in_use: 2,
            materialized: 3,
            max_size: 3,
        };
        assert!(!has_spare.is_exhausted());
    }
}
