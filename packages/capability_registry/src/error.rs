use thiserror::Error;

/// Errors reported by [`CapabilityRegistry`][crate::CapabilityRegistry] operations.
///
/// None of these leave the registry in a modified state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// An instance is already registered for this capability. The existing registration
    /// was left untouched.
    #[error("capability {capability} is already registered")]
    AlreadyRegistered {
        /// Type name of the capability.
        capability: &'static str,
    },

    /// The capability is not registered, or is registered with a different instance
    /// than the one provided.
    #[error("capability {capability} is not registered")]
    NotRegistered {
        /// Type name of the capability.
        capability: &'static str,
    },
}

impl RegistryError {
    /// Type name of the capability the failed operation referenced.
    #[must_use]
    pub fn capability(&self) -> &'static str {
        match self {
            Self::AlreadyRegistered { capability } | Self::NotRegistered { capability } => {
                capability
            }
        }
    }
}
