/// What happened to a capability registration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RegistryEventKind {
    /// An instance was registered for the capability.
    Registered,

    /// The instance registered for the capability was removed.
    Deregistered,
}

/// Notification delivered to registry subscribers after a registration changes.
///
/// Events are a side channel for diagnostics and similar tooling. They carry the capability
/// type name but not the instance itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegistryEvent {
    kind: RegistryEventKind,
    capability: &'static str,
}

impl RegistryEvent {
    pub(crate) fn new(kind: RegistryEventKind, capability: &'static str) -> Self {
        Self { kind, capability }
    }

    /// Whether the capability was registered or deregistered.
    #[must_use]
    pub fn kind(&self) -> RegistryEventKind {
        self.kind
    }

    /// Type name of the capability whose registration changed.
    #[must_use]
    pub fn capability(&self) -> &'static str {
        self.capability
    }
}

/// Identifies a subscription created by
/// [`CapabilityRegistry::subscribe()`][crate::CapabilityRegistry::subscribe].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionId(pub(crate) u64);
