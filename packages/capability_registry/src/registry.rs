use std::any::{Any, TypeId, type_name};
use std::collections::hash_map;
use std::fmt;
use std::rc::Rc;

use hash_hasher::HashedMap;
use tracing::{debug, warn};

use crate::{RegistryError, RegistryEvent, RegistryEventKind, SubscriptionId};

// TypeId already is a hash, so HashedMap uses its raw value instead of hashing it again.
type Entries = HashedMap<TypeId, Entry>;

type Observer = Box<dyn FnMut(&RegistryEvent)>;

struct Entry {
    capability: &'static str,

    // Always holds an `Rc<C>` where `C` is the capability type this entry is keyed by.
    instance: Box<dyn Any>,
}

/// Maps capability types to the single instance currently providing each of them.
///
/// The capability type `C` is the lookup key. It may be unsized, so trait object types such as
/// `dyn Clock` are the typical choice: the registering side provides an `Rc<dyn Clock>` and
/// consumers get back the same `Rc<dyn Clock>` without knowing the concrete type.
///
/// # Example
///
/// ```rust
/// use std::rc::Rc;
///
/// use capability_registry::{CapabilityRegistry, RegistryError};
///
/// trait Clock {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock(u64);
///
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         self.0
///     }
/// }
///
/// let mut registry = CapabilityRegistry::new();
///
/// let clock: Rc<dyn Clock> = Rc::new(FixedClock(5));
/// registry.register(Rc::clone(&clock)).unwrap();
///
/// // The first registration wins.
/// let other: Rc<dyn Clock> = Rc::new(FixedClock(9));
/// assert!(matches!(
///     registry.register(other),
///     Err(RegistryError::AlreadyRegistered { .. })
/// ));
/// assert_eq!(registry.get::<dyn Clock>().unwrap().now(), 5);
///
/// registry.deregister(&clock).unwrap();
/// assert!(registry.get::<dyn Clock>().is_none());
/// ```
pub struct CapabilityRegistry {
    entries: Entries,

    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription_id: u64,
}

impl CapabilityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Entries::default(),
            observers: Vec::new(),
            next_subscription_id: 0,
        }
    }

    /// Registers `instance` as the provider of capability `C`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if an instance is already registered
    /// for `C`. The existing registration is kept and `instance` is dropped.
    pub fn register<C>(&mut self, instance: Rc<C>) -> Result<(), RegistryError>
    where
        C: ?Sized + 'static,
    {
        let capability = type_name::<C>();

        match self.entries.entry(TypeId::of::<C>()) {
            hash_map::Entry::Occupied(_) => {
                warn!(capability, "capability already registered, keeping existing instance");
                return Err(RegistryError::AlreadyRegistered { capability });
            }
            hash_map::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    capability,
                    instance: Box::new(instance),
                });
            }
        }

        debug!(capability, "capability registered");
        self.notify(RegistryEvent::new(RegistryEventKind::Registered, capability));

        Ok(())
    }

    /// Removes the registration of capability `C`, provided that `instance` is the instance
    /// that was registered for it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] if nothing is registered for `C` or if
    /// a different instance is registered. The registry is left unchanged in both cases.
    pub fn deregister<C>(&mut self, instance: &Rc<C>) -> Result<(), RegistryError>
    where
        C: ?Sized + 'static,
    {
        let capability = type_name::<C>();

        let hash_map::Entry::Occupied(occupied) = self.entries.entry(TypeId::of::<C>()) else {
            warn!(capability, "cannot deregister capability that is not registered");
            return Err(RegistryError::NotRegistered { capability });
        };

        let is_same_instance = occupied
            .get()
            .instance
            .downcast_ref::<Rc<C>>()
            .is_some_and(|registered| Rc::ptr_eq(registered, instance));

        if !is_same_instance {
            warn!(
                capability,
                "cannot deregister capability, a different instance is registered"
            );
            return Err(RegistryError::NotRegistered { capability });
        }

        occupied.remove();

        debug!(capability, "capability deregistered");
        self.notify(RegistryEvent::new(
            RegistryEventKind::Deregistered,
            capability,
        ));

        Ok(())
    }

    /// Returns the instance registered for capability `C`, if any.
    #[must_use]
    pub fn get<C>(&self) -> Option<Rc<C>>
    where
        C: ?Sized + 'static,
    {
        self.entries
            .get(&TypeId::of::<C>())
            .and_then(|entry| entry.instance.downcast_ref::<Rc<C>>())
            .map(Rc::clone)
    }

    /// Returns the instance registered for capability `C`, treating absence as an error.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] if nothing is registered for `C`.
    pub fn require<C>(&self) -> Result<Rc<C>, RegistryError>
    where
        C: ?Sized + 'static,
    {
        self.get::<C>().ok_or(RegistryError::NotRegistered {
            capability: type_name::<C>(),
        })
    }

    /// Whether an instance is registered for capability `C`.
    #[must_use]
    pub fn contains<C>(&self) -> bool
    where
        C: ?Sized + 'static,
    {
        self.entries.contains_key(&TypeId::of::<C>())
    }

    /// The number of registered capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no capability is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names of the registered capabilities, in no particular order.
    pub fn capabilities(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|entry| entry.capability)
    }

    /// Calls `observer` after every successful registration and deregistration.
    ///
    /// Observers are called in subscription order.
    pub fn subscribe(&mut self, observer: impl FnMut(&RegistryEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription_id);
        self.next_subscription_id = self.next_subscription_id.wrapping_add(1);

        self.observers.push((id, Box::new(observer)));

        id
    }

    /// Removes a subscription. Returns `false` if it did not exist.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let count_before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);

        self.observers.len() != count_before
    }

    fn notify(&mut self, event: RegistryEvent) {
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapabilityRegistry {
    #[cfg_attr(test, mutants::skip)] // Debug output is not part of the contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capabilities().collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::RefCell;

    use static_assertions::assert_not_impl_any;

    use super::*;

    trait Counter {
        fn value(&self) -> u32;
    }

    struct FixedCounter(u32);

    impl Counter for FixedCounter {
        fn value(&self) -> u32 {
            self.0
        }
    }

    trait Label {
        fn text(&self) -> &str;
    }

    struct StaticLabel;

    impl Label for StaticLabel {
        fn text(&self) -> &str {
            "label"
        }
    }

    #[test]
    fn single_threaded_assertions() {
        assert_not_impl_any!(CapabilityRegistry: Send, Sync);
    }

    #[test]
    fn get_unregistered_is_none() {
        let registry = CapabilityRegistry::new();

        assert!(registry.get::<dyn Counter>().is_none());
        assert!(!registry.contains::<dyn Counter>());
        assert!(registry.is_empty());
    }

    #[test]
    fn register_then_get() {
        let mut registry = CapabilityRegistry::new();

        let counter: Rc<dyn Counter> = Rc::new(FixedCounter(7));
        registry.register(Rc::clone(&counter)).unwrap();

        let found = registry.get::<dyn Counter>().unwrap();
        assert!(Rc::ptr_eq(&found, &counter));
        assert_eq!(found.value(), 7);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn second_registration_is_rejected() {
        let mut registry = CapabilityRegistry::new();

        let first: Rc<dyn Counter> = Rc::new(FixedCounter(1));
        let second: Rc<dyn Counter> = Rc::new(FixedCounter(2));

        registry.register(Rc::clone(&first)).unwrap();
        let result = registry.register(second);

        assert!(matches!(
            result,
            Err(RegistryError::AlreadyRegistered { .. })
        ));
        assert!(Rc::ptr_eq(&registry.get::<dyn Counter>().unwrap(), &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn capabilities_are_independent() {
        let mut registry = CapabilityRegistry::new();

        registry
            .register::<dyn Counter>(Rc::new(FixedCounter(3)))
            .unwrap();
        registry.register::<dyn Label>(Rc::new(StaticLabel)).unwrap();
        registry.register(Rc::new(FixedCounter(4))).unwrap();

        assert_eq!(registry.get::<dyn Counter>().unwrap().value(), 3);
        assert_eq!(registry.get::<dyn Label>().unwrap().text(), "label");
        // The concrete type is a capability of its own.
        assert_eq!(registry.get::<FixedCounter>().unwrap().value(), 4);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn deregister_removes_entry() {
        let mut registry = CapabilityRegistry::new();

        let counter: Rc<dyn Counter> = Rc::new(FixedCounter(1));
        registry.register(Rc::clone(&counter)).unwrap();
        registry.deregister(&counter).unwrap();

        assert!(registry.get::<dyn Counter>().is_none());
        assert!(registry.is_empty());

        // The capability can be registered again afterwards.
        registry.register(counter).unwrap();
        assert!(registry.contains::<dyn Counter>());
    }

    #[test]
    fn deregister_unregistered_fails() {
        let mut registry = CapabilityRegistry::new();

        let counter: Rc<dyn Counter> = Rc::new(FixedCounter(1));

        assert!(matches!(
            registry.deregister(&counter),
            Err(RegistryError::NotRegistered { .. })
        ));
    }

    #[test]
    fn deregister_with_other_instance_keeps_registration() {
        let mut registry = CapabilityRegistry::new();

        let registered: Rc<dyn Counter> = Rc::new(FixedCounter(1));
        let impostor: Rc<dyn Counter> = Rc::new(FixedCounter(2));

        registry.register(Rc::clone(&registered)).unwrap();

        assert!(matches!(
            registry.deregister(&impostor),
            Err(RegistryError::NotRegistered { .. })
        ));
        assert!(Rc::ptr_eq(
            &registry.get::<dyn Counter>().unwrap(),
            &registered
        ));
    }

    #[test]
    fn require_reports_absence() {
        let mut registry = CapabilityRegistry::new();

        let error = registry.require::<dyn Counter>().err().unwrap();
        assert!(error.capability().contains("Counter"));

        registry
            .register::<dyn Counter>(Rc::new(FixedCounter(5)))
            .unwrap();
        assert_eq!(registry.require::<dyn Counter>().unwrap().value(), 5);
    }

    #[test]
    fn observers_see_successful_changes_only() {
        let mut registry = CapabilityRegistry::new();

        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = Rc::clone(&events);
        registry.subscribe(move |event| events_clone.borrow_mut().push(*event));

        let counter: Rc<dyn Counter> = Rc::new(FixedCounter(1));
        registry.register(Rc::clone(&counter)).unwrap();
        registry
            .register::<dyn Counter>(Rc::new(FixedCounter(2)))
            .unwrap_err();
        registry.deregister(&counter).unwrap();
        registry.deregister(&counter).unwrap_err();

        let events = events.borrow();
        assert_eq!(events.len(), 2);

        let first = events.first().unwrap();
        assert_eq!(first.kind(), RegistryEventKind::Registered);
        assert!(first.capability().contains("Counter"));

        let second = events.get(1).unwrap();
        assert_eq!(second.kind(), RegistryEventKind::Deregistered);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let mut registry = CapabilityRegistry::new();

        let count = Rc::new(RefCell::new(0_u32));
        let count_clone = Rc::clone(&count);
        let id = registry.subscribe(move |_| *count_clone.borrow_mut() += 1);

        registry.register::<dyn Label>(Rc::new(StaticLabel)).unwrap();
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));

        registry
            .register::<dyn Counter>(Rc::new(FixedCounter(1)))
            .unwrap();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn debug_lists_capabilities() {
        let mut registry = CapabilityRegistry::new();
        registry.register::<dyn Label>(Rc::new(StaticLabel)).unwrap();

        let debug = format!("{registry:?}");
        assert!(debug.contains("Label"));
    }
}
