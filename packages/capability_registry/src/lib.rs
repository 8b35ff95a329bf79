#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`CapabilityRegistry`], a lookup from an abstract capability type
//! to the one instance that currently provides it.
//!
//! A capability is usually a trait object type (e.g. `dyn Clock`) but any `'static` type works.
//! Components register the instance they provide and other components look it up by type,
//! without either side knowing about the other's concrete type.
//!
//! The registry is an ordinary value that the application creates and passes to whoever needs
//! it. There is no hidden global instance.
//!
//! # Rules
//!
//! * At most one instance is registered per capability type. A second registration is rejected
//!   with [`RegistryError::AlreadyRegistered`] and the first one stays in place.
//! * Looking up an unregistered capability returns `None`. The registry never constructs
//!   a default instance.
//! * Deregistering requires the same instance that was registered.
//!
//! Observers may [subscribe][CapabilityRegistry::subscribe] to registration and deregistration
//! events, e.g. for diagnostics.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use capability_registry::CapabilityRegistry;
//!
//! trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! let mut registry = CapabilityRegistry::new();
//! registry.register::<dyn Greeter>(Rc::new(English)).unwrap();
//!
//! let greeter = registry.get::<dyn Greeter>().unwrap();
//! assert_eq!(greeter.greet(), "hello");
//! ```
//!
//! # Thread safety
//!
//! The registry is single-threaded. It holds [`Rc`][std::rc::Rc] instances and is neither
//! [`Send`] nor [`Sync`].

mod error;
mod event;
mod registry;

pub use error::*;
pub use event::*;
pub use registry::*;
