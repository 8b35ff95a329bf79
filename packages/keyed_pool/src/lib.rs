#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! This package provides [`KeyedPool`], a bounded pool of reusable resources partitioned by key,
//! for applications that spawn and despawn many short-lived objects, such as projectiles,
//! particles or enemies in a game loop.
//!
//! Creating such objects is often expensive while resetting them is cheap. The pool creates each
//! resource once and from then on only moves it between two states: available in the pool or in
//! use by exactly one caller. [`Poolable`] hooks reset the resource at each transition.
//!
//! # Features
//!
//! - **Keyed inventories**: every key has its own factory, initial size and maximum size.
//! - **Bounded**: a key never grows beyond its maximum size. Exhaustion is a recoverable
//!   [`PoolError::Exhausted`], not a panic.
//! - **Safe leases**: [`Lease`] handles detect reuse, so releasing twice or releasing through an
//!   outdated lease never affects another owner.
//! - **Delayed release**: reclaim a resource after a delay through any [`Scheduler`], including
//!   the tick-driven [`TickScheduler`]. Resources may limit their own lifetime.
//! - **Bulk release**: return everything, or everything of one key, in one call.
//! - **Service bundle**: [`PoolService`] groups named pools and makes them reachable through a
//!   [`CapabilityRegistry`][capability_registry::CapabilityRegistry].
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! use keyed_pool::{KeyedPool, Lifecycle, PoolConfig, Poolable, TickScheduler};
//!
//! #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
//! enum Projectile {
//!     Arrow,
//!     Fireball,
//! }
//!
//! #[derive(Clone, Default)]
//! struct Shot {
//!     kind: Option<Projectile>,
//!     distance: f32,
//! }
//!
//! impl Poolable for Shot {
//!     type Key = Projectile;
//!
//!     fn key(&self) -> Option<&Projectile> {
//!         self.kind.as_ref()
//!     }
//!
//!     fn set_key(&mut self, key: Projectile) {
//!         self.kind = Some(key);
//!     }
//!
//!     fn activate(&mut self, lifecycle: &mut Lifecycle<'_, Projectile>) {
//!         self.distance = 0.0;
//!
//!         // Shots that hit nothing disappear after a while.
//!         lifecycle.release_after(Duration::from_secs(2));
//!     }
//!
//!     fn deactivate(&mut self) {}
//! }
//!
//! let scheduler = Rc::new(TickScheduler::new());
//!
//! let pool = KeyedPool::builder()
//!     .key(
//!         Projectile::Arrow,
//!         PoolConfig::from_prototype(Shot::default())
//!             .initial_size(20)
//!             .max_size(50),
//!     )
//!     .key(
//!         Projectile::Fireball,
//!         PoolConfig::from_prototype(Shot::default()).max_size(5),
//!     )
//!     .scheduler(scheduler.clone())
//!     .build()
//!     .unwrap();
//!
//! let arrow = pool.acquire(&Projectile::Arrow).unwrap();
//! assert!(pool.is_in_use(arrow));
//!
//! // The arrow hit something before its time ran out.
//! pool.release(arrow).unwrap();
//! assert!(!pool.is_in_use(arrow));
//!
//! let fireball = pool.acquire(&Projectile::Fireball).unwrap();
//!
//! // One tick of the game loop, long enough for the fireball to burn out.
//! scheduler.advance(Duration::from_secs(3));
//! assert!(!pool.is_in_use(fireball));
//! ```
//!
//! # Thread safety
//!
//! Pools are single-threaded. Every pool operation, every resource hook and every scheduler
//! callback runs on the thread that owns the pool. The pool types are neither [`Send`] nor
//! [`Sync`].

mod builder;
mod config;
mod drop_policy;
mod error;
mod inventory;
mod lease;
mod options;
mod pool;
mod poolable;
mod scheduler;
mod service;
mod stats;
mod tick_scheduler;

pub use builder::*;
pub use config::*;
pub use drop_policy::*;
pub use error::*;
pub use lease::{Lease, ResourceId};
pub use options::*;
pub use pool::*;
pub use poolable::*;
pub use scheduler::*;
pub use service::*;
pub use stats::*;
pub use tick_scheduler::*;
