//! Eventline: an embeddable event-sourcing runtime providing a transactional
//! message store and partition-ordered, exactly-once dispatch to reactors.
//!
//! A host process builds a [`Store`] backend, wraps it in a [`Config`],
//! registers one or more [`Reactor`] implementations (deciders, projectors,
//! or plain consumers), and starts a [`Dispatcher`] to drive them. Direct
//! callers that don't need the background dispatcher can drive reactors
//! synchronously through [`Router::drain`].

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod error_strategy;
pub mod guard;
pub mod message;
pub mod notifier;
pub mod queue;
pub mod reactor;
pub mod router;
pub mod store;

pub use config::{Config, ConfigBuilder};
pub use dispatcher::Dispatcher;
pub use error::{EventlineError, Result};
pub use guard::{Condition, Guard};
pub use message::{Message, MessageBuilder, MessageRegistry, Position};
pub use reactor::{Action, ActionBatch, GroupProxy, History, Reactor};
pub use router::Router;
pub use store::{memory::MemoryStore, Claim, ConsumerGroup, GroupStatus, Offset, Store};

/// Crate version, exposed for hosts that want to stamp it into their own
/// diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
