//! `planner-events`: typed in-process publish/subscribe for meeting lifecycle events.
//!
//! Producers call [`EventBus::publish`]; consumers register an [`EventHandler`]
//! for one [`EventTag`]. The tag set is closed, so every producer and consumer
//! is checked against the same enum.

pub mod bus;
pub mod error;
pub mod types;

pub use bus::{EventBus, SubscriptionId};
pub use error::{EventError, Result};
pub use types::{EventHandler, EventTag, LifecycleEvent};
