//! Priority event bus
//!
//! Decouples producers of lifecycle events from consumers (metrics,
//! alerting) through a single background dispatcher that delivers in
//! priority order.

mod dispatcher;
mod event;

pub use dispatcher::{EventBus, SubscriberError};
pub use event::{Event, EventKind, EventMetadata};
