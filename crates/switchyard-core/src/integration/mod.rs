//! Integration layer: interfaces to collaborators outside the dispatch core.

pub mod outbound;
pub mod processor;

pub use outbound::{AckMode, BoxedOutbound, NoopOutbound, Outbound};
pub use processor::{BoxedEventProcessor, DefaultEventProcessor, EventProcessor};
