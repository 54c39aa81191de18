//! Event pre-processing hooks.
//!
//! An [`EventProcessor`] is consulted by the pipeline before any routing
//! happens. It decides whether an event is processed at all, which text
//! prefix applies to it and which locale it should be handled in.
//!
//! Every hook has a default, so implementors override only what they need:
//!
//! ```rust,ignore
//! struct GuildPrefixes(HashMap<ChannelId, String>);
//!
//! #[async_trait]
//! impl EventProcessor for GuildPrefixes {
//!     async fn prefix(&self, event: &InboundEvent) -> Option<String> {
//!         self.0.get(&event.channel()).cloned()
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::BoxError;
use crate::foundation::event::{InboundEvent, Locale};

/// Filters events and resolves their prefix and locale.
#[async_trait]
pub trait EventProcessor: Send + Sync {
    /// Returns `Ok(false)` to drop the event. Errors are treated as a drop.
    ///
    /// The default drops events authored by bots.
    async fn filter(&self, event: &InboundEvent) -> Result<bool, BoxError> {
        Ok(!event.is_from_bot())
    }

    /// Text prefix for message-text events. `None` selects the configured default.
    async fn prefix(&self, _event: &InboundEvent) -> Option<String> {
        None
    }

    /// Resolves the effective locale. `Ok(None)` and errors fall back to the
    /// configured default.
    ///
    /// The default parses the event's locale hint.
    async fn locale(&self, event: &InboundEvent) -> Result<Option<Locale>, BoxError> {
        match event.locale_hint() {
            Some(hint) => Ok(Some(hint.parse()?)),
            None => Ok(None),
        }
    }
}

/// Shared processor handle.
pub type BoxedEventProcessor = Arc<dyn EventProcessor>;

/// Processor with every hook left at its default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEventProcessor;

impl EventProcessor for DefaultEventProcessor {}
