//! Outbound collaborator.
//!
//! The dispatch core never talks to a chat platform directly. Anything that
//! leaves the process (interaction acknowledgements, replies and edits of
//! those replies) goes through an [`Outbound`] implementation supplied by
//! the embedding application.
//!
//! ```rust,ignore
//! struct Console;
//!
//! #[async_trait]
//! impl Outbound for Console {
//!     async fn acknowledge(&self, _: &InboundEvent, _: bool) -> Result<(), OutboundError> {
//!         Ok(())
//!     }
//!
//!     async fn send(&self, event: &InboundEvent, text: &str) -> Result<(), OutboundError> {
//!         println!("[{}] {text}", event.actor());
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::foundation::error::OutboundError;
use crate::foundation::event::InboundEvent;

/// How an interaction is acknowledged before its handler runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AckMode {
    /// Do not acknowledge; the handler is expected to respond itself.
    None,
    /// Defer with a visible "thinking" state.
    #[default]
    Defer,
    /// Defer, visible only to the invoking user.
    DeferEphemeral,
}

impl AckMode {
    /// Returns `true` unless the mode is [`AckMode::None`].
    pub fn acknowledges(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Returns `true` for [`AckMode::DeferEphemeral`].
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::DeferEphemeral)
    }
}

/// Sends acknowledgements and replies back to the platform.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Acknowledges an interaction event.
    async fn acknowledge(&self, event: &InboundEvent, ephemeral: bool)
    -> Result<(), OutboundError>;

    /// Sends a text reply in the context of `event`.
    async fn send(&self, event: &InboundEvent, text: &str) -> Result<(), OutboundError>;

    /// Replaces the text of the first reply sent for `event`.
    ///
    /// The default sends a new message instead, for platforms that cannot
    /// edit.
    async fn edit_reply(&self, event: &InboundEvent, text: &str) -> Result<(), OutboundError> {
        self.send(event, text).await
    }
}

/// Shared outbound handle.
pub type BoxedOutbound = Arc<dyn Outbound>;

/// An [`Outbound`] that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOutbound;

#[async_trait]
impl Outbound for NoopOutbound {
    async fn acknowledge(
        &self,
        event: &InboundEvent,
        ephemeral: bool,
    ) -> Result<(), OutboundError> {
        trace!(actor = %event.actor(), ephemeral, "Discarding acknowledgement");
        Ok(())
    }

    async fn send(&self, event: &InboundEvent, text: &str) -> Result<(), OutboundError> {
        trace!(actor = %event.actor(), len = text.len(), "Discarding reply");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::foundation::event::ActorKey;

    #[derive(Default)]
    struct SendOnly(Mutex<Vec<String>>);

    #[async_trait]
    impl Outbound for SendOnly {
        async fn acknowledge(&self, _: &InboundEvent, _: bool) -> Result<(), OutboundError> {
            Ok(())
        }

        async fn send(&self, _: &InboundEvent, text: &str) -> Result<(), OutboundError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_edit_reply_defaults_to_send() {
        let outbound = SendOnly::default();
        let event = InboundEvent::text(ActorKey::new(1, 2), "!pages");
        outbound.send(&event, "page 1").await.unwrap();
        outbound.edit_reply(&event, "page 2").await.unwrap();
        assert_eq!(*outbound.0.lock().unwrap(), ["page 1", "page 2"]);
    }

    #[test]
    fn test_ack_mode_serde() {
        let mode: AckMode = serde_json::from_str("\"defer-ephemeral\"").unwrap();
        assert_eq!(mode, AckMode::DeferEphemeral);
        assert!(mode.acknowledges());
        assert!(mode.is_ephemeral());
        assert!(!AckMode::None.acknowledges());
        assert_eq!(AckMode::default(), AckMode::Defer);
    }
}
