//! Foundation layer: identity, events and errors.

pub mod error;
pub mod event;

pub use error::{AliasConflict, BoxError, DispatchError, DispatchResult, OutboundError};
pub use event::{
    ActorKey, ChannelId, EventKind, InboundEvent, InvalidLocale, Locale, MessageId, OptionValue,
    Payload, UserId,
};
