//! # Switchyard Core
//!
//! Foundation types shared by every layer of the Switchyard dispatch
//! framework.
//!
//! ## Foundation Layer
//!
//! - **Identity**: [`UserId`], [`ChannelId`], [`MessageId`] and the composite
//!   [`ActorKey`] used to scope per-actor state
//! - **Events**: [`InboundEvent`] with its kind-specific [`Payload`]
//! - **Errors**: the runtime taxonomy [`DispatchError`] and the registration-time
//!   [`AliasConflict`]
//!
//! ## Integration Layer
//!
//! Narrow interfaces to the collaborators that live outside the dispatch core:
//! - [`Outbound`]: acknowledges interactions and transmits replies
//! - [`EventProcessor`]: filters events and resolves prefix and locale
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────┐     ┌──────────┐
//! │   transport    │────▶│ DispatchPipeline │────▶│ handlers │
//! │ (InboundEvent) │     │   (framework)    │     └────┬─────┘
//! └────────────────┘     └──────────────────┘          │
//!                                 ▲                    ▼
//!                          EventProcessor          Outbound
//! ```

pub mod foundation;
pub mod integration;

pub use foundation::{
    ActorKey, AliasConflict, BoxError, ChannelId, DispatchError, DispatchResult, EventKind,
    InboundEvent, InvalidLocale, Locale, MessageId, OptionValue, OutboundError, Payload, UserId,
};
pub use integration::{
    AckMode, BoxedEventProcessor, BoxedOutbound, DefaultEventProcessor, EventProcessor,
    NoopOutbound, Outbound,
};
