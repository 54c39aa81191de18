//! Parameter injection for handlers.
//!
//! Every handler parameter implements [`FromContext`]. Extraction is
//! synchronous and fallible; a failure aborts the handler with the returned
//! error, which is then routed by the pipeline's error router.
//!
//! | extractor | yields |
//! |---|---|
//! | `Arc<DispatchContext>` | the whole context |
//! | [`ActorKey`](switchyard_core::ActorKey) | the invoking actor |
//! | [`Locale`](switchyard_core::Locale) | the resolved locale |
//! | [`InboundEvent`](switchyard_core::InboundEvent) | a copy of the event |
//! | [`Args`] | arguments left over after command resolution |
//! | [`Flags`] | `-name[=value]` flags of a text command |
//! | [`Options<T>`] | options bound against the action's schema |
//! | [`SelectedValues`] | values picked in a select menu |
//! | [`ModalFields`] | fields submitted through a modal |
//! | `Option<T>` | `T`, or `None` if it could not be extracted |

pub mod core;
pub mod input;

pub use core::FromContext;
pub use input::{Args, Flags, ModalFields, Options, SelectedValues};
