//! Handler system.
//!
//! - [`traits`]: the [`Handler`] trait, implemented for async functions whose
//!   parameters are [`FromContext`](crate::extractor::FromContext) extractors
//! - [`outcome`]: [`IntoOutcome`], which turns a handler's return value into
//!   a reply or an error
//!
//! ```rust,ignore
//! // No parameters, no reply
//! async fn ping() {}
//!
//! // Leftover arguments in, reply out
//! async fn echo(Args(args): Args) -> String {
//!     args.join(" ")
//! }
//!
//! // Fallible, with typed options
//! async fn ban(ctx: Arc<DispatchContext>, Options(ban): Options<Ban>) -> DispatchResult<String> {
//!     moderation::ban(ban.user).await.map_err(DispatchError::unhandled)?;
//!     Ok(format!("banned {}", ban.user))
//! }
//! ```

pub mod outcome;
pub mod traits;

pub use outcome::IntoOutcome;
pub use traits::{BoxedHandler, Handler, into_handler};
