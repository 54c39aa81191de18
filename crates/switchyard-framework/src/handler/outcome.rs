//! Handler return values.

use async_trait::async_trait;

use switchyard_core::{DispatchError, DispatchResult};

use crate::context::DispatchContext;

/// Converts a handler's return value into the event's outcome.
#[async_trait]
pub trait IntoOutcome: Send {
    async fn into_outcome(self, ctx: &DispatchContext) -> DispatchResult;
}

/// Nothing to do.
#[async_trait]
impl IntoOutcome for () {
    async fn into_outcome(self, _ctx: &DispatchContext) -> DispatchResult {
        Ok(())
    }
}

/// Sent back as a reply.
#[async_trait]
impl IntoOutcome for String {
    async fn into_outcome(self, ctx: &DispatchContext) -> DispatchResult {
        ctx.reply(&self).await
    }
}

#[async_trait]
impl IntoOutcome for &'static str {
    async fn into_outcome(self, ctx: &DispatchContext) -> DispatchResult {
        ctx.reply(self).await
    }
}

/// `None` does nothing.
#[async_trait]
impl<T: IntoOutcome> IntoOutcome for Option<T> {
    async fn into_outcome(self, ctx: &DispatchContext) -> DispatchResult {
        match self {
            Some(inner) => inner.into_outcome(ctx).await,
            None => Ok(()),
        }
    }
}

/// Errors are handed to the error router.
#[async_trait]
impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<DispatchError> + Send,
{
    async fn into_outcome(self, ctx: &DispatchContext) -> DispatchResult {
        match self {
            Ok(inner) => inner.into_outcome(ctx).await,
            Err(err) => Err(err.into()),
        }
    }
}
