use std::sync::Arc;

use switchyard_core::{ActorKey, DispatchResult, InboundEvent, Locale};

use crate::context::DispatchContext;

/// A type that can be extracted from a [`DispatchContext`].
///
/// Implement this to make a type usable as a handler parameter.
pub trait FromContext: Sized {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self>;
}

impl FromContext for Arc<DispatchContext> {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(Arc::clone(ctx))
    }
}

/// Never fails; yields `None` when `T` cannot be extracted.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

impl FromContext for ActorKey {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(ctx.actor())
    }
}

impl FromContext for Locale {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(ctx.locale().clone())
    }
}

impl FromContext for InboundEvent {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(ctx.event().clone())
    }
}
