//! The [`Handler`] trait and its implementations for async functions.
//!
//! Like axum handlers, any async function whose parameters all implement
//! [`FromContext`] and whose return type implements [`IntoOutcome`] is a
//! handler. Extraction failures abort the call with the extractor's error,
//! which the pipeline routes like any other failure.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use switchyard_core::DispatchResult;

use super::outcome::IntoOutcome;
use crate::context::DispatchContext;
use crate::extractor::FromContext;

/// An async function usable as an action body.
///
/// `T` is the tuple of extractor types and only serves to keep the blanket
/// implementations apart.
#[async_trait]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    async fn call(self, ctx: Arc<DispatchContext>) -> DispatchResult;
}

/// A type-erased handler stored on an [`Action`](crate::Action).
pub type BoxedHandler =
    Arc<dyn Fn(Arc<DispatchContext>) -> BoxFuture<'static, DispatchResult> + Send + Sync>;

/// Erases a handler's type.
pub fn into_handler<H, T>(handler: H) -> BoxedHandler
where
    H: Handler<T>,
    T: 'static,
{
    Arc::new(move |ctx| handler.clone().call(ctx))
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case)]
        #[async_trait]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoOutcome + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            async fn call(self, ctx: Arc<DispatchContext>) -> DispatchResult {
                $(
                    let $ty = $ty::from_context(&ctx)?;
                )*

                let res = (self)($($ty,)*).await;
                res.into_outcome(&ctx).await
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
