//! Error routing.
//!
//! The [`ErrorRouter`] maps a failed dispatch to a recovery action. Routes
//! are tried in registration order and the first whose [`ErrorClass`]
//! matches the error wins; unmatched errors go to the fallback, which by
//! default logs the error with a snapshot of the context.
//!
//! Recovery actions may fail or panic themselves. Both are logged and
//! swallowed so that they never reach the dispatch loop.
//!
//! ```rust,ignore
//! let router = ErrorRouter::new()
//!     .on(ErrorClass::CooldownBreached, |err, ctx| async move {
//!         ctx.reply(&format!("Slow down! {err}")).await
//!     })
//!     .on(ErrorClass::PrivilegeDenied, |_, ctx| async move {
//!         ctx.reply("You are not allowed to do that.").await
//!     });
//! ```

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::error;

use switchyard_core::{DispatchError, DispatchResult};

use crate::context::DispatchContext;
use crate::pipeline::panic_message;

/// Families of [`DispatchError`] that a route can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    ExecutionFailed,
    PrivilegeDenied,
    CooldownBreached,
    /// Both `InvalidInput` and `BadSubcommand`.
    InvalidInput,
    Timeout,
    Unhandled,
}

impl ErrorClass {
    pub fn of(error: &DispatchError) -> Self {
        match error {
            DispatchError::ExecutionFailed { .. } => Self::ExecutionFailed,
            DispatchError::PrivilegeDenied { .. } => Self::PrivilegeDenied,
            DispatchError::CooldownBreached { .. } => Self::CooldownBreached,
            DispatchError::InvalidInput { .. } | DispatchError::BadSubcommand { .. } => {
                Self::InvalidInput
            }
            DispatchError::Timeout { .. } => Self::Timeout,
            DispatchError::Unhandled(_) => Self::Unhandled,
        }
    }

    pub fn matches(self, error: &DispatchError) -> bool {
        Self::of(error) == self
    }
}

/// A type-erased recovery action.
pub type RecoveryFn = Arc<
    dyn Fn(DispatchError, Arc<DispatchContext>) -> BoxFuture<'static, DispatchResult> + Send + Sync,
>;

fn into_recovery<F, Fut>(f: F) -> RecoveryFn
where
    F: Fn(DispatchError, Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult> + Send + 'static,
{
    Arc::new(move |err, ctx| f(err, ctx).boxed())
}

/// Ordered mapping from error classes to recovery actions.
#[derive(Clone)]
pub struct ErrorRouter {
    routes: Vec<(ErrorClass, RecoveryFn)>,
    fallback: RecoveryFn,
}

impl Default for ErrorRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ErrorRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes: Vec<_> = self.routes.iter().map(|(class, _)| class).collect();
        f.debug_struct("ErrorRouter")
            .field("routes", &classes)
            .finish_non_exhaustive()
    }
}

impl ErrorRouter {
    /// A router with no routes and the logging fallback.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: into_recovery(log_unhandled),
        }
    }

    /// A router that answers the user-facing error classes with a short reply
    /// and logs everything else.
    pub fn replying() -> Self {
        Self::new()
            .on(ErrorClass::ExecutionFailed, |err, ctx| async move {
                ctx.reply(&err.to_string()).await
            })
            .on(ErrorClass::PrivilegeDenied, |err, ctx| async move {
                let text = match &err {
                    DispatchError::PrivilegeDenied { reasons } if !reasons.is_empty() => {
                        format!("Permission denied: {}", reasons.join(", "))
                    }
                    _ => "Permission denied.".to_string(),
                };
                ctx.reply(&text).await
            })
            .on(ErrorClass::CooldownBreached, |err, ctx| async move {
                let text = match err {
                    DispatchError::CooldownBreached { retry_after, .. } => format!(
                        "You are on cooldown. Try again in {:.1}s.",
                        retry_after.as_secs_f64()
                    ),
                    other => other.to_string(),
                };
                ctx.reply(&text).await
            })
            .on(ErrorClass::InvalidInput, |err, ctx| async move {
                ctx.reply(&format!("Invalid input: {err}")).await
            })
    }

    /// Appends a route. Earlier routes take precedence.
    pub fn on<F, Fut>(mut self, class: ErrorClass, recovery: F) -> Self
    where
        F: Fn(DispatchError, Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult> + Send + 'static,
    {
        self.routes.push((class, into_recovery(recovery)));
        self
    }

    /// Replaces the fallback used for unmatched errors.
    pub fn fallback<F, Fut>(mut self, recovery: F) -> Self
    where
        F: Fn(DispatchError, Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult> + Send + 'static,
    {
        self.fallback = into_recovery(recovery);
        self
    }

    /// Runs the recovery action for `error`. Never fails and never unwinds.
    pub async fn route(&self, error: DispatchError, ctx: Arc<DispatchContext>) {
        let class = ErrorClass::of(&error);
        let recovery = self
            .routes
            .iter()
            .find(|(route, _)| *route == class)
            .map(|(_, recovery)| recovery)
            .unwrap_or(&self.fallback);

        match AssertUnwindSafe(recovery(error, Arc::clone(&ctx)))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(
                actor = %ctx.actor(),
                action = %ctx.action().name(),
                kind = err.kind_name(),
                "Recovery action failed: {err}"
            ),
            Err(panic) => error!(
                actor = %ctx.actor(),
                action = %ctx.action().name(),
                "{}",
                panic_message("recovery action", panic)
            ),
        }
    }
}

/// The default fallback: logs the error with the context snapshot.
async fn log_unhandled(err: DispatchError, ctx: Arc<DispatchContext>) -> DispatchResult {
    error!(
        user = %ctx.user(),
        channel = %ctx.channel(),
        action = %ctx.action().name(),
        kind = err.kind_name(),
        event = %ctx.event().kind(),
        "Unhandled dispatch error: {err}"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use switchyard_core::{ActorKey, InboundEvent};

    use super::*;
    use crate::context::tests::context_for;

    fn ctx() -> Arc<DispatchContext> {
        context_for(InboundEvent::text(ActorKey::new(1, 2), "!x"))
    }

    #[test]
    fn test_classes() {
        assert_eq!(
            ErrorClass::of(&DispatchError::bad_subcommand(None)),
            ErrorClass::InvalidInput
        );
        assert!(ErrorClass::CooldownBreached.matches(&DispatchError::CooldownBreached {
            permits: 1,
            interval: Duration::from_secs(1),
            retry_after: Duration::from_secs(1),
        }));
    }

    #[tokio::test]
    async fn test_first_matching_route_wins() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (seen.clone(), seen.clone());
        let router = ErrorRouter::new()
            .on(ErrorClass::PrivilegeDenied, move |_, _| {
                let a = a.clone();
                async move {
                    a.lock().push("first");
                    Ok(())
                }
            })
            .on(ErrorClass::PrivilegeDenied, move |_, _| {
                let b = b.clone();
                async move {
                    b.lock().push("second");
                    Ok(())
                }
            });

        router.route(DispatchError::denied(), ctx()).await;
        assert_eq!(*seen.lock(), ["first"]);
    }

    #[tokio::test]
    async fn test_unmatched_goes_to_fallback() {
        let fallbacks = Arc::new(AtomicUsize::new(0));
        let counter = fallbacks.clone();
        let router = ErrorRouter::new()
            .on(ErrorClass::PrivilegeDenied, |_, _| async { Ok(()) })
            .fallback(move |_, _| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        router.route(DispatchError::failed("boom"), ctx()).await;
        router.route(DispatchError::denied(), ctx()).await;
        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovery_failure_is_swallowed() {
        let router = ErrorRouter::new()
            .on(ErrorClass::ExecutionFailed, |_, _| async {
                Err(DispatchError::failed("recovery broke"))
            })
            .fallback(|_, _| async { Err(DispatchError::failed("fallback broke")) });

        router.route(DispatchError::failed("boom"), ctx()).await;
        router
            .route(DispatchError::unhandled("io"), ctx())
            .await;
    }

    #[tokio::test]
    async fn test_recovery_panic_is_swallowed() {
        let fallbacks = Arc::new(AtomicUsize::new(0));
        let counter = fallbacks.clone();
        let router = ErrorRouter::new()
            .on(ErrorClass::ExecutionFailed, |_, _| async {
                let explode = true;
                if explode {
                    panic!("recovery exploded");
                }
                Ok(())
            })
            .fallback(move |_, _| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            });

        let routed = tokio::spawn(async move {
            router.route(DispatchError::failed("boom"), ctx()).await;
            router.route(DispatchError::denied(), ctx()).await;
        })
        .await;

        assert!(routed.is_ok());
        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
    }
}
