//! Authorization predicates.
//!
//! A [`Privilege`] is an async check over the [`DispatchContext`] that either
//! passes or fails with [`DispatchError::PrivilegeDenied`]. Privileges compose
//! with [`and`](Privilege::and) / [`or`](Privilege::or); both operands are
//! always evaluated and the reasons of every failing side are kept.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use switchyard_core::{DispatchError, DispatchResult};

use crate::context::DispatchContext;

type CheckFn = Arc<dyn Fn(Arc<DispatchContext>) -> BoxFuture<'static, DispatchResult> + Send + Sync>;

#[derive(Clone)]
enum Rule {
    Allowed,
    Denied(Option<String>),
    Check(CheckFn),
    And(Box<Privilege>, Box<Privilege>),
    Or(Box<Privilege>, Box<Privilege>),
}

/// An authorization rule attached to an [`Action`](crate::Action).
#[derive(Clone)]
pub struct Privilege {
    rule: Rule,
}

impl Privilege {
    /// Allows everyone.
    pub fn allowed() -> Self {
        Self {
            rule: Rule::Allowed,
        }
    }

    /// Denies everyone, without a reason.
    pub fn denied() -> Self {
        Self {
            rule: Rule::Denied(None),
        }
    }

    /// Denies everyone with `reason`.
    pub fn denied_with(reason: impl Into<String>) -> Self {
        Self {
            rule: Rule::Denied(Some(reason.into())),
        }
    }

    /// Wraps an async predicate.
    ///
    /// ```rust,ignore
    /// let owner_only = Privilege::from_fn(|ctx: Arc<DispatchContext>| async move {
    ///     if ctx.user() == OWNER {
    ///         Ok(())
    ///     } else {
    ///         Err(DispatchError::denied_with("owner only"))
    ///     }
    /// });
    /// ```
    pub fn from_fn<F, Fut>(check: F) -> Self
    where
        F: Fn(Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult> + Send + 'static,
    {
        Self {
            rule: Rule::Check(Arc::new(move |ctx| check(ctx).boxed())),
        }
    }

    /// Passes only if both `self` and `other` pass.
    pub fn and(self, other: Privilege) -> Self {
        Self {
            rule: Rule::And(Box::new(self), Box::new(other)),
        }
    }

    /// Passes if either `self` or `other` passes.
    pub fn or(self, other: Privilege) -> Self {
        Self {
            rule: Rule::Or(Box::new(self), Box::new(other)),
        }
    }

    /// Evaluates the rule.
    ///
    /// Errors other than `PrivilegeDenied` raised by a predicate are returned
    /// as-is and take precedence over denials.
    pub fn check(&self, ctx: &Arc<DispatchContext>) -> BoxFuture<'static, DispatchResult> {
        match &self.rule {
            Rule::Allowed => futures::future::ok(()).boxed(),
            Rule::Denied(reason) => {
                let err = match reason {
                    Some(reason) => DispatchError::denied_with(reason.clone()),
                    None => DispatchError::denied(),
                };
                futures::future::err(err).boxed()
            }
            Rule::Check(check) => check(Arc::clone(ctx)),
            Rule::And(left, right) => {
                let (left, right) = (left.check(ctx), right.check(ctx));
                async move {
                    let (left, right) = futures::join!(left, right);
                    let (left, right) = (denial(left), denial(right));
                    match (left?, right?) {
                        (None, None) => Ok(()),
                        (left, right) => Err(merge(left, right)),
                    }
                }
                .boxed()
            }
            Rule::Or(left, right) => {
                let (left, right) = (left.check(ctx), right.check(ctx));
                async move {
                    let (left, right) = futures::join!(left, right);
                    let (left, right) = (denial(left), denial(right));
                    match (left?, right?) {
                        (Some(left), Some(right)) => Err(merge(Some(left), Some(right))),
                        _ => Ok(()),
                    }
                }
                .boxed()
            }
        }
    }
}

impl Default for Privilege {
    fn default() -> Self {
        Self::allowed()
    }
}

impl fmt::Debug for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Rule::Allowed => f.write_str("Allowed"),
            Rule::Denied(reason) => f.debug_tuple("Denied").field(reason).finish(),
            Rule::Check(_) => f.write_str("Check(..)"),
            Rule::And(l, r) => f.debug_tuple("And").field(l).field(r).finish(),
            Rule::Or(l, r) => f.debug_tuple("Or").field(l).field(r).finish(),
        }
    }
}

/// `Ok(None)` on pass, `Ok(Some(reasons))` on denial, `Err` for anything else.
fn denial(result: DispatchResult) -> DispatchResult<Option<Vec<String>>> {
    match result {
        Ok(()) => Ok(None),
        Err(DispatchError::PrivilegeDenied { reasons }) => Ok(Some(reasons)),
        Err(other) => Err(other),
    }
}

fn merge(left: Option<Vec<String>>, right: Option<Vec<String>>) -> DispatchError {
    DispatchError::PrivilegeDenied {
        reasons: left.into_iter().chain(right).flatten().collect(),
    }
}
