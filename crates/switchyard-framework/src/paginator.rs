//! Button-driven paging over a reply.
//!
//! A [`Paginator`] sends the first page as a reply, then waits for the actor
//! to press one of three buttons (previous, next, close) and edits the reply
//! in place. The session ends on close or when no button is pressed within
//! the idle timeout; either way the reply is re-rendered one last time in its
//! inactive state so the controls can be shown disabled.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use switchyard_core::{DispatchError, DispatchResult};
use tracing::{debug, error};

use crate::context::{DispatchContext, Verdict};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Where a paging session currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    page: usize,
    page_count: usize,
    active: bool,
    base_id: String,
}

impl PageState {
    /// Zero-based index of the page on display.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// False once the session was closed or timed out.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Prefix shared by the three button identifiers of this session.
    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    pub fn previous_id(&self) -> String {
        format!("{}_previous", self.base_id)
    }

    pub fn next_id(&self) -> String {
        format!("{}_next", self.base_id)
    }

    pub fn close_id(&self) -> String {
        format!("{}_close", self.base_id)
    }

    /// Whether the previous button should be enabled.
    pub fn has_previous(&self) -> bool {
        self.active && self.page > 0
    }

    /// Whether the next button should be enabled.
    pub fn has_next(&self) -> bool {
        self.active && self.page + 1 < self.page_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Press {
    Previous,
    Next,
    Close,
}

/// Pages through `page_count` pages produced by a render function.
///
/// ```rust,ignore
/// async fn list(ctx: Arc<DispatchContext>) -> DispatchResult {
///     Paginator::new(3)
///         .run(&ctx, |state: PageState| async move {
///             Ok(format!("page {} of {}", state.page() + 1, state.page_count()))
///         })
///         .await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Paginator {
    page_count: usize,
    initial_page: usize,
    timeout: Option<Duration>,
}

impl Paginator {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            initial_page: 0,
            timeout: None,
        }
    }

    /// Page shown first. Defaults to 0.
    pub fn initial_page(mut self, page: usize) -> Self {
        self.initial_page = page;
        self
    }

    /// Idle time allowed between two presses. Defaults to the context's
    /// await timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runs the session to completion and returns its final state.
    ///
    /// Out-of-range presses are ignored. Errors from `render` or from the
    /// outbound end the session after the inactive state has been rendered.
    pub async fn run<R, Fut>(
        &self,
        ctx: &Arc<DispatchContext>,
        render: R,
    ) -> DispatchResult<PageState>
    where
        R: Fn(PageState) -> Fut,
        Fut: Future<Output = DispatchResult<String>>,
    {
        if self.page_count == 0 {
            return Err(DispatchError::invalid_argument("page_count", Some("0".into())));
        }
        if self.initial_page >= self.page_count {
            return Err(DispatchError::invalid_argument(
                "initial_page",
                Some(self.initial_page.to_string()),
            ));
        }

        let mut state = PageState {
            page: self.initial_page,
            page_count: self.page_count,
            active: true,
            base_id: format!("page-{}", NEXT_SESSION.fetch_add(1, Ordering::Relaxed)),
        };
        let ttl = self.timeout.unwrap_or_else(|| ctx.await_timeout());

        ctx.reply(&render(state.clone()).await?).await?;
        let outcome = self.drive(ctx, &mut state, ttl, &render).await;

        state.active = false;
        let closing = match render(state.clone()).await {
            Ok(text) => ctx.edit_reply(&text).await,
            Err(err) => Err(err),
        };
        if let Err(err) = closing {
            error!(actor = %ctx.actor(), session = %state.base_id, "Failed to render closed pages: {err}");
        }

        outcome.map(|()| state)
    }

    async fn drive<R, Fut>(
        &self,
        ctx: &Arc<DispatchContext>,
        state: &mut PageState,
        ttl: Duration,
        render: &R,
    ) -> DispatchResult
    where
        R: Fn(PageState) -> Fut,
        Fut: Future<Output = DispatchResult<String>>,
    {
        let (previous, next, close) = (state.previous_id(), state.next_id(), state.close_id());
        let ids = [previous.as_str(), next.as_str(), close.as_str()];

        loop {
            let ids_owned = (previous.clone(), next.clone());
            let pressed = ctx
                .await_any_with_ttl(&ids, ttl, move |answer: Arc<DispatchContext>| {
                    let (previous, next) = ids_owned.clone();
                    async move {
                        Ok(Verdict::Accept(match answer.event().custom_id() {
                            Some(id) if id == previous => Press::Previous,
                            Some(id) if id == next => Press::Next,
                            _ => Press::Close,
                        }))
                    }
                })
                .await;

            let press = match pressed {
                Ok(press) => press,
                Err(DispatchError::Timeout { .. }) => {
                    debug!(actor = %ctx.actor(), session = %state.base_id, "Paging session went idle");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            match press {
                Press::Previous if state.has_previous() => state.page -= 1,
                Press::Next if state.has_next() => state.page += 1,
                Press::Close => return Ok(()),
                _ => continue,
            }
            ctx.edit_reply(&render(state.clone()).await?).await?;
        }
    }
}
