//! The per-event dispatch context.
//!
//! A [`DispatchContext`] is created by the pipeline once an event has been
//! resolved to an [`Action`]. It carries the event, the effective locale, the
//! resolved action and its input, plus handles to the outbound collaborator
//! and the component registry. It lives only as long as the event is being
//! processed.
//!
//! # Awaiting components
//!
//! A handler can suspend until the same actor interacts with a component:
//!
//! ```rust,ignore
//! async fn delete(ctx: Arc<DispatchContext>) -> DispatchResult<String> {
//!     ctx.reply("Type the name of the repository to confirm.").await?;
//!     let fields = ctx
//!         .await_component("confirm-delete", |answer: Arc<DispatchContext>| async move {
//!             let name = ModalFields::from_context(&answer)?;
//!             if name.get("name") == Some("switchyard") {
//!                 Ok(Verdict::Accept(()))
//!             } else {
//!                 answer.reply("That is not it, try again.").await?;
//!                 Ok(Verdict::Retry)
//!             }
//!         })
//!         .await?;
//!     Ok("Deleted.".into())
//! }
//! ```
//!
//! [`DispatchContext::await_any`] does the same for several identifiers at
//! once and resumes on whichever fires first.
//!
//! A fresh single-use listener is registered for each attempt. Returning
//! [`Verdict::Retry`] re-registers it and waits again; any error returned by
//! the listener is handed back to the awaiting handler. If no matching event
//! arrives within the TTL the wait fails with [`DispatchError::Timeout`] and
//! the stale listener is withdrawn.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use switchyard_core::{
    ActorKey, BoxedOutbound, ChannelId, DispatchError, DispatchResult, InboundEvent, Locale,
    Payload, UserId,
};

use crate::action::Action;
use crate::extractor::ModalFields;
use crate::handler::BoxedHandler;
use crate::options::OptionMap;
use crate::registry::{ComponentRegistry, ListenerToken};

/// What an awaited component listener decided about the event it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<T> {
    /// Resume the awaiting handler with this value.
    Accept(T),
    /// Discard this event and wait for another one.
    Retry,
}

/// Collaborators shared by every context a pipeline creates.
#[derive(Clone)]
pub(crate) struct Services {
    pub(crate) outbound: BoxedOutbound,
    pub(crate) components: Arc<ComponentRegistry>,
    pub(crate) await_timeout: Duration,
}

/// Everything a handler knows about the event it is processing.
pub struct DispatchContext {
    event: InboundEvent,
    locale: Locale,
    action: Arc<Action>,
    args: Vec<String>,
    flags: HashMap<String, String>,
    services: Services,
}

impl DispatchContext {
    pub(crate) fn new(
        event: InboundEvent,
        locale: Locale,
        action: Arc<Action>,
        services: Services,
    ) -> Self {
        Self {
            event,
            locale,
            action,
            args: Vec::new(),
            flags: HashMap::new(),
            services,
        }
    }

    pub(crate) fn with_input(mut self, args: Vec<String>, flags: HashMap<String, String>) -> Self {
        self.args = args;
        self.flags = flags;
        self
    }

    pub fn event(&self) -> &InboundEvent {
        &self.event
    }

    pub fn actor(&self) -> ActorKey {
        self.event.actor()
    }

    pub fn user(&self) -> UserId {
        self.event.user()
    }

    pub fn channel(&self) -> ChannelId {
        self.event.channel()
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    /// The action the event resolved to.
    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    /// Arguments left over after command resolution.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn flags(&self) -> &HashMap<String, String> {
        &self.flags
    }

    /// Binds the event's input against the action's option schema.
    pub fn options(&self) -> DispatchResult<OptionMap> {
        let schema = self.action.schema();
        match self.event.payload() {
            Payload::SlashCommand { options, .. } => schema.bind_named(options),
            _ => schema.bind_text(&self.args),
        }
    }

    pub fn outbound(&self) -> &BoxedOutbound {
        &self.services.outbound
    }

    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.services.components
    }

    /// Default TTL of awaited component listeners.
    pub fn await_timeout(&self) -> Duration {
        self.services.await_timeout
    }

    /// Sends a text reply in the context of this event.
    pub async fn reply(&self, text: &str) -> DispatchResult {
        self.services
            .outbound
            .send(&self.event, text)
            .await
            .map_err(DispatchError::from)
    }

    /// Replaces the text of the first reply sent for this event.
    pub async fn edit_reply(&self, text: &str) -> DispatchResult {
        self.services
            .outbound
            .edit_reply(&self.event, text)
            .await
            .map_err(DispatchError::from)
    }

    /// Registers a single-use listener scoped to this context's actor.
    pub fn register_scoped(&self, action: impl Into<Arc<Action>>) -> ListenerToken {
        self.services
            .components
            .register_scoped_with_ttl(self.actor(), action, self.services.await_timeout)
    }

    /// Waits for this actor to interact with the component `custom_id`,
    /// using the configured timeout.
    pub async fn await_component<T, F, Fut>(&self, custom_id: &str, listener: F) -> DispatchResult<T>
    where
        T: Send + 'static,
        F: Fn(Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Verdict<T>>> + Send + 'static,
    {
        self.await_component_with_ttl(custom_id, self.services.await_timeout, listener)
            .await
    }

    /// Like [`await_component`](Self::await_component) with an explicit TTL
    /// for each attempt.
    pub async fn await_component_with_ttl<T, F, Fut>(
        &self,
        custom_id: &str,
        ttl: Duration,
        listener: F,
    ) -> DispatchResult<T>
    where
        T: Send + 'static,
        F: Fn(Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Verdict<T>>> + Send + 'static,
    {
        self.await_any_with_ttl(&[custom_id], ttl, listener).await
    }

    /// Waits for this actor to interact with the first of several
    /// components, using the configured timeout.
    ///
    /// The listener sees whichever event arrived first and can tell them apart
    /// by [`InboundEvent::custom_id`]. Listeners for the other identifiers are
    /// withdrawn once one of them has fired.
    pub async fn await_any<T, F, Fut>(&self, custom_ids: &[&str], listener: F) -> DispatchResult<T>
    where
        T: Send + 'static,
        F: Fn(Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Verdict<T>>> + Send + 'static,
    {
        self.await_any_with_ttl(custom_ids, self.services.await_timeout, listener)
            .await
    }

    /// Like [`await_any`](Self::await_any) with an explicit TTL for each
    /// attempt.
    ///
    /// Fails with [`DispatchError::InvalidInput`] if `custom_ids` is empty.
    pub async fn await_any_with_ttl<T, F, Fut>(
        &self,
        custom_ids: &[&str],
        ttl: Duration,
        listener: F,
    ) -> DispatchResult<T>
    where
        T: Send + 'static,
        F: Fn(Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<Verdict<T>>> + Send + 'static,
    {
        if custom_ids.is_empty() {
            return Err(DispatchError::invalid_argument("custom_id", None));
        }
        let listener = Arc::new(listener);
        let actor = self.actor();
        let awaited = custom_ids.join(", ");

        loop {
            let (tx, rx) = oneshot::channel();
            // Shared by every listener of this attempt; the first to fire takes it.
            let slot = Arc::new(Mutex::new(Some(tx)));
            let tokens: Vec<(&str, ListenerToken)> = custom_ids
                .iter()
                .map(|&custom_id| {
                    let action = Action::component(custom_id)
                        .boxed_handler(attempt_handler(&listener, &slot))
                        .build();
                    let token = self
                        .services
                        .components
                        .register_scoped_with_ttl(actor, action, ttl);
                    (custom_id, token)
                })
                .collect();

            let outcome = tokio::time::timeout(ttl, rx).await;
            for (custom_id, token) in &tokens {
                self.services.components.withdraw(actor, custom_id, *token);
            }

            match outcome {
                Ok(Ok(Ok(Verdict::Accept(value)))) => return Ok(value),
                Ok(Ok(Ok(Verdict::Retry))) => {
                    debug!(%actor, custom_ids = %awaited, "Awaited component asked for a retry");
                }
                Ok(Ok(Err(err))) => return Err(err),
                Ok(Err(_)) | Err(_) => {
                    debug!(%actor, custom_ids = %awaited, ttl = ?ttl, "Awaited component timed out");
                    return Err(DispatchError::Timeout {
                        custom_id: awaited,
                        after: ttl,
                    });
                }
            }
        }
    }

    /// Waits for a click on the button `custom_id`; returns its id.
    pub async fn await_button(&self, custom_id: &str) -> DispatchResult<String> {
        self.await_component(custom_id, |ctx: Arc<DispatchContext>| async move {
            Ok(match ctx.event().payload() {
                Payload::ButtonClick { custom_id } => Verdict::Accept(custom_id.clone()),
                _ => Verdict::Retry,
            })
        })
        .await
    }

    /// Waits for a pick in the select menu `custom_id`; returns the values.
    pub async fn await_select(&self, custom_id: &str) -> DispatchResult<Vec<String>> {
        self.await_component(custom_id, |ctx: Arc<DispatchContext>| async move {
            Ok(match ctx.event().payload() {
                Payload::SelectMenuPick { values, .. } => Verdict::Accept(values.clone()),
                _ => Verdict::Retry,
            })
        })
        .await
    }

    /// Waits for the modal `custom_id` to be submitted; returns its fields.
    pub async fn await_modal(&self, custom_id: &str) -> DispatchResult<ModalFields> {
        self.await_component(custom_id, |ctx: Arc<DispatchContext>| async move {
            Ok(match ctx.event().payload() {
                Payload::ModalSubmit { fields, .. } => Verdict::Accept(ModalFields(fields.clone())),
                _ => Verdict::Retry,
            })
        })
        .await
    }
}

type VerdictSlot<T> = Arc<Mutex<Option<oneshot::Sender<DispatchResult<Verdict<T>>>>>>;

/// Handler for one listener of an await attempt. Only the listener that
/// takes the slot runs the body; later ones find it empty and do nothing.
fn attempt_handler<T, F, Fut>(listener: &Arc<F>, slot: &VerdictSlot<T>) -> BoxedHandler
where
    T: Send + 'static,
    F: Fn(Arc<DispatchContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<Verdict<T>>> + Send + 'static,
{
    let body = Arc::clone(listener);
    let slot = Arc::clone(slot);
    Arc::new(move |ctx| {
        let body = Arc::clone(&body);
        let slot = Arc::clone(&slot);
        async move {
            let Some(tx) = slot.lock().take() else {
                return Ok(());
            };
            // The awaiting side may already have timed out.
            let _ = tx.send(body(ctx).await);
            Ok(())
        }
        .boxed()
    })
}

impl fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext")
            .field("event", &self.event)
            .field("locale", &self.locale)
            .field("action", &self.action.name())
            .field("args", &self.args)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
