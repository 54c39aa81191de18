//! The dispatch pipeline.
//!
//! Every inbound event goes through the same stages, short-circuiting on the
//! first drop or failure:
//!
//! ```text
//! filter ─▶ locale ─▶ resolve ─▶ acknowledge ─▶ authorize ─▶ rate-limit ─▶ execute
//!   │                    │            │              └────────────┴────────────┴─▶ recover
//!   └── drop ◀───────────┴── drop ◀───┘
//! ```
//!
//! Filter, resolve and acknowledge failures drop the event. Failures from
//! authorization onwards are handed to the [`ErrorRouter`]. Nothing escapes
//! [`DispatchPipeline::dispatch`], so one bad event never affects another.
//!
//! The pipeline holds no global lock: routing tables are read-mostly and the
//! only contended state (cooldown windows, scoped listeners) is sharded per
//! actor. `DispatchPipeline` is cheap to clone and also implements
//! `tower::Service<InboundEvent>`.
//!
//! ```rust,ignore
//! let pipeline = DispatchPipeline::builder()
//!     .outbound(Arc::new(MyOutbound))
//!     .router(ErrorRouter::replying())
//!     .command(Action::command("ping").handler(|| async { "pong" }))
//!     .build()?;
//!
//! tokio::spawn({
//!     let pipeline = pipeline.clone();
//!     async move { pipeline.dispatch(event).await }
//! });
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tower::Service;
use tracing::{Instrument, Level, debug, span, trace, warn};

use switchyard_core::{
    AckMode, ActorKey, AliasConflict, BoxedEventProcessor, BoxedOutbound, DefaultEventProcessor,
    DispatchError, DispatchResult, InboundEvent, Locale, NoopOutbound, OutboundError, Payload,
    UserId,
};

use crate::action::Action;
use crate::context::{DispatchContext, Services};
use crate::recovery::{ErrorClass, ErrorRouter};
use crate::registry::{ComponentRegistry, DEFAULT_SCOPED_TTL, ListenerToken};
use crate::routes::{CommandKey, CommandTable};
use crate::tokenize::tokenize;
use crate::trie::AliasTrie;

// ============================================================================
// Settings and outcomes
// ============================================================================

/// Static pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Default text-command prefix.
    pub prefix: String,
    /// Locale used when the processor yields none.
    pub default_locale: Locale,
    /// Acknowledgement mode for interactions, unless an action overrides it.
    pub ack_mode: AckMode,
    /// TTL of awaited component listeners.
    pub await_timeout: Duration,
    /// Accept `<@bot>` and `<@!bot>` as prefixes when `bot_user_id` is set.
    pub mention_prefix: bool,
    pub bot_user_id: Option<UserId>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            default_locale: Locale::default(),
            ack_mode: AckMode::default(),
            await_timeout: DEFAULT_SCOPED_TTL,
            mention_prefix: true,
            bot_user_id: None,
        }
    }
}

/// Why an event was dropped without reaching a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Rejected by the event processor's filter, or the filter failed.
    Filtered,
    /// A text event without a recognised prefix.
    NoPrefix,
    /// Nothing is registered for the event.
    Unresolved,
    /// The interaction could not be acknowledged.
    AckFailed,
}

/// How the pipeline disposed of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Dropped(DropReason),
    /// The handler ran and succeeded.
    Completed,
    /// Dispatch failed and the error was routed to a recovery action.
    Recovered(ErrorClass),
}

/// Counts of state reclaimed by [`DispatchPipeline::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub listeners: usize,
    pub cooldown_windows: usize,
}

/// A resolved route, before the context is built.
struct Route {
    action: Arc<Action>,
    args: Vec<String>,
    flags: HashMap<String, String>,
}

impl Route {
    fn bare(action: Arc<Action>) -> Self {
        Self {
            action,
            args: Vec::new(),
            flags: HashMap::new(),
        }
    }
}

// ============================================================================
// DispatchPipeline
// ============================================================================

struct Inner {
    settings: PipelineSettings,
    processor: BoxedEventProcessor,
    router: ErrorRouter,
    commands: RwLock<AliasTrie>,
    slash: CommandTable,
    user_menus: CommandTable,
    message_menus: CommandTable,
    /// Actions with a bounded cooldown, for the idle-window sweep.
    rate_limited: RwLock<Vec<Arc<Action>>>,
    services: Services,
}

/// Routes inbound events to actions. See the [module docs](self).
#[derive(Clone)]
pub struct DispatchPipeline {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DispatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPipeline")
            .field("settings", &self.inner.settings)
            .field("commands", &self.inner.commands.read().len())
            .field("slash", &self.inner.slash.len())
            .field("components", &self.inner.services.components.persistent_len())
            .finish_non_exhaustive()
    }
}

impl DispatchPipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.inner.services.components
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Adds a root text command. New roots may be added at any time; a
    /// conflicting one is rejected and leaves the routing table unchanged.
    pub fn register_command(&self, action: impl Into<Arc<Action>>) -> Result<(), AliasConflict> {
        let action = action.into();
        self.inner.commands.write().insert(Arc::clone(&action))?;
        self.track_cooldowns(&action);
        Ok(())
    }

    pub fn register_slash(&self, key: CommandKey, action: impl Into<Arc<Action>>) {
        let action = action.into();
        self.track_cooldowns(&action);
        self.inner.slash.insert(key, action);
    }

    pub fn register_user_menu(&self, name: impl Into<String>, action: impl Into<Arc<Action>>) {
        let action = action.into();
        self.track_cooldowns(&action);
        self.inner.user_menus.insert(CommandKey::new(name), action);
    }

    pub fn register_message_menu(&self, name: impl Into<String>, action: impl Into<Arc<Action>>) {
        let action = action.into();
        self.track_cooldowns(&action);
        self.inner.message_menus.insert(CommandKey::new(name), action);
    }

    /// Adds a persistent component listener.
    pub fn register_component(&self, action: impl Into<Arc<Action>>) {
        let action = action.into();
        self.track_cooldowns(&action);
        self.inner.services.components.register(action);
    }

    /// Adds a single-use component listener for `actor`.
    pub fn register_scoped(&self, actor: ActorKey, action: impl Into<Arc<Action>>) -> ListenerToken {
        self.inner.services.components.register_scoped(actor, action)
    }

    fn track_cooldowns(&self, action: &Arc<Action>) {
        let mut tracked = self.inner.rate_limited.write();
        let mut pending = vec![Arc::clone(action)];
        while let Some(action) = pending.pop() {
            pending.extend(action.children().iter().cloned());
            if !action.cooldown().is_unbounded() && !tracked.iter().any(|a| Arc::ptr_eq(a, &action)) {
                tracked.push(action);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// The text command at exactly `path`.
    pub fn command_at<S: AsRef<str>>(&self, path: &[S]) -> Option<Arc<Action>> {
        self.inner.commands.read().action_at(path)
    }

    /// The text commands directly under `path`.
    pub fn list_commands<S: AsRef<str>>(&self, path: &[S]) -> DispatchResult<Vec<Arc<Action>>> {
        self.inner.commands.read().list(path)
    }

    /// Reclaims expired scoped listeners and idle cooldown windows.
    pub fn sweep(&self) -> SweepStats {
        let listeners = self.inner.services.components.purge_expired();
        let cooldown_windows = self
            .inner
            .rate_limited
            .read()
            .iter()
            .map(|action| action.cooldown().purge_idle())
            .sum();
        SweepStats {
            listeners,
            cooldown_windows,
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Runs one event through every stage.
    pub async fn dispatch(&self, event: InboundEvent) -> Disposition {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            kind = %event.kind(),
            channel = %event.channel(),
            user = %event.user()
        );
        self.run(event).instrument(span).await
    }

    async fn run(&self, event: InboundEvent) -> Disposition {
        match self.inner.processor.filter(&event).await {
            Ok(true) => {}
            Ok(false) => {
                trace!("Event filtered out");
                return Disposition::Dropped(DropReason::Filtered);
            }
            Err(err) => {
                warn!(error = %err, "Event filter failed, dropping event");
                return Disposition::Dropped(DropReason::Filtered);
            }
        }

        let locale = self.resolve_locale(&event).await;

        let route = match self.resolve(&event).await {
            Ok(route) => route,
            Err(reason) => {
                trace!(?reason, "Event dropped");
                return Disposition::Dropped(reason);
            }
        };
        debug!(action = %route.action.name(), %locale, "Resolved action");

        let ctx = Arc::new(
            DispatchContext::new(event, locale, route.action, self.inner.services.clone())
                .with_input(route.args, route.flags),
        );

        if let Err(err) = self.acknowledge(&ctx).await {
            warn!(action = %ctx.action().name(), error = %err, "Acknowledgement failed, dropping event");
            return Disposition::Dropped(DropReason::AckFailed);
        }

        match execute(&ctx).await {
            Ok(()) => Disposition::Completed,
            Err(err) => {
                let class = ErrorClass::of(&err);
                debug!(action = %ctx.action().name(), kind = err.kind_name(), "Dispatch failed: {err}");
                self.inner.router.route(err, ctx).await;
                Disposition::Recovered(class)
            }
        }
    }

    async fn resolve_locale(&self, event: &InboundEvent) -> Locale {
        match self.inner.processor.locale(event).await {
            Ok(Some(locale)) => locale,
            Ok(None) => self.inner.settings.default_locale.clone(),
            Err(err) => {
                debug!(error = %err, "Locale resolution failed, using default");
                self.inner.settings.default_locale.clone()
            }
        }
    }

    async fn resolve(&self, event: &InboundEvent) -> Result<Route, DropReason> {
        let found = match event.payload() {
            Payload::MessageText { content } => return self.resolve_text(event, content).await,
            Payload::SlashCommand {
                name,
                group,
                subcommand,
                ..
            } => self.inner.slash.get(&CommandKey {
                name: name.clone(),
                group: group.clone(),
                subcommand: subcommand.clone(),
            }),
            Payload::UserContextMenu { name, .. } => {
                self.inner.user_menus.get(&CommandKey::new(name.as_str()))
            }
            Payload::MessageContextMenu { name, .. } => {
                self.inner.message_menus.get(&CommandKey::new(name.as_str()))
            }
            Payload::ButtonClick { custom_id }
            | Payload::SelectMenuPick { custom_id, .. }
            | Payload::ModalSubmit { custom_id, .. } => self
                .inner
                .services
                .components
                .lookup(event.actor(), custom_id)
                .map(|found| {
                    trace!(custom_id = %custom_id, scope = ?found.scope, "Matched component listener");
                    found.action
                }),
        };
        found.map(Route::bare).ok_or(DropReason::Unresolved)
    }

    async fn resolve_text(&self, event: &InboundEvent, content: &str) -> Result<Route, DropReason> {
        let body = self
            .strip_prefix(event, content)
            .await
            .ok_or(DropReason::NoPrefix)?;
        let (tokens, flags) = tokenize(body).into_parts();
        if tokens.is_empty() {
            return Err(DropReason::Unresolved);
        }
        let resolution = self
            .inner
            .commands
            .read()
            .resolve(&tokens)
            .ok_or(DropReason::Unresolved)?;
        Ok(Route {
            action: resolution.action,
            args: resolution.args,
            flags,
        })
    }

    async fn strip_prefix<'a>(&self, event: &InboundEvent, content: &'a str) -> Option<&'a str> {
        let settings = &self.inner.settings;
        let mut prefixes = vec![
            self.inner
                .processor
                .prefix(event)
                .await
                .unwrap_or_else(|| settings.prefix.clone()),
        ];
        if settings.mention_prefix
            && let Some(bot) = settings.bot_user_id
        {
            prefixes.push(format!("<@{bot}>"));
            prefixes.push(format!("<@!{bot}>"));
        }

        let content = content.trim_start();
        prefixes
            .iter()
            .filter(|prefix| !prefix.is_empty())
            .find_map(|prefix| strip_prefix_ignore_case(content, prefix))
    }

    async fn acknowledge(&self, ctx: &DispatchContext) -> Result<(), OutboundError> {
        if !ctx.event().kind().is_interaction() {
            return Ok(());
        }
        let mode = ctx.action().ack().unwrap_or(self.inner.settings.ack_mode);
        if !mode.acknowledges() {
            return Ok(());
        }
        trace!(?mode, "Acknowledging interaction");
        ctx.outbound()
            .acknowledge(ctx.event(), mode.is_ephemeral())
            .await
    }
}

/// Authorize, rate-limit and run the handler. Panics in the handler are
/// reported as [`DispatchError::Unhandled`].
async fn execute(ctx: &Arc<DispatchContext>) -> DispatchResult {
    let action = ctx.action();
    action.privilege().check(ctx).await?;
    action.cooldown().fire(ctx.actor())?;

    let Some(handler) = action.handler() else {
        return Err(DispatchError::bad_subcommand(ctx.args().first().cloned()));
    };
    AssertUnwindSafe(handler(Arc::clone(ctx)))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(DispatchError::unhandled(panic_message("handler", panic))))
}

/// Renders a caught panic payload as `"{source} panicked: {message}"`.
pub(crate) fn panic_message(source: &str, panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => format!("{source} panicked: {message}"),
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(message) => format!("{source} panicked: {message}"),
            Err(_) => format!("{source} panicked"),
        },
    }
}

fn strip_prefix_ignore_case<'a>(content: &'a str, prefix: &str) -> Option<&'a str> {
    let head = content.get(..prefix.len())?;
    if head.to_lowercase() == prefix.to_lowercase() {
        content.get(prefix.len()..)
    } else {
        None
    }
}

impl Service<InboundEvent> for DispatchPipeline {
    type Response = Disposition;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Disposition, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: InboundEvent) -> Self::Future {
        let pipeline = self.clone();
        async move { Ok(pipeline.dispatch(event).await) }.boxed()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`DispatchPipeline`].
pub struct PipelineBuilder {
    settings: PipelineSettings,
    processor: Option<BoxedEventProcessor>,
    outbound: Option<BoxedOutbound>,
    router: ErrorRouter,
    commands: Vec<Arc<Action>>,
    slash: Vec<(CommandKey, Arc<Action>)>,
    user_menus: Vec<(String, Arc<Action>)>,
    message_menus: Vec<(String, Arc<Action>)>,
    components: Vec<Arc<Action>>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            settings: PipelineSettings::default(),
            processor: None,
            outbound: None,
            router: ErrorRouter::new(),
            commands: Vec::new(),
            slash: Vec::new(),
            user_menus: Vec::new(),
            message_menus: Vec::new(),
            components: Vec::new(),
        }
    }
}

impl PipelineBuilder {
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Defaults to [`DefaultEventProcessor`].
    pub fn processor(mut self, processor: BoxedEventProcessor) -> Self {
        self.processor = Some(processor);
        self
    }

    /// Defaults to [`NoopOutbound`].
    pub fn outbound(mut self, outbound: BoxedOutbound) -> Self {
        self.outbound = Some(outbound);
        self
    }

    pub fn router(mut self, router: ErrorRouter) -> Self {
        self.router = router;
        self
    }

    pub fn command(mut self, action: impl Into<Arc<Action>>) -> Self {
        self.commands.push(action.into());
        self
    }

    pub fn slash(mut self, key: CommandKey, action: impl Into<Arc<Action>>) -> Self {
        self.slash.push((key, action.into()));
        self
    }

    pub fn user_menu(mut self, name: impl Into<String>, action: impl Into<Arc<Action>>) -> Self {
        self.user_menus.push((name.into(), action.into()));
        self
    }

    pub fn message_menu(mut self, name: impl Into<String>, action: impl Into<Arc<Action>>) -> Self {
        self.message_menus.push((name.into(), action.into()));
        self
    }

    pub fn component(mut self, action: impl Into<Arc<Action>>) -> Self {
        self.components.push(action.into());
        self
    }

    /// Compiles the routing tables. Any alias conflict aborts the build.
    pub fn build(self) -> Result<DispatchPipeline, AliasConflict> {
        let commands = AliasTrie::build(self.commands.iter().cloned())?;
        let services = Services {
            outbound: self.outbound.unwrap_or_else(|| Arc::new(NoopOutbound)),
            components: Arc::new(ComponentRegistry::new(self.settings.await_timeout)),
            await_timeout: self.settings.await_timeout,
        };
        let pipeline = DispatchPipeline {
            inner: Arc::new(Inner {
                processor: self
                    .processor
                    .unwrap_or_else(|| Arc::new(DefaultEventProcessor)),
                router: self.router,
                commands: RwLock::new(commands),
                slash: CommandTable::new(),
                user_menus: CommandTable::new(),
                message_menus: CommandTable::new(),
                rate_limited: RwLock::new(Vec::new()),
                services,
                settings: self.settings,
            }),
        };

        for action in &self.commands {
            pipeline.track_cooldowns(action);
        }
        for (key, action) in self.slash {
            pipeline.register_slash(key, action);
        }
        for (name, action) in self.user_menus {
            pipeline.register_user_menu(name, action);
        }
        for (name, action) in self.message_menus {
            pipeline.register_message_menu(name, action);
        }
        for action in self.components {
            pipeline.register_component(action);
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use switchyard_core::{BoxError, EventKind, EventProcessor, OptionValue, Outbound};
    use tower::ServiceExt;

    use super::*;
    use crate::context::Verdict;
    use crate::extractor::{Args, Flags, FromContext, Options, SelectedValues};
    use crate::options::{OptionKind, OptionMap, OptionSpec};
    use crate::cooldown::Cooldown;
    use crate::privilege::Privilege;

    #[derive(Default)]
    struct RecordingOutbound {
        acks: Mutex<Vec<(EventKind, bool)>>,
        sent: Mutex<Vec<String>>,
        fail_acks: bool,
    }

    impl RecordingOutbound {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }

        fn acks(&self) -> Vec<(EventKind, bool)> {
            self.acks.lock().clone()
        }
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn acknowledge(
            &self,
            event: &InboundEvent,
            ephemeral: bool,
        ) -> Result<(), OutboundError> {
            if self.fail_acks {
                return Err(OutboundError::NotConnected);
            }
            self.acks.lock().push((event.kind(), ephemeral));
            Ok(())
        }

        async fn send(&self, _event: &InboundEvent, text: &str) -> Result<(), OutboundError> {
            self.sent.lock().push(text.to_string());
            Ok(())
        }
    }

    const ALICE: ActorKey = ActorKey {
        channel: switchyard_core::ChannelId(1),
        user: UserId(100),
    };
    const BOB: ActorKey = ActorKey {
        channel: switchyard_core::ChannelId(1),
        user: UserId(200),
    };

    fn pipeline_with(
        outbound: Arc<RecordingOutbound>,
        configure: impl FnOnce(PipelineBuilder) -> PipelineBuilder,
    ) -> DispatchPipeline {
        let builder = DispatchPipeline::builder()
            .outbound(outbound)
            .router(ErrorRouter::replying());
        configure(builder).build().unwrap()
    }

    async fn echo(Args(args): Args) -> String {
        args.join(" ")
    }

    #[tokio::test]
    async fn test_text_command_with_subcommand() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("p").child(Action::command("a").handler(echo)))
        });

        let disposition = pipeline.dispatch(InboundEvent::text(ALICE, "!p a x")).await;
        assert_eq!(disposition, Disposition::Completed);
        assert_eq!(out.sent(), ["x"]);
    }

    #[tokio::test]
    async fn test_text_drops() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| b.command(Action::command("ping").handler(echo)));

        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "ping")).await,
            Disposition::Dropped(DropReason::NoPrefix)
        );
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!pong")).await,
            Disposition::Dropped(DropReason::Unresolved)
        );
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!   ")).await,
            Disposition::Dropped(DropReason::Unresolved)
        );
        assert_eq!(
            pipeline
                .dispatch(InboundEvent::text(ALICE, "!ping").from_bot(true))
                .await,
            Disposition::Dropped(DropReason::Filtered)
        );
        assert!(out.sent().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_is_case_insensitive_and_mentions_work() {
        let out = Arc::new(RecordingOutbound::default());
        let settings = PipelineSettings {
            prefix: "sy!".into(),
            bot_user_id: Some(UserId(42)),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline_with(out.clone(), |b| {
            b.settings(settings)
                .command(Action::command("echo").handler(echo))
        });

        for text in ["SY!echo one", "<@42> echo two", "<@!42>echo three"] {
            assert_eq!(
                pipeline.dispatch(InboundEvent::text(ALICE, text)).await,
                Disposition::Completed
            );
        }
        assert_eq!(out.sent(), ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_flags_reach_handler() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("ban").handler(|Args(args): Args, flags: Flags| async move {
                format!("{} silent={}", args.join(","), flags.has("silent"))
            }))
        });

        pipeline
            .dispatch(InboundEvent::text(ALICE, "!ban -silent bob"))
            .await;
        assert_eq!(out.sent(), ["bob silent=true"]);
    }

    #[tokio::test]
    async fn test_processor_prefix_and_locale() {
        struct Custom;

        #[async_trait]
        impl EventProcessor for Custom {
            async fn prefix(&self, _event: &InboundEvent) -> Option<String> {
                Some("?".into())
            }

            async fn locale(&self, event: &InboundEvent) -> Result<Option<Locale>, BoxError> {
                match event.locale_hint() {
                    Some("broken") => Err("no locale service".into()),
                    Some(hint) => Ok(Some(hint.parse()?)),
                    None => Ok(None),
                }
            }
        }

        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.processor(Arc::new(Custom)).command(
                Action::command("lang").handler(|locale: Locale| async move { locale.to_string() }),
            )
        });

        pipeline
            .dispatch(InboundEvent::text(ALICE, "?lang").with_locale("fr-FR"))
            .await;
        pipeline.dispatch(InboundEvent::text(ALICE, "?lang")).await;
        pipeline
            .dispatch(InboundEvent::text(ALICE, "?lang").with_locale("broken"))
            .await;
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!lang")).await,
            Disposition::Dropped(DropReason::NoPrefix)
        );
        assert_eq!(out.sent(), ["fr-FR", "en-US", "en-US"]);
    }

    #[tokio::test]
    async fn test_filter_error_drops() {
        struct Failing;

        #[async_trait]
        impl EventProcessor for Failing {
            async fn filter(&self, _event: &InboundEvent) -> Result<bool, BoxError> {
                Err("filter exploded".into())
            }
        }

        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.processor(Arc::new(Failing))
                .command(Action::command("ping").handler(echo))
        });
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!ping")).await,
            Disposition::Dropped(DropReason::Filtered)
        );
    }

    #[tokio::test]
    async fn test_privilege_denied_is_recovered() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(
                Action::command("admin")
                    .privilege(Privilege::denied_with("admins only"))
                    .handler(|| async { "secret" }),
            )
        });

        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!admin")).await,
            Disposition::Recovered(ErrorClass::PrivilegeDenied)
        );
        assert_eq!(out.sent(), ["Permission denied: admins only"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_breach_is_recovered() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(
                Action::command("roll")
                    .cooldown(Cooldown::new(
                        NonZeroUsize::new(3).unwrap(),
                        Duration::from_secs(10),
                    ))
                    .handler(|| async {}),
            )
        });

        for _ in 0..3 {
            assert_eq!(
                pipeline.dispatch(InboundEvent::text(ALICE, "!roll")).await,
                Disposition::Completed
            );
        }
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!roll")).await,
            Disposition::Recovered(ErrorClass::CooldownBreached)
        );
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(BOB, "!roll")).await,
            Disposition::Completed
        );

        tokio::time::advance(Duration::from_secs(11)).await;
        let stats = pipeline.sweep();
        assert_eq!(stats.cooldown_windows, 2);
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!roll")).await,
            Disposition::Completed
        );
    }

    #[tokio::test]
    async fn test_parent_without_handler_is_bad_subcommand() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("config").child(Action::command("get").handler(echo)))
        });

        assert_eq!(
            pipeline
                .dispatch(InboundEvent::text(ALICE, "!config nope"))
                .await,
            Disposition::Recovered(ErrorClass::InvalidInput)
        );
        assert_eq!(out.sent(), ["Invalid input: bad subcommand 'nope'"]);
    }

    #[tokio::test]
    async fn test_typed_options() {
        struct Add {
            a: i64,
            b: i64,
        }

        impl crate::options::FromOptions for Add {
            fn from_options(options: &OptionMap) -> DispatchResult<Self> {
                Ok(Self {
                    a: options.integer("a")?,
                    b: options.integer_opt("b")?.unwrap_or(0),
                })
            }
        }

        let add = || {
            Action::command("add")
                .option(OptionSpec::new("a", OptionKind::Integer))
                .option(OptionSpec::new("b", OptionKind::Integer).optional())
                .handler(|Options(add): Options<Add>| async move { (add.a + add.b).to_string() })
        };
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(add()).slash(CommandKey::new("add"), add())
        });

        pipeline.dispatch(InboundEvent::text(ALICE, "!add 2 3")).await;
        pipeline
            .dispatch(
                InboundEvent::slash(ALICE, "add").with_option("a", OptionValue::Integer(7)),
            )
            .await;
        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!add two")).await,
            Disposition::Recovered(ErrorClass::InvalidInput)
        );
        assert_eq!(out.sent()[..2], ["5", "7"]);
    }

    #[tokio::test]
    async fn test_structured_routes() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.slash(
                CommandKey::new("role").subcommand("add"),
                Action::command("role-add").handler(|| async { "slash" }),
            )
            .user_menu("Inspect", Action::command("inspect").handler(|| async { "user" }))
            .message_menu("Quote", Action::command("quote").handler(|| async { "message" }))
        });

        let slash = InboundEvent::slash(ALICE, "role").with_path(None, Some("add"));
        assert_eq!(pipeline.dispatch(slash).await, Disposition::Completed);
        assert_eq!(
            pipeline.dispatch(InboundEvent::slash(ALICE, "role")).await,
            Disposition::Dropped(DropReason::Unresolved)
        );
        pipeline
            .dispatch(InboundEvent::user_menu(ALICE, "Inspect", UserId(5)))
            .await;
        pipeline
            .dispatch(InboundEvent::message_menu(
                ALICE,
                "Quote",
                switchyard_core::MessageId(9),
            ))
            .await;
        assert_eq!(out.sent(), ["slash", "user", "message"]);
    }

    #[tokio::test]
    async fn test_acknowledgement_modes() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("text").handler(|| async {}))
                .slash(CommandKey::new("deferred"), Action::command("deferred").handler(|| async {}))
                .slash(
                    CommandKey::new("private"),
                    Action::command("private")
                        .ack(AckMode::DeferEphemeral)
                        .handler(|| async {}),
                )
                .slash(
                    CommandKey::new("silent"),
                    Action::command("silent").ack(AckMode::None).handler(|| async {}),
                )
                .component(Action::component("btn").handler(|| async {}))
        });

        pipeline.dispatch(InboundEvent::text(ALICE, "!text")).await;
        pipeline.dispatch(InboundEvent::slash(ALICE, "deferred")).await;
        pipeline.dispatch(InboundEvent::slash(ALICE, "private")).await;
        pipeline.dispatch(InboundEvent::slash(ALICE, "silent")).await;
        pipeline.dispatch(InboundEvent::button(ALICE, "btn")).await;

        assert_eq!(
            out.acks(),
            [
                (EventKind::SlashCommand, false),
                (EventKind::SlashCommand, true),
                (EventKind::ButtonClick, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_ack_failure_aborts() {
        let out = Arc::new(RecordingOutbound {
            fail_acks: true,
            ..RecordingOutbound::default()
        });
        let pipeline = pipeline_with(out.clone(), |b| {
            b.slash(CommandKey::new("ping"), Action::command("ping").handler(|| async { "pong" }))
        });

        assert_eq!(
            pipeline.dispatch(InboundEvent::slash(ALICE, "ping")).await,
            Disposition::Dropped(DropReason::AckFailed)
        );
        assert!(out.sent().is_empty());
    }

    #[tokio::test]
    async fn test_scoped_listener_then_persistent() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.component(Action::component("next").handler(|| async { "persistent" }))
        });
        pipeline.register_scoped(ALICE, Action::component("next").handler(|| async { "scoped" }));

        pipeline.dispatch(InboundEvent::button(BOB, "next")).await;
        pipeline.dispatch(InboundEvent::button(ALICE, "next")).await;
        pipeline.dispatch(InboundEvent::button(ALICE, "next")).await;
        assert_eq!(out.sent(), ["persistent", "scoped", "persistent"]);
    }

    #[tokio::test]
    async fn test_consumed_scoped_listener_without_fallback_drops() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| b);
        pipeline.register_scoped(ALICE, Action::component("next").handler(|| async {}));

        assert_eq!(
            pipeline.dispatch(InboundEvent::button(ALICE, "next")).await,
            Disposition::Completed
        );
        assert_eq!(
            pipeline.dispatch(InboundEvent::button(ALICE, "next")).await,
            Disposition::Dropped(DropReason::Unresolved)
        );
    }

    async fn wait_for_listener(pipeline: &DispatchPipeline, actor: ActorKey) {
        while pipeline.components().scoped_len(actor) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_await_button() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("delete").handler(
                |ctx: Arc<DispatchContext>| async move {
                    let id = ctx.await_button("confirm").await?;
                    DispatchResult::Ok(format!("confirmed via {id}"))
                },
            ))
        });

        let waiting = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.dispatch(InboundEvent::text(ALICE, "!delete")).await }
        });
        wait_for_listener(&pipeline, ALICE).await;

        assert_eq!(
            pipeline.dispatch(InboundEvent::button(BOB, "confirm")).await,
            Disposition::Dropped(DropReason::Unresolved)
        );
        assert_eq!(
            pipeline.dispatch(InboundEvent::button(ALICE, "confirm")).await,
            Disposition::Completed
        );
        assert_eq!(waiting.await.unwrap(), Disposition::Completed);
        assert_eq!(out.sent(), ["confirmed via confirm"]);
        assert_eq!(pipeline.components().scoped_actors(), 0);
    }

    #[tokio::test]
    async fn test_await_retries_until_accepted() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("pick").handler(
                |ctx: Arc<DispatchContext>| async move {
                    let choice = ctx
                        .await_component("color", |answer: Arc<DispatchContext>| async move {
                            let SelectedValues(values) = SelectedValues::from_context(&answer)?;
                            if values == ["blue"] {
                                DispatchResult::Ok(Verdict::Accept(values[0].clone()))
                            } else {
                                answer.reply("try again").await?;
                                DispatchResult::Ok(Verdict::Retry)
                            }
                        })
                        .await?;
                    DispatchResult::Ok(format!("picked {choice}"))
                },
            ))
        });

        let waiting = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.dispatch(InboundEvent::text(ALICE, "!pick")).await }
        });

        wait_for_listener(&pipeline, ALICE).await;
        pipeline
            .dispatch(InboundEvent::select(ALICE, "color", ["red"]))
            .await;
        wait_for_listener(&pipeline, ALICE).await;
        pipeline
            .dispatch(InboundEvent::select(ALICE, "color", ["blue"]))
            .await;

        assert_eq!(waiting.await.unwrap(), Disposition::Completed);
        assert_eq!(out.sent(), ["try again", "picked blue"]);
    }

    #[tokio::test]
    async fn test_await_listener_error_propagates() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("ask").handler(|ctx: Arc<DispatchContext>| async move {
                ctx.await_component("answer", |_| async {
                    DispatchResult::<Verdict<()>>::Err(DispatchError::failed("bad answer"))
                })
                .await
            }))
        });

        let waiting = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.dispatch(InboundEvent::text(ALICE, "!ask")).await }
        });
        wait_for_listener(&pipeline, ALICE).await;

        // The component event itself completes; the failure belongs to the awaiter.
        assert_eq!(
            pipeline.dispatch(InboundEvent::button(ALICE, "answer")).await,
            Disposition::Completed
        );
        assert_eq!(
            waiting.await.unwrap(),
            Disposition::Recovered(ErrorClass::ExecutionFailed)
        );
        assert_eq!(out.sent(), ["bad answer"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_timeout_is_recovered() {
        let out = Arc::new(RecordingOutbound::default());
        let settings = PipelineSettings {
            await_timeout: Duration::from_millis(100),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline_with(out.clone(), |b| {
            b.settings(settings).command(Action::command("wait").handler(
                |ctx: Arc<DispatchContext>| async move { ctx.await_button("go").await.map(|_| ()) },
            ))
        });

        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!wait")).await,
            Disposition::Recovered(ErrorClass::Timeout)
        );
        assert_eq!(pipeline.components().scoped_actors(), 0);
        assert_eq!(
            pipeline.dispatch(InboundEvent::button(ALICE, "go")).await,
            Disposition::Dropped(DropReason::Unresolved)
        );
    }

    #[tokio::test]
    async fn test_handler_panic_is_recovered() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(Action::command("boom").handler(|| async {
                if true {
                    panic!("kaboom");
                }
            }))
        });

        assert_eq!(
            pipeline.dispatch(InboundEvent::text(ALICE, "!boom")).await,
            Disposition::Recovered(ErrorClass::Unhandled)
        );
    }

    #[tokio::test]
    async fn test_panicking_recovery_stays_inside_dispatch() {
        let pipeline = DispatchPipeline::builder()
            .router(ErrorRouter::new().on(ErrorClass::ExecutionFailed, |_, _| async {
                let explode = true;
                if explode {
                    panic!("recovery exploded");
                }
                Ok(())
            }))
            .command(Action::command("fail").handler(|| async {
                DispatchResult::<()>::Err(DispatchError::failed("nope"))
            }))
            .build()
            .unwrap();

        let dispatched = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.dispatch(InboundEvent::text(ALICE, "!fail")).await }
        })
        .await;

        assert_eq!(
            dispatched.unwrap(),
            Disposition::Recovered(ErrorClass::ExecutionFailed)
        );
    }

    #[tokio::test]
    async fn test_incremental_registration() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| b.command(Action::command("ping").handler(echo)));

        pipeline
            .register_command(Action::command("pong").handler(echo))
            .unwrap();
        let err = pipeline
            .register_command(Action::command("other").alias("ping"))
            .unwrap_err();
        assert_eq!(err.alias, "ping");

        let names: Vec<_> = pipeline
            .list_commands::<&str>(&[])
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, ["ping", "pong"]);
        assert!(pipeline.command_at(&["pong"]).is_some());
    }

    #[test]
    fn test_build_rejects_conflicts() {
        let result = DispatchPipeline::builder()
            .command(Action::command("a"))
            .command(Action::command("b").alias("a"))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_tower_service() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| b.command(Action::command("echo").handler(echo)));

        let disposition = pipeline
            .oneshot(InboundEvent::text(ALICE, "!echo via tower"))
            .await
            .unwrap();
        assert_eq!(disposition, Disposition::Completed);
        assert_eq!(out.sent(), ["via tower"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_respects_cooldown() {
        let out = Arc::new(RecordingOutbound::default());
        let pipeline = pipeline_with(out.clone(), |b| {
            b.command(
                Action::command("claim")
                    .cooldown(Cooldown::new(
                        NonZeroUsize::new(2).unwrap(),
                        Duration::from_secs(3600),
                    ))
                    .handler(|| async { "claimed" }),
            )
        });

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.dispatch(InboundEvent::text(ALICE, "!claim")).await })
            })
            .collect();

        let mut completed = 0;
        for task in tasks {
            if task.await.unwrap() == Disposition::Completed {
                completed += 1;
            }
        }
        assert_eq!(completed, 2);
        assert_eq!(out.sent().iter().filter(|s| *s == "claimed").count(), 2);
    }
}
