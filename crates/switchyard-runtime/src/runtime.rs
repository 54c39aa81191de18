//! The event loop.
//!
//! [`SwitchyardRuntime`] owns a [`DispatchPipeline`] and feeds it from an
//! mpsc queue. Every event is dispatched on its own task, so a slow handler
//! (for example one awaiting a button click) never holds up other events.
//! A periodic sweep reclaims expired scoped listeners and idle cooldown
//! windows. On shutdown the loop stops accepting events and waits for the
//! in-flight ones to finish.
//!
//! ```rust,ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! let runtime = SwitchyardRuntime::builder()
//!     .config_file("switchyard.toml")
//!     .pipeline(|p| p.outbound(Arc::new(MyOutbound)).command(ping()))
//!     .build()?;
//!
//! let events = runtime.sender();
//! tokio::spawn(async move { transport.forward_to(events).await });
//!
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::signal;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use switchyard_core::{ActorKey, InboundEvent};
use switchyard_framework::{
    Action, CommandKey, DispatchPipeline, Disposition, ListenerToken, PipelineBuilder,
};

use crate::config::{ConfigLoader, SwitchyardConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// A snapshot of the runtime's event counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Events taken off the queue.
    pub received: u64,
    /// Events whose handler succeeded.
    pub completed: u64,
    /// Events whose failure was routed to a recovery action.
    pub recovered: u64,
    /// Events dropped before reaching a handler.
    pub dropped: u64,
}

impl RuntimeStats {
    /// Events that reached a handler.
    pub fn dispatched(&self) -> u64 {
        self.completed + self.recovered
    }

    /// Events whose dispatch has finished.
    pub fn finished(&self) -> u64 {
        self.completed + self.recovered + self.dropped
    }
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    completed: AtomicU64,
    recovered: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn record(&self, disposition: Disposition) {
        let counter = match disposition {
            Disposition::Completed => &self.completed,
            Disposition::Recovered(_) => &self.recovered,
            Disposition::Dropped(_) => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RuntimeStats {
        RuntimeStats {
            received: self.received.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            recovered: self.recovered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Drives a [`DispatchPipeline`] from an event queue.
pub struct SwitchyardRuntime {
    config: SwitchyardConfig,
    pipeline: DispatchPipeline,
    events_tx: mpsc::Sender<InboundEvent>,
    /// Taken by the event loop when it starts.
    events_rx: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    counters: Arc<Counters>,
}

impl SwitchyardRuntime {
    /// Creates a runtime builder that loads configuration from the usual
    /// locations.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration, initializes logging from it and builds
    /// the pipeline with the configured dispatch settings.
    pub fn new(config: SwitchyardConfig, pipeline: PipelineBuilder) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let settings = config.dispatch.to_settings()?;
        let pipeline = pipeline.settings(settings).build()?;
        let (events_tx, events_rx) = mpsc::channel(config.dispatch.event_buffer);

        info!(
            log_level = %config.logging.level,
            dispatch = %config.dispatch,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config,
            pipeline,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn config(&self) -> &SwitchyardConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &DispatchPipeline {
        &self.pipeline
    }

    /// A handle for submitting inbound events.
    pub fn sender(&self) -> mpsc::Sender<InboundEvent> {
        self.events_tx.clone()
    }

    pub fn stats(&self) -> RuntimeStats {
        self.counters.snapshot()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    pub fn register_command(&self, action: impl Into<Arc<Action>>) -> RuntimeResult<()> {
        Ok(self.pipeline.register_command(action)?)
    }

    pub fn register_slash(&self, key: CommandKey, action: impl Into<Arc<Action>>) {
        self.pipeline.register_slash(key, action);
    }

    pub fn register_user_menu(&self, name: impl Into<String>, action: impl Into<Arc<Action>>) {
        self.pipeline.register_user_menu(name, action);
    }

    pub fn register_message_menu(&self, name: impl Into<String>, action: impl Into<Arc<Action>>) {
        self.pipeline.register_message_menu(name, action);
    }

    pub fn register_component(&self, action: impl Into<Arc<Action>>) {
        self.pipeline.register_component(action);
    }

    pub fn register_scoped(&self, actor: ActorKey, action: impl Into<Arc<Action>>) -> ListenerToken {
        self.pipeline.register_scoped(actor, action)
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Runs until Ctrl+C or [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> RuntimeResult<()> {
        info!("Switchyard runtime is now running. Press Ctrl+C to stop.");
        self.run_until(wait_for_ctrl_c()).await
    }

    /// Runs until `shutdown` completes or [`shutdown`](Self::shutdown) is
    /// called. The loop can be started only once.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let mut events = self
            .events_rx
            .lock()
            .await
            .take()
            .ok_or(RuntimeError::AlreadyRunning)?;

        let mut sweep = tokio::time::interval(self.config.dispatch.sweep_interval());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        sweep.tick().await;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = sweep.tick() => self.sweep(),
                event = events.recv() => match event {
                    Some(event) => self.spawn_dispatch(event),
                    None => {
                        info!("Event queue closed");
                        break;
                    }
                },
            }
        }

        events.close();
        self.tracker.close();
        info!(in_flight = self.tracker.len(), "Waiting for in-flight events");
        self.tracker.wait().await;

        let stats = self.stats();
        info!(
            received = stats.received,
            completed = stats.completed,
            recovered = stats.recovered,
            dropped = stats.dropped,
            "Runtime stopped"
        );
        Ok(())
    }

    /// Stops the event loop. In-flight events still run to completion.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn spawn_dispatch(&self, event: InboundEvent) {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        let pipeline = self.pipeline.clone();
        let counters = Arc::clone(&self.counters);
        self.tracker.spawn(async move {
            let disposition = pipeline.dispatch(event).await;
            counters.record(disposition);
        });
    }

    fn sweep(&self) {
        let swept = self.pipeline.sweep();
        if swept.listeners > 0 || swept.cooldown_windows > 0 {
            debug!(
                listeners = swept.listeners,
                cooldown_windows = swept.cooldown_windows,
                "Swept expired dispatch state"
            );
        }
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C, waiting for shutdown()");
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`SwitchyardRuntime`] that loads its own configuration.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    pipeline: PipelineBuilder,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            pipeline: DispatchPipeline::builder(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges a configuration on top of every loaded source.
    pub fn merge(mut self, config: SwitchyardConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Configures the pipeline. Its settings are replaced by the loaded
    /// dispatch configuration.
    pub fn pipeline(mut self, configure: impl FnOnce(PipelineBuilder) -> PipelineBuilder) -> Self {
        self.pipeline = configure(self.pipeline);
        self
    }

    pub fn build(self) -> RuntimeResult<SwitchyardRuntime> {
        let config = self.config_loader.load()?;
        SwitchyardRuntime::new(config, self.pipeline)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    const ACTOR: ActorKey = ActorKey {
        channel: switchyard_core::ChannelId(1),
        user: switchyard_core::UserId(2),
    };

    fn counting(name: &str, hits: &Arc<AtomicUsize>) -> Action {
        let hits = Arc::clone(hits);
        Action::command(name)
            .handler(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            })
            .build()
    }

    fn spawn_run(
        runtime: &Arc<SwitchyardRuntime>,
    ) -> tokio::task::JoinHandle<RuntimeResult<()>> {
        let runtime = Arc::clone(runtime);
        tokio::spawn(async move { runtime.run_until(std::future::pending()).await })
    }

    async fn wait_until(runtime: &SwitchyardRuntime, check: impl Fn(RuntimeStats) -> bool) {
        while !check(runtime.stats()) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_dispatches_queued_events() {
        let hits = Arc::new(AtomicUsize::new(0));
        let runtime = Arc::new(
            SwitchyardRuntime::new(
                SwitchyardConfig::default(),
                DispatchPipeline::builder().command(counting("ping", &hits)),
            )
            .unwrap(),
        );
        let handle = spawn_run(&runtime);

        let events = runtime.sender();
        events.send(InboundEvent::text(ACTOR, "!ping")).await.unwrap();
        events.send(InboundEvent::text(ACTOR, "no prefix")).await.unwrap();
        events.send(InboundEvent::text(ACTOR, "!ping")).await.unwrap();
        wait_until(&runtime, |s| s.finished() == 3).await;

        runtime.shutdown();
        handle.await.unwrap().unwrap();

        let stats = runtime.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dispatched(), 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_events() {
        let runtime = Arc::new(
            SwitchyardRuntime::new(
                SwitchyardConfig::default(),
                DispatchPipeline::builder().command(Action::command("slow").handler(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                })),
            )
            .unwrap(),
        );
        let handle = spawn_run(&runtime);

        runtime
            .sender()
            .send(InboundEvent::text(ACTOR, "!slow"))
            .await
            .unwrap();
        wait_until(&runtime, |s| s.received == 1).await;

        runtime.shutdown();
        handle.await.unwrap().unwrap();
        assert_eq!(runtime.stats().completed, 1);
    }

    #[tokio::test]
    async fn test_loop_starts_once() {
        let runtime = SwitchyardRuntime::new(SwitchyardConfig::default(), DispatchPipeline::builder())
            .unwrap();
        runtime.run_until(async {}).await.unwrap();
        assert!(matches!(
            runtime.run_until(async {}).await,
            Err(RuntimeError::AlreadyRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_sweep_reclaims_listeners() {
        let mut config = SwitchyardConfig::default();
        config.dispatch.await_component_timeout_secs = 1;
        config.dispatch.sweep_interval_secs = 1;
        let runtime = Arc::new(SwitchyardRuntime::new(config, DispatchPipeline::builder()).unwrap());
        runtime.register_scoped(ACTOR, Action::component("confirm"));
        assert_eq!(runtime.pipeline().components().scoped_actors(), 1);

        let handle = spawn_run(&runtime);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(runtime.pipeline().components().scoped_actors(), 0);

        runtime.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SwitchyardConfig::default();
        config.dispatch.prefix.clear();
        assert!(matches!(
            SwitchyardRuntime::new(config, DispatchPipeline::builder()),
            Err(RuntimeError::Config(_))
        ));
    }

    #[test]
    fn test_alias_conflict_is_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let pipeline = DispatchPipeline::builder()
            .command(counting("ping", &hits))
            .command(Action::command("pong").alias("ping"));
        assert!(matches!(
            SwitchyardRuntime::new(SwitchyardConfig::default(), pipeline),
            Err(RuntimeError::Registration(_))
        ));
    }
}
