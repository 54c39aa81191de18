//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchyard_core::{AckMode, UserId};
use switchyard_framework::PipelineSettings;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchyardConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `Full` without it.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `switchyard_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// The base level, or `None` if `level` is not a valid level name.
    pub fn tracing_level(&self) -> Option<tracing::Level> {
        self.level.parse().ok()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatch pipeline and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Text-command prefix.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Locale tag used when an event carries none.
    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default)]
    pub ack_mode: AckMode,

    /// TTL of awaited component listeners, in seconds.
    #[serde(default = "default_await_timeout_secs")]
    pub await_component_timeout_secs: u64,

    /// Period of the expired-listener and idle-cooldown sweep, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Also accept a mention of the bot as a prefix.
    #[serde(default = "default_mention_prefix")]
    pub mention_prefix: bool,

    #[serde(default)]
    pub bot_user_id: Option<u64>,

    /// Capacity of the inbound event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            default_locale: default_locale(),
            ack_mode: AckMode::default(),
            await_component_timeout_secs: default_await_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            mention_prefix: default_mention_prefix(),
            bot_user_id: None,
            event_buffer: default_event_buffer(),
        }
    }
}

impl DispatchConfig {
    pub fn await_timeout(&self) -> Duration {
        Duration::from_secs(self.await_component_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Converts to the pipeline's settings.
    pub fn to_settings(&self) -> ConfigResult<PipelineSettings> {
        let default_locale = self
            .default_locale
            .parse()
            .map_err(|e| ConfigError::validation(format!("Invalid default locale: {e}")))?;
        Ok(PipelineSettings {
            prefix: self.prefix.clone(),
            default_locale,
            ack_mode: self.ack_mode,
            await_timeout: self.await_timeout(),
            mention_prefix: self.mention_prefix,
            bot_user_id: self.bot_user_id.map(UserId),
        })
    }
}

impl fmt::Display for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prefix={:?} locale={} ack={:?} await={}s sweep={}s",
            self.prefix,
            self.default_locale,
            self.ack_mode,
            self.await_component_timeout_secs,
            self.sweep_interval_secs
        )
    }
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_await_timeout_secs() -> u64 {
    600
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_mention_prefix() -> bool {
    true
}

fn default_event_buffer() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SwitchyardConfig::default();
        let settings = config.dispatch.to_settings().unwrap();
        assert_eq!(settings.prefix, "!");
        assert_eq!(settings.default_locale.as_str(), "en-US");
        assert_eq!(settings.ack_mode, AckMode::Defer);
        assert_eq!(settings.await_timeout, Duration::from_secs(600));
        assert!(settings.bot_user_id.is_none());
        assert_eq!(config.logging.tracing_level(), Some(tracing::Level::INFO));
    }

    #[test]
    fn test_bad_locale_is_rejected() {
        let config = DispatchConfig {
            default_locale: "not a locale".into(),
            ..DispatchConfig::default()
        };
        assert!(matches!(
            config.to_settings(),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
