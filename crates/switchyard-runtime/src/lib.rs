//! Switchyard Runtime - configuration, logging and the event loop.
//!
//! This crate provides:
//! - Layered configuration loading and validation ([`config`])
//! - Logging setup from configuration ([`logging`])
//! - [`SwitchyardRuntime`], which feeds inbound events to a
//!   [`DispatchPipeline`](switchyard_framework::DispatchPipeline), one task
//!   per event, and sweeps expired dispatch state in the background
//!
//! ```ignore
//! use switchyard_runtime::SwitchyardRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SwitchyardRuntime::builder()
//!         .pipeline(|p| p.outbound(Arc::new(MyOutbound)).command(ping()))
//!         .build()?;
//!
//!     // Hand the sender to the transport
//!     let events = runtime.sender();
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig, SwitchyardConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, RuntimeStats, SwitchyardRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for applications built on Switchyard.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
