//! # Switchyard
//!
//! Command and component dispatch for chat bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  InboundEvent  ┌─────────────────────────────────────────────┐
//! │ transport │───────────────▶│ SwitchyardRuntime (one task per event)      │
//! └───────────┘                │  └─ DispatchPipeline                        │
//!       ▲                      │      filter → resolve → ack → privilege     │
//!       │                      │      → cooldown → handler ─┐                │
//!       │        Outbound      │                 ErrorRouter◀┘ on failure    │
//!       └──────────────────────┴─────────────────────────────────────────────┘
//! ```
//!
//! - **Core**: identifiers, events, the error taxonomy and the collaborator
//!   traits (`Outbound`, `EventProcessor`)
//! - **Framework**: actions, the alias trie, cooldowns, privileges, the
//!   component registry, handlers and the pipeline
//! - **Runtime**: configuration, logging and the event loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use switchyard::prelude::*;
//!
//! async fn echo(Args(args): Args) -> String {
//!     args.join(" ")
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SwitchyardRuntime::builder()
//!         .pipeline(|p| {
//!             p.outbound(Arc::new(MyOutbound))
//!                 .router(ErrorRouter::replying())
//!                 .command(Action::command("echo").alias("say").handler(echo))
//!         })
//!         .build()?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use switchyard_core as core;
pub use switchyard_framework as framework;
pub use switchyard_runtime as runtime;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use switchyard::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use switchyard_runtime::{SwitchyardConfig, SwitchyardRuntime};

    // Events and errors
    pub use switchyard_core::{
        AckMode, ActorKey, DispatchError, DispatchResult, EventKind, EventProcessor,
        InboundEvent, Locale, Outbound, OutboundError, Payload,
    };

    // Actions and routing
    pub use switchyard_framework::{
        Action, CommandDoc, CommandKey, Cooldown, DispatchContext, DispatchPipeline, Disposition,
        ErrorClass, ErrorRouter, PageState, Paginator, Privilege, Verdict,
    };

    // Extractors - for handler parameters
    pub use switchyard_framework::{
        Args, Flags, FromContext, FromOptions, ModalFields, OptionKind, OptionMap, OptionSpec,
        Options, SelectedValues,
    };
}
