//! # Switchyard Framework
//!
//! The dispatch core of Switchyard, built on the types in `switchyard-core`.
//!
//! This layer provides:
//! - [`Action`] trees with aliases, privileges, cooldowns and option schemas
//! - [`AliasTrie`] for text commands and [`CommandTable`] for structured ones
//! - [`ComponentRegistry`] with single-use scoped and persistent listeners
//! - Axum-style [`Handler`]s with [`FromContext`] parameter injection
//! - [`DispatchPipeline`], which runs every event from filter to recovery
//! - [`ErrorRouter`] for mapping failures to recovery actions
//! - [`Paginator`] for button-driven paging and [`CommandDoc`] help metadata

pub mod action;
pub mod context;
pub mod cooldown;
pub mod doc;
pub mod extractor;
pub mod handler;
pub mod options;
pub mod paginator;
pub mod pipeline;
pub mod privilege;
pub mod recovery;
pub mod registry;
pub mod routes;
pub mod tokenize;
pub mod trie;

pub use action::{Action, ActionBuilder};
pub use context::{DispatchContext, Verdict};
pub use cooldown::{Cooldown, Remaining};
pub use doc::{CommandDoc, FlagDoc};
pub use extractor::{Args, Flags, FromContext, ModalFields, Options, SelectedValues};
pub use handler::{BoxedHandler, Handler, IntoOutcome, into_handler};
pub use options::{FromOptions, OptionKind, OptionMap, OptionSchema, OptionSpec};
pub use paginator::{PageState, Paginator};
pub use pipeline::{
    DispatchPipeline, Disposition, DropReason, PipelineBuilder, PipelineSettings, SweepStats,
};
pub use privilege::Privilege;
pub use recovery::{ErrorClass, ErrorRouter, RecoveryFn};
pub use registry::{
    ComponentMatch, ComponentRegistry, DEFAULT_SCOPED_TTL, ListenerScope, ListenerToken,
};
pub use routes::{CommandKey, CommandTable};
pub use tokenize::{TokenizedInput, fit_args, tokenize};
pub use trie::{AliasTrie, Resolution};
