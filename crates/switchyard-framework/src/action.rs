//! Actions: the registrable handler units.
//!
//! An [`Action`] is either a text command (one or more aliases, optionally
//! with subcommands), a structured command, or an interactive component
//! (a single custom identifier). It carries its own authorization rule,
//! cooldown, acknowledgement override and option schema.
//!
//! Actions are assembled with [`ActionBuilder`] and are immutable once built.
//!
//! ```rust,ignore
//! let config = Action::command("config")
//!     .alias("cfg")
//!     .privilege(Privilege::from_fn(is_admin))
//!     .child(Action::command("get").handler(config_get))
//!     .child(
//!         Action::command("set")
//!             .option(OptionSpec::new("key", OptionKind::String))
//!             .option(OptionSpec::new("value", OptionKind::String))
//!             .cooldown(Cooldown::new(NonZeroUsize::new(3).unwrap(), Duration::from_secs(10)))
//!             .handler(config_set),
//!     )
//!     .build();
//! ```

use std::fmt;
use std::sync::Arc;

use switchyard_core::AckMode;

use crate::cooldown::Cooldown;
use crate::doc::CommandDoc;
use crate::handler::{BoxedHandler, Handler, into_handler};
use crate::options::{OptionSchema, OptionSpec};
use crate::privilege::Privilege;

/// A registrable handler unit.
pub struct Action {
    name: String,
    aliases: Vec<String>,
    privilege: Privilege,
    cooldown: Cooldown,
    ack: Option<AckMode>,
    schema: OptionSchema,
    children: Vec<Arc<Action>>,
    handler: Option<BoxedHandler>,
    doc: Option<CommandDoc>,
}

impl Action {
    /// Starts an action with only a name; add aliases explicitly.
    pub fn builder(name: impl Into<String>) -> ActionBuilder {
        ActionBuilder::new(name.into())
    }

    /// Starts a text or structured command whose name is also its first alias.
    pub fn command(name: impl Into<String>) -> ActionBuilder {
        let name = name.into();
        ActionBuilder::new(name.clone()).alias(name)
    }

    /// Starts a component listener keyed by `custom_id`.
    pub fn component(custom_id: impl Into<String>) -> ActionBuilder {
        ActionBuilder::new(custom_id.into())
    }

    /// Name used in logs. For components this is the custom identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier under which a component action is registered.
    pub fn custom_id(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn privilege(&self) -> &Privilege {
        &self.privilege
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    /// Acknowledgement override; `None` defers to the pipeline default.
    pub fn ack(&self) -> Option<AckMode> {
        self.ack
    }

    pub fn schema(&self) -> &OptionSchema {
        &self.schema
    }

    pub fn children(&self) -> &[Arc<Action>] {
        &self.children
    }

    /// `None` for parent commands that only group subcommands.
    pub fn handler(&self) -> Option<&BoxedHandler> {
        self.handler.as_ref()
    }

    pub fn doc(&self) -> Option<&CommandDoc> {
        self.doc.as_ref()
    }

    /// Whether the action should be left out of listings.
    pub fn is_unlisted(&self) -> bool {
        self.doc.as_ref().is_some_and(CommandDoc::is_unlisted)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("cooldown", &self.cooldown.permits())
            .field("ack", &self.ack)
            .field("children", &self.children.len())
            .field("has_handler", &self.handler.is_some())
            .field("unlisted", &self.is_unlisted())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Action`].
pub struct ActionBuilder {
    name: String,
    aliases: Vec<String>,
    privilege: Privilege,
    cooldown: Cooldown,
    ack: Option<AckMode>,
    schema: OptionSchema,
    children: Vec<Arc<Action>>,
    handler: Option<BoxedHandler>,
    doc: Option<CommandDoc>,
}

impl ActionBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            aliases: Vec::new(),
            privilege: Privilege::allowed(),
            cooldown: Cooldown::none(),
            ack: None,
            schema: OptionSchema::new(),
            children: Vec::new(),
            handler: None,
            doc: None,
        }
    }

    /// Adds an alias. Duplicates on the same action are ignored.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        if !self.aliases.contains(&alias) {
            self.aliases.push(alias);
        }
        self
    }

    pub fn aliases<I, S>(self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        aliases
            .into_iter()
            .fold(self, |builder, alias| builder.alias(alias))
    }

    pub fn privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn cooldown(mut self, cooldown: Cooldown) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Overrides the pipeline's acknowledgement mode for this action.
    pub fn ack(mut self, mode: AckMode) -> Self {
        self.ack = Some(mode);
        self
    }

    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.schema.push(spec);
        self
    }

    pub fn schema(mut self, schema: OptionSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Adds a subcommand.
    pub fn child(mut self, child: impl Into<Arc<Action>>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        self.handler = Some(into_handler(handler));
        self
    }

    pub fn doc(mut self, doc: CommandDoc) -> Self {
        self.doc = Some(doc);
        self
    }

    pub(crate) fn boxed_handler(mut self, handler: BoxedHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> Action {
        Action {
            name: self.name,
            aliases: self.aliases,
            privilege: self.privilege,
            cooldown: self.cooldown,
            ack: self.ack,
            schema: self.schema,
            children: self.children,
            handler: self.handler,
            doc: self.doc,
        }
    }
}

impl From<ActionBuilder> for Action {
    fn from(builder: ActionBuilder) -> Self {
        builder.build()
    }
}

impl From<ActionBuilder> for Arc<Action> {
    fn from(builder: ActionBuilder) -> Self {
        Arc::new(builder.build())
    }
}
