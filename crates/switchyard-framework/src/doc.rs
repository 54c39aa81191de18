//! Human-facing documentation attached to commands.
//!
//! Nothing in dispatch reads a [`CommandDoc`] except [`AliasTrie::list`],
//! which hides actions marked unlisted. Help renderers are free to format
//! the rest however they like.
//!
//! [`AliasTrie::list`]: crate::trie::AliasTrie::list

/// Describes one flag a command understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDoc {
    pub name: String,
    /// Shape of the flag's value, e.g. `<seconds>`; `None` for switches.
    pub value_format: Option<String>,
    pub description: String,
}

/// Help text for a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandDoc {
    description: String,
    syntax: Option<String>,
    body: Option<String>,
    flags: Vec<FlagDoc>,
    unlisted: bool,
}

impl CommandDoc {
    /// Starts a doc with its one-line description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Usage line, e.g. `<user> [reason]`.
    pub fn syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = Some(syntax.into());
        self
    }

    /// Longer free-form explanation.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn flag(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.flags.push(FlagDoc {
            name: name.into(),
            value_format: None,
            description: description.into(),
        });
        self
    }

    pub fn valued_flag(
        mut self,
        name: impl Into<String>,
        value_format: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.flags.push(FlagDoc {
            name: name.into(),
            value_format: Some(value_format.into()),
            description: description.into(),
        });
        self
    }

    /// Keeps the command out of listings. It still dispatches.
    pub fn unlisted(mut self) -> Self {
        self.unlisted = true;
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn syntax_line(&self) -> Option<&str> {
        self.syntax.as_deref()
    }

    pub fn body_text(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn flags(&self) -> &[FlagDoc] {
        &self.flags
    }

    pub fn is_unlisted(&self) -> bool {
        self.unlisted
    }
}
