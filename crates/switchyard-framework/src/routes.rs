//! Flat routing tables for structured commands.
//!
//! Structured commands (slash commands and context menus) arrive already
//! split into a name and an optional group/subcommand path, so they resolve
//! through a plain map instead of the alias trie.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::action::Action;

/// Full path of a structured command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub name: String,
    pub group: Option<String>,
    pub subcommand: Option<String>,
}

impl CommandKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            subcommand: None,
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn subcommand(mut self, subcommand: impl Into<String>) -> Self {
        self.subcommand = Some(subcommand.into());
        self
    }
}

impl fmt::Display for CommandKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)?;
        if let Some(group) = &self.group {
            write!(f, " {group}")?;
        }
        if let Some(subcommand) = &self.subcommand {
            write!(f, " {subcommand}")?;
        }
        Ok(())
    }
}

/// A concurrent map from [`CommandKey`] to action. Re-registering a key
/// replaces the previous action.
#[derive(Debug, Default)]
pub struct CommandTable {
    entries: RwLock<HashMap<CommandKey, Arc<Action>>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: CommandKey, action: Arc<Action>) {
        let replaced = self.entries.write().insert(key.clone(), action).is_some();
        debug!(command = %key, replaced, "Registered structured command");
    }

    pub fn get(&self, key: &CommandKey) -> Option<Arc<Action>> {
        self.entries.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
