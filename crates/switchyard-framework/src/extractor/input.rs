//! Extractors over the event's input.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use switchyard_core::{DispatchError, DispatchResult, Payload};

use super::core::FromContext;
use crate::context::DispatchContext;
use crate::options::FromOptions;

/// Arguments left over after command resolution.
///
/// Empty for structured commands and components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(pub Vec<String>);

impl Deref for Args {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromContext for Args {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(Self(ctx.args().to_vec()))
    }
}

/// Flags of a text command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(pub HashMap<String, String>);

impl Flags {
    /// Value of a flag; `Some("")` for a bare `-name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }
}

impl FromContext for Flags {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        Ok(Self(ctx.flags().clone()))
    }
}

/// Options bound against the action's schema and built into `T`.
///
/// Fails with [`DispatchError::InvalidInput`] when a required option is
/// missing or a value does not match its declared kind.
#[derive(Debug, Clone)]
pub struct Options<T>(pub T);

impl<T> Deref for Options<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: FromOptions> FromContext for Options<T> {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        let options = ctx.options()?;
        T::from_options(&options).map(Self)
    }
}

/// Values picked in a select menu.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedValues(pub Vec<String>);

impl Deref for SelectedValues {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromContext for SelectedValues {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        match ctx.event().payload() {
            Payload::SelectMenuPick { values, .. } => Ok(Self(values.clone())),
            _ => Err(DispatchError::invalid_argument("values", None)),
        }
    }
}

/// Fields submitted through a modal, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModalFields(pub Vec<(String, String)>);

impl ModalFields {
    /// Value of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`get`](Self::get), but a missing field is an input error.
    pub fn require(&self, name: &str) -> DispatchResult<&str> {
        self.get(name)
            .ok_or_else(|| DispatchError::invalid_argument(name, None))
    }
}

impl FromContext for ModalFields {
    fn from_context(ctx: &Arc<DispatchContext>) -> DispatchResult<Self> {
        match ctx.event().payload() {
            Payload::ModalSubmit { fields, .. } => Ok(Self(fields.clone())),
            _ => Err(DispatchError::invalid_argument("fields", None)),
        }
    }
}
