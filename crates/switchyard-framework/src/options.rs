//! Declared option schemas and typed option values.
//!
//! An [`Action`](crate::Action) may declare an ordered [`OptionSchema`]. The
//! schema is applied to whatever input the invoking event carried:
//!
//! - structured commands supply named [`OptionValue`]s, which are checked
//!   against each [`OptionSpec`] by name and kind
//! - text commands supply leftover arguments, which are bound positionally
//!   (surplus arguments merge into the last option) and parsed per kind
//!
//! The resulting [`OptionMap`] is turned into a handler-facing value object
//! through [`FromOptions`]:
//!
//! ```rust,ignore
//! struct Ban {
//!     user: UserId,
//!     reason: Option<String>,
//! }
//!
//! impl FromOptions for Ban {
//!     fn from_options(options: &OptionMap) -> DispatchResult<Self> {
//!         Ok(Self {
//!             user: options.user("user")?,
//!             reason: options.string_opt("reason")?,
//!         })
//!     }
//! }
//!
//! async fn ban(Options(ban): Options<Ban>) -> String {
//!     format!("banned {}", ban.user)
//! }
//! ```

use std::collections::HashMap;
use std::fmt;

use switchyard_core::{ChannelId, DispatchError, DispatchResult, OptionValue, UserId};

use crate::tokenize::fit_args;

// ============================================================================
// Schema
// ============================================================================

/// The kind of value an option holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
}

impl OptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::User => "user",
            Self::Channel => "channel",
        }
    }

    /// Parses a text argument as this kind.
    ///
    /// Users and channels accept either a bare id or a mention
    /// (`<@id>`, `<@!id>`, `<#id>`).
    pub fn parse(self, raw: &str) -> Option<OptionValue> {
        match self {
            Self::String => Some(OptionValue::String(raw.to_string())),
            Self::Integer => raw.parse().ok().map(OptionValue::Integer),
            Self::Number => raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(OptionValue::Number),
            Self::Boolean => parse_bool(raw).map(OptionValue::Boolean),
            Self::User => parse_mention(raw, &["<@!", "<@"])
                .map(|id| OptionValue::User(UserId(id))),
            Self::Channel => {
                parse_mention(raw, &["<#"]).map(|id| OptionValue::Channel(ChannelId(id)))
            }
        }
    }

    /// Checks a structured value against this kind. Integers are accepted
    /// where numbers are expected.
    fn coerce(self, value: &OptionValue) -> Option<OptionValue> {
        match (self, value) {
            (Self::String, OptionValue::String(_))
            | (Self::Integer, OptionValue::Integer(_))
            | (Self::Number, OptionValue::Number(_))
            | (Self::Boolean, OptionValue::Boolean(_))
            | (Self::User, OptionValue::User(_))
            | (Self::Channel, OptionValue::Channel(_)) => Some(value.clone()),
            (Self::Number, OptionValue::Integer(i)) => Some(OptionValue::Number(*i as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn parse_mention(raw: &str, openers: &[&str]) -> Option<u64> {
    let inner = openers
        .iter()
        .find_map(|opener| raw.strip_prefix(opener)?.strip_suffix('>'))
        .unwrap_or(raw);
    inner.parse().ok()
}

/// One declared option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: String,
    pub kind: OptionKind,
    pub required: bool,
}

impl OptionSpec {
    /// A required option.
    pub fn new(name: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Marks the option as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// An ordered list of option declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSchema {
    specs: Vec<OptionSpec>,
}

impl OptionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a declaration.
    pub fn with(mut self, spec: OptionSpec) -> Self {
        self.push(spec);
        self
    }

    /// Appends a declaration, replacing an earlier one with the same name.
    pub fn push(&mut self, spec: OptionSpec) {
        self.specs.retain(|existing| existing.name != spec.name);
        self.specs.push(spec);
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.specs.iter()
    }

    /// Binds text arguments positionally.
    pub fn bind_text(&self, args: &[String]) -> DispatchResult<OptionMap> {
        let mut map = OptionMap::default();
        for (spec, raw) in self.specs.iter().zip(fit_args(args, self.specs.len())) {
            match raw {
                Some(raw) => {
                    let value = spec.kind.parse(&raw).ok_or_else(|| {
                        DispatchError::invalid_argument(spec.name.clone(), Some(raw.clone()))
                    })?;
                    map.values.insert(spec.name.clone(), value);
                }
                None if spec.required => {
                    return Err(DispatchError::invalid_argument(spec.name.clone(), None));
                }
                None => {}
            }
        }
        Ok(map)
    }

    /// Binds named structured values. Undeclared names are ignored.
    pub fn bind_named(&self, options: &[(String, OptionValue)]) -> DispatchResult<OptionMap> {
        let mut map = OptionMap::default();
        for spec in &self.specs {
            let given = options
                .iter()
                .find(|(name, _)| *name == spec.name)
                .map(|(_, value)| value);
            match given {
                Some(value) => {
                    let value = spec.kind.coerce(value).ok_or_else(|| {
                        DispatchError::invalid_argument(spec.name.clone(), Some(value.to_string()))
                    })?;
                    map.values.insert(spec.name.clone(), value);
                }
                None if spec.required => {
                    return Err(DispatchError::invalid_argument(spec.name.clone(), None));
                }
                None => {}
            }
        }
        Ok(map)
    }
}

impl FromIterator<OptionSpec> for OptionSchema {
    fn from_iter<I: IntoIterator<Item = OptionSpec>>(iter: I) -> Self {
        let mut schema = Self::new();
        for spec in iter {
            schema.push(spec);
        }
        schema
    }
}

// ============================================================================
// Bound values
// ============================================================================

/// Option values bound against a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionMap {
    values: HashMap<String, OptionValue>,
}

macro_rules! typed_getter {
    ($get:ident, $get_opt:ident, $ty:ty, $variant:ident) => {
        #[doc = concat!("Required `", stringify!($variant), "` option.")]
        pub fn $get(&self, name: &str) -> DispatchResult<$ty> {
            self.$get_opt(name)?
                .ok_or_else(|| DispatchError::invalid_argument(name, None))
        }

        #[doc = concat!("Optional `", stringify!($variant), "` option.")]
        pub fn $get_opt(&self, name: &str) -> DispatchResult<Option<$ty>> {
            match self.values.get(name) {
                None => Ok(None),
                Some(OptionValue::$variant(v)) => Ok(Some(v.clone())),
                Some(other) => Err(DispatchError::invalid_argument(
                    name,
                    Some(other.to_string()),
                )),
            }
        }
    };
}

impl OptionMap {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    typed_getter!(string, string_opt, String, String);
    typed_getter!(integer, integer_opt, i64, Integer);
    typed_getter!(number, number_opt, f64, Number);
    typed_getter!(boolean, boolean_opt, bool, Boolean);
    typed_getter!(user, user_opt, UserId, User);
    typed_getter!(channel, channel_opt, ChannelId, Channel);
}

/// Builds a value object from bound options.
pub trait FromOptions: Sized {
    fn from_options(options: &OptionMap) -> DispatchResult<Self>;
}

impl FromOptions for OptionMap {
    fn from_options(options: &OptionMap) -> DispatchResult<Self> {
        Ok(options.clone())
    }
}
