//! Inbound event model.
//!
//! Every event that reaches the dispatch core is an [`InboundEvent`]: the
//! identity of the actor that produced it, an optional locale hint, and a
//! kind-specific [`Payload`].
//!
//! ```rust,ignore
//! use switchyard_core::{ActorKey, InboundEvent};
//!
//! let actor = ActorKey::new(10, 42);
//! let event = InboundEvent::text(actor, "!ping").with_locale("fr-FR");
//! assert_eq!(event.kind(), EventKind::MessageText);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw numeric value.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Opaque identity of a user.
    UserId
);
id_type!(
    /// Opaque identity of a channel.
    ChannelId
);
id_type!(
    /// Opaque identity of a message, used by message context menus.
    MessageId
);

/// Composite identity of an actor: the user acting in a given channel.
///
/// Cooldown state and scoped single-use listeners are keyed by this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorKey {
    pub channel: ChannelId,
    pub user: UserId,
}

impl ActorKey {
    pub fn new(channel: u64, user: u64) -> Self {
        Self {
            channel: ChannelId(channel),
            user: UserId(user),
        }
    }
}

impl fmt::Display for ActorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.channel)
    }
}

// ============================================================================
// Locale
// ============================================================================

/// Returned when a string is not a well-formed language tag.
#[derive(Debug, Clone, Error)]
#[error("invalid locale tag: '{0}'")]
pub struct InvalidLocale(pub String);

/// A language tag such as `en-US` or `fr`.
///
/// Only the shape is validated: one or more ASCII alphanumeric subtags of
/// 1 to 8 characters separated by `-` (or `_`, normalised to `-`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the primary language subtag (`en` for `en-US`).
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

/// `en-US`.
impl Default for Locale {
    fn default() -> Self {
        Self("en-US".to_string())
    }
}

impl FromStr for Locale {
    type Err = InvalidLocale;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().replace('_', "-");
        let well_formed = !normalised.is_empty()
            && normalised.split('-').all(|part| {
                (1..=8).contains(&part.len()) && part.chars().all(|c| c.is_ascii_alphanumeric())
            });
        if well_formed {
            Ok(Self(normalised))
        } else {
            Err(InvalidLocale(s.to_string()))
        }
    }
}

impl TryFrom<String> for Locale {
    type Error = InvalidLocale;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Event kinds and payloads
// ============================================================================

/// Classification of inbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    MessageText,
    SlashCommand,
    UserContextMenu,
    MessageContextMenu,
    ButtonClick,
    SelectMenuPick,
    ModalSubmit,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageText => "message-text",
            Self::SlashCommand => "slash-command",
            Self::UserContextMenu => "user-context-menu",
            Self::MessageContextMenu => "message-context-menu",
            Self::ButtonClick => "button-click",
            Self::SelectMenuPick => "select-menu-pick",
            Self::ModalSubmit => "modal-submit",
        }
    }

    /// Interaction kinds are the ones a protocol may require to be
    /// acknowledged early; plain text messages are not.
    pub fn is_interaction(self) -> bool {
        self != Self::MessageText
    }

    /// Component kinds are resolved through the component registry.
    pub fn is_component(self) -> bool {
        matches!(
            self,
            Self::ButtonClick | Self::SelectMenuPick | Self::ModalSubmit
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed value of a named structured-command option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(UserId),
    Channel(ChannelId),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::User(u) => write!(f, "{u}"),
            Self::Channel(c) => write!(f, "{c}"),
        }
    }
}

/// Kind-specific content of an inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Payload {
    /// Free text, possibly a prefixed command.
    MessageText { content: String },
    /// A structured command with an optional group/subcommand path.
    SlashCommand {
        name: String,
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        subcommand: Option<String>,
        #[serde(default)]
        options: Vec<(String, OptionValue)>,
    },
    UserContextMenu { name: String, target: UserId },
    MessageContextMenu { name: String, target: MessageId },
    ButtonClick { custom_id: String },
    SelectMenuPick {
        custom_id: String,
        #[serde(default)]
        values: Vec<String>,
    },
    ModalSubmit {
        custom_id: String,
        #[serde(default)]
        fields: Vec<(String, String)>,
    },
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageText { .. } => EventKind::MessageText,
            Self::SlashCommand { .. } => EventKind::SlashCommand,
            Self::UserContextMenu { .. } => EventKind::UserContextMenu,
            Self::MessageContextMenu { .. } => EventKind::MessageContextMenu,
            Self::ButtonClick { .. } => EventKind::ButtonClick,
            Self::SelectMenuPick { .. } => EventKind::SelectMenuPick,
            Self::ModalSubmit { .. } => EventKind::ModalSubmit,
        }
    }
}

// ============================================================================
// InboundEvent
// ============================================================================

/// One event as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    actor: ActorKey,
    #[serde(default)]
    locale_hint: Option<String>,
    /// Set when the event was produced by a bot account (including this one).
    #[serde(default)]
    from_bot: bool,
    payload: Payload,
}

impl InboundEvent {
    pub fn new(actor: ActorKey, payload: Payload) -> Self {
        Self {
            actor,
            locale_hint: None,
            from_bot: false,
            payload,
        }
    }

    pub fn text(actor: ActorKey, content: impl Into<String>) -> Self {
        Self::new(
            actor,
            Payload::MessageText {
                content: content.into(),
            },
        )
    }

    pub fn slash(actor: ActorKey, name: impl Into<String>) -> Self {
        Self::new(
            actor,
            Payload::SlashCommand {
                name: name.into(),
                group: None,
                subcommand: None,
                options: Vec::new(),
            },
        )
    }

    pub fn user_menu(actor: ActorKey, name: impl Into<String>, target: UserId) -> Self {
        Self::new(
            actor,
            Payload::UserContextMenu {
                name: name.into(),
                target,
            },
        )
    }

    pub fn message_menu(actor: ActorKey, name: impl Into<String>, target: MessageId) -> Self {
        Self::new(
            actor,
            Payload::MessageContextMenu {
                name: name.into(),
                target,
            },
        )
    }

    pub fn button(actor: ActorKey, custom_id: impl Into<String>) -> Self {
        Self::new(
            actor,
            Payload::ButtonClick {
                custom_id: custom_id.into(),
            },
        )
    }

    pub fn select(
        actor: ActorKey,
        custom_id: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::new(
            actor,
            Payload::SelectMenuPick {
                custom_id: custom_id.into(),
                values: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn modal(
        actor: ActorKey,
        custom_id: impl Into<String>,
        fields: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self::new(
            actor,
            Payload::ModalSubmit {
                custom_id: custom_id.into(),
                fields: fields
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
        )
    }

    /// Sets the locale hint reported by the transport.
    pub fn with_locale(mut self, hint: impl Into<String>) -> Self {
        self.locale_hint = Some(hint.into());
        self
    }

    /// Marks the event as produced by a bot account.
    pub fn from_bot(mut self, from_bot: bool) -> Self {
        self.from_bot = from_bot;
        self
    }

    /// Sets the subcommand group and subcommand of a slash-command event.
    ///
    /// Has no effect on other kinds.
    pub fn with_path(mut self, group: Option<&str>, subcommand: Option<&str>) -> Self {
        if let Payload::SlashCommand {
            group: g,
            subcommand: s,
            ..
        } = &mut self.payload
        {
            *g = group.map(str::to_string);
            *s = subcommand.map(str::to_string);
        }
        self
    }

    /// Appends a named option to a slash-command event.
    ///
    /// Has no effect on other kinds.
    pub fn with_option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        if let Payload::SlashCommand { options, .. } = &mut self.payload {
            options.push((name.into(), value));
        }
        self
    }

    pub fn actor(&self) -> ActorKey {
        self.actor
    }

    pub fn user(&self) -> UserId {
        self.actor.user
    }

    pub fn channel(&self) -> ChannelId {
        self.actor.channel
    }

    pub fn locale_hint(&self) -> Option<&str> {
        self.locale_hint.as_deref()
    }

    pub fn is_from_bot(&self) -> bool {
        self.from_bot
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Raw text of a `message-text` event.
    pub fn text_content(&self) -> Option<&str> {
        match &self.payload {
            Payload::MessageText { content } => Some(content),
            _ => None,
        }
    }

    /// Identifier of the component that produced a component event.
    pub fn custom_id(&self) -> Option<&str> {
        match &self.payload {
            Payload::ButtonClick { custom_id }
            | Payload::SelectMenuPick { custom_id, .. }
            | Payload::ModalSubmit { custom_id, .. } => Some(custom_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_parsing() {
        let locale: Locale = "en_US".parse().unwrap();
        assert_eq!(locale.as_str(), "en-US");
        assert_eq!(locale.language(), "en");

        assert!("".parse::<Locale>().is_err());
        assert!("en--US".parse::<Locale>().is_err());
        assert!("english-language".parse::<Locale>().is_err());
        assert!("fr".parse::<Locale>().is_ok());
    }

    #[test]
    fn test_event_kind_classification() {
        assert!(!EventKind::MessageText.is_interaction());
        assert!(EventKind::SlashCommand.is_interaction());
        assert!(EventKind::ModalSubmit.is_component());
        assert!(!EventKind::UserContextMenu.is_component());
    }

    #[test]
    fn test_custom_id_only_for_components() {
        let actor = ActorKey::new(1, 2);
        assert_eq!(
            InboundEvent::select(actor, "pick", ["a"]).custom_id(),
            Some("pick")
        );
        assert_eq!(InboundEvent::text(actor, "hello").custom_id(), None);
    }

    #[test]
    fn test_slash_builders_ignore_other_kinds() {
        let actor = ActorKey::new(1, 2);
        let event = InboundEvent::button(actor, "next")
            .with_option("x", OptionValue::Integer(1))
            .with_path(Some("g"), Some("s"));
        assert_eq!(event.payload(), &Payload::ButtonClick {
            custom_id: "next".into()
        });
    }

    #[test]
    fn test_event_deserializes_from_json() {
        let json = r#"{
            "actor": {"channel": 7, "user": 9},
            "payload": {"kind": "select-menu-pick", "custom_id": "color", "values": ["red"]}
        }"#;
        let event: InboundEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), EventKind::SelectMenuPick);
        assert_eq!(event.actor(), ActorKey::new(7, 9));
        assert!(!event.is_from_bot());
    }
}
