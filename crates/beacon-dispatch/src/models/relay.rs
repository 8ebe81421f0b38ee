//! Value objects for events that touch no cache.

use beacon_core::ids::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Extra, User};

/// `GUILD_BAN_ADD` / `GUILD_BAN_REMOVE`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuildBan {
    /// Guild the ban applies to.
    pub guild_id: Snowflake,
    /// Banned user.
    pub user: User,
}

/// Reaction emoji. Unicode emoji have no id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Emoji {
    /// Custom emoji id.
    #[serde(default)]
    pub id: Option<Snowflake>,
    /// Emoji name or unicode character.
    #[serde(default)]
    pub name: Option<String>,
    /// Animated custom emoji.
    #[serde(default)]
    pub animated: bool,
}

/// `MESSAGE_REACTION_ADD` / `MESSAGE_REACTION_REMOVE`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Reacting user.
    pub user_id: Snowflake,
    /// Channel of the message.
    pub channel_id: Snowflake,
    /// Reacted message.
    pub message_id: Snowflake,
    /// Owning guild.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// The emoji.
    pub emoji: Emoji,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// `MESSAGE_REACTION_REMOVE_ALL`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRemoveAll {
    /// Channel of the message.
    pub channel_id: Snowflake,
    /// Cleared message.
    pub message_id: Snowflake,
    /// Owning guild.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

/// `CHANNEL_PINS_UPDATE`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinsUpdate {
    /// Owning guild.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// Channel whose pins changed.
    pub channel_id: Snowflake,
    /// Time of the newest pin.
    #[serde(default)]
    pub last_pin_timestamp: Option<DateTime<Utc>>,
}

/// `TYPING_START`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingStart {
    /// Channel being typed in.
    pub channel_id: Snowflake,
    /// Owning guild.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// Typing user.
    pub user_id: Snowflake,
    /// When typing started (unix seconds on the wire).
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

/// `VOICE_SERVER_UPDATE`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceServerUpdate {
    /// Voice connection token.
    pub token: String,
    /// Guild the server belongs to.
    pub guild_id: Snowflake,
    /// Voice server host. `None` while the server is being reallocated.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// `INTERACTION_CREATE`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Interaction id.
    pub id: Snowflake,
    /// Application the interaction is for.
    pub application_id: Snowflake,
    /// Interaction type discriminator.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Continuation token for follow-up requests.
    pub token: String,
    /// Owning guild.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// Channel the interaction was triggered from.
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    /// Command or component data, passed through.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}
