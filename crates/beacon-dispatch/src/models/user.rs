use beacon_core::ids::{CompoundKey, Snowflake};
use serde::{Deserialize, Serialize};

use super::Extra;
use crate::cache::Cached;

/// A user account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: Snowflake,
    /// Account name. Empty when only a partial user was sent.
    #[serde(default)]
    pub username: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    /// Avatar hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Whether the account is a bot.
    #[serde(default)]
    pub bot: bool,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for User {
    type Key = Snowflake;

    fn cache_key(&self) -> Snowflake {
        self.id
    }
}

/// A user's voice connection state inside one guild.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceState {
    /// Owning guild.
    pub guild_id: Snowflake,
    /// User the state belongs to.
    pub user_id: Snowflake,
    /// Connected channel. `None` means the user left voice.
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    /// Voice session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Self-muted.
    #[serde(default)]
    pub self_mute: bool,
    /// Self-deafened.
    #[serde(default)]
    pub self_deaf: bool,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for VoiceState {
    type Key = CompoundKey;

    fn cache_key(&self) -> CompoundKey {
        CompoundKey::new(self.guild_id, self.user_id)
    }
}

/// A user's presence inside one guild.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    /// Owning guild.
    pub guild_id: Snowflake,
    /// The (usually partial) user.
    pub user: User,
    /// `online`, `idle`, `dnd` or `offline`.
    #[serde(default)]
    pub status: String,
    /// Current activities, passed through.
    #[serde(default)]
    pub activities: Vec<serde_json::Value>,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Presence {
    /// Whether this presence marks the user as gone.
    pub fn is_offline(&self) -> bool {
        self.status == "offline"
    }
}

impl Cached for Presence {
    type Key = CompoundKey;

    fn cache_key(&self) -> CompoundKey {
        CompoundKey::new(self.guild_id, self.user.id)
    }
}
