use beacon_core::ids::Snowflake;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Extra, User};
use crate::cache::Cached;

/// A guild channel, DM channel or thread.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel id.
    pub id: Snowflake,
    /// Channel type discriminator.
    #[serde(rename = "type", default)]
    pub kind: u8,
    /// Owning guild, absent for DMs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    /// Channel name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Category, or parent channel for threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    /// Channel topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Sort position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for Channel {
    type Key = Snowflake;

    fn cache_key(&self) -> Snowflake {
        self.id
    }
}

/// A message in a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: Snowflake,
    /// Channel the message was sent in.
    pub channel_id: Snowflake,
    /// Owning guild, absent for DMs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    /// Author. Absent on partial updates of uncached messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Send time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Last edit time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_timestamp: Option<DateTime<Utc>>,
    /// Pinned flag.
    #[serde(default)]
    pub pinned: bool,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for Message {
    type Key = Snowflake;

    fn cache_key(&self) -> Snowflake {
        self.id
    }
}
