use beacon_core::ids::{CompoundKey, Snowflake};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Extra, User};
use crate::cache::Cached;

/// A guild, without the member/channel/role arrays that `GUILD_CREATE` embeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    /// Guild id.
    pub id: Snowflake,
    /// Guild name.
    #[serde(default)]
    pub name: String,
    /// Owner user id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Snowflake>,
    /// Icon hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Total member count (only on `GUILD_CREATE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    /// Set while the guild is in an outage.
    #[serde(default)]
    pub unavailable: bool,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for Guild {
    type Key = Snowflake;

    fn cache_key(&self) -> Snowflake {
        self.id
    }
}

/// Guild stub listed in `READY` and sent by `GUILD_DELETE`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    /// Guild id.
    pub id: Snowflake,
    /// `true` for an outage, absent when the client was removed.
    #[serde(default)]
    pub unavailable: bool,
}

/// A user's membership in one guild.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Owning guild.
    pub guild_id: Snowflake,
    /// The member's user.
    pub user: User,
    /// Guild nickname.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    /// Role ids.
    #[serde(default)]
    pub roles: Vec<Snowflake>,
    /// Join time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for Member {
    type Key = CompoundKey;

    fn cache_key(&self) -> CompoundKey {
        CompoundKey::new(self.guild_id, self.user.id)
    }
}

/// A guild role.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Owning guild.
    pub guild_id: Snowflake,
    /// Role id.
    pub id: Snowflake,
    /// Role name.
    #[serde(default)]
    pub name: String,
    /// RGB color.
    #[serde(default)]
    pub color: u32,
    /// Sort position.
    #[serde(default)]
    pub position: i32,
    /// Permission bitset as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Cached for Role {
    type Key = Snowflake;

    fn cache_key(&self) -> Snowflake {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn member_parses_join_time() {
        let member: Member = serde_json::from_value(json!({
            "guild_id": "1",
            "user": {"id": "2", "username": "a"},
            "roles": ["3", "4"],
            "joined_at": "2015-04-26T06:26:56.936000+00:00",
            "deaf": false
        }))
        .unwrap();
        assert_eq!(member.cache_key().to_string(), "1:2");
        assert_eq!(member.roles, vec![Snowflake::new(3), Snowflake::new(4)]);
        assert!(member.joined_at.is_some());
        assert_eq!(member.extra["deaf"], false);
    }

    #[test]
    fn guild_defaults() {
        let guild: Guild = serde_json::from_value(json!({"id": "9"})).unwrap();
        assert!(guild.name.is_empty());
        assert!(!guild.unavailable);
        assert_eq!(guild.cache_key(), Snowflake::new(9));
    }

    #[test]
    fn unavailable_guild_flag() {
        let stub: UnavailableGuild =
            serde_json::from_value(json!({"id": "9", "unavailable": true})).unwrap();
        assert!(stub.unavailable);
        let removed: UnavailableGuild = serde_json::from_value(json!({"id": "9"})).unwrap();
        assert!(!removed.unavailable);
    }
}
