//! Typed decode of Dispatch payloads.
//!
//! [`DispatchEvent::decode`] maps a wire event name to a closed set of payload
//! shapes. Names it does not know, and known names whose payload does not fit
//! the expected shape, become [`DispatchEvent::Unknown`] so decoding never
//! fails.
//!
//! Update and delete events carry a [`KeyedPayload`]: the cache key plus the
//! raw payload, which is merged over the cached entity (updates) or relayed
//! when nothing was cached (deletes).

use beacon_core::ids::{CompoundKey, Snowflake};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::{
    Channel, Extra, Guild, GuildBan, Interaction, Member, Message, PinsUpdate, Presence, Reaction,
    ReactionRemoveAll, Role, TypingStart, UnavailableGuild, User, VoiceServerUpdate, VoiceState,
};

/// Cache key plus the raw payload it was read from.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedPayload<K> {
    /// Key of the affected entity.
    pub key: K,
    /// Payload as received (with `guild_id` injected for role events).
    pub payload: Value,
}

/// `READY` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version.
    #[serde(default)]
    pub v: u8,
    /// The connected user.
    pub user: User,
    /// Guilds that will arrive as `GUILD_CREATE`.
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    /// Session id for resuming.
    pub session_id: String,
    /// URL to use when resuming this session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
    /// `[index, count]` of this shard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    /// Other fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// `GUILD_CREATE` payload split into the guild and its embedded collections.
#[derive(Clone, Debug, PartialEq)]
pub struct GuildCreate {
    /// The guild itself.
    pub guild: Guild,
    /// Guild channels.
    pub channels: Vec<Channel>,
    /// Active threads.
    pub threads: Vec<Channel>,
    /// Roles.
    pub roles: Vec<Role>,
    /// Members sent with the guild.
    pub members: Vec<Member>,
    /// Users currently in voice.
    pub voice_states: Vec<VoiceState>,
    /// Presences sent with the guild.
    pub presences: Vec<Presence>,
}

/// `MESSAGE_DELETE_BULK` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleteBulk {
    /// Deleted message ids.
    pub ids: Vec<Snowflake>,
    /// Channel the messages were in.
    pub channel_id: Snowflake,
    /// Owning guild.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

/// A decoded Dispatch payload.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum DispatchEvent {
    /// `READY`
    Ready(Box<Ready>),
    /// `RESUMED`
    Resumed,
    /// `GUILD_CREATE`
    GuildCreate(Box<GuildCreate>),
    /// `GUILD_UPDATE`
    GuildUpdate(KeyedPayload<Snowflake>),
    /// `GUILD_DELETE`
    GuildDelete(KeyedPayload<Snowflake>),
    /// `GUILD_BAN_ADD`
    GuildBanAdd(GuildBan),
    /// `GUILD_BAN_REMOVE`
    GuildBanRemove(GuildBan),
    /// `GUILD_MEMBER_ADD`
    GuildMemberAdd(Member),
    /// `GUILD_MEMBER_UPDATE`
    GuildMemberUpdate(KeyedPayload<CompoundKey>),
    /// `GUILD_MEMBER_REMOVE`
    GuildMemberRemove(KeyedPayload<CompoundKey>),
    /// `GUILD_ROLE_CREATE`
    GuildRoleCreate(Role),
    /// `GUILD_ROLE_UPDATE`
    GuildRoleUpdate(KeyedPayload<Snowflake>),
    /// `GUILD_ROLE_DELETE`
    GuildRoleDelete(KeyedPayload<Snowflake>),
    /// `CHANNEL_CREATE`
    ChannelCreate(Channel),
    /// `CHANNEL_UPDATE`
    ChannelUpdate(KeyedPayload<Snowflake>),
    /// `CHANNEL_DELETE`
    ChannelDelete(KeyedPayload<Snowflake>),
    /// `CHANNEL_PINS_UPDATE`
    ChannelPinsUpdate(PinsUpdate),
    /// `THREAD_CREATE`
    ThreadCreate(Channel),
    /// `THREAD_UPDATE`
    ThreadUpdate(KeyedPayload<Snowflake>),
    /// `THREAD_DELETE`
    ThreadDelete(KeyedPayload<Snowflake>),
    /// `MESSAGE_CREATE`
    MessageCreate(Message),
    /// `MESSAGE_UPDATE`
    MessageUpdate(KeyedPayload<Snowflake>),
    /// `MESSAGE_DELETE`
    MessageDelete(KeyedPayload<Snowflake>),
    /// `MESSAGE_DELETE_BULK`
    MessageDeleteBulk(MessageDeleteBulk),
    /// `MESSAGE_REACTION_ADD`
    MessageReactionAdd(Reaction),
    /// `MESSAGE_REACTION_REMOVE`
    MessageReactionRemove(Reaction),
    /// `MESSAGE_REACTION_REMOVE_ALL`
    MessageReactionRemoveAll(ReactionRemoveAll),
    /// `PRESENCE_UPDATE`
    PresenceUpdate(KeyedPayload<CompoundKey>),
    /// `VOICE_STATE_UPDATE`
    VoiceStateUpdate(KeyedPayload<CompoundKey>),
    /// `VOICE_SERVER_UPDATE`
    VoiceServerUpdate(VoiceServerUpdate),
    /// `TYPING_START`
    TypingStart(TypingStart),
    /// `USER_UPDATE`
    UserUpdate(KeyedPayload<Snowflake>),
    /// `INTERACTION_CREATE`
    InteractionCreate(Box<Interaction>),
    /// Any other event, or a known event whose payload did not decode.
    Unknown {
        /// Wire event name.
        name: String,
        /// Payload as received.
        payload: Value,
    },
}

impl DispatchEvent {
    /// Decode a Dispatch payload by its wire event name. Never fails.
    pub fn decode(name: &str, payload: Value) -> Self {
        match Self::try_decode(name, &payload) {
            Ok(Some(event)) => event,
            Ok(None) => Self::Unknown {
                name: name.to_string(),
                payload,
            },
            Err(error) => {
                warn!(event = name, %error, "malformed dispatch payload, relaying raw");
                Self::Unknown {
                    name: name.to_string(),
                    payload,
                }
            }
        }
    }

    /// Whether the name was recognized and the payload decoded.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }

    fn try_decode(name: &str, payload: &Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match name {
            "READY" => Self::Ready(Box::new(parse(payload)?)),
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate(Box::new(guild_create(payload)?)),
            "GUILD_UPDATE" => Self::GuildUpdate(by_id(payload)?),
            "GUILD_DELETE" => Self::GuildDelete(by_id(payload)?),
            "GUILD_BAN_ADD" => Self::GuildBanAdd(parse(payload)?),
            "GUILD_BAN_REMOVE" => Self::GuildBanRemove(parse(payload)?),
            "GUILD_MEMBER_ADD" => Self::GuildMemberAdd(parse(payload)?),
            "GUILD_MEMBER_UPDATE" => Self::GuildMemberUpdate(by_guild_user(payload, "/user/id")?),
            "GUILD_MEMBER_REMOVE" => Self::GuildMemberRemove(by_guild_user(payload, "/user/id")?),
            "GUILD_ROLE_CREATE" => Self::GuildRoleCreate(parse(&role_with_guild(payload)?)?),
            "GUILD_ROLE_UPDATE" => {
                let role = role_with_guild(payload)?;
                Self::GuildRoleUpdate(KeyedPayload {
                    key: snowflake_at(&role, "/id", "role.id")?,
                    payload: role,
                })
            }
            "GUILD_ROLE_DELETE" => Self::GuildRoleDelete(KeyedPayload {
                key: snowflake_at(payload, "/role_id", "role_id")?,
                payload: payload.clone(),
            }),
            "CHANNEL_CREATE" => Self::ChannelCreate(parse(payload)?),
            "CHANNEL_UPDATE" => Self::ChannelUpdate(by_id(payload)?),
            "CHANNEL_DELETE" => Self::ChannelDelete(by_id(payload)?),
            "CHANNEL_PINS_UPDATE" => Self::ChannelPinsUpdate(parse(payload)?),
            "THREAD_CREATE" => Self::ThreadCreate(parse(payload)?),
            "THREAD_UPDATE" => Self::ThreadUpdate(by_id(payload)?),
            "THREAD_DELETE" => Self::ThreadDelete(by_id(payload)?),
            "MESSAGE_CREATE" => Self::MessageCreate(parse(payload)?),
            "MESSAGE_UPDATE" => Self::MessageUpdate(by_id(payload)?),
            "MESSAGE_DELETE" => Self::MessageDelete(by_id(payload)?),
            "MESSAGE_DELETE_BULK" => Self::MessageDeleteBulk(parse(payload)?),
            "MESSAGE_REACTION_ADD" => Self::MessageReactionAdd(parse(payload)?),
            "MESSAGE_REACTION_REMOVE" => Self::MessageReactionRemove(parse(payload)?),
            "MESSAGE_REACTION_REMOVE_ALL" => Self::MessageReactionRemoveAll(parse(payload)?),
            "PRESENCE_UPDATE" => Self::PresenceUpdate(by_guild_user(payload, "/user/id")?),
            "VOICE_STATE_UPDATE" => Self::VoiceStateUpdate(by_guild_user(payload, "/user_id")?),
            "VOICE_SERVER_UPDATE" => Self::VoiceServerUpdate(parse(payload)?),
            "TYPING_START" => Self::TypingStart(parse(payload)?),
            "USER_UPDATE" => Self::UserUpdate(by_id(payload)?),
            "INTERACTION_CREATE" => Self::InteractionCreate(Box::new(parse(payload)?)),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

// ─── Decode helpers ──────────────────────────────────────────────────────────

fn parse<T: DeserializeOwned>(payload: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(payload)
}

fn snowflake_at(
    payload: &Value,
    pointer: &str,
    field: &'static str,
) -> Result<Snowflake, serde_json::Error> {
    payload
        .pointer(pointer)
        .filter(|v| !v.is_null())
        .map_or_else(|| Err(serde_json::Error::missing_field(field)), Snowflake::deserialize)
}

fn by_id(payload: &Value) -> Result<KeyedPayload<Snowflake>, serde_json::Error> {
    Ok(KeyedPayload {
        key: snowflake_at(payload, "/id", "id")?,
        payload: payload.clone(),
    })
}

fn by_guild_user(
    payload: &Value,
    user_pointer: &str,
) -> Result<KeyedPayload<CompoundKey>, serde_json::Error> {
    let scope = snowflake_at(payload, "/guild_id", "guild_id")?;
    let entity = snowflake_at(payload, user_pointer, "user_id")?;
    Ok(KeyedPayload {
        key: CompoundKey::new(scope, entity),
        payload: payload.clone(),
    })
}

/// Set `guild_id` on an object payload that lacks it.
pub(crate) fn with_guild_id(mut value: Value, guild_id: Snowflake) -> Value {
    if let Value::Object(map) = &mut value {
        let _ = map
            .entry("guild_id")
            .or_insert_with(|| Value::String(guild_id.to_string()));
    }
    value
}

fn role_with_guild(payload: &Value) -> Result<Value, serde_json::Error> {
    let guild_id = snowflake_at(payload, "/guild_id", "guild_id")?;
    let role = payload
        .get("role")
        .cloned()
        .ok_or_else(|| serde_json::Error::missing_field("role"))?;
    Ok(with_guild_id(role, guild_id))
}

fn guild_create(payload: &Value) -> Result<GuildCreate, serde_json::Error> {
    let mut object = payload
        .as_object()
        .cloned()
        .ok_or_else(|| serde_json::Error::custom("guild payload is not an object"))?;

    let mut take = |key: &str| match object.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    let channels = take("channels");
    let threads = take("threads");
    let roles = take("roles");
    let members = take("members");
    let voice_states = take("voice_states");
    let presences = take("presences");

    let guild: Guild = serde_json::from_value(Value::Object(object))?;
    let id = guild.id;

    Ok(GuildCreate {
        channels: embedded(channels, id),
        threads: embedded(threads, id),
        roles: embedded(roles, id),
        members: embedded(members, id),
        voice_states: embedded(voice_states, id),
        presences: embedded(presences, id),
        guild,
    })
}

/// Decode embedded guild items, skipping any that do not fit.
fn embedded<T: DeserializeOwned>(items: Vec<Value>, guild_id: Snowflake) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(with_guild_id(item, guild_id)) {
            Ok(entity) => Some(entity),
            Err(error) => {
                warn!(%guild_id, %error, "skipping malformed embedded guild item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn ready_decodes() {
        let event = DispatchEvent::decode(
            "READY",
            json!({
                "v": 10,
                "session_id": "abc",
                "user": {"id": "1", "username": "bot", "bot": true},
                "guilds": [{"id": "5", "unavailable": true}],
                "resume_gateway_url": "wss://resume.test",
                "shard": [0, 1]
            }),
        );
        assert_matches!(event, DispatchEvent::Ready(ready) => {
            assert_eq!(ready.session_id, "abc");
            assert_eq!(ready.user.id, Snowflake::new(1));
            assert_eq!(ready.guilds.len(), 1);
            assert_eq!(ready.resume_gateway_url.as_deref(), Some("wss://resume.test"));
            assert_eq!(ready.shard, Some([0, 1]));
        });
    }

    #[test]
    fn unknown_name_is_relayed() {
        let payload = json!({"anything": 1});
        let event = DispatchEvent::decode("AUTO_MODERATION_ACTION_EXECUTION", payload.clone());
        assert!(!event.is_known());
        assert_matches!(event, DispatchEvent::Unknown { name, payload: p } => {
            assert_eq!(name, "AUTO_MODERATION_ACTION_EXECUTION");
            assert_eq!(p, payload);
        });
    }

    #[test]
    fn malformed_known_event_falls_back_to_unknown() {
        let event = DispatchEvent::decode("MESSAGE_DELETE", json!({"channel_id": "1"}));
        assert_matches!(event, DispatchEvent::Unknown { name, .. } if name == "MESSAGE_DELETE");

        let event = DispatchEvent::decode("READY", json!("not an object"));
        assert!(!event.is_known());
    }

    #[test]
    fn delete_keeps_raw_payload() {
        let payload = json!({"id": "99", "channel_id": "3"});
        let event = DispatchEvent::decode("MESSAGE_DELETE", payload.clone());
        assert_matches!(event, DispatchEvent::MessageDelete(keyed) => {
            assert_eq!(keyed.key, Snowflake::new(99));
            assert_eq!(keyed.payload, payload);
        });
    }

    #[test]
    fn compound_keys() {
        let event = DispatchEvent::decode(
            "VOICE_STATE_UPDATE",
            json!({"guild_id": "1", "user_id": "2", "channel_id": null}),
        );
        assert_matches!(event, DispatchEvent::VoiceStateUpdate(k) if k.key.to_string() == "1:2");

        let event = DispatchEvent::decode(
            "GUILD_MEMBER_REMOVE",
            json!({"guild_id": "1", "user": {"id": "3"}}),
        );
        assert_matches!(event, DispatchEvent::GuildMemberRemove(k) if k.key.to_string() == "1:3");
    }

    #[test]
    fn role_events_inject_guild_id() {
        let event = DispatchEvent::decode(
            "GUILD_ROLE_CREATE",
            json!({"guild_id": "1", "role": {"id": "7", "name": "mods"}}),
        );
        assert_matches!(event, DispatchEvent::GuildRoleCreate(role) => {
            assert_eq!(role.guild_id, Snowflake::new(1));
            assert_eq!(role.name, "mods");
        });

        let event = DispatchEvent::decode(
            "GUILD_ROLE_UPDATE",
            json!({"guild_id": "1", "role": {"id": "7", "color": 5}}),
        );
        assert_matches!(event, DispatchEvent::GuildRoleUpdate(k) => {
            assert_eq!(k.key, Snowflake::new(7));
            assert_eq!(k.payload["guild_id"], "1");
        });
    }

    #[test]
    fn guild_create_splits_embedded_arrays() {
        let event = DispatchEvent::decode(
            "GUILD_CREATE",
            json!({
                "id": "1",
                "name": "g",
                "channels": [{"id": "10", "type": 0}],
                "threads": [],
                "roles": [{"id": "1", "name": "@everyone"}],
                "members": [{"user": {"id": "20"}}, {"nick": "no user"}],
                "voice_states": [{"user_id": "20", "channel_id": "10"}],
                "presences": [{"user": {"id": "20"}, "status": "online"}]
            }),
        );
        assert_matches!(event, DispatchEvent::GuildCreate(create) => {
            assert_eq!(create.guild.name, "g");
            assert!(!create.guild.extra.contains_key("channels"));
            assert_eq!(create.channels[0].guild_id, Some(Snowflake::new(1)));
            assert_eq!(create.roles[0].guild_id, Snowflake::new(1));
            assert_eq!(create.members.len(), 1);
            assert_eq!(create.voice_states[0].guild_id, Snowflake::new(1));
            assert_eq!(create.presences[0].status, "online");
        });
    }

    #[test]
    fn with_guild_id_keeps_existing() {
        let value = with_guild_id(json!({"guild_id": "5"}), Snowflake::new(1));
        assert_eq!(value["guild_id"], "5");
        let value = with_guild_id(json!({}), Snowflake::new(1));
        assert_eq!(value["guild_id"], "1");
    }
}
