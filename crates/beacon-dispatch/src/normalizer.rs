//! Dispatch normalizer.
//!
//! For every Dispatch frame, in socket order:
//! 1. decode the payload into a [`DispatchEvent`]
//! 2. apply it to the caches (create → set, update → merge and set,
//!    delete → take)
//! 3. publish exactly one [`NormalizedEvent`] under the camel-cased name
//!
//! Caches are always written before the event is published, so a subscriber
//! reading the cache sees the post-event state.

use std::sync::Arc;

use beacon_core::ids::{CompoundKey, Snowflake};
use beacon_core::json::merge_patch;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::cache::{CacheStore, Cached, Caches};
use crate::events::{ClientEvent, NormalizedEvent, Removed, Update};
use crate::models::{Extra, Guild, UnavailableGuild};
use crate::names::normalize_event_name;
use crate::wire::{DispatchEvent, GuildCreate, KeyedPayload, MessageDeleteBulk, Ready};

/// Converts Dispatch frames into cache writes and published events.
pub struct Normalizer {
    caches: Caches,
    bus: Arc<EventBus>,
}

impl Normalizer {
    /// Create a normalizer writing to `caches` and publishing on `bus`.
    pub fn new(caches: Caches, bus: Arc<EventBus>) -> Self {
        Self { caches, bus }
    }

    /// The caches this normalizer maintains.
    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// The bus events are published on.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Normalize one Dispatch frame and publish the result.
    ///
    /// Never fails: unknown names and payloads that do not decode are
    /// published as [`ClientEvent::Raw`].
    pub fn handle(&self, wire_name: &str, sequence: Option<u64>, payload: Value) -> Arc<NormalizedEvent> {
        let name = normalize_event_name(wire_name);
        let event = self.apply(DispatchEvent::decode(wire_name, payload));
        debug!(event = %name, ?sequence, "dispatch normalized");
        counter!("dispatch_events_total", "event" => name.clone()).increment(1);

        let event = Arc::new(NormalizedEvent {
            name,
            sequence,
            event,
        });
        let _ = self.bus.publish(&event);
        event
    }

    #[allow(clippy::too_many_lines)]
    fn apply(&self, event: DispatchEvent) -> ClientEvent {
        let c = &self.caches;
        match event {
            DispatchEvent::Ready(ready) => self.ready(ready),
            DispatchEvent::Resumed => ClientEvent::Resumed,

            DispatchEvent::GuildCreate(create) => self.hydrate_guild(*create),
            DispatchEvent::GuildUpdate(keyed) => {
                patched(&*c.guilds, keyed).map_or_else(ClientEvent::Raw, ClientEvent::GuildUpdate)
            }
            DispatchEvent::GuildDelete(keyed) => self.guild_delete(keyed),
            DispatchEvent::GuildBanAdd(ban) => ClientEvent::GuildBanAdd(ban),
            DispatchEvent::GuildBanRemove(ban) => ClientEvent::GuildBanRemove(ban),

            DispatchEvent::GuildMemberAdd(member) => {
                c.users.set(member.user.clone());
                ClientEvent::GuildMemberAdd(stored(&*c.members, member))
            }
            DispatchEvent::GuildMemberUpdate(keyed) => match patched(&*c.members, keyed) {
                Ok(update) => {
                    c.users.set(update.new.user.clone());
                    ClientEvent::GuildMemberUpdate(update)
                }
                Err(raw) => ClientEvent::Raw(raw),
            },
            DispatchEvent::GuildMemberRemove(keyed) => {
                ClientEvent::GuildMemberRemove(removed(&*c.members, keyed))
            }

            DispatchEvent::GuildRoleCreate(role) => ClientEvent::GuildRoleCreate(stored(&*c.roles, role)),
            DispatchEvent::GuildRoleUpdate(keyed) => {
                patched(&*c.roles, keyed).map_or_else(ClientEvent::Raw, ClientEvent::GuildRoleUpdate)
            }
            DispatchEvent::GuildRoleDelete(keyed) => ClientEvent::GuildRoleDelete(removed(&*c.roles, keyed)),

            DispatchEvent::ChannelCreate(channel) => {
                ClientEvent::ChannelCreate(stored(&*c.channels, channel))
            }
            DispatchEvent::ChannelUpdate(keyed) => {
                patched(&*c.channels, keyed).map_or_else(ClientEvent::Raw, ClientEvent::ChannelUpdate)
            }
            DispatchEvent::ChannelDelete(keyed) => {
                ClientEvent::ChannelDelete(removed(&*c.channels, keyed))
            }
            DispatchEvent::ChannelPinsUpdate(pins) => ClientEvent::ChannelPinsUpdate(pins),

            DispatchEvent::ThreadCreate(thread) => ClientEvent::ThreadCreate(stored(&*c.channels, thread)),
            DispatchEvent::ThreadUpdate(keyed) => {
                patched(&*c.channels, keyed).map_or_else(ClientEvent::Raw, ClientEvent::ThreadUpdate)
            }
            DispatchEvent::ThreadDelete(keyed) => ClientEvent::ThreadDelete(removed(&*c.channels, keyed)),

            DispatchEvent::MessageCreate(message) => {
                if let Some(author) = &message.author {
                    c.users.set(author.clone());
                }
                ClientEvent::MessageCreate(stored(&*c.messages, message))
            }
            DispatchEvent::MessageUpdate(keyed) => {
                patched(&*c.messages, keyed).map_or_else(ClientEvent::Raw, ClientEvent::MessageUpdate)
            }
            DispatchEvent::MessageDelete(keyed) => {
                ClientEvent::MessageDelete(removed(&*c.messages, keyed))
            }
            DispatchEvent::MessageDeleteBulk(bulk) => self.message_delete_bulk(&bulk),
            DispatchEvent::MessageReactionAdd(reaction) => ClientEvent::MessageReactionAdd(reaction),
            DispatchEvent::MessageReactionRemove(reaction) => {
                ClientEvent::MessageReactionRemove(reaction)
            }
            DispatchEvent::MessageReactionRemoveAll(cleared) => {
                ClientEvent::MessageReactionRemoveAll(cleared)
            }

            DispatchEvent::PresenceUpdate(keyed) => self.presence_update(keyed),
            DispatchEvent::VoiceStateUpdate(keyed) => self.voice_state_update(keyed),
            DispatchEvent::VoiceServerUpdate(server) => ClientEvent::VoiceServerUpdate(server),
            DispatchEvent::TypingStart(typing) => ClientEvent::TypingStart(typing),
            DispatchEvent::UserUpdate(keyed) => {
                patched(&*c.users, keyed).map_or_else(ClientEvent::Raw, ClientEvent::UserUpdate)
            }
            DispatchEvent::InteractionCreate(interaction) => ClientEvent::InteractionCreate(interaction),

            DispatchEvent::Unknown { name, payload } => {
                debug!(event = %name, "relaying unrecognized dispatch");
                ClientEvent::Raw(payload)
            }
        }
    }

    // ─── Event families with extra cache work ───────────────────────────────

    fn ready(&self, ready: Box<Ready>) -> ClientEvent {
        self.caches.users.set(ready.user.clone());
        for stub in &ready.guilds {
            self.caches.guilds.set(guild_stub(stub));
        }
        ClientEvent::Ready(ready)
    }

    fn hydrate_guild(&self, create: GuildCreate) -> ClientEvent {
        let c = &self.caches;
        let GuildCreate {
            guild,
            channels,
            threads,
            roles,
            members,
            voice_states,
            presences,
        } = create;

        debug!(
            guild_id = %guild.id,
            channels = channels.len() + threads.len(),
            members = members.len(),
            "hydrating guild caches"
        );
        for channel in channels.into_iter().chain(threads) {
            c.channels.set(channel);
        }
        for role in roles {
            c.roles.set(role);
        }
        for member in members {
            c.users.set(member.user.clone());
            c.members.set(member);
        }
        for state in voice_states {
            c.voice_states.set(state);
        }
        for presence in presences.into_iter().filter(|p| !p.is_offline()) {
            c.presences.set(presence);
        }
        ClientEvent::GuildCreate(stored(&*c.guilds, guild))
    }

    fn guild_delete(&self, keyed: KeyedPayload<Snowflake>) -> ClientEvent {
        let outage = keyed.payload.get("unavailable").and_then(Value::as_bool) == Some(true);
        if !outage {
            self.purge_guild(keyed.key);
            return ClientEvent::GuildDelete(removed(&*self.caches.guilds, keyed));
        }

        warn!(guild_id = %keyed.key, "guild unavailable");
        if let Some(mut guild) = self.caches.guilds.get(&keyed.key) {
            guild.unavailable = true;
            self.caches.guilds.set(guild);
        }
        ClientEvent::GuildUnavailable(UnavailableGuild {
            id: keyed.key,
            unavailable: true,
        })
    }

    /// Drop everything `GUILD_CREATE` hydrated for a guild the client left.
    fn purge_guild(&self, guild_id: Snowflake) {
        let c = &self.caches;
        let channels = c.channels.retain(&|ch| ch.guild_id != Some(guild_id));
        let messages = c.messages.retain(&|m| m.guild_id != Some(guild_id));
        let roles = c.roles.retain(&|r| r.guild_id != guild_id);
        let members = c.members.retain(&|m| m.guild_id != guild_id);
        let voice_states = c.voice_states.retain(&|v| v.guild_id != guild_id);
        let presences = c.presences.retain(&|p| p.guild_id != guild_id);
        debug!(
            %guild_id,
            channels,
            messages,
            roles,
            members,
            voice_states,
            presences,
            "purged guild caches"
        );
    }

    fn message_delete_bulk(&self, bulk: &MessageDeleteBulk) -> ClientEvent {
        let removed = bulk
            .ids
            .iter()
            .map(|id| match self.caches.messages.take(id) {
                Some(message) => Removed::Cached(message),
                None => {
                    let mut raw = json!({"id": id, "channel_id": bulk.channel_id});
                    if let Some(guild_id) = bulk.guild_id {
                        raw["guild_id"] = json!(guild_id);
                    }
                    Removed::Raw(raw)
                }
            })
            .collect();
        ClientEvent::MessageDeleteBulk(removed)
    }

    fn presence_update(&self, keyed: KeyedPayload<CompoundKey>) -> ClientEvent {
        let store = &*self.caches.presences;
        let key = keyed.key;
        let old = store.get(&key);
        match merged(old.as_ref(), &keyed.payload) {
            Ok(new) => {
                if new.is_offline() {
                    let _ = store.delete(&key);
                } else {
                    store.set(new.clone());
                }
                ClientEvent::PresenceUpdate(Update { old, new })
            }
            Err(error) => {
                warn!(%key, %error, "presence payload does not build an entity, relaying raw");
                ClientEvent::Raw(keyed.payload)
            }
        }
    }

    fn voice_state_update(&self, keyed: KeyedPayload<CompoundKey>) -> ClientEvent {
        let store = &*self.caches.voice_states;
        let key = keyed.key;
        let left = keyed.payload.get("channel_id").is_none_or(Value::is_null);
        let old = store.get(&key);
        match merged(old.as_ref(), &keyed.payload) {
            Ok(mut new) => {
                if left {
                    new.channel_id = None;
                    let _ = store.delete(&key);
                } else {
                    store.set(new.clone());
                }
                ClientEvent::VoiceStateUpdate(Update { old, new })
            }
            Err(error) => {
                warn!(%key, %error, "voice state payload does not build an entity, relaying raw");
                ClientEvent::Raw(keyed.payload)
            }
        }
    }
}

// ─── Cache helpers ───────────────────────────────────────────────────────────

fn stored<T: Cached>(store: &dyn CacheStore<T>, entity: T) -> T {
    store.set(entity.clone());
    entity
}

fn removed<T: Cached>(store: &dyn CacheStore<T>, keyed: KeyedPayload<T::Key>) -> Removed<T> {
    match store.take(&keyed.key) {
        Some(entity) => Removed::Cached(entity),
        None => Removed::Raw(keyed.payload),
    }
}

/// Merge `payload` over the cached value and store the result.
///
/// Returns the raw payload when the merged value does not build an entity
/// (e.g. a partial update for an entity that was never cached).
fn patched<T>(store: &dyn CacheStore<T>, keyed: KeyedPayload<T::Key>) -> Result<Update<T>, Value>
where
    T: Cached + Serialize + DeserializeOwned,
{
    let old = store.get(&keyed.key);
    match merged(old.as_ref(), &keyed.payload) {
        Ok(new) => {
            store.set(new.clone());
            Ok(Update { old, new })
        }
        Err(error) => {
            warn!(key = %keyed.key, %error, "update payload does not build an entity, relaying raw");
            Err(keyed.payload)
        }
    }
}

fn merged<T: Serialize + DeserializeOwned>(old: Option<&T>, payload: &Value) -> Result<T, serde_json::Error> {
    let base = old
        .map(|entity| serde_json::to_value(entity).unwrap_or_default())
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    serde_json::from_value(merge_patch(base, payload.clone()))
}

fn guild_stub(stub: &UnavailableGuild) -> Guild {
    Guild {
        id: stub.id,
        name: String::new(),
        owner_id: None,
        icon: None,
        member_count: None,
        unavailable: stub.unavailable,
        extra: Extra::new(),
    }
}
