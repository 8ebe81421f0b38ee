//! Application-facing events.

use serde_json::Value;

use crate::models::{
    Channel, Guild, GuildBan, Interaction, Member, Message, PinsUpdate, Presence, Reaction,
    ReactionRemoveAll, Role, TypingStart, UnavailableGuild, User, VoiceServerUpdate, VoiceState,
};
use crate::wire::Ready;

/// Previous and current value of an updated entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Update<T> {
    /// Cached value before the update, if it was cached.
    pub old: Option<T>,
    /// Value after the update.
    pub new: T,
}

/// What a delete event removed.
#[derive(Clone, Debug, PartialEq)]
pub enum Removed<T> {
    /// The entity as it was cached.
    Cached(T),
    /// The wire payload, when nothing was cached under the key.
    Raw(Value),
}

impl<T> Removed<T> {
    /// The cached entity, if there was one.
    pub fn cached(&self) -> Option<&T> {
        match self {
            Self::Cached(entity) => Some(entity),
            Self::Raw(_) => None,
        }
    }
}

/// A normalized event: arguments for subscribers of one event name.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum ClientEvent {
    /// Session established.
    Ready(Box<Ready>),
    /// Session resumed.
    Resumed,
    /// Guild became available (cache hydrated).
    GuildCreate(Guild),
    /// Guild changed.
    GuildUpdate(Update<Guild>),
    /// Client removed from a guild.
    GuildDelete(Removed<Guild>),
    /// Guild went into an outage.
    GuildUnavailable(UnavailableGuild),
    /// User banned.
    GuildBanAdd(GuildBan),
    /// User unbanned.
    GuildBanRemove(GuildBan),
    /// Member joined.
    GuildMemberAdd(Member),
    /// Member changed.
    GuildMemberUpdate(Update<Member>),
    /// Member left.
    GuildMemberRemove(Removed<Member>),
    /// Role created.
    GuildRoleCreate(Role),
    /// Role changed.
    GuildRoleUpdate(Update<Role>),
    /// Role deleted.
    GuildRoleDelete(Removed<Role>),
    /// Channel created.
    ChannelCreate(Channel),
    /// Channel changed.
    ChannelUpdate(Update<Channel>),
    /// Channel deleted.
    ChannelDelete(Removed<Channel>),
    /// Pins changed in a channel.
    ChannelPinsUpdate(PinsUpdate),
    /// Thread created.
    ThreadCreate(Channel),
    /// Thread changed.
    ThreadUpdate(Update<Channel>),
    /// Thread deleted.
    ThreadDelete(Removed<Channel>),
    /// Message sent.
    MessageCreate(Message),
    /// Message edited.
    MessageUpdate(Update<Message>),
    /// Message deleted.
    MessageDelete(Removed<Message>),
    /// Several messages deleted, one entry per id.
    MessageDeleteBulk(Vec<Removed<Message>>),
    /// Reaction added.
    MessageReactionAdd(Reaction),
    /// Reaction removed.
    MessageReactionRemove(Reaction),
    /// All reactions cleared.
    MessageReactionRemoveAll(ReactionRemoveAll),
    /// Presence changed. An offline presence is no longer cached.
    PresenceUpdate(Update<Presence>),
    /// Voice state changed. A state without a channel is no longer cached.
    VoiceStateUpdate(Update<VoiceState>),
    /// Voice server assigned.
    VoiceServerUpdate(VoiceServerUpdate),
    /// User started typing.
    TypingStart(TypingStart),
    /// The connected user changed.
    UserUpdate(Update<User>),
    /// Interaction received.
    InteractionCreate(Box<Interaction>),
    /// Payload relayed as received.
    Raw(Value),
}

/// An event as published on the bus.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedEvent {
    /// Lower-camel event name, e.g. `messageDelete`.
    pub name: String,
    /// Sequence number of the frame that carried it.
    pub sequence: Option<u64>,
    /// Event arguments.
    pub event: ClientEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removed_cached_accessor() {
        let cached: Removed<u8> = Removed::Cached(3);
        assert_eq!(cached.cached(), Some(&3));
        let raw: Removed<u8> = Removed::Raw(json!({"id": "3"}));
        assert!(raw.cached().is_none());
    }
}
