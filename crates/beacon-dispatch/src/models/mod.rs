//! Domain entities built from Dispatch payloads.
//!
//! Every entity keeps unrecognized payload fields in `extra`, so an entity
//! serialized back to JSON carries everything the wire sent. Partial updates
//! rely on this: the patch is merged over the serialized cached value, and a
//! `null` in the patch clears the field.

mod channel;
mod guild;
mod relay;
mod user;

pub use channel::{Channel, Message};
pub use guild::{Guild, Member, Role, UnavailableGuild};
pub use relay::{
    Emoji, GuildBan, Interaction, PinsUpdate, Reaction, ReactionRemoveAll, TypingStart,
    VoiceServerUpdate,
};
pub use user::{Presence, User, VoiceState};

/// Unrecognized payload fields.
pub type Extra = serde_json::Map<String, serde_json::Value>;
