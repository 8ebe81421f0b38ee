//! Frame codec.
//!
//! Pure functions between wire text and frames. Every frame is
//! `{"op": u8, "d": any, "s": u64?, "t": string?}`; `s` and `t` are only
//! meaningful on Dispatch frames. Decoding does no recovery: a malformed
//! frame is a [`FrameError`] for the connection manager to deal with.

use std::fmt;

use beacon_core::ids::Snowflake;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::FrameError;
use crate::opcode::Opcode;

// ─── Outbound ────────────────────────────────────────────────────────────────

/// Client properties sent with Identify.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionProperties {
    /// Operating system.
    pub os: String,
    /// Library name.
    pub browser: String,
    /// Library name.
    pub device: String,
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "beacon".into(),
            device: "beacon".into(),
        }
    }
}

/// Identify payload: starts a new session.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Identify {
    /// Credential.
    pub token: String,
    /// Connection properties.
    pub properties: ConnectionProperties,
    /// `[index, count]`.
    pub shard: [u32; 2],
    /// Capability/intent bitmask.
    pub intents: u64,
    /// Member count above which offline members are omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,
}

impl fmt::Debug for Identify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identify")
            .field("token", &"<redacted>")
            .field("shard", &self.shard)
            .field("intents", &self.intents)
            .field("large_threshold", &self.large_threshold)
            .finish_non_exhaustive()
    }
}

/// Resume payload: reattaches to an existing session.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Resume {
    /// Credential.
    pub token: String,
    /// Session to resume.
    pub session_id: String,
    /// Last sequence seen on that session.
    pub seq: u64,
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Client status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Online.
    #[default]
    Online,
    /// Idle.
    Idle,
    /// Do not disturb.
    Dnd,
    /// Shown as offline.
    Invisible,
    /// Offline.
    Offline,
}

/// An activity shown in presence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity name.
    pub name: String,
    /// Activity type (0 playing, 1 streaming, 2 listening, 3 watching, 4 custom, 5 competing).
    #[serde(rename = "type")]
    pub kind: u8,
    /// Stream URL for streaming activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Presence update payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdate {
    /// Unix millis since the client went idle, if idle.
    pub since: Option<u64>,
    /// Activities.
    pub activities: Vec<Activity>,
    /// Status.
    pub status: Status,
    /// AFK flag.
    pub afk: bool,
}

/// Voice state update payload. `channel_id: None` leaves voice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    /// Guild.
    pub guild_id: Snowflake,
    /// Channel to join, or `None` to disconnect.
    pub channel_id: Option<Snowflake>,
    /// Self-mute.
    pub self_mute: bool,
    /// Self-deafen.
    pub self_deaf: bool,
}

/// Request guild members payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembers {
    /// Guild.
    pub guild_id: Snowflake,
    /// Username prefix, `""` for all members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Maximum members to return, 0 for no limit.
    pub limit: u32,
    /// Include presences.
    #[serde(default)]
    pub presences: bool,
    /// Specific users to fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Snowflake>>,
    /// Echoed in the resulting chunk events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// A client → server control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Op 1 with the last seen sequence, or `null` before the first Dispatch.
    Heartbeat(Option<u64>),
    /// Op 2.
    Identify(Box<Identify>),
    /// Op 3.
    PresenceUpdate(PresenceUpdate),
    /// Op 4.
    VoiceStateUpdate(VoiceStateUpdate),
    /// Op 6.
    Resume(Resume),
    /// Op 8.
    RequestGuildMembers(RequestGuildMembers),
}

impl OutboundFrame {
    /// The frame's opcode.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Heartbeat(_) => Opcode::Heartbeat,
            Self::Identify(_) => Opcode::Identify,
            Self::PresenceUpdate(_) => Opcode::PresenceUpdate,
            Self::VoiceStateUpdate(_) => Opcode::VoiceStateUpdate,
            Self::Resume(_) => Opcode::Resume,
            Self::RequestGuildMembers(_) => Opcode::RequestGuildMembers,
        }
    }

    /// Encode as `{"op": .., "d": ..}` text.
    pub fn encode(&self) -> String {
        let data = match self {
            Self::Heartbeat(seq) => json!(seq),
            Self::Identify(identify) => json!(identify),
            Self::PresenceUpdate(presence) => json!(presence),
            Self::VoiceStateUpdate(voice) => json!(voice),
            Self::Resume(resume) => json!(resume),
            Self::RequestGuildMembers(request) => json!(request),
        };
        json!({ "op": self.opcode().code(), "d": data }).to_string()
    }
}

/// Encode a Heartbeat frame.
pub fn encode_heartbeat(last_sequence: Option<u64>) -> String {
    OutboundFrame::Heartbeat(last_sequence).encode()
}

/// Encode an Identify frame with default connection properties.
pub fn encode_identify(token: &str, shard: [u32; 2], intents: u64) -> String {
    OutboundFrame::Identify(Box::new(Identify {
        token: token.to_string(),
        properties: ConnectionProperties::default(),
        shard,
        intents,
        large_threshold: None,
    }))
    .encode()
}

/// Encode a Resume frame.
pub fn encode_resume(token: &str, session_id: &str, seq: u64) -> String {
    OutboundFrame::Resume(Resume {
        token: token.to_string(),
        session_id: session_id.to_string(),
        seq,
    })
    .encode()
}

/// Encode a PresenceUpdate frame.
pub fn encode_presence_update(
    activity: Option<Activity>,
    status: Status,
    afk: bool,
    since: Option<u64>,
) -> String {
    OutboundFrame::PresenceUpdate(PresenceUpdate {
        since,
        activities: activity.into_iter().collect(),
        status,
        afk,
    })
    .encode()
}

// ─── Inbound ─────────────────────────────────────────────────────────────────

/// A decoded server → client frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    /// Opcode.
    pub opcode: Opcode,
    /// Sequence (Dispatch only).
    pub sequence: Option<u64>,
    /// Event name (Dispatch only, always present there).
    pub event_name: Option<String>,
    /// The `d` field, `null` when absent.
    pub payload: Value,
}

#[derive(Deserialize)]
struct RawFrame {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

/// Decode inbound frame text.
pub fn decode_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let opcode = Opcode::try_from(raw.op)?;
    if opcode == Opcode::Dispatch && raw.t.is_none() {
        return Err(FrameError::MissingField("t"));
    }
    Ok(InboundFrame {
        opcode,
        sequence: raw.s,
        event_name: raw.t,
        payload: raw.d,
    })
}

impl InboundFrame {
    /// `heartbeat_interval` of a Hello frame, in milliseconds.
    pub fn heartbeat_interval(&self) -> Result<u64, FrameError> {
        self.payload
            .get("heartbeat_interval")
            .and_then(Value::as_u64)
            .ok_or(FrameError::MissingField("heartbeat_interval"))
    }
}
