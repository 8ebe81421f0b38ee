//! Gateway opcodes.

use crate::errors::FrameError;

/// Control opcode carried in the `op` field of every frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Server → client: a named domain event.
    Dispatch = 0,
    /// Both directions: liveness beat carrying the last sequence.
    Heartbeat = 1,
    /// Client → server: start a new session.
    Identify = 2,
    /// Client → server: update the client's presence.
    PresenceUpdate = 3,
    /// Client → server: join, move or leave voice.
    VoiceStateUpdate = 4,
    /// Client → server: reattach to an existing session.
    Resume = 6,
    /// Server → client: reconnect and resume.
    Reconnect = 7,
    /// Client → server: request guild member chunks.
    RequestGuildMembers = 8,
    /// Server → client: the session is invalid.
    InvalidSession = 9,
    /// Server → client: first frame, carries the heartbeat interval.
    Hello = 10,
    /// Server → client: heartbeat acknowledged.
    HeartbeatAck = 11,
}

impl Opcode {
    /// Wire value.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Snake-case name, used as a metrics label.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatch => "dispatch",
            Self::Heartbeat => "heartbeat",
            Self::Identify => "identify",
            Self::PresenceUpdate => "presence_update",
            Self::VoiceStateUpdate => "voice_state_update",
            Self::Resume => "resume",
            Self::Reconnect => "reconnect",
            Self::RequestGuildMembers => "request_guild_members",
            Self::InvalidSession => "invalid_session",
            Self::Hello => "hello",
            Self::HeartbeatAck => "heartbeat_ack",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, FrameError> {
        Ok(match value {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            other => return Err(FrameError::UnknownOpcode(other)),
        })
    }
}
