//! Close code classification.

/// Normal closure. Sent when abandoning an invalidated session.
pub const CLOSE_NORMAL: u16 = 1000;

/// Client-chosen close code that keeps the session resumable.
pub const CLOSE_RESUMABLE: u16 = 4000;

/// What a close code means for the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Reconnect and resume.
    Resumable,
    /// Reconnect with a fresh Identify; the session is gone.
    SessionInvalidated,
    /// Reconnecting will fail the same way.
    Fatal,
}

/// Classify a server close code.
pub fn classify(code: u16) -> CloseDisposition {
    match code {
        4004 | 4010..=4014 => CloseDisposition::Fatal,
        4007 | 4009 => CloseDisposition::SessionInvalidated,
        _ => CloseDisposition::Resumable,
    }
}

/// Human-readable reason for gateway close codes.
pub fn describe(code: u16) -> &'static str {
    match code {
        1000 => "normal closure",
        1001 => "going away",
        4000 => "unknown error",
        4001 => "unknown opcode",
        4002 => "decode error",
        4003 => "not authenticated",
        4004 => "authentication failed",
        4005 => "already authenticated",
        4007 => "invalid seq",
        4008 => "rate limited",
        4009 => "session timed out",
        4010 => "invalid shard",
        4011 => "sharding required",
        4012 => "invalid API version",
        4013 => "invalid intents",
        4014 => "disallowed intents",
        _ => "unrecognized close code",
    }
}
