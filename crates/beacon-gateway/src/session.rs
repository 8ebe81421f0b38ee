//! Session state.
//!
//! Owned by exactly one [`GatewayConnection`](crate::GatewayConnection) and
//! written only by it. Outside the connection it is only ever seen as a
//! cloned snapshot.

/// Which handshake frame a socket was opened for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handshake {
    /// Fresh session.
    Identify,
    /// Reattach to the stored session.
    Resume,
}

/// Lifecycle of one socket instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No socket.
    #[default]
    Idle,
    /// Socket requested, not yet open.
    Connecting,
    /// Socket open, nothing received yet.
    SocketOpen,
    /// Waiting for Hello before sending the handshake.
    AwaitingHello,
    /// Handshake sent, waiting for `READY` / `RESUMED`.
    Handshaking(Handshake),
    /// Session established; heartbeats running.
    Heartbeating,
    /// Close requested.
    Closing,
}

impl ConnectionPhase {
    /// Whether a socket is open and can carry frames.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Self::SocketOpen | Self::AwaitingHello | Self::Handshaking(_) | Self::Heartbeating
        )
    }

    /// Whether a socket is open or being opened.
    pub fn is_active(self) -> bool {
        self == Self::Connecting || self.is_open()
    }
}

/// Session bookkeeping.
///
/// `session_id` is set only by a successful `READY` and cleared only when the
/// server says the session cannot be resumed. `last_sequence` never
/// decreases within one session and is only reset by a new `READY`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current socket phase.
    pub phase: ConnectionPhase,
    /// Highest Dispatch sequence seen.
    pub last_sequence: Option<u64>,
    /// Server-assigned session id.
    pub session_id: Option<String>,
    /// URL the server asked resumes to use.
    pub resume_gateway_url: Option<String>,
}

impl SessionState {
    /// Whether the next socket can resume instead of identifying.
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.last_sequence.is_some()
    }

    pub(crate) fn observe_sequence(&mut self, sequence: u64) {
        self.last_sequence = Some(self.last_sequence.map_or(sequence, |last| last.max(sequence)));
    }

    pub(crate) fn begin_session(
        &mut self,
        session_id: String,
        resume_gateway_url: Option<String>,
        sequence: Option<u64>,
    ) {
        self.session_id = Some(session_id);
        self.resume_gateway_url = resume_gateway_url;
        self.last_sequence = sequence;
    }

    pub(crate) fn invalidate(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn open_phases() {
        assert!(!ConnectionPhase::Idle.is_open());
        assert!(!ConnectionPhase::Connecting.is_open());
        assert!(ConnectionPhase::Connecting.is_active());
        assert!(ConnectionPhase::Handshaking(Handshake::Resume).is_open());
        assert!(!ConnectionPhase::Closing.is_active());
    }

    #[test]
    fn resume_needs_both_fields() {
        let mut state = SessionState::default();
        assert!(!state.can_resume());
        state.observe_sequence(3);
        assert!(!state.can_resume());
        state.session_id = Some("abc".into());
        assert!(state.can_resume());
    }

    #[test]
    fn new_session_resets_sequence() {
        let mut state = SessionState::default();
        state.observe_sequence(50);
        state.begin_session("new".into(), None, Some(1));
        assert_eq!(state.last_sequence, Some(1));
    }

    #[test]
    fn invalidate_keeps_sequence() {
        let mut state = SessionState::default();
        state.begin_session("abc".into(), Some("wss://r".into()), Some(4));
        state.invalidate();
        assert!(state.session_id.is_none());
        assert!(state.resume_gateway_url.is_none());
        assert_eq!(state.last_sequence, Some(4));
    }

    proptest! {
        #[test]
        fn last_sequence_is_running_max(seqs in prop::collection::vec(0u64..10_000, 1..50)) {
            let mut state = SessionState::default();
            for &s in &seqs {
                state.observe_sequence(s);
            }
            prop_assert_eq!(state.last_sequence, seqs.iter().copied().max());
        }
    }
}
