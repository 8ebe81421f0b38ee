//! Connection manager state machine.
//!
//! [`GatewayConnection`] owns the [`SessionState`] and turns
//! [`ConnectionEvent`]s (socket opened, text frame, socket closed, heartbeat
//! timer fired) into [`Command`]s for whatever owns the real socket. It
//! performs no I/O itself, so every protocol path can be driven by a scripted
//! sequence of synthetic events.
//!
//! Protocol flow for one socket:
//!
//! ```text
//! connect() → OpenSocket
//! Opened    → (identify_on_open ? handshake : wait)
//! Hello     → StartHeartbeat(interval) + handshake if not yet sent
//! Dispatch  → sequence bookkeeping, session capture on READY, sink
//! Reconnect → close 4000, connect() (resumes)
//! InvalidSession → clear session, close 1000, connect() (identifies)
//! Closed    → StopHeartbeat, Idle (no reconnect here)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use beacon_dispatch::Normalizer;
use beacon_settings::GatewaySettings;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::close_code::{self, CLOSE_NORMAL, CLOSE_RESUMABLE, CloseDisposition};
use crate::codec::{
    ConnectionProperties, Identify, InboundFrame, OutboundFrame, PresenceUpdate,
    RequestGuildMembers, Resume, VoiceStateUpdate, decode_frame,
};
use crate::errors::GatewayError;
use crate::opcode::Opcode;
use crate::session::{ConnectionPhase, Handshake, SessionState};

/// Receives Dispatch frames in socket order.
pub trait DispatchSink: Send {
    /// Handle one Dispatch frame.
    fn dispatch(&mut self, name: &str, sequence: Option<u64>, payload: Value);
}

impl DispatchSink for Normalizer {
    fn dispatch(&mut self, name: &str, sequence: Option<u64>, payload: Value) {
        let _ = self.handle(name, sequence, payload);
    }
}

impl DispatchSink for Arc<Normalizer> {
    fn dispatch(&mut self, name: &str, sequence: Option<u64>, payload: Value) {
        let _ = self.handle(name, sequence, payload);
    }
}

/// Static parameters of one shard's connection.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Credential. `connect()` fails without it.
    pub token: Option<String>,
    /// Gateway base URL (without version query).
    pub url: String,
    /// Protocol version appended to the URL.
    pub api_version: u8,
    /// `[index, count]`.
    pub shard: [u32; 2],
    /// Capability/intent bitmask.
    pub intents: u64,
    /// Offline member threshold sent in Identify.
    pub large_threshold: Option<u16>,
    /// Send the handshake on socket open instead of after Hello.
    pub identify_on_open: bool,
    /// Treat an un-ACKed heartbeat at the next tick as a dead connection.
    pub zombie_detection: bool,
}

impl ConnectionConfig {
    /// Build from settings and an already resolved gateway URL.
    pub fn from_settings(settings: &GatewaySettings, url: impl Into<String>) -> Self {
        Self {
            token: settings.token.clone(),
            url: url.into(),
            api_version: settings.api_version,
            shard: [settings.shard.index, settings.shard.count],
            intents: settings.intents,
            large_threshold: settings.large_threshold,
            identify_on_open: settings.identify_on_open,
            zombie_detection: settings.heartbeat.zombie_detection,
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("url", &self.url)
            .field("api_version", &self.api_version)
            .field("shard", &self.shard)
            .field("intents", &self.intents)
            .field("identify_on_open", &self.identify_on_open)
            .field("zombie_detection", &self.zombie_detection)
            .finish_non_exhaustive()
    }
}

/// Socket URL for a gateway base URL and protocol version.
pub fn socket_url(base: &str, api_version: u8) -> String {
    format!("{}/?v={api_version}&encoding=json", base.trim_end_matches('/'))
}

/// Input to the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket requested by `OpenSocket` is open.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The socket closed without the client asking.
    Closed {
        /// Close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason or transport error text.
        reason: String,
    },
    /// The transport reported an error. A `Closed` event follows.
    Error(String),
    /// The heartbeat timer fired.
    HeartbeatDue,
}

/// Output of the state machine, applied in order by the socket owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open a socket to `url`, then report `Opened` or `Closed`.
    OpenSocket {
        /// Full socket URL.
        url: String,
    },
    /// Write a frame.
    Send(OutboundFrame),
    /// Start (or replace) the periodic heartbeat timer.
    StartHeartbeat(Duration),
    /// Cancel the heartbeat timer.
    StopHeartbeat,
    /// Close the socket with `code`. No `Closed` event is expected back.
    CloseSocket {
        /// Close code sent to the server.
        code: u16,
    },
}

/// Protocol state machine for one shard.
pub struct GatewayConnection<S> {
    config: ConnectionConfig,
    state: SessionState,
    sink: S,
    heartbeat_interval: Option<Duration>,
    handshake_sent: bool,
    awaiting_ack: bool,
    last_beat_at: Option<Instant>,
    latency: Option<Duration>,
}

impl<S: DispatchSink> GatewayConnection<S> {
    /// Create an idle connection.
    pub fn new(config: ConnectionConfig, sink: S) -> Self {
        Self {
            config,
            state: SessionState::default(),
            sink,
            heartbeat_interval: None,
            handshake_sent: false,
            awaiting_ack: false,
            last_beat_at: None,
            latency: None,
        }
    }

    /// Session bookkeeping.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Connection parameters.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Period of the active heartbeat timer, if one is running.
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        self.heartbeat_interval
    }

    /// Round trip of the last acknowledged heartbeat.
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// The dispatch sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn shard(&self) -> u32 {
        self.config.shard[0]
    }

    // ─── Public operations ──────────────────────────────────────────────

    /// Request a socket. A no-op while one is open or opening.
    ///
    /// Returns as soon as the socket is requested; readiness is signalled by
    /// the `ready` event, not by this call.
    pub fn connect(&mut self) -> Result<Vec<Command>, GatewayError> {
        if self.config.token.as_deref().is_none_or(str::is_empty) {
            return Err(GatewayError::Configuration(
                "no gateway credential configured".into(),
            ));
        }
        if self.state.phase.is_active() {
            debug!(shard = self.shard(), phase = ?self.state.phase, "connect ignored, socket already open");
            return Ok(Vec::new());
        }

        let resuming = self.state.can_resume();
        let base = match (&self.state.resume_gateway_url, resuming) {
            (Some(resume_url), true) => resume_url.as_str(),
            _ => self.config.url.as_str(),
        };
        let url = socket_url(base, self.config.api_version);
        info!(shard = self.shard(), %url, resuming, "opening gateway socket");

        self.state.phase = ConnectionPhase::Connecting;
        self.handshake_sent = false;
        Ok(vec![Command::OpenSocket { url }])
    }

    /// Send a presence update. Warns and does nothing without an open socket.
    pub fn update_presence(&mut self, presence: PresenceUpdate) -> Vec<Command> {
        self.send_if_open(OutboundFrame::PresenceUpdate(presence))
    }

    /// Join, move or leave voice. Warns and does nothing without an open socket.
    pub fn update_voice_state(&mut self, voice: VoiceStateUpdate) -> Vec<Command> {
        self.send_if_open(OutboundFrame::VoiceStateUpdate(voice))
    }

    /// Request member chunks. Warns and does nothing without an open socket.
    pub fn request_guild_members(&mut self, request: RequestGuildMembers) -> Vec<Command> {
        self.send_if_open(OutboundFrame::RequestGuildMembers(request))
    }

    /// Close the socket for good (session kept for a later `connect()`).
    pub fn disconnect(&mut self) -> Vec<Command> {
        if !self.state.phase.is_active() {
            return Vec::new();
        }
        info!(shard = self.shard(), "disconnecting");
        let commands = self.close(CLOSE_NORMAL);
        self.state.phase = ConnectionPhase::Idle;
        commands
    }

    /// Advance the state machine by one event.
    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<Command> {
        match event {
            ConnectionEvent::Opened => self.on_open(),
            ConnectionEvent::Message(text) => self.on_message(&text),
            ConnectionEvent::Closed { code, reason } => self.on_close(code, &reason),
            ConnectionEvent::Error(error) => {
                warn!(shard = self.shard(), %error, "gateway transport error");
                Vec::new()
            }
            ConnectionEvent::HeartbeatDue => self.on_heartbeat_due(),
        }
    }

    // ─── Socket lifecycle ───────────────────────────────────────────────

    fn on_open(&mut self) -> Vec<Command> {
        debug!(shard = self.shard(), "gateway socket open");
        self.state.phase = ConnectionPhase::SocketOpen;
        self.awaiting_ack = false;

        if self.config.identify_on_open {
            return self.handshake().into_iter().collect();
        }
        self.state.phase = ConnectionPhase::AwaitingHello;
        Vec::new()
    }

    fn on_close(&mut self, code: Option<u16>, reason: &str) -> Vec<Command> {
        self.heartbeat_interval = None;
        self.awaiting_ack = false;
        self.state.phase = ConnectionPhase::Idle;

        let shard = self.shard();
        match code {
            Some(code) => match close_code::classify(code) {
                CloseDisposition::Fatal => {
                    error!(shard, code, reason, meaning = close_code::describe(code), "gateway closed with fatal code");
                }
                CloseDisposition::SessionInvalidated => {
                    warn!(shard, code, reason, meaning = close_code::describe(code), "gateway session cannot be resumed");
                    self.state.invalidate();
                }
                CloseDisposition::Resumable => {
                    info!(shard, code, reason, "gateway socket closed");
                }
            },
            None => info!(shard, reason, "gateway socket closed without code"),
        }
        vec![Command::StopHeartbeat]
    }

    fn close(&mut self, code: u16) -> Vec<Command> {
        self.heartbeat_interval = None;
        self.awaiting_ack = false;
        self.state.phase = ConnectionPhase::Closing;
        vec![Command::StopHeartbeat, Command::CloseSocket { code }]
    }

    fn reconnect_now(&mut self) -> Vec<Command> {
        self.connect().unwrap_or_else(|error| {
            error!(shard = self.shard(), %error, "cannot reconnect");
            Vec::new()
        })
    }

    // ─── Inbound frames ─────────────────────────────────────────────────

    fn on_message(&mut self, text: &str) -> Vec<Command> {
        counter!("gateway_frames_received_total").increment(1);
        match decode_frame(text) {
            Ok(frame) => self.on_frame(frame),
            Err(error) => {
                counter!("gateway_decode_errors_total").increment(1);
                warn!(shard = self.shard(), %error, "dropping undecodable frame");
                Vec::new()
            }
        }
    }

    fn on_frame(&mut self, frame: InboundFrame) -> Vec<Command> {
        trace!(shard = self.shard(), opcode = frame.opcode.code(), seq = ?frame.sequence, "frame received");
        match frame.opcode {
            Opcode::Hello => self.on_hello(&frame),
            Opcode::HeartbeatAck => {
                self.on_ack();
                Vec::new()
            }
            Opcode::Heartbeat => vec![self.beat()],
            Opcode::Dispatch => {
                self.on_dispatch(frame);
                Vec::new()
            }
            Opcode::InvalidSession => self.on_invalid_session(&frame.payload),
            Opcode::Reconnect => self.on_reconnect(),
            other => {
                debug!(shard = self.shard(), opcode = other.code(), "ignoring client opcode sent by server");
                Vec::new()
            }
        }
    }

    fn on_hello(&mut self, frame: &InboundFrame) -> Vec<Command> {
        let millis = match frame.heartbeat_interval() {
            Ok(millis) if millis > 0 => millis,
            Ok(_) => {
                warn!(shard = self.shard(), "hello with zero heartbeat interval, ignoring");
                return Vec::new();
            }
            Err(error) => {
                counter!("gateway_decode_errors_total").increment(1);
                warn!(shard = self.shard(), %error, "malformed hello, ignoring");
                return Vec::new();
            }
        };
        let interval = Duration::from_millis(millis);
        debug!(shard = self.shard(), interval_ms = millis, "hello received");

        self.heartbeat_interval = Some(interval);
        self.awaiting_ack = false;
        let mut commands = vec![Command::StartHeartbeat(interval)];
        if !self.handshake_sent {
            commands.extend(self.handshake());
        }
        commands
    }

    fn on_dispatch(&mut self, frame: InboundFrame) {
        let InboundFrame {
            sequence,
            event_name,
            payload,
            ..
        } = frame;
        let name = event_name.unwrap_or_default();
        if let Some(seq) = sequence {
            self.state.observe_sequence(seq);
        }

        match name.as_str() {
            "READY" => {
                match payload.get("session_id").and_then(Value::as_str) {
                    Some(session_id) => {
                        let resume_url = payload
                            .get("resume_gateway_url")
                            .and_then(Value::as_str)
                            .map(String::from);
                        info!(shard = self.shard(), session_id, seq = ?sequence, "session ready");
                        self.state.begin_session(session_id.to_string(), resume_url, sequence);
                    }
                    None => warn!(shard = self.shard(), "READY without session_id"),
                }
                self.state.phase = ConnectionPhase::Heartbeating;
            }
            "RESUMED" => {
                info!(shard = self.shard(), seq = ?self.state.last_sequence, "session resumed");
                self.state.phase = ConnectionPhase::Heartbeating;
            }
            _ => {}
        }

        self.sink.dispatch(&name, sequence, payload);
    }

    fn on_invalid_session(&mut self, payload: &Value) -> Vec<Command> {
        let resumable = payload.as_bool().unwrap_or(false);
        counter!("gateway_invalid_sessions_total").increment(1);
        warn!(shard = self.shard(), resumable, "session invalidated, identifying again");

        self.state.invalidate();
        let mut commands = self.close(CLOSE_NORMAL);
        commands.extend(self.reconnect_now());
        commands
    }

    fn on_reconnect(&mut self) -> Vec<Command> {
        counter!("gateway_reconnects_total").increment(1);
        info!(shard = self.shard(), "server requested reconnect");
        let mut commands = self.close(CLOSE_RESUMABLE);
        commands.extend(self.reconnect_now());
        commands
    }

    // ─── Heartbeat ──────────────────────────────────────────────────────

    fn on_heartbeat_due(&mut self) -> Vec<Command> {
        if !self.state.phase.is_open() {
            return Vec::new();
        }
        if self.awaiting_ack && self.config.zombie_detection {
            counter!("gateway_reconnects_total").increment(1);
            warn!(shard = self.shard(), "heartbeat not acknowledged, reconnecting");
            let mut commands = self.close(CLOSE_RESUMABLE);
            commands.extend(self.reconnect_now());
            return commands;
        }
        vec![self.beat()]
    }

    fn beat(&mut self) -> Command {
        self.awaiting_ack = true;
        self.last_beat_at = Some(Instant::now());
        Command::Send(OutboundFrame::Heartbeat(self.state.last_sequence))
    }

    fn on_ack(&mut self) {
        self.awaiting_ack = false;
        if let Some(sent) = self.last_beat_at.take() {
            let latency = sent.elapsed();
            trace!(shard = self.shard(), ?latency, "heartbeat acknowledged");
            self.latency = Some(latency);
        }
    }

    // ─── Outbound ───────────────────────────────────────────────────────

    fn handshake(&mut self) -> Option<Command> {
        let Some(token) = self.config.token.clone() else {
            error!(shard = self.shard(), "no credential for handshake");
            return None;
        };
        self.handshake_sent = true;

        let frame = match self.state.session_id.clone().zip(self.state.last_sequence) {
            Some((session_id, seq)) => {
                info!(shard = self.shard(), %session_id, seq, "resuming session");
                self.state.phase = ConnectionPhase::Handshaking(Handshake::Resume);
                OutboundFrame::Resume(Resume {
                    token,
                    session_id,
                    seq,
                })
            }
            None => {
                match (&self.state.session_id, self.state.last_sequence) {
                    (Some(_), None) => {
                        info!(shard = self.shard(), "no sequence recorded, identifying instead of resuming");
                    }
                    (None, Some(seq)) => {
                        info!(shard = self.shard(), seq, "session invalidated, identifying instead of resuming");
                    }
                    _ => info!(shard = self.shard(), "identifying"),
                }
                self.state.phase = ConnectionPhase::Handshaking(Handshake::Identify);
                OutboundFrame::Identify(Box::new(Identify {
                    token,
                    properties: ConnectionProperties::default(),
                    shard: self.config.shard,
                    intents: self.config.intents,
                    large_threshold: self.config.large_threshold,
                }))
            }
        };
        Some(Command::Send(frame))
    }

    fn send_if_open(&self, frame: OutboundFrame) -> Vec<Command> {
        if self.state.phase.is_open() {
            return vec![Command::Send(frame)];
        }
        warn!(
            shard = self.shard(),
            op = frame.opcode().name(),
            phase = ?self.state.phase,
            "no open gateway socket, dropping frame"
        );
        Vec::new()
    }
}
