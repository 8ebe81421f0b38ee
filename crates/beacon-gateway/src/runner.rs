//! Async socket driver for one shard.
//!
//! [`spawn`] moves a [`GatewayConnection`] onto a tokio task that owns the
//! real WebSocket and the heartbeat timer, applies the machine's
//! [`Command`]s, and feeds socket activity back as [`ConnectionEvent`]s.
//! Unexpected closes are retried with exponential backoff; a successful
//! READY or RESUMED resets the attempt counter.
//!
//! The returned [`ShardHandle`] talks to the task over an mpsc channel and
//! exposes a snapshot of the session that is refreshed after every event.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use beacon_settings::ReconnectSettings;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::close_code::{self, CloseDisposition};
use crate::codec::{OutboundFrame, PresenceUpdate, RequestGuildMembers, VoiceStateUpdate};
use crate::connection::{Command, ConnectionConfig, ConnectionEvent, DispatchSink, GatewayConnection};
use crate::errors::GatewayError;
use crate::session::{ConnectionPhase, SessionState};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CONTROL_CAPACITY: usize = 64;

/// Request from a [`ShardHandle`] to its driver task.
enum Control {
    Connect(oneshot::Sender<Result<(), GatewayError>>),
    Send(OutboundFrame),
}

/// Session and latency as last seen by the driver.
#[derive(Clone, Debug, Default)]
struct Snapshot {
    session: SessionState,
    latency: Option<Duration>,
}

/// Handle to a running shard driver.
pub struct ShardHandle {
    shard: u32,
    control: mpsc::Sender<Control>,
    snapshot: Arc<RwLock<Snapshot>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ShardHandle {
    /// Ask the driver to open the socket.
    ///
    /// Resolves once the socket is requested. Fails with
    /// [`GatewayError::Configuration`] when no credential is configured.
    pub async fn connect(&self) -> Result<(), GatewayError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(Control::Connect(reply))
            .await
            .map_err(|_| GatewayError::Closed)?;
        rx.await.map_err(|_| GatewayError::Closed)?
    }

    /// Send a presence update (dropped with a warning when no socket is open).
    pub async fn update_presence(&self, presence: PresenceUpdate) -> Result<(), GatewayError> {
        self.send(OutboundFrame::PresenceUpdate(presence)).await
    }

    /// Join, move or leave a voice channel.
    pub async fn update_voice_state(&self, voice: VoiceStateUpdate) -> Result<(), GatewayError> {
        self.send(OutboundFrame::VoiceStateUpdate(voice)).await
    }

    /// Request member chunks for a guild.
    pub async fn request_guild_members(
        &self,
        request: RequestGuildMembers,
    ) -> Result<(), GatewayError> {
        self.send(OutboundFrame::RequestGuildMembers(request)).await
    }

    /// Current session bookkeeping.
    pub fn session(&self) -> SessionState {
        self.snapshot.read().session.clone()
    }

    /// Round trip of the last acknowledged heartbeat.
    pub fn latency(&self) -> Option<Duration> {
        self.snapshot.read().latency
    }

    /// Whether the driver task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the socket normally and wait for the driver to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(error) = self.task.await {
            warn!(shard = self.shard, %error, "shard driver task failed");
        }
    }

    async fn send(&self, frame: OutboundFrame) -> Result<(), GatewayError> {
        self.control
            .send(Control::Send(frame))
            .await
            .map_err(|_| GatewayError::Closed)
    }
}

/// Start a driver task for one shard. The socket stays closed until
/// [`ShardHandle::connect`] is called.
pub fn spawn<S: DispatchSink + 'static>(
    config: ConnectionConfig,
    reconnect: ReconnectSettings,
    sink: S,
) -> ShardHandle {
    let shard = config.shard[0];
    let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
    let snapshot = Arc::new(RwLock::new(Snapshot::default()));
    let cancel = CancellationToken::new();

    let driver = Driver::new(
        GatewayConnection::new(config, sink),
        reconnect,
        Arc::clone(&snapshot),
        cancel.clone(),
    );
    let task = tokio::spawn(driver.run(control_rx));

    ShardHandle {
        shard,
        control: control_tx,
        snapshot,
        cancel,
        task,
    }
}

// ─── Driver ─────────────────────────────────────────────────────────────

struct Driver<S> {
    connection: GatewayConnection<S>,
    reconnect: ReconnectSettings,
    socket: Option<WsStream>,
    heartbeat: Option<Interval>,
    reconnect_at: Option<Instant>,
    attempts: u32,
    snapshot: Arc<RwLock<Snapshot>>,
    cancel: CancellationToken,
}

impl<S: DispatchSink> Driver<S> {
    fn new(
        connection: GatewayConnection<S>,
        reconnect: ReconnectSettings,
        snapshot: Arc<RwLock<Snapshot>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            connection,
            reconnect,
            socket: None,
            heartbeat: None,
            reconnect_at: None,
            attempts: 0,
            snapshot,
            cancel,
        }
    }

    fn shard(&self) -> u32 {
        self.connection.config().shard[0]
    }

    async fn run(mut self, mut control: mpsc::Receiver<Control>) {
        debug!(shard = self.shard(), "shard driver started");
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                request = control.recv() => match request {
                    Some(request) => self.on_control(request).await,
                    None => break,
                },
                frame = next_frame(&mut self.socket) => self.on_socket(frame).await,
                () = tick(&mut self.heartbeat) => {
                    let commands = self.connection.handle(ConnectionEvent::HeartbeatDue);
                    self.apply(commands).await;
                }
                () = sleep_until_opt(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.reconnect_now().await;
                }
            }
        }

        let commands = self.connection.disconnect();
        self.apply(commands).await;
        debug!(shard = self.shard(), "shard driver stopped");
    }

    async fn on_control(&mut self, request: Control) {
        match request {
            Control::Connect(reply) => match self.connection.connect() {
                Ok(commands) => {
                    let _ = reply.send(Ok(()));
                    self.reconnect_at = None;
                    self.attempts = 0;
                    self.apply(commands).await;
                }
                Err(error) => {
                    let _ = reply.send(Err(error));
                }
            },
            Control::Send(frame) => {
                let commands = match frame {
                    OutboundFrame::PresenceUpdate(p) => self.connection.update_presence(p),
                    OutboundFrame::VoiceStateUpdate(v) => self.connection.update_voice_state(v),
                    OutboundFrame::RequestGuildMembers(r) => self.connection.request_guild_members(r),
                    other => {
                        debug!(shard = self.shard(), op = other.opcode().name(), "ignoring handle frame");
                        Vec::new()
                    }
                };
                self.apply(commands).await;
            }
        }
    }

    async fn on_socket(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        let commands = match frame {
            Some(Ok(Message::Text(text))) => self
                .connection
                .handle(ConnectionEvent::Message(text.as_str().to_owned())),
            Some(Ok(Message::Close(frame))) => {
                let (code, reason) = frame.map_or((None, String::new()), |f| {
                    (Some(u16::from(f.code)), f.reason.as_str().to_owned())
                });
                self.lost_socket(code, reason)
            }
            Some(Ok(Message::Binary(bytes))) => {
                debug!(shard = self.shard(), len = bytes.len(), "ignoring binary frame");
                Vec::new()
            }
            Some(Ok(_)) => Vec::new(),
            Some(Err(error)) => {
                let mut commands = self.connection.handle(ConnectionEvent::Error(error.to_string()));
                commands.extend(self.lost_socket(None, error.to_string()));
                commands
            }
            None => self.lost_socket(None, "stream ended".into()),
        };
        self.apply(commands).await;
    }

    async fn reconnect_now(&mut self) {
        match self.connection.connect() {
            Ok(commands) => self.apply(commands).await,
            Err(error) => error!(shard = self.shard(), %error, "cannot reconnect"),
        }
    }

    /// The transport went away without the client asking.
    fn lost_socket(&mut self, code: Option<u16>, reason: String) -> Vec<Command> {
        self.socket = None;
        let commands = self.connection.handle(ConnectionEvent::Closed { code, reason });
        self.schedule_reconnect(code);
        commands
    }

    fn schedule_reconnect(&mut self, code: Option<u16>) {
        let shard = self.shard();
        if !self.reconnect.enabled {
            info!(shard, "automatic reconnect disabled, staying idle");
            return;
        }
        if code.is_some_and(|code| close_code::classify(code) == CloseDisposition::Fatal) {
            return;
        }
        if !self.reconnect.backoff.allows(self.attempts) {
            error!(shard, attempts = self.attempts, "reconnect attempts exhausted, staying idle");
            return;
        }

        let delay = self.reconnect.backoff.delay_for(self.attempts);
        self.attempts += 1;
        counter!("gateway_reconnects_total").increment(1);
        info!(shard, attempt = self.attempts, ?delay, "scheduling reconnect");
        self.reconnect_at = Some(Instant::now() + delay);
    }

    // ─── Command application ────────────────────────────────────────────

    async fn apply(&mut self, commands: Vec<Command>) {
        let mut queue: VecDeque<Command> = commands.into();
        while let Some(command) = queue.pop_front() {
            match command {
                Command::OpenSocket { url } => {
                    let result = tokio::select! {
                        () = self.cancel.cancelled() => break,
                        result = connect_async(url.as_str()) => result,
                    };
                    match result {
                        Ok((ws, _response)) => {
                            self.socket = Some(ws);
                            queue.extend(self.connection.handle(ConnectionEvent::Opened));
                        }
                        Err(error) => {
                            warn!(shard = self.shard(), %url, %error, "gateway connect failed");
                            queue.extend(self.lost_socket(None, error.to_string()));
                        }
                    }
                }
                Command::Send(frame) => {
                    let Some(ws) = self.socket.as_mut() else {
                        warn!(shard = self.shard(), op = frame.opcode().name(), "no socket for outbound frame");
                        continue;
                    };
                    let op = frame.opcode().name();
                    match ws.send(Message::Text(frame.encode().into())).await {
                        Ok(()) => counter!("gateway_frames_sent_total", "op" => op).increment(1),
                        Err(error) => {
                            warn!(shard = self.shard(), op, %error, "gateway send failed");
                            queue.extend(self.lost_socket(None, error.to_string()));
                        }
                    }
                }
                Command::StartHeartbeat(period) => {
                    let mut timer = interval_at(Instant::now() + period, period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.heartbeat = Some(timer);
                }
                Command::StopHeartbeat => self.heartbeat = None,
                Command::CloseSocket { code } => {
                    if let Some(mut ws) = self.socket.take() {
                        let frame = CloseFrame {
                            code: code.into(),
                            reason: "".into(),
                        };
                        if let Err(error) = ws.close(Some(frame)).await {
                            debug!(shard = self.shard(), code, %error, "close handshake failed");
                        }
                    }
                }
            }
        }

        if self.connection.state().phase == ConnectionPhase::Heartbeating {
            self.attempts = 0;
        }
        self.publish();
    }

    fn publish(&self) {
        *self.snapshot.write() = Snapshot {
            session: self.connection.state().clone(),
            latency: self.connection.latency(),
        };
    }
}

// ─── select! helpers ────────────────────────────────────────────────────

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(timer) => {
            let _ = timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
