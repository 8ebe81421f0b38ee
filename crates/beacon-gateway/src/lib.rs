//! # beacon-gateway
//!
//! Gateway connection manager for one shard.
//!
//! - [`codec`]: `{op, d, s, t}` frame encoding and decoding
//! - [`session`]: phase, sequence cursor, and resume credentials
//! - [`connection::GatewayConnection`]: the protocol state machine. Pure:
//!   events in, commands out, Dispatch frames forwarded to a
//!   [`connection::DispatchSink`]
//! - [`runner`]: tokio driver owning the WebSocket, heartbeat timer and
//!   reconnect backoff, controlled through a [`ShardHandle`]
//!
//! ## Crate Position
//!
//! Depends on beacon-core, beacon-settings and beacon-dispatch.
//! Depended on by beacon-agent.

#![deny(unsafe_code)]

pub mod close_code;
pub mod codec;
pub mod connection;
pub mod errors;
pub mod opcode;
pub mod runner;
pub mod session;

pub use codec::{
    Activity, InboundFrame, OutboundFrame, PresenceUpdate, RequestGuildMembers, Status,
    VoiceStateUpdate, decode_frame,
};
pub use connection::{
    Command, ConnectionConfig, ConnectionEvent, DispatchSink, GatewayConnection, socket_url,
};
pub use errors::{FrameError, GatewayError};
pub use opcode::Opcode;
pub use runner::{ShardHandle, spawn};
pub use session::{ConnectionPhase, Handshake, SessionState};
