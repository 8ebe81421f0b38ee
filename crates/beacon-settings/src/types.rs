//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may specify any subset of fields.

use std::fmt;

use beacon_core::retry::BackoffConfig;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Intent bit: guild lifecycle, channels, roles, threads.
pub const INTENT_GUILDS: u64 = 1 << 0;
/// Intent bit: guild messages.
pub const INTENT_GUILD_MESSAGES: u64 = 1 << 9;

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Gateway connection settings.
    pub gateway: GatewaySettings,
    /// REST collaborator settings.
    pub rest: RestSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl BeaconSettings {
    /// Reject combinations the gateway would refuse.
    pub fn validate(&self) -> Result<()> {
        let shard = &self.gateway.shard;
        if shard.count == 0 {
            return Err(SettingsError::InvalidValue("shard count must be at least 1".into()));
        }
        if shard.index >= shard.count {
            return Err(SettingsError::InvalidValue(format!(
                "shard index {} >= shard count {}",
                shard.index, shard.count
            )));
        }
        Ok(())
    }
}

/// Gateway connection settings.
///
/// The credential, shard pair and intent mask are opaque to the client and
/// forwarded verbatim into the Identify frame.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Bot credential. Optional at load time; `connect()` fails without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Gateway WebSocket URL. Discovered over REST when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Gateway protocol version appended to the URL query.
    pub api_version: u8,
    /// Member count above which the server omits offline members.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,
    /// Send Identify/Resume as soon as the socket opens instead of after Hello.
    pub identify_on_open: bool,
    /// Shard pair sent in Identify.
    pub shard: ShardSettings,
    /// Capability/intent bitmask sent in Identify.
    pub intents: u64,
    /// Heartbeat behavior.
    pub heartbeat: HeartbeatSettings,
    /// Reconnect supervisor behavior.
    pub reconnect: ReconnectSettings,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            token: None,
            url: None,
            api_version: 10,
            large_threshold: None,
            identify_on_open: false,
            shard: ShardSettings::default(),
            intents: INTENT_GUILDS | INTENT_GUILD_MESSAGES,
            heartbeat: HeartbeatSettings::default(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl fmt::Debug for GatewaySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("url", &self.url)
            .field("api_version", &self.api_version)
            .field("large_threshold", &self.large_threshold)
            .field("identify_on_open", &self.identify_on_open)
            .field("shard", &self.shard)
            .field("intents", &self.intents)
            .field("heartbeat", &self.heartbeat)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// Shard index/count pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShardSettings {
    /// Zero-based shard index.
    pub index: u32,
    /// Total shard count.
    pub count: u32,
}

impl Default for ShardSettings {
    fn default() -> Self {
        Self { index: 0, count: 1 }
    }
}

/// Heartbeat behavior.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatSettings {
    /// Treat an un-ACKed heartbeat at the next tick as a dead connection.
    pub zombie_detection: bool,
}

/// Reconnect supervisor behavior after an unexpected transport close.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Whether the driver reconnects on its own.
    pub enabled: bool,
    /// Backoff schedule between attempts.
    #[serde(flatten)]
    pub backoff: BackoffConfig,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            backoff: BackoffConfig::default(),
        }
    }
}

/// REST collaborator settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestSettings {
    /// API base URL (no trailing slash).
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RestSettings {
    fn default() -> Self {
        Self {
            base_url: "https://discord.com/api/v10".into(),
            timeout_ms: 15_000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter level.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
