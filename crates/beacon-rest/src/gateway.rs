//! Gateway URL discovery.

use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use crate::client::RestClient;
use crate::errors::RestError;

/// Response of `GET /gateway/bot`.
#[derive(Clone, Debug, Deserialize)]
pub struct GatewayBot {
    /// WebSocket URL to open.
    pub url: String,
    /// Recommended shard count.
    #[serde(default = "one")]
    pub shards: u32,
    /// Identify budget for this credential.
    #[serde(default)]
    pub session_start_limit: Option<SessionStartLimit>,
}

fn one() -> u32 {
    1
}

/// Identify budget reported by the gateway discovery endpoint.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionStartLimit {
    /// Total session starts allowed per reset window.
    pub total: u32,
    /// Session starts left in the current window.
    pub remaining: u32,
    /// Milliseconds until the window resets.
    pub reset_after: u64,
    /// Identify requests allowed per 5 seconds.
    #[serde(default = "one")]
    pub max_concurrency: u32,
}

/// Fetch `GET /gateway/bot`.
pub async fn fetch_gateway_bot(client: &dyn RestClient) -> Result<GatewayBot, RestError> {
    let value = client.request(Method::GET, "/gateway/bot", None, None).await?;
    let bot: GatewayBot = serde_json::from_value(value)?;
    info!(url = %bot.url, shards = bot.shards, "discovered gateway");
    Ok(bot)
}

/// Fetch only the gateway WebSocket URL.
pub async fn fetch_gateway_url(client: &dyn RestClient) -> Result<String, RestError> {
    fetch_gateway_bot(client).await.map(|bot| bot.url)
}
