//! # beacon
//!
//! Boots one gateway shard from settings and logs every normalized event
//! until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_core::logging::init_subscriber;
use beacon_dispatch::bus::EventReceiver;
use beacon_dispatch::{Caches, EventBus, Normalizer, normalize_event_name};
use beacon_gateway::ConnectionConfig;
use beacon_rest::{HttpRestClient, fetch_gateway_url};
use beacon_settings::{BeaconSettings, load_settings, load_settings_from_path};
use clap::Parser;
use tokio::sync::broadcast;

/// Gateway client.
#[derive(Parser, Debug)]
#[command(name = "beacon", about = "Connect one gateway shard and log its events")]
struct Cli {
    /// Settings file (defaults to `~/.beacon/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Bot credential (overrides settings and `BEACON_TOKEN`).
    #[arg(long)]
    token: Option<String>,

    /// Log level filter (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Only log these events. Repeatable; accepts `MESSAGE_CREATE` or
    /// `messageCreate`.
    #[arg(long = "event", value_name = "NAME")]
    events: Vec<String>,
}

impl Cli {
    fn load_settings(&self) -> Result<BeaconSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings_from_path(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => load_settings().context("failed to load settings")?,
        };
        if let Some(token) = &self.token {
            settings.gateway.token = Some(token.clone());
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        Ok(settings)
    }

    /// Requested event names in client form.
    fn event_filter(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|name| {
                if name.contains('_') || name.chars().all(|c| !c.is_lowercase()) {
                    normalize_event_name(name)
                } else {
                    name.clone()
                }
            })
            .collect()
    }
}

/// Configured gateway URL, or the one advertised by `GET /gateway/bot`.
async fn resolve_gateway_url(settings: &BeaconSettings) -> Result<String> {
    if let Some(url) = &settings.gateway.url {
        return Ok(url.clone());
    }
    let client = HttpRestClient::new(&settings.rest, settings.gateway.token.clone())
        .context("failed to build REST client")?;
    fetch_gateway_url(&client)
        .await
        .context("failed to discover gateway URL")
}

async fn log_events(mut events: EventReceiver, filter: Vec<String>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if !filter.is_empty() && !filter.contains(&event.name) {
                    continue;
                }
                tracing::info!(event = %event.name, seq = ?event.sequence, "event");
                tracing::debug!(event = %event.name, payload = ?event.event, "event payload");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(lagged = n, "event logger lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.load_settings()?;
    init_subscriber(&settings.logging.level);

    let url = resolve_gateway_url(&settings).await?;
    let bus = Arc::new(EventBus::default());
    let normalizer = Arc::new(Normalizer::new(Caches::in_memory(), Arc::clone(&bus)));
    let logger = tokio::spawn(log_events(bus.subscribe_all(), cli.event_filter()));

    let shard = beacon_gateway::spawn(
        ConnectionConfig::from_settings(&settings.gateway, url),
        settings.gateway.reconnect.clone(),
        normalizer,
    );
    shard
        .connect()
        .await
        .context("failed to start gateway connection")?;
    tracing::info!(
        shard = settings.gateway.shard.index,
        count = settings.gateway.shard.count,
        "beacon running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    shard.shutdown().await;
    logger.abort();
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["beacon"]);
        assert!(cli.settings.is_none());
        assert!(cli.token.is_none());
        assert!(cli.events.is_empty());
    }

    #[test]
    fn cli_repeatable_event_filter() {
        let cli = Cli::parse_from([
            "beacon",
            "--event",
            "MESSAGE_CREATE",
            "--event",
            "guildCreate",
            "--event",
            "READY",
        ]);
        assert_eq!(cli.event_filter(), ["messageCreate", "guildCreate", "ready"]);
    }

    #[test]
    fn cli_overrides_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"gateway": {"token": "file"}, "logging": {"level": "warn"}}"#)
            .unwrap();
        let cli = Cli::parse_from([
            "beacon",
            "--settings",
            path.to_str().unwrap(),
            "--token",
            "cli",
            "--log-level",
            "debug",
        ]);
        let settings = cli.load_settings().unwrap();
        assert_eq!(settings.gateway.token.as_deref(), Some("cli"));
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_settings_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{oops").unwrap();
        let cli = Cli::parse_from(["beacon", "--settings", path.to_str().unwrap()]);
        let error = cli.load_settings().unwrap_err();
        assert!(error.to_string().contains("failed to load settings"));
    }

    #[tokio::test]
    async fn configured_url_skips_discovery() {
        let mut settings = BeaconSettings::default();
        settings.gateway.url = Some("wss://configured.test".into());
        settings.rest.base_url = "http://127.0.0.1:9".into();
        assert_eq!(resolve_gateway_url(&settings).await.unwrap(), "wss://configured.test");
    }

    #[tokio::test]
    async fn url_discovered_over_rest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .and(header("authorization", "Bot tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "url": "wss://discovered.test",
                "shards": 1,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = BeaconSettings::default();
        settings.gateway.token = Some("tok".into());
        settings.rest.base_url = server.uri();
        assert_eq!(resolve_gateway_url(&settings).await.unwrap(), "wss://discovered.test");
    }

    #[tokio::test]
    async fn discovery_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "401: Unauthorized"})))
            .mount(&server)
            .await;

        let mut settings = BeaconSettings::default();
        settings.rest.base_url = server.uri();
        let error = resolve_gateway_url(&settings).await.unwrap_err();
        assert!(error.to_string().contains("discover gateway URL"));
    }
}
