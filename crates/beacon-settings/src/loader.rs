//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `BEACON_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

pub use beacon_core::json::deep_merge;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::BeaconSettings;

/// Resolve the default settings file path (`~/.beacon/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid shard pair is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Load settings from `path`, reading overrides through `env`.
pub fn load_with_env(path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<BeaconSettings> {
    let defaults = serde_json::to_value(BeaconSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: BeaconSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    settings.validate()?;
    Ok(settings)
}

/// Apply environment overrides read through `env`.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut BeaconSettings, env: impl Fn(&str) -> Option<String>) {
    let read_string = |key: &str| env(key).filter(|v| !v.is_empty());
    let read_parsed = |key: &str| -> Option<u64> {
        let raw = read_string(key)?;
        let parsed = raw.parse().ok();
        if parsed.is_none() {
            tracing::warn!(key, value = %raw, "invalid integer env var, ignoring");
        }
        parsed
    };

    if let Some(v) = read_string("BEACON_TOKEN") {
        settings.gateway.token = Some(v);
    }
    if let Some(v) = read_string("BEACON_GATEWAY_URL") {
        settings.gateway.url = Some(v);
    }
    if let Some(v) = read_parsed("BEACON_API_VERSION").and_then(|v| u8::try_from(v).ok()) {
        settings.gateway.api_version = v;
    }
    if let Some(v) = read_parsed("BEACON_SHARD_INDEX").and_then(|v| u32::try_from(v).ok()) {
        settings.gateway.shard.index = v;
    }
    if let Some(v) = read_parsed("BEACON_SHARD_COUNT").and_then(|v| u32::try_from(v).ok()) {
        settings.gateway.shard.count = v;
    }
    if let Some(v) = read_parsed("BEACON_INTENTS") {
        settings.gateway.intents = v;
    }
    if let Some(v) = read_string("BEACON_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(raw) = read_string("BEACON_RECONNECT") {
        match parse_bool(&raw) {
            Some(v) => settings.gateway.reconnect.enabled = v,
            None => tracing::warn!(key = "BEACON_RECONNECT", value = %raw, "invalid boolean env var, ignoring"),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── load_with_env ───────────────────────────────────────────────

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_with_env(&dir.path().join("nope.json"), no_env).unwrap();
        assert_eq!(s.gateway.api_version, 10);
        assert!(s.gateway.token.is_none());
    }

    #[test]
    fn file_values_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"gateway": {"token": "abc", "shard": {"index": 1, "count": 2}, "reconnect": {"maxDelayMs": 5000}}}"#,
        )
        .unwrap();

        let s = load_with_env(&path, no_env).unwrap();
        assert_eq!(s.gateway.token.as_deref(), Some("abc"));
        assert_eq!(s.gateway.shard.index, 1);
        assert_eq!(s.gateway.shard.count, 2);
        assert_eq!(s.gateway.reconnect.backoff.max_delay_ms, 5000);
        assert_eq!(s.gateway.reconnect.backoff.base_delay_ms, 1000);
        assert!(s.gateway.reconnect.enabled);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_with_env(&path, no_env), Err(SettingsError::Json(_))));
    }

    #[test]
    fn invalid_shard_pair_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"gateway": {"shard": {"index": 5, "count": 2}}}"#).unwrap();
        assert!(matches!(
            load_with_env(&path, no_env),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn env_overrides_take_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"gateway": {"token": "from-file"}}"#).unwrap();

        let env = env_from(&[
            ("BEACON_TOKEN", "from-env"),
            ("BEACON_GATEWAY_URL", "wss://example.test"),
            ("BEACON_SHARD_INDEX", "1"),
            ("BEACON_SHARD_COUNT", "4"),
            ("BEACON_INTENTS", "32767"),
            ("BEACON_LOG_LEVEL", "debug"),
            ("BEACON_RECONNECT", "off"),
        ]);
        let s = load_with_env(&path, env).unwrap();
        assert_eq!(s.gateway.token.as_deref(), Some("from-env"));
        assert_eq!(s.gateway.url.as_deref(), Some("wss://example.test"));
        assert_eq!(s.gateway.shard.index, 1);
        assert_eq!(s.gateway.shard.count, 4);
        assert_eq!(s.gateway.intents, 32767);
        assert_eq!(s.logging.level, "debug");
        assert!(!s.gateway.reconnect.enabled);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut s = BeaconSettings::default();
        apply_env_overrides(
            &mut s,
            env_from(&[
                ("BEACON_SHARD_COUNT", "many"),
                ("BEACON_API_VERSION", "9999"),
                ("BEACON_RECONNECT", "maybe"),
                ("BEACON_TOKEN", ""),
            ]),
        );
        assert_eq!(s.gateway.shard.count, 1);
        assert_eq!(s.gateway.api_version, 10);
        assert!(s.gateway.reconnect.enabled);
        assert!(s.gateway.token.is_none());
    }

    #[test]
    fn parse_bool_variants() {
        for v in ["true", "1", "YES", "on"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("2"), None);
    }

    #[test]
    fn settings_path_ends_with_beacon_dir() {
        let path = settings_path();
        assert!(path.ends_with(".beacon/settings.json"));
    }
}
