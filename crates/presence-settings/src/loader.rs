//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PresenceSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply environment variable overrides (highest priority)
//! 4. Validate ranges the relay cannot run without
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::PresenceSettings;

/// Resolve the default settings file (`~/.presence/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".presence").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PresenceSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with process env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PresenceSettings> {
    load_with_env(path, |name| std::env::var(name).ok())
}

/// Load settings from `path`, reading overrides through `env`.
pub fn load_with_env<F>(path: &Path, env: F) -> Result<PresenceSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(PresenceSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PresenceSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, env);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment overrides read through `env`.
///
/// `PORT` keeps the conventional name used by hosting platforms; the rest
/// are namespaced `PRESENCE_*`. Invalid values are ignored with a warning.
pub fn apply_env_overrides<F>(settings: &mut PresenceSettings, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = read_u16(&env, "PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = read_string(&env, "PRESENCE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_u64(&env, "PRESENCE_REAP_INTERVAL_MS", 10, 3_600_000) {
        settings.server.reap_interval_ms = v;
    }
    if let Some(v) = read_u64(&env, "PRESENCE_STALE_TIMEOUT_MS", 10, 86_400_000) {
        settings.server.stale_timeout_ms = v;
    }
    if let Some(v) = read_usize(&env, "PRESENCE_SEND_QUEUE", 1, 65_536) {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = read_string(&env, "PRESENCE_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

fn validate(settings: &PresenceSettings) -> Result<()> {
    let server = &settings.server;
    if server.reap_interval_ms == 0 {
        return Err(SettingsError::InvalidValue("server.reapIntervalMs must be > 0".into()));
    }
    if server.stale_timeout_ms == 0 {
        return Err(SettingsError::InvalidValue("server.staleTimeoutMs must be > 0".into()));
    }
    if server.send_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "server.sendQueueCapacity must be > 0".into(),
        ));
    }
    if server.max_message_size == 0 {
        return Err(SettingsError::InvalidValue("server.maxMessageSize must be > 0".into()));
    }
    Ok(())
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env readers ─────────────────────────────────────────────────────────────

fn read_string<F: Fn(&str) -> Option<String>>(env: &F, name: &str) -> Option<String> {
    env(name).filter(|v| !v.is_empty())
}

fn read_u16<F: Fn(&str) -> Option<String>>(env: &F, name: &str, min: u16, max: u16) -> Option<u16> {
    let val = env(name)?;
    let result = parse_u16_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
    }
    result
}

fn read_u64<F: Fn(&str) -> Option<String>>(env: &F, name: &str, min: u64, max: u64) -> Option<u64> {
    let val = env(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_usize<F: Fn(&str) -> Option<String>>(
    env: &F,
    name: &str,
    min: usize,
    max: usize,
) -> Option<usize> {
    let val = env(name)?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_primitive_replaces_object() {
        let target = serde_json::json!({"a": {"nested": true}});
        let source = serde_json::json!({"a": 42});
        assert_eq!(deep_merge(target, source)["a"], 42);
    }

    // ── load_with_env ───────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_with_env(Path::new("/nonexistent/settings.json"), no_env).unwrap();
        assert_eq!(settings, PresenceSettings::default());
    }

    #[test]
    fn load_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9090, "staleTimeoutMs": 10000}}"#).unwrap();

        let settings = load_with_env(&path, no_env).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.stale_timeout_ms, 10_000);
        assert_eq!(settings.server.reap_interval_ms, 5_000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn zero_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"staleTimeoutMs": 0}}"#).unwrap();

        let err = load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn zero_send_queue_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"sendQueueCapacity": 0}}"#).unwrap();

        assert!(load_with_env(&path, no_env).is_err());
    }

    #[test]
    fn zero_max_message_size_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"maxMessageSize": 0}}"#).unwrap();

        let err = load_with_env(&path, no_env).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    #[test]
    fn env_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": 9090}}"#).unwrap();

        let settings = load_with_env(&path, env_from(&[("PORT", "7000")])).unwrap();
        assert_eq!(settings.server.port, 7000);
    }

    // ── apply_env_overrides ─────────────────────────────────────────

    #[test]
    fn env_overrides_all_fields() {
        let mut settings = PresenceSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("PORT", "3000"),
                ("PRESENCE_HOST", "127.0.0.1"),
                ("PRESENCE_REAP_INTERVAL_MS", "1000"),
                ("PRESENCE_STALE_TIMEOUT_MS", "15000"),
                ("PRESENCE_SEND_QUEUE", "64"),
                ("PRESENCE_LOG_LEVEL", "debug"),
            ]),
        );
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.reap_interval_ms, 1_000);
        assert_eq!(settings.server.stale_timeout_ms, 15_000);
        assert_eq!(settings.server.send_queue_capacity, 64);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = PresenceSettings::default();
        apply_env_overrides(
            &mut settings,
            env_from(&[
                ("PORT", "not-a-port"),
                ("PRESENCE_STALE_TIMEOUT_MS", "0"),
                ("PRESENCE_SEND_QUEUE", "-4"),
                ("PRESENCE_HOST", ""),
            ]),
        );
        assert_eq!(settings, PresenceSettings::default());
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_u16_bounds() {
        assert_eq!(parse_u16_range("8080", 1, 65535), Some(8080));
        assert_eq!(parse_u16_range(" 80 ", 1, 65535), Some(80));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("70000", 1, 65535), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 10, 100_000), Some(30_000));
        assert_eq!(parse_u64_range("5", 10, 100_000), None);
        assert_eq!(parse_u64_range("abc", 10, 100_000), None);
    }

    #[test]
    fn parse_usize_bounds() {
        assert_eq!(parse_usize_range("1", 1, 10), Some(1));
        assert_eq!(parse_usize_range("11", 1, 10), None);
    }

    #[test]
    fn settings_path_under_presence_dir() {
        let path = settings_path();
        assert!(path.ends_with(".presence/settings.json"));
    }
}
