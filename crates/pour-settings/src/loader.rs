//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PourSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `POUR_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{DirectoryKind, PourSettings};

/// Resolve the default settings file path (`~/.pour/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pour").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PourSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; a file with invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<PourSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<PourSettings> {
    let defaults = serde_json::to_value(PourSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply process environment overrides.
pub fn apply_env_overrides(settings: &mut PourSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_overrides_from<F>(settings: &mut PourSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("POUR_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.parsed("POUR_PORT", 0_u16, u16::MAX) {
        settings.server.port = v;
    }
    if let Some(v) = env.parsed("POUR_MAX_CONNECTIONS", 1_usize, 1_000_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = env.parsed("POUR_HEARTBEAT_INTERVAL_MS", 1_000_u64, 600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.parsed("POUR_HEARTBEAT_TIMEOUT_MS", 1_000_u64, 3_600_000) {
        settings.server.heartbeat_timeout_ms = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env.string("POUR_JWT_SECRET") {
        settings.auth.jwt_secret = v;
    }
    if let Some(v) = env.string("POUR_JWT_ISSUER") {
        settings.auth.issuer = Some(v);
    }
    if let Some(v) = env.string("POUR_JWT_AUDIENCE") {
        settings.auth.audience = Some(v);
    }

    // ── Directory ───────────────────────────────────────────────────
    if let Some(v) = env.string("POUR_USERS_FILE") {
        settings.directory.kind = DirectoryKind::Static;
        settings.directory.users_file = Some(v);
    }
    if let Some(v) = env.string("POUR_USER_DIRECTORY_URL") {
        settings.directory.kind = DirectoryKind::Http;
        settings.directory.base_url = Some(v);
    }
    if let Some(v) = env.string("POUR_USER_DIRECTORY_API_KEY") {
        settings.directory.api_key = Some(v);
    }

    // ── Internal API / logging ──────────────────────────────────────
    if let Some(v) = env.string("POUR_INTERNAL_API_KEY") {
        settings.internal.api_key = Some(v);
    }
    if let Some(v) = env.string("POUR_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("POUR_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a number and require it to lie within `min..=max`.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn parsed<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = self.string(name)?;
        let result = parse_in_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }
}
