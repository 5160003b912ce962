use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Substrings that reject a post without consulting the analyzer.
pub const DEFAULT_DENY_LIST: &[&str] = &[
    "nonsense",
    "illogical",
    "conspiracy",
    "propaganda",
    "fake news",
];

pub const DEFAULT_MODERATION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub openai_api_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub worker_poll_interval: Duration,
    pub moderation: ModerationConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let openai_api_key = env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        let moderation =
            ModerationConfig::from_lookup(|key| env::var(key).ok(), openai_api_key.is_some());

        let worker_poll_ms: u64 = env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .context("WORKER_POLL_INTERVAL_MS must be a number of milliseconds")?;

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "forum".to_string()),
            openai_api_key,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            worker_poll_interval: Duration::from_millis(worker_poll_ms),
            moderation,
        })
    }
}

/// Moderation settings, read once at start-up and injected everywhere.
///
/// Absent settings mean "disabled": the forum always runs with fully manual
/// moderation when nothing is configured.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationConfig {
    pub enabled: bool,
    pub auto_approve_enabled: bool,
    pub approve_threshold: f64,
    pub auto_reject_enabled: bool,
    pub reject_threshold: f64,
    pub model: String,
    pub deny_list: Vec<String>,
    /// Shared secret an external moderation service sends in `X-API-Key`.
    /// The webhook refuses every call while unset.
    pub webhook_key: Option<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_approve_enabled: false,
            approve_threshold: DEFAULT_THRESHOLD,
            auto_reject_enabled: false,
            reject_threshold: DEFAULT_THRESHOLD,
            model: DEFAULT_MODERATION_MODEL.to_string(),
            deny_list: DEFAULT_DENY_LIST.iter().map(|s| s.to_string()).collect(),
            webhook_key: None,
        }
    }
}

impl ModerationConfig {
    /// Load from the process environment.
    pub fn from_env(analyzer_configured: bool) -> Self {
        Self::from_lookup(|key| env::var(key).ok(), analyzer_configured)
    }

    /// Build from an arbitrary key lookup. Never fails; bad values fall back
    /// to defaults with a warning.
    pub fn from_lookup<F>(lookup: F, analyzer_configured: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mut enabled = parse_flag(&lookup, "MODERATION_ENABLED");
        if enabled && !analyzer_configured {
            warn!("MODERATION_ENABLED is set but OPENAI_API_KEY is missing; moderation stays manual");
            enabled = false;
        }

        let deny_list = lookup("MODERATION_DENY_LIST")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.deny_list);

        Self {
            enabled,
            auto_approve_enabled: parse_flag(&lookup, "MODERATION_AUTO_APPROVE"),
            approve_threshold: parse_threshold(&lookup, "MODERATION_APPROVE_THRESHOLD"),
            auto_reject_enabled: parse_flag(&lookup, "MODERATION_AUTO_REJECT"),
            reject_threshold: parse_threshold(&lookup, "MODERATION_REJECT_THRESHOLD"),
            model: lookup("MODERATION_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(defaults.model),
            deny_list,
            webhook_key: lookup("MODERATION_WEBHOOK_KEY").filter(|k| !k.trim().is_empty()),
        }
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()) {
        None => false,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "" | "0" | "false" | "no" | "off" => false,
            other => {
                warn!(key, value = other, "unrecognized boolean setting, treating as false");
                false
            }
        },
    }
}

fn parse_threshold<F>(lookup: &F, key: &str) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return DEFAULT_THRESHOLD;
    };

    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value.clamp(0.0, 1.0),
        _ => {
            warn!(key, value = %raw, default = DEFAULT_THRESHOLD, "invalid threshold, using default");
            DEFAULT_THRESHOLD
        }
    }
}
