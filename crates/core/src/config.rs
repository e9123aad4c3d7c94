use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub ingest: IngestConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `POSTGATE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("POSTGATE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            ingest: IngestConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject values that would make a service misbehave at runtime.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ingest.total_pages == 0 {
            return Err(CoreError::InvalidConfig {
                key: "INGEST_TOTAL_PAGES".into(),
                value: "0".into(),
            });
        }
        if !self.ingest.feed_url.starts_with("http://")
            && !self.ingest.feed_url.starts_with("https://")
        {
            return Err(CoreError::InvalidConfig {
                key: "INGEST_FEED_URL".into(),
                value: self.ingest.feed_url.clone(),
            });
        }
        if self.server.request_timeout_secs == 0 {
            return Err(CoreError::InvalidConfig {
                key: "REQUEST_TIMEOUT_SECS".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  server:    {}:{}, request timeout {}s",
            self.server.host,
            self.server.port,
            self.server.request_timeout_secs
        );
        tracing::info!(
            "  postgres:  host={}, db={}, sslmode={}",
            self.postgres.host,
            self.postgres.database,
            self.postgres.ssl_mode
        );
        tracing::info!(
            "  ingest:    feed={}, pages={}, concurrency={}",
            self.ingest.feed_url,
            self.ingest.total_pages,
            self.ingest.concurrency()
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline applied to every downstream RPC call.
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8080),
            request_timeout_secs: profiled_env_u64(p, "REQUEST_TIMEOUT_SECS", 60),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "postgate"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "disable"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

// ── Ingestion ─────────────────────────────────────────────────

/// Upper bound for concurrent page fetches against the feed.
pub const MAX_INGEST_CONCURRENCY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Feed endpoint; the page number is appended as `?page=N`.
    pub feed_url: String,
    pub total_pages: u32,
    pub max_concurrency: u32,
    pub http_timeout_secs: u64,
}

impl IngestConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            feed_url: profiled_env_or(p, "INGEST_FEED_URL", "https://gorest.co.in/public/v1/posts"),
            total_pages: profiled_env_u32(p, "INGEST_TOTAL_PAGES", 50),
            max_concurrency: profiled_env_u32(p, "INGEST_MAX_CONCURRENCY", 8),
            http_timeout_secs: profiled_env_u64(p, "INGEST_HTTP_TIMEOUT_SECS", 30),
        }
    }

    /// Effective fetch concurrency, clamped to `1..=MAX_INGEST_CONCURRENCY`.
    pub fn concurrency(&self) -> usize {
        (self.max_concurrency as usize).clamp(1, MAX_INGEST_CONCURRENCY)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::from_env_profiled("")
    }
}
