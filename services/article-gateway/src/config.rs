// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the article gateway.
//!
//! Values are layered: built-in defaults, then an optional config file,
//! then `GATEWAY__*` environment variables (`__` separates sections, e.g.
//! `GATEWAY__RATE_LIMIT__BURST=5`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;

/// Configuration for the article gateway service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:7451)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory served under `/static` and holding `index.html`
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Allowed CORS origins; empty disables the CORS layer
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Backing store connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Delivery engine configuration
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Account snapshot configuration
    #[serde(default)]
    pub accounts: AccountsConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Backing store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Engine endpoint, `ws://host:port` for a server or `mem://` in-process
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Root credentials; sign-in is skipped when either is absent
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

/// Two-tier rate limiting: one global bucket plus a per-source cool-down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Global token refill rate per second (default: 2)
    #[serde(default = "default_rate_per_sec")]
    pub rate_per_sec: f64,

    /// Global bucket capacity (default: 5)
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Per-source cool-down window in whole seconds; 0 disables it (default: 10)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

/// Delivery engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Maximum rows a single query may return (default: 100)
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    /// Limit used when the caller does not supply one (default: 10)
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Include the article body in rendered messages (default: true)
    #[serde(default = "default_true")]
    pub include_body: bool,

    /// Topic used when the caller does not name one (default: general)
    #[serde(default = "default_topic")]
    pub default_topic: String,

    /// Platform label recorded on cursors created through the API (default: API)
    #[serde(default = "default_platform")]
    pub default_platform: String,
}

/// Account snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Seconds between snapshot reloads (default: 300)
    #[serde(default = "default_reload_secs")]
    pub reload_interval_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:7451".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8000".to_string()
}

fn default_namespace() -> String {
    "news".to_string()
}

fn default_database() -> String {
    "news".to_string()
}

fn default_rate_per_sec() -> f64 {
    2.0
}

fn default_burst() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    10
}

fn default_max_limit() -> u32 {
    100
}

fn default_limit() -> u32 {
    10
}

fn default_topic() -> String {
    "general".to_string()
}

fn default_platform() -> String {
    "API".to_string()
}

fn default_reload_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
            allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            rate_limit: RateLimitConfig::default(),
            delivery: DeliveryConfig::default(),
            accounts: AccountsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            namespace: default_namespace(),
            database: default_database(),
            username: None,
            password: None,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate_per_sec: default_rate_per_sec(),
            burst: default_burst(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_limit: default_max_limit(),
            default_limit: default_limit(),
            include_body: default_true(),
            default_topic: default_topic(),
            default_platform: default_platform(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            reload_interval_secs: default_reload_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from an optional file and the environment.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("allowed_origins")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| AppError::Config(e.to_string()))
    }
}

impl RateLimitConfig {
    /// Get the cool-down window
    pub fn cooldown_window(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl AccountsConfig {
    /// Get the reload interval
    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs.max(1))
    }
}
