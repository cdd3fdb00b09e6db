//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and serde field defaults
//! 2. **Config file**: TOML file given by `--config` or the `TRACEWIRE_CONFIG` env var
//! 3. **Environment variables**: `TRACEWIRE__SECTION__FIELD` overrides specific fields
//!
//! # Configuration Sections
//!
//! - [`TransportConfig`]: JSON-RPC endpoint, timeouts, concurrency, retries
//! - [`CacheConfig`]: response cache allow-list and key limits
//! - [`TelemetryConfig`]: OTLP exporter and propagation settings
//! - [`LoggingConfig`]: log level and format
//!
//! # Example
//!
//! ```toml
//! [transport]
//! endpoint = "https://mainnet.infura.io/v3/YOUR_API_KEY"
//! timeout_seconds = 10
//!
//! [cache]
//! allowlist = ["eth_chainId", "net_version"]
//!
//! [telemetry]
//! service_name = "balance-checker"
//! otlp_endpoint = "http://collector:4317"
//! ```

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::DEFAULT_CACHEABLE_METHODS;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// JSON-RPC endpoint connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// HTTP(S) JSON-RPC endpoint URL.
    pub endpoint: String,

    /// Per-request timeout in seconds. Defaults to `30`.
    pub timeout_seconds: u64,

    /// Maximum number of in-flight HTTP requests. Defaults to `64`.
    pub concurrent_limit: usize,

    /// Retries after the first attempt on connect failures and HTTP 5xx. Defaults to `2`.
    pub max_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://mainnet.infura.io/v3/YOUR_API_KEY".to_string(),
            timeout_seconds: 30,
            concurrent_limit: 64,
            max_retries: 2,
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the cache adapter is part of the default pipeline. Defaults to `true`.
    pub enabled: bool,

    /// Methods whose results are cached for the process lifetime. Defaults to `["eth_chainId"]`.
    pub allowlist: Vec<String>,

    /// Upper bound on a cache key's canonical size in bytes. Calls with larger params
    /// bypass the cache. Defaults to `65536`.
    pub max_key_bytes: usize,

    /// Tag the active span with `rpc.cache = hit | miss`. Defaults to `false`.
    pub annotate_spans: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowlist: DEFAULT_CACHEABLE_METHODS.iter().map(ToString::to_string).collect(),
            max_key_bytes: 64 * 1024,
            annotate_spans: false,
        }
    }
}

/// Header format used to carry trace context across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationFormat {
    /// W3C `traceparent` / `tracestate` headers.
    #[default]
    TraceContext,
    /// W3C trace context plus the W3C `baggage` header.
    TraceContextBaggage,
    /// No propagator is installed.
    None,
}

/// OpenTelemetry exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether spans are exported. When disabled, spans are still created and sampled by a
    /// provider with no exporter, so propagation keeps working. Defaults to `true`.
    pub enabled: bool,

    /// `service.name` resource attribute identifying this process. Defaults to `"tracewire"`.
    pub service_name: String,

    /// OTLP/gRPC collector endpoint. Defaults to `http://localhost:4317`.
    pub otlp_endpoint: String,

    /// Propagation header format. Defaults to `trace_context`.
    pub propagation: PropagationFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "tracewire".to_string(),
            otlp_endpoint: "http://localhost:4317".to_string(),
            propagation: PropagationFormat::TraceContext,
        }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// A missing file is not an error; defaults and environment still apply. Environment
    /// variables use the `TRACEWIRE__` prefix and `__` as the nesting separator (e.g.
    /// `TRACEWIRE__TRANSPORT__ENDPOINT=http://localhost:8545`). `cache.allowlist` accepts a
    /// comma-separated list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("transport.timeout_seconds", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("TRACEWIRE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cache.allowlist")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        let endpoint = &self.transport.endpoint;
        if endpoint.is_empty() {
            return invalid("transport endpoint is empty".to_string());
        }
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return invalid(format!("transport endpoint must be an http(s) URL: {endpoint}"));
        }
        if self.transport.timeout_seconds == 0 {
            return invalid("transport timeout must be greater than 0".to_string());
        }
        if self.transport.concurrent_limit == 0 {
            return invalid("transport concurrent limit must be greater than 0".to_string());
        }

        if self.cache.max_key_bytes == 0 {
            return invalid("cache max_key_bytes must be greater than 0".to_string());
        }
        for method in &self.cache.allowlist {
            if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return invalid(format!("invalid method name in cache allowlist: {method:?}"));
            }
        }

        if self.telemetry.enabled {
            if self.telemetry.service_name.trim().is_empty() {
                return invalid("telemetry service_name is empty".to_string());
            }
            if !self.telemetry.otlp_endpoint.starts_with("http") {
                return invalid(format!(
                    "telemetry otlp_endpoint must be an http(s) URL: {}",
                    self.telemetry.otlp_endpoint
                ));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return invalid(format!(
                "logging level must be one of {}: {:?}",
                LOG_LEVELS.join(", "),
                self.logging.level
            ));
        }
        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return invalid("logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
