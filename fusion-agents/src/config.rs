//! Configuration for providers and the enrichment engine
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! variables. CLI flags are applied on top by the binary.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use fusion_core::{DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_GLOBAL_TIMEOUT_SECS, DEFAULT_MAX_WORKERS};
use fusion_net::HttpConfig;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Provider credentials
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub virustotal: Option<String>,
    pub shodan: Option<String>,
    pub censys_id: Option<String>,
    pub censys_secret: Option<String>,
    pub otx: Option<String>,
    pub abuseipdb: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |key: &Option<String>| if key.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("ApiKeys")
            .field("virustotal", &mask(&self.virustotal))
            .field("shodan", &mask(&self.shodan))
            .field("censys_id", &mask(&self.censys_id))
            .field("censys_secret", &mask(&self.censys_secret))
            .field("otx", &mask(&self.otx))
            .field("abuseipdb", &mask(&self.abuseipdb))
            .finish()
    }
}

/// Engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Maximum concurrent provider calls
    pub max_workers: usize,
    /// Global enrichment timeout in seconds
    pub default_timeout_secs: u64,
    /// Per-call provider timeout in seconds
    pub call_timeout_secs: u64,
    /// Abort abandoned provider calls instead of detaching them
    pub cancel_abandoned: bool,
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            default_timeout_secs: DEFAULT_GLOBAL_TIMEOUT_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            cancel_abandoned: false,
            log_level: "INFO".to_string(),
        }
    }
}

/// HTTP transport settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub proxy: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpConfig::default();
        Self {
            timeout_secs: defaults.timeout_secs,
            max_retries: defaults.max_retries,
            backoff_base_ms: defaults.backoff_base_ms,
            proxy: defaults.proxy,
        }
    }
}

impl HttpSettings {
    pub fn to_http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            backoff_base_ms: self.backoff_base_ms,
            proxy: self.proxy.clone(),
            ..Default::default()
        }
    }
}

/// Complete ThreatFusion configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub api: ApiKeys,
    pub app: AppSettings,
    pub http: HttpSettings,
    /// Requests-per-minute overrides keyed by provider name
    pub rate_limits: HashMap<String, u32>,
}

impl FusionConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Defaults, optional file, then process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let keys = [
            ("VT_API_KEY", &mut self.api.virustotal),
            ("SHODAN_API_KEY", &mut self.api.shodan),
            ("CENSYS_API_ID", &mut self.api.censys_id),
            ("CENSYS_API_SECRET", &mut self.api.censys_secret),
            ("OTX_API_KEY", &mut self.api.otx),
            ("ABUSEIPDB_API_KEY", &mut self.api.abuseipdb),
        ];
        for (var, slot) in keys {
            if let Some(value) = non_empty(var) {
                *slot = Some(value);
            }
        }

        if let Some(value) = non_empty("MAX_WORKERS") {
            self.app.max_workers = parse_number("MAX_WORKERS", &value)?;
        }
        if let Some(value) = non_empty("DEFAULT_TIMEOUT") {
            self.app.default_timeout_secs = parse_number("DEFAULT_TIMEOUT", &value)?;
        }
        if let Some(value) = non_empty("LOG_LEVEL") {
            self.app.log_level = value;
        }

        Ok(())
    }

    /// Requests per minute for a provider, falling back to its default
    pub fn rate_limit_for(&self, provider: &str, default: u32) -> u32 {
        self.rate_limits.get(provider).copied().unwrap_or(default)
    }

    /// Which services have credentials configured
    pub fn configured_services(&self) -> Vec<(&'static str, bool)> {
        let api = &self.api;
        vec![
            ("virustotal", api.virustotal.is_some()),
            ("shodan", api.shodan.is_some()),
            ("censys", api.censys_id.is_some() && api.censys_secret.is_some()),
            ("otx", api.otx.is_some()),
            ("abuseipdb", api.abuseipdb.is_some()),
        ]
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
