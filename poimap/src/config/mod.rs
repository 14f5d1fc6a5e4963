//! Engine configuration.
//!
//! [`EngineConfig`] is the typed view used to assemble the engine. It can be
//! built in code or loaded from an INI file:
//!
//! ```ini
//! [api]
//! mirrors = https://overpass-api.de/api/interpreter, https://overpass.kumi.systems/api/interpreter
//! request_timeout_secs = 30
//! query_timeout_secs = 25
//!
//! [transport]
//! max_attempts = 3
//! retry_after_cap_secs = 15
//! failover_pause_ms = 200
//! backoff_base_ms = 400
//!
//! [cache]
//! ttl_secs = 300
//!
//! [refresh]
//! debounce_ms = 300
//! base_radius_m = 1000
//!
//! [filters]
//! toilets = true
//! fountains = true
//! glass = true
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::DEFAULT_TTL;
use crate::model::FilterSet;
use crate::query::{QueryBuilder, DEFAULT_QUERY_TIMEOUT_SECS};
use crate::transport::{FetchPolicy, DEFAULT_MIRRORS, DEFAULT_REQUEST_TIMEOUT};

pub use crate::refresh::RefreshConfig;

/// Directory under the home directory holding the config file.
pub const CONFIG_DIR_NAME: &str = ".poimap";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Default config file location: `~/.poimap/config.ini`.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// Transport settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Server-side `[timeout:N]` in the query.
    pub query_timeout_secs: u32,
    pub policy: FetchPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            policy: FetchPolicy::default(),
        }
    }
}

impl TransportConfig {
    pub fn query_builder(&self) -> QueryBuilder {
        QueryBuilder::new(self.query_timeout_secs)
    }
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Ordered mirror endpoints, tried first to last.
    pub mirrors: Vec<String>,
    pub transport: TransportConfig,
    pub cache: CacheConfig,
    pub refresh: RefreshConfig,
    /// Filter selection a new subscription starts with.
    pub filters: FilterSet,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            transport: TransportConfig::default(),
            cache: CacheConfig::default(),
            refresh: RefreshConfig::default(),
            filters: FilterSet::ALL,
        }
    }
}

impl EngineConfig {
    pub fn with_mirrors(mut self, mirrors: Vec<String>) -> Self {
        self.mirrors = mirrors;
        self
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.transport.policy = policy;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.transport.request_timeout = timeout;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.ttl = ttl;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.refresh.debounce = debounce;
        self
    }

    pub fn with_base_radius_m(mut self, base_radius_m: f64) -> Self {
        self.refresh.base_radius_m = base_radius_m;
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    /// Check cross-field invariants.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` if no mirror is configured, a mirror is blank,
    /// `max_attempts` is zero, or the base radius is not a positive number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mirrors.is_empty() {
            return Err(invalid("api.mirrors", "at least one mirror is required"));
        }
        if self.mirrors.iter().any(|m| m.trim().is_empty()) {
            return Err(invalid("api.mirrors", "mirror URLs must not be blank"));
        }
        if self.transport.policy.max_attempts == 0 {
            return Err(invalid("transport.max_attempts", "must be at least 1"));
        }
        if !(self.refresh.base_radius_m.is_finite() && self.refresh.base_radius_m > 0.0) {
            return Err(invalid("refresh.base_radius_m", "must be a positive number"));
        }
        Ok(())
    }

    /// Load from the default path, falling back to defaults if the file does
    /// not exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path()?)
    }

    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(err) => ConfigError::Parse {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |section: &str, key: &str| lookup(ini, section, key);

        if let Some(value) = get("api", "mirrors") {
            config.mirrors = value
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(secs) = parse_value::<u64>(get("api", "request_timeout_secs"), "api.request_timeout_secs")? {
            config.transport.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_value::<u32>(get("api", "query_timeout_secs"), "api.query_timeout_secs")? {
            config.transport.query_timeout_secs = secs;
        }

        let policy = &mut config.transport.policy;
        if let Some(n) = parse_value::<u32>(get("transport", "max_attempts"), "transport.max_attempts")? {
            policy.max_attempts = n;
        }
        if let Some(secs) = parse_value::<u64>(get("transport", "retry_after_cap_secs"), "transport.retry_after_cap_secs")? {
            policy.retry_after_cap = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_value::<u64>(get("transport", "failover_pause_ms"), "transport.failover_pause_ms")? {
            policy.failover_pause = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_value::<u64>(get("transport", "backoff_base_ms"), "transport.backoff_base_ms")? {
            policy.backoff_base = Duration::from_millis(ms);
        }

        if let Some(secs) = parse_value::<u64>(get("cache", "ttl_secs"), "cache.ttl_secs")? {
            config.cache.ttl = Duration::from_secs(secs);
        }

        if let Some(ms) = parse_value::<u64>(get("refresh", "debounce_ms"), "refresh.debounce_ms")? {
            config.refresh.debounce = Duration::from_millis(ms);
        }
        if let Some(radius) = parse_value::<f64>(get("refresh", "base_radius_m"), "refresh.base_radius_m")? {
            config.refresh.base_radius_m = radius;
        }

        if let Some(on) = parse_bool(get("filters", "toilets"), "filters.toilets")? {
            config.filters.toilets = on;
        }
        if let Some(on) = parse_bool(get("filters", "fountains"), "filters.fountains")? {
            config.filters.fountains = on;
        }
        if let Some(on) = parse_bool(get("filters", "glass"), "filters.glass")? {
            config.filters.glass = on;
        }

        config.validate()?;
        Ok(config)
    }

    /// Render as INI.
    pub fn to_ini(&self) -> Ini {
        let policy = &self.transport.policy;
        let mut ini = Ini::new();
        ini.with_section(Some("api"))
            .set("mirrors", self.mirrors.join(", "))
            .set(
                "request_timeout_secs",
                self.transport.request_timeout.as_secs().to_string(),
            )
            .set("query_timeout_secs", self.transport.query_timeout_secs.to_string());
        ini.with_section(Some("transport"))
            .set("max_attempts", policy.max_attempts.to_string())
            .set("retry_after_cap_secs", policy.retry_after_cap.as_secs().to_string())
            .set("failover_pause_ms", policy.failover_pause.as_millis().to_string())
            .set("backoff_base_ms", policy.backoff_base.as_millis().to_string());
        ini.with_section(Some("cache"))
            .set("ttl_secs", self.cache.ttl.as_secs().to_string());
        ini.with_section(Some("refresh"))
            .set("debounce_ms", self.refresh.debounce.as_millis().to_string())
            .set("base_radius_m", self.refresh.base_radius_m.to_string());
        ini.with_section(Some("filters"))
            .set("toilets", self.filters.toilets.to_string())
            .set("fountains", self.filters.fountains.to_string())
            .set("glass", self.filters.glass.to_string());
        ini
    }

    /// Render as INI text.
    pub fn to_ini_string(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.to_ini().write_to(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Save to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path()?)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        self.to_ini().write_to_file(path).map_err(io_err)
    }
}

/// Trimmed, non-empty value of `section.key`.
fn lookup<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}

fn parse_value<T>(raw: Option<&str>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|v| {
        v.parse::<T>()
            .map_err(|e| invalid(key, format!("'{}': {}", v, e)))
    })
    .transpose()
}

fn parse_bool(raw: Option<&str>, key: &str) -> Result<Option<bool>, ConfigError> {
    raw.map(|v| match v.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, format!("'{}' is not a boolean", v))),
    })
    .transpose()
}
