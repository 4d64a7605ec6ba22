//! Configuration loading and typed config structures for Pulse.
//!
//! The canonical configuration lives in `pulse-config.yaml` at the
//! project root. This module defines strongly-typed structs that
//! mirror the YAML structure and provides a loader that reads the
//! file. All fields have defaults, so an absent file or an empty
//! document yields a runnable configuration tracking the Korean
//! peninsula.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::territory::Territory;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configured reporting timezone is not a known IANA name.
    #[error("unknown reporting timezone {name:?}: {message}")]
    Timezone {
        /// The rejected timezone name.
        name: String,
        /// The parser's explanation.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    /// HTTP server bind settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Broadcast loop settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Tracked territories and reporting timezone.
    #[serde(default)]
    pub population: PopulationConfig,

    /// Contact form settings.
    #[serde(default)]
    pub contact: ContactConfig,

    /// Administrative update settings.
    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `PULSE_ADMIN_KEY` overrides `admin.update_key`
    /// - `PULSE_PORT` overrides `server.port` (when parseable)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to an already-built
    /// configuration. Called by the loaders; also useful when running
    /// entirely from defaults with no config file on disk.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PULSE_ADMIN_KEY") {
            self.admin.update_key = key;
        }
        if let Ok(port) = std::env::var("PULSE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
    }
}

/// HTTP server bind settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Broadcast loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Seconds between broadcast ticks.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

/// Tracked territories and the timezone daily counters report in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PopulationConfig {
    /// IANA timezone name the daily birth/death counters reset in.
    #[serde(default = "default_reporting_timezone")]
    pub reporting_timezone: String,

    /// Territory anchors initialized at process start.
    #[serde(default = "default_territories")]
    pub territories: Vec<Territory>,
}

impl PopulationConfig {
    /// Parse the configured reporting timezone.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Timezone`] if the name is not a known
    /// IANA timezone.
    pub fn reporting_tz(&self) -> Result<Tz, ConfigError> {
        self.reporting_timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Timezone {
                name: self.reporting_timezone.clone(),
                message: e.to_string(),
            })
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            reporting_timezone: default_reporting_timezone(),
            territories: default_territories(),
        }
    }
}

/// Contact form settings.
///
/// Rate-limit thresholds are explicit configuration rather than
/// baked-in constants.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactConfig {
    /// Maximum accepted submissions per client within one window.
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,

    /// Length of the rate-limit window in seconds.
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    /// Cap on messages the in-memory sink retains.
    #[serde(default = "default_max_stored_messages")]
    pub max_stored_messages: usize,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_seconds: default_rate_limit_window_seconds(),
            max_stored_messages: default_max_stored_messages(),
        }
    }
}

/// Administrative update settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdminConfig {
    /// Pre-shared key required by the administrative endpoints. An
    /// empty key disables them.
    #[serde(default)]
    pub update_key: String,
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

const fn default_interval_seconds() -> u64 {
    1
}

fn default_reporting_timezone() -> String {
    String::from("Asia/Seoul")
}

const fn default_rate_limit_max_requests() -> u32 {
    5
}

const fn default_rate_limit_window_seconds() -> u64 {
    60
}

const fn default_max_stored_messages() -> usize {
    500
}

fn default_reference_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// The default territory set: the Korean peninsula, anchored to the
/// 2024 KOSIS and CIA World Factbook releases.
fn default_territories() -> Vec<Territory> {
    vec![
        Territory {
            name: String::from("south_korea"),
            display_name: String::from("South Korea"),
            reference_population: 51_628_117,
            reference_timestamp: default_reference_timestamp(),
            annual_growth_rate: -0.0021,
            annual_births: 216_215,
            annual_deaths: 325_162,
            birth_rate: 4.2,
            death_rate: 6.3,
            fertility_rate: 0.748,
            life_expectancy: 75.5,
            data_source: String::from("KOSIS (Korean Statistical Information Service)"),
        },
        Territory {
            name: String::from("north_korea"),
            display_name: String::from("North Korea"),
            reference_population: 25_971_909,
            reference_timestamp: default_reference_timestamp(),
            annual_growth_rate: 0.004,
            annual_births: 342_829,
            annual_deaths: 238_941,
            birth_rate: 13.2,
            death_rate: 9.2,
            fertility_rate: 1.9,
            life_expectancy: 72.3,
            data_source: String::from("CIA World Factbook 2024"),
        },
    ]
}
