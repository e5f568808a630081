//! Configuration management for radiogated.
//!
//! Settings come from /etc/radiogate/config.toml, then the per-user config
//! directory, else defaults. Every field is optional.

use crate::arbiter::ArbiterConfig;
use crate::classify::CandidatePolicy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System-wide config file path
pub const CONFIG_PATH: &str = "/etc/radiogate/config.toml";

/// Longest accepted debounce, cooldown, grace or idle interval (one day)
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Which OS backend drives the probes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Auto,
    Linux,
    Macos,
}

impl Platform {
    /// Resolve `Auto` against the build target.
    pub fn resolve(self) -> Platform {
        match self {
            Platform::Auto if cfg!(target_os = "macos") => Platform::Macos,
            Platform::Auto => Platform::Linux,
            other => other,
        }
    }
}

/// Wireless radio settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Wireless device override (e.g. "en0", "wlp2s0"); autodetected when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Settle time before re-reading power after a set
    #[serde(default = "default_verify_delay_ms")]
    pub verify_delay_ms: u64,
}

fn default_verify_delay_ms() -> u64 {
    1_000
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            device: None,
            verify_delay_ms: default_verify_delay_ms(),
        }
    }
}

/// Wired candidate rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WiredConfig {
    /// Pseudo-ports that never count as a wired link
    #[serde(default = "default_ignored_ports")]
    pub ignored_ports: Vec<String>,

    /// When non-empty, only these ports may count as the wired link
    #[serde(default)]
    pub allowed_ports: Vec<String>,
}

fn default_ignored_ports() -> Vec<String> {
    ["lo", "Thunderbolt 1", "Thunderbolt 2", "Thunderbolt Bridge"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for WiredConfig {
    fn default() -> Self {
        Self {
            ignored_ports: default_ignored_ports(),
            allowed_ports: Vec::new(),
        }
    }
}

/// Debounce, cooldown and polling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,

    /// Minimum time between two successful radio toggles
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Fast polling after the radio was turned on
    #[serde(default = "default_grace")]
    pub grace_secs: u64,

    #[serde(default = "default_fast_interval")]
    pub fast_interval_secs: u64,

    /// Poll interval away from base with no cable
    #[serde(default = "default_idle_interval")]
    pub idle_interval_secs: u64,

    /// Upper bound for any single OS command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Act on the very first observation without waiting out the debounce
    #[serde(default)]
    pub trust_initial_observation: bool,
}

fn default_debounce() -> u64 {
    2
}

fn default_cooldown() -> u64 {
    8
}

fn default_grace() -> u64 {
    20
}

fn default_fast_interval() -> u64 {
    2
}

fn default_idle_interval() -> u64 {
    60
}

fn default_command_timeout() -> u64 {
    5
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce(),
            cooldown_secs: default_cooldown(),
            grace_secs: default_grace(),
            fast_interval_secs: default_fast_interval(),
            idle_interval_secs: default_idle_interval(),
            command_timeout_secs: default_command_timeout(),
            trust_initial_observation: false,
        }
    }
}

/// Home ("office") networks: fast polling while associated, even without a cable
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeConfig {
    #[serde(default)]
    pub networks: Vec<String>,
}

/// Desktop notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,

    /// Notification sound name (macOS only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
}

fn default_notifications_enabled() -> bool {
    true
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            sound: None,
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    Console,
    File,
}

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Log level, log sinks and event journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_targets")]
    pub targets: Vec<LogTarget>,

    /// Log file for the `file` target; rolled files get a date suffix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rolled log files kept next to the live one
    #[serde(default = "default_backup_count")]
    pub backup_count: usize,

    /// Append-only JSONL journal of actuations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_targets() -> Vec<LogTarget> {
    vec![LogTarget::Console]
}

fn default_backup_count() -> usize {
    3
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            targets: default_log_targets(),
            file_path: None,
            rotation: LogRotation::default(),
            backup_count: default_backup_count(),
            journal_path: None,
        }
    }
}

impl LoggingConfig {
    pub fn wants(&self, target: LogTarget) -> bool {
        self.targets.contains(&target)
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub wired: WiredConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub home: HomeConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// First existing config file on the search path
    pub fn locate() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.exists())
    }

    /// System file first, then the per-user file
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("radiogate").join("config.toml"));
        }
        paths
    }

    /// Load config from a specific path and validate it
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Default config rendered as TOML
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    /// Reject values the poll loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        if t.fast_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "timing.fast_interval_secs must be at least 1".to_string(),
            ));
        }
        if t.idle_interval_secs < t.fast_interval_secs {
            return Err(ConfigError::Invalid(format!(
                "timing.idle_interval_secs ({}) is shorter than timing.fast_interval_secs ({})",
                t.idle_interval_secs, t.fast_interval_secs
            )));
        }
        for (key, secs) in [
            ("debounce_secs", t.debounce_secs),
            ("cooldown_secs", t.cooldown_secs),
            ("grace_secs", t.grace_secs),
            ("idle_interval_secs", t.idle_interval_secs),
        ] {
            if secs > MAX_WINDOW_SECS {
                return Err(ConfigError::Invalid(format!(
                    "timing.{} ({}) exceeds {} seconds",
                    key, secs, MAX_WINDOW_SECS
                )));
            }
        }
        if t.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timing.command_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "logging.level '{}' is not a log level",
                self.logging.level
            )));
        }
        let logging = &self.logging;
        if logging.targets.is_empty() {
            return Err(ConfigError::Invalid(
                "logging.targets must name at least one of console, file".to_string(),
            ));
        }
        if logging.wants(LogTarget::File) {
            match &logging.file_path {
                None => {
                    return Err(ConfigError::Invalid(
                        "logging.targets includes file but logging.file_path is unset".to_string(),
                    ))
                }
                Some(path) if path.file_name().is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "logging.file_path {} does not name a file",
                        path.display()
                    )))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn to_arbiter_config(&self) -> ArbiterConfig {
        let t = &self.timing;
        ArbiterConfig {
            debounce: Duration::from_secs(t.debounce_secs),
            cooldown: Duration::from_secs(t.cooldown_secs),
            grace: Duration::from_secs(t.grace_secs),
            fast_interval: Duration::from_secs(t.fast_interval_secs),
            idle_interval: Duration::from_secs(t.idle_interval_secs),
            home_networks: self.home.networks.iter().cloned().collect(),
            trust_initial_observation: t.trust_initial_observation,
        }
    }

    pub fn candidate_policy(&self) -> CandidatePolicy {
        let policy = CandidatePolicy::new(
            self.wired.ignored_ports.iter().cloned(),
            self.wired.allowed_ports.iter().cloned(),
        );
        match &self.radio.device {
            Some(device) => policy.with_wireless_device(device.clone()),
            None => policy,
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.command_timeout_secs)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.radio.verify_delay_ms)
    }
}
