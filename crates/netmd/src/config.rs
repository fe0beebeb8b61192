//! Driver configuration management
//!
//! Exchange timing and retry budgets are tunable, with defaults matching
//! what NetMD hardware has always been driven with. Configuration is read
//! from TOML:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [exchange]
//! poll_timeout_ms = 1000
//! recv_poll_attempts = 30
//! ```

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub exchange: ExchangeSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

/// Timing and retry budgets for the exchange handshake
///
/// Time spent backing off in one exchange never exceeds `exchange_timeout_ms`,
/// however many busy rounds the device answers with. Transfer timeouts come
/// on top; see [`ExchangeSettings::worst_case_duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeSettings {
    /// Timeout of each poll control read
    #[serde(default = "ExchangeSettings::default_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Timeout of the command control write
    #[serde(default = "ExchangeSettings::default_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Timeout of each response control read
    #[serde(default = "ExchangeSettings::default_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// Poll attempts before sending a command
    #[serde(default = "ExchangeSettings::default_send_poll_attempts")]
    pub send_poll_attempts: u32,
    /// Poll attempts while waiting for each response
    #[serde(default = "ExchangeSettings::default_recv_attempts")]
    pub recv_poll_attempts: u32,
    /// Maximum busy (0x0f) responses tolerated before giving up
    #[serde(default = "ExchangeSettings::default_recv_attempts")]
    pub busy_rounds: u32,
    /// Delay between unsuccessful poll attempts
    #[serde(default = "ExchangeSettings::default_backoff_ms")]
    pub backoff_ms: u64,
    /// Overall ceiling on one exchange, measured from the first poll
    #[serde(default = "ExchangeSettings::default_exchange_timeout_ms")]
    pub exchange_timeout_ms: u64,
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            poll_timeout_ms: Self::default_timeout_ms(),
            send_timeout_ms: Self::default_timeout_ms(),
            recv_timeout_ms: Self::default_timeout_ms(),
            send_poll_attempts: Self::default_send_poll_attempts(),
            recv_poll_attempts: Self::default_recv_attempts(),
            busy_rounds: Self::default_recv_attempts(),
            backoff_ms: Self::default_backoff_ms(),
            exchange_timeout_ms: Self::default_exchange_timeout_ms(),
        }
    }
}

impl ExchangeSettings {
    fn default_timeout_ms() -> u64 {
        1000
    }

    fn default_send_poll_attempts() -> u32 {
        1
    }

    fn default_recv_attempts() -> u32 {
        30
    }

    fn default_backoff_ms() -> u64 {
        1000 // one poll per second
    }

    fn default_exchange_timeout_ms() -> u64 {
        30_000
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    /// Upper bound on the time one exchange may block in backoff sleeps
    ///
    /// The smaller of the attempt budgets and `exchange_timeout_ms`.
    pub fn worst_case_duration(&self) -> Duration {
        let sleeps = u64::from(self.send_poll_attempts.saturating_sub(1))
            + u64::from(self.busy_rounds)
                .saturating_mul(u64::from(self.recv_poll_attempts.saturating_sub(1)));
        let budgeted = Duration::from_millis(self.backoff_ms.saturating_mul(sleeps));
        budgeted.min(self.exchange_timeout())
    }

    fn validate(&self) -> Result<()> {
        let timeouts = [
            ("poll_timeout_ms", self.poll_timeout_ms),
            ("send_timeout_ms", self.send_timeout_ms),
            ("recv_timeout_ms", self.recv_timeout_ms),
            ("exchange_timeout_ms", self.exchange_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(anyhow!("Invalid exchange.{}: must be greater than 0", name));
            }
        }

        let budgets = [
            ("send_poll_attempts", self.send_poll_attempts),
            ("recv_poll_attempts", self.recv_poll_attempts),
            ("busy_rounds", self.busy_rounds),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(anyhow!("Invalid exchange.{}: must be greater than 0", name));
            }
        }

        Ok(())
    }
}

impl ProbeConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/netmd/netmd.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ProbeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("netmd").join("netmd.toml")
        } else {
            PathBuf::from(".config/netmd/netmd.toml")
        }
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }

        self.exchange.validate()
    }
}

/// Load configuration from a path that may start with `~`
pub fn load_config(path: &str) -> Result<ProbeConfig> {
    let path_buf = PathBuf::from(shellexpand::tilde(path).as_ref());
    ProbeConfig::load(Some(path_buf))
}
