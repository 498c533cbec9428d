//! # Configuration Management Module
//!
//! Centralized configuration for the winkeyd daemon: keyer device settings,
//! the UDP listening endpoint, CW keying parameters, and logging.
//!
//! ## Configuration Structure
//!
//! - [`KeyerConfig`] - Serial device path and baud rate
//! - [`NetworkConfig`] - UDP bind address and port
//! - [`CwConfig`] - Speed, pot range, weighting, PTT lead-in, sidetone mute,
//!   echo mode
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use winkeyd::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Keyer device: {}", config.keyer.device);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [keyer]
//! device = "/dev/ttyUSB0"
//! baud_rate = 1200
//!
//! [network]
//! bind = "0.0.0.0"
//! port = 6789
//!
//! [cw]
//! speed = 24
//! min_speed = 10
//! max_speed = 40
//! weight = 50
//! ptt_lead_in_ms = 0
//! mute = false
//! echo = true
//! ```
//!
//! All CW values except `speed` are fixed for the daemon's lifetime; `speed`
//! is the startup value and is mutated at runtime by client commands.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub keyer: KeyerConfig,
    pub network: NetworkConfig,
    pub cw: CwConfig,
    pub logging: LoggingConfig,
}

/// Serial link to the keyer module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyerConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub device: String,
    /// WinKeyer-compatible modules run their host interface at 1200 baud.
    pub baud_rate: u32,
}

/// UDP endpoint the daemon listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub bind: String,
    pub port: u16,
}

impl NetworkConfig {
    /// Bind address in `host:port` form.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// CW keying parameters sent to the keyer at session bring-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CwConfig {
    /// Initial keying speed in WPM.
    pub speed: u8,
    /// Lower bound of the speed-pot range. Requested speeds below this are
    /// accepted but logged as out of range.
    pub min_speed: u8,
    /// Upper bound of the speed-pot range.
    pub max_speed: u8,
    /// Dit/dah weighting, 10..=90 with 50 meaning unweighted.
    pub weight: u8,
    /// PTT lead-in in milliseconds, 0..=50.
    pub ptt_lead_in_ms: u8,
    /// Disable the keyer's sidetone oscillator.
    #[serde(default)]
    pub mute: bool,
    /// Echo keyed characters back to all known clients.
    #[serde(default = "default_echo")]
    pub echo: bool,
}

fn default_echo() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keyer: KeyerConfig {
                device: "/dev/ttyUSB0".to_string(),
                baud_rate: 1200,
            },
            network: NetworkConfig {
                bind: "0.0.0.0".to_string(),
                port: 6789,
            },
            cw: CwConfig {
                speed: 24,
                min_speed: 10,
                max_speed: 40,
                weight: 50,
                ptt_lead_in_ms: 0,
                mute: false,
                echo: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("winkeyd.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.keyer.baud_rate, 1200);
        assert_eq!(config.network.port, 6789);
        assert_eq!(config.cw.speed, 24);
        assert_eq!(config.cw.weight, 50);
        assert!(config.cw.echo);
        assert!(!config.cw.mute);
    }

    #[test]
    fn test_bind_addr_formatting() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr(), "0.0.0.0:6789");
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.keyer.device, config.keyer.device);
        assert_eq!(parsed.cw.max_speed, config.cw.max_speed);
        assert_eq!(parsed.logging.level, config.logging.level);
    }

    #[test]
    fn test_optional_fields_default() {
        // mute and echo may be omitted from the [cw] section entirely
        let toml_src = r#"
            [keyer]
            device = "/dev/ttyS0"
            baud_rate = 1200

            [network]
            bind = "127.0.0.1"
            port = 6789

            [cw]
            speed = 20
            min_speed = 5
            max_speed = 50
            weight = 50
            ptt_lead_in_ms = 10

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert!(!config.cw.mute);
        assert!(config.cw.echo);
        assert_eq!(config.logging.file, None);
    }
}
