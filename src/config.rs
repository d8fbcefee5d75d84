use anyhow::{bail, Context};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

lazy_static! {
    // Dotted DNS name made of LDH labels, optionally absolute
    static ref ZONE_NAME: Regex =
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*\.?$")
            .unwrap();
}

pub const DEFAULT_CONFIG_PATH: &str = "/etc/ixhash.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// DNS zones queried with `<digest>.<zone>`
    pub zones: Vec<String>,
    pub dns: DnsConfig,
    pub milter: MilterConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DnsConfig {
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MilterConfig {
    pub socket_path: String,
    /// Prefix of the added headers, e.g. `X-Ixhash-Digests`
    pub header_prefix: String,
    /// Bodies larger than this are not hashed
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            zones: vec!["generic.ixhash.net".to_string()],
            dns: DnsConfig::default(),
            milter: MilterConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig { timeout_seconds: 5 }
    }
}

impl Default for MilterConfig {
    fn default() -> Self {
        MilterConfig {
            socket_path: "/var/run/ixhash-milter.sock".to_string(),
            header_prefix: "X-Ixhash".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {path}"))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {path}"))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for zone in &self.zones {
            if !ZONE_NAME.is_match(zone) {
                bail!("Invalid DNS zone name: {zone:?}");
            }
        }
        if self.dns.timeout_seconds == 0 {
            bail!("dns.timeout_seconds must be greater than zero");
        }
        if self.milter.socket_path.trim().is_empty() {
            bail!("milter.socket_path must not be empty");
        }
        if self.milter.header_prefix.trim().is_empty() {
            bail!("milter.header_prefix must not be empty");
        }
        if self.milter.max_body_bytes == 0 {
            bail!("milter.max_body_bytes must be greater than zero");
        }
        if self.logging.level.parse::<log::LevelFilter>().is_err() {
            bail!("Unknown logging.level: {:?}", self.logging.level);
        }
        Ok(())
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns.timeout_seconds)
    }

    /// Level filter for `env_logger`; unknown names fall back to `Info`.
    pub fn log_level(&self) -> log::LevelFilter {
        self.logging.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.zones, vec!["generic.ixhash.net".to_string()]);
        assert_eq!(config.dns_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ixhash.yaml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.zones.push("ixhash.spamdomain.example.".to_string());
        config.dns.timeout_seconds = 3;
        config.to_file(path).unwrap();

        let loaded = Config::from_file(path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("zones:\n  - hashes.example.org\n").unwrap();
        assert_eq!(config.zones, vec!["hashes.example.org".to_string()]);
        assert_eq!(config.milter, MilterConfig::default());
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.zones.push("bad zone".to_string());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.zones.push(String::new());
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.dns.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.milter.socket_path = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.milter.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_body_limit_from_yaml() {
        let config: Config =
            serde_yaml::from_str("milter:\n  max_body_bytes: 65536\n").unwrap();
        assert_eq!(config.milter.max_body_bytes, 65536);
        assert_eq!(config.milter.header_prefix, "X-Ixhash");
        assert_eq!(
            Config::default().milter.max_body_bytes,
            10 * 1024 * 1024
        );
    }

    #[test]
    fn test_log_level() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
        config.logging.level = "loud".to_string();
        assert_eq!(config.log_level(), log::LevelFilter::Info);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::from_file("/nonexistent/ixhash.yaml").is_err());
    }
}
