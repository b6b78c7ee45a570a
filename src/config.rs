//! Configuration management for ddns-updater.

use crate::error::{DdnsError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to keep updated (e.g. "home.example.org").
    #[serde(default)]
    pub host: Option<String>,

    /// Credentials file (default: credentials.toml next to the config).
    #[serde(default)]
    pub credentials: Option<PathBuf>,

    /// Status cache file (default: status.json in the cache directory).
    #[serde(default)]
    pub status_file: Option<PathBuf>,

    /// Maximum age of the last update in seconds (default: 86400 = 24 hours).
    #[serde(default = "default_force_timeout")]
    pub force_timeout_secs: u64,

    /// Whether to update the A record.
    #[serde(default = "default_true")]
    pub ipv4: bool,

    /// Whether to update the AAAA record.
    #[serde(default = "default_true")]
    pub ipv6: bool,

    /// Route53 signing region, unless set in the credentials.
    #[serde(default = "default_region")]
    pub region: String,

    /// Address lookup backends, in the order they are tried.
    #[serde(default = "default_inquirers")]
    pub inquirers: Vec<InquirerConfig>,
}

fn default_force_timeout() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_inquirers() -> Vec<InquirerConfig> {
    vec![
        InquirerConfig::Ipify { tls: true },
        InquirerConfig::IpMe { tls: true },
        InquirerConfig::Ipify { tls: false },
        InquirerConfig::IpMe { tls: false },
    ]
}

/// Address lookup backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InquirerConfig {
    #[serde(rename = "ipify")]
    Ipify {
        /// Use the https endpoints.
        #[serde(default = "default_true")]
        tls: bool,
    },

    #[serde(rename = "ipme")]
    IpMe {
        /// Use the https endpoints.
        #[serde(default = "default_true")]
        tls: bool,
    },

    #[serde(rename = "custom")]
    Custom {
        /// Name used in logs.
        name: String,
        /// URL answering with the IPv4 address.
        #[serde(default)]
        ipv4_url: Option<String>,
        /// URL answering with the IPv6 address.
        #[serde(default)]
        ipv6_url: Option<String>,
        /// Regex locating the address in the response (first group or whole match).
        #[serde(default)]
        pattern: Option<String>,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            credentials: None,
            status_file: None,
            force_timeout_secs: default_force_timeout(),
            ipv4: true,
            ipv6: true,
            region: default_region(),
            inquirers: default_inquirers(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the default credentials file path.
    pub fn default_credentials_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("credentials.toml"))
    }

    /// Get the default status file path.
    pub fn default_status_path() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| DdnsError::Config("Could not find cache directory".to_string()))?;

        Ok(cache_dir.join("ddns-updater").join("status.json"))
    }

    fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("ddns-updater"))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the credentials path, falling back to the default location.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials {
            Some(path) => Ok(path.clone()),
            None => Self::default_credentials_path(),
        }
    }

    /// Resolve the status file path, falling back to the default location.
    pub fn status_path(&self) -> Result<PathBuf> {
        match &self.status_file {
            Some(path) => Ok(path.clone()),
            None => Self::default_status_path(),
        }
    }

    /// Generate example configuration.
    pub fn example() -> Self {
        Self {
            host: Some("home.example.org".to_string()),
            inquirers: vec![
                InquirerConfig::Ipify { tls: true },
                InquirerConfig::IpMe { tls: true },
                InquirerConfig::Custom {
                    name: "checkip".to_string(),
                    ipv4_url: Some("https://checkip.amazonaws.com".to_string()),
                    ipv6_url: None,
                    pattern: None,
                },
            ],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.force_timeout_secs, 86400);
        assert!(config.ipv4 && config.ipv6);
        assert_eq!(config.inquirers.len(), 4);
        assert_eq!(config.inquirers[0], InquirerConfig::Ipify { tls: true });
    }

    #[test]
    fn test_parse_inquirer_list() {
        let config: Config = toml::from_str(
            r#"
            host = "gw.example.net"
            ipv6 = false
            force_timeout_secs = 3600

            [[inquirers]]
            type = "ipme"

            [[inquirers]]
            type = "custom"
            name = "router"
            ipv4_url = "http://192.168.1.1/status"
            pattern = 'WAN: ([0-9.]+)'
            "#,
        )
        .unwrap();

        assert_eq!(config.host.as_deref(), Some("gw.example.net"));
        assert!(config.ipv4);
        assert!(!config.ipv6);
        assert_eq!(config.force_timeout_secs, 3600);
        assert_eq!(config.inquirers[0], InquirerConfig::IpMe { tls: true });
        assert!(matches!(
            &config.inquirers[1],
            InquirerConfig::Custom { name, ipv6_url: None, .. } if name == "router"
        ));
    }

    #[test]
    fn test_example_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::example().save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.host.as_deref(), Some("home.example.org"));
        assert_eq!(loaded.inquirers.len(), 3);
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert!(config.host.is_none());
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = Config {
            credentials: Some(PathBuf::from("/etc/ddns/creds.toml")),
            status_file: Some(PathBuf::from("/var/lib/ddns/status.json")),
            ..Config::default()
        };
        assert_eq!(
            config.credentials_path().unwrap(),
            PathBuf::from("/etc/ddns/creds.toml")
        );
        assert_eq!(
            config.status_path().unwrap(),
            PathBuf::from("/var/lib/ddns/status.json")
        );
    }
}
