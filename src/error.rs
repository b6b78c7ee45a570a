//! Error types for ddns-updater.

use std::fmt;
use thiserror::Error;

/// Result type alias for ddns-updater.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// Address family of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => f.write_str("IPv4"),
            AddressFamily::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// A single address backend failed or answered with garbage.
    #[error("Address lookup failed: {0}")]
    Lookup(String),

    /// Every address backend failed for one family.
    #[error("All {} lookups failed: {}", .family, .failures.join("; "))]
    LookupExhausted {
        family: AddressFamily,
        failures: Vec<String>,
    },

    /// Configuration error (missing credential, bad path, bad config file).
    #[error("Configuration error: {0}")]
    Config(String),

    /// No provider zone matches the host.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider API call failed.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Status cache could not be read or flushed.
    #[error("Status persistence failed: {0}")]
    Persistence(String),

    /// Operation invoked with unusable input or out of sequence.
    #[error("Usage error: {0}")]
    Usage(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Lookup(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DdnsError {
    fn from(e: toml::ser::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}
