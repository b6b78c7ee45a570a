//! Public address lookup backends.

mod combined;
mod rest;


pub use combined::CombinedInquirer;
pub use rest::{ResponseDecoder, RestInquirer};

use crate::config::InquirerConfig;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

// Loose shape checks to keep unexpected input out before parsing.
static IPV4_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,3}\.){3}[0-9]{1,3}$").expect("valid IPv4 pattern"));
static IPV6_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{0,4}(:[0-9a-fA-F]{0,4}){2,7}$").expect("valid IPv6 pattern")
});

/// Addresses found during one run.
///
/// `None` means the family was not queried (or is disabled), never "cleared".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressResult {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

impl AddressResult {
    /// Whether neither family produced an address.
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }
}

/// A "what is my IP" backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AddressInquirer: Send + Sync {
    /// Backend name used in logs and composite errors.
    fn name(&self) -> String;

    /// Query the public IPv4 address. `Ok(None)` if the backend has no IPv4 endpoint.
    async fn query_ipv4(&self) -> Result<Option<Ipv4Addr>>;

    /// Query the public IPv6 address. `Ok(None)` if the backend has no IPv6 endpoint.
    async fn query_ipv6(&self) -> Result<Option<Ipv6Addr>>;
}

/// Validate and parse a decoded IPv4 response.
pub fn parse_ipv4(text: &str) -> Result<Ipv4Addr> {
    if !IPV4_SHAPE.is_match(text) {
        return Err(DdnsError::Lookup(format!("Invalid IPv4 address: '{}'", text)));
    }
    text.parse()
        .map_err(|_| DdnsError::Lookup(format!("Invalid IPv4 address: '{}'", text)))
}

/// Validate and parse a decoded IPv6 response.
pub fn parse_ipv6(text: &str) -> Result<Ipv6Addr> {
    if !IPV6_SHAPE.is_match(text) {
        return Err(DdnsError::Lookup(format!("Invalid IPv6 address: '{}'", text)));
    }
    text.parse()
        .map_err(|_| DdnsError::Lookup(format!("Invalid IPv6 address: '{}'", text)))
}

/// Build the combined inquirer from the configured backend list.
pub fn create_inquirer(configs: &[InquirerConfig]) -> Result<CombinedInquirer> {
    let inquirers = configs
        .iter()
        .map(|config| -> Result<Box<dyn AddressInquirer>> {
            let inquirer = match config {
                InquirerConfig::Ipify { tls } => RestInquirer::ipify(*tls),
                InquirerConfig::IpMe { tls } => RestInquirer::ipme(*tls),
                InquirerConfig::Custom {
                    name,
                    ipv4_url,
                    ipv6_url,
                    pattern,
                } => {
                    let decoder = match pattern {
                        Some(pattern) => ResponseDecoder::Pattern(Regex::new(pattern).map_err(
                            |e| DdnsError::Config(format!("Invalid pattern for {}: {}", name, e)),
                        )?),
                        None => ResponseDecoder::Plain,
                    };
                    RestInquirer::new(name.clone(), ipv4_url.clone(), ipv6_url.clone(), decoder)
                }
            };
            Ok(Box::new(inquirer))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CombinedInquirer::new(inquirers))
}
