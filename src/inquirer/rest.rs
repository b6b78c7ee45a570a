//! HTTP "what is my IP" services.

use super::{parse_ipv4, parse_ipv6, AddressInquirer};
use crate::error::{AddressFamily, DdnsError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

const IPIFY_IPV4_TLS: &str = "https://api.ipify.org";
const IPIFY_IPV6_TLS: &str = "https://api6.ipify.org";
const IPIFY_IPV4_PLAIN: &str = "http://api.ipify.org";
const IPIFY_IPV6_PLAIN: &str = "http://api6.ipify.org";

const IPME_IPV4_TLS: &str = "https://ip4only.me/api/";
const IPME_IPV6_TLS: &str = "https://ip6only.me/api/";
const IPME_IPV4_PLAIN: &str = "http://ip4only.me/api/";
const IPME_IPV6_PLAIN: &str = "http://ip6only.me/api/";

/// How a service's response body is turned into address text.
#[derive(Debug, Clone)]
pub enum ResponseDecoder {
    /// The whole body is the address.
    Plain,
    /// Comma separated list: family tag (`IPv4`/`IPv6`), then the address.
    Typed,
    /// First capture group (or whole match) of the pattern.
    Pattern(Regex),
}

impl ResponseDecoder {
    /// Extract the address text for `family` from a response body.
    pub fn decode(&self, body: &str, family: AddressFamily) -> Result<String> {
        let body = body.trim();

        match self {
            ResponseDecoder::Plain => Ok(body.to_string()),
            ResponseDecoder::Typed => {
                let elements: Vec<&str> = body.split(',').map(str::trim).collect();
                if elements.len() < 2 {
                    return Err(DdnsError::Lookup(format!("Unexpected response: '{}'", body)));
                }
                if elements[0] != family.to_string() {
                    return Err(DdnsError::Lookup(format!(
                        "Unexpected response type: '{}'",
                        elements[0]
                    )));
                }
                Ok(elements[1].to_string())
            }
            ResponseDecoder::Pattern(pattern) => {
                let captures = pattern.captures(body).ok_or_else(|| {
                    DdnsError::Lookup(format!("Response does not match pattern: '{}'", body))
                })?;
                let found = captures
                    .get(1)
                    .or_else(|| captures.get(0))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                Ok(found)
            }
        }
    }
}

/// REST based address inquirer.
pub struct RestInquirer {
    client: reqwest::Client,
    name: String,
    ipv4_url: Option<String>,
    ipv6_url: Option<String>,
    decoder: ResponseDecoder,
}

impl RestInquirer {
    /// Create an inquirer for arbitrary service URLs.
    pub fn new(
        name: String,
        ipv4_url: Option<String>,
        ipv6_url: Option<String>,
        decoder: ResponseDecoder,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            name,
            ipv4_url,
            ipv6_url,
            decoder,
        }
    }

    /// www.ipify.org (plain text responses).
    pub fn ipify(tls: bool) -> Self {
        let (ipv4, ipv6) = if tls {
            (IPIFY_IPV4_TLS, IPIFY_IPV6_TLS)
        } else {
            (IPIFY_IPV4_PLAIN, IPIFY_IPV6_PLAIN)
        };
        Self::new(
            scheme_name("ipify", tls),
            Some(ipv4.to_string()),
            Some(ipv6.to_string()),
            ResponseDecoder::Plain,
        )
    }

    /// ip6.me (`IPv4,1.2.3.4,...` responses).
    pub fn ipme(tls: bool) -> Self {
        let (ipv4, ipv6) = if tls {
            (IPME_IPV4_TLS, IPME_IPV6_TLS)
        } else {
            (IPME_IPV4_PLAIN, IPME_IPV6_PLAIN)
        };
        Self::new(
            scheme_name("ip6.me", tls),
            Some(ipv4.to_string()),
            Some(ipv6.to_string()),
            ResponseDecoder::Typed,
        )
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        tracing::info!("Inquiring {}...", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DdnsError::Lookup(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let text = response.text().await?;
        tracing::debug!("Received response: {:?}", text);
        Ok(text)
    }
}

fn scheme_name(service: &str, tls: bool) -> String {
    if tls {
        format!("{} (https)", service)
    } else {
        format!("{} (http)", service)
    }
}

#[async_trait]
impl AddressInquirer for RestInquirer {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn query_ipv4(&self) -> Result<Option<Ipv4Addr>> {
        let Some(url) = &self.ipv4_url else {
            return Ok(None);
        };

        let body = self.fetch(url).await?;
        let text = self.decoder.decode(&body, AddressFamily::Ipv4)?;
        let address = parse_ipv4(&text)?;
        tracing::info!("Inquiry result: {}", address);
        Ok(Some(address))
    }

    async fn query_ipv6(&self) -> Result<Option<Ipv6Addr>> {
        let Some(url) = &self.ipv6_url else {
            return Ok(None);
        };

        let body = self.fetch(url).await?;
        let text = self.decoder.decode(&body, AddressFamily::Ipv6)?;
        let address = parse_ipv6(&text)?;
        tracing::info!("Inquiry result: {}", address);
        Ok(Some(address))
    }
}
