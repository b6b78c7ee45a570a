//! Ordered fallback over several inquirers.

use super::{AddressInquirer, AddressResult, RestInquirer};
use crate::error::{AddressFamily, DdnsError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::pin::Pin;

type Query<'a, T> = Pin<Box<dyn Future<Output = Result<Option<T>>> + Send + 'a>>;

/// Asks each backend in turn and keeps the first address found.
///
/// Backends are queried sequentially; once one answers, the rest are skipped.
/// Failures are logged and collected; they only surface if no backend answered.
pub struct CombinedInquirer {
    inquirers: Vec<Box<dyn AddressInquirer>>,
}

impl CombinedInquirer {
    /// Create from an ordered backend list.
    pub fn new(inquirers: Vec<Box<dyn AddressInquirer>>) -> Self {
        Self { inquirers }
    }

    /// Number of configured backends.
    pub fn len(&self) -> usize {
        self.inquirers.len()
    }

    /// Whether no backend is configured.
    pub fn is_empty(&self) -> bool {
        self.inquirers.is_empty()
    }

    /// Query the enabled families.
    pub async fn query(&self, ipv4: bool, ipv6: bool) -> Result<AddressResult> {
        let ipv4 = if ipv4 { self.query_ipv4().await? } else { None };
        let ipv6 = if ipv6 { self.query_ipv6().await? } else { None };
        Ok(AddressResult { ipv4, ipv6 })
    }

    async fn first_answer<'a, T, F>(&'a self, family: AddressFamily, query: F) -> Result<Option<T>>
    where
        T: std::fmt::Display,
        F: Fn(&'a dyn AddressInquirer) -> Query<'a, T>,
    {
        let mut failures = Vec::new();

        for inquirer in &self.inquirers {
            let name = inquirer.name();
            tracing::debug!("Invoking {} inquirer {}...", family, name);

            match query(inquirer.as_ref()).await {
                Ok(Some(address)) => {
                    tracing::debug!("Inquirer {} succeeded: {}", name, address);
                    return Ok(Some(address));
                }
                Ok(None) => {
                    tracing::debug!("Inquirer {} does not support {}", name, family);
                }
                Err(e) => {
                    tracing::warn!("Inquirer {} failed: {}", name, e);
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(None)
        } else {
            Err(DdnsError::LookupExhausted { family, failures })
        }
    }
}

impl Default for CombinedInquirer {
    /// TLS endpoints first, plain HTTP as last resort.
    fn default() -> Self {
        Self::new(vec![
            Box::new(RestInquirer::ipify(true)),
            Box::new(RestInquirer::ipme(true)),
            Box::new(RestInquirer::ipify(false)),
            Box::new(RestInquirer::ipme(false)),
        ])
    }
}

#[async_trait]
impl AddressInquirer for CombinedInquirer {
    fn name(&self) -> String {
        "combined".to_string()
    }

    async fn query_ipv4(&self) -> Result<Option<Ipv4Addr>> {
        self.first_answer(AddressFamily::Ipv4, |inquirer| inquirer.query_ipv4())
            .await
    }

    async fn query_ipv6(&self) -> Result<Option<Ipv6Addr>> {
        self.first_answer(AddressFamily::Ipv6, |inquirer| inquirer.query_ipv6())
            .await
    }
}
