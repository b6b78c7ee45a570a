//! Provider side DNS record merging.
//!
//! A merge is a small transaction: [`DnsMerger::new`] starts idle,
//! [`DnsMerger::prepare`] binds host and credentials, the `merge_*` calls
//! buffer addresses, and [`DnsMerger::commit`] consumes the merger. The
//! ordering is enforced by the type of the merger, so committing an
//! unprepared merge does not compile.
//!
//! Only existing, single valued A/AAAA record sets are ever rewritten.
//! Nothing is created and nothing is deleted.

mod route53;

#[cfg(test)]
mod tests;

pub use route53::Route53Connector;

use crate::credentials::Credentials;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// DNS record type, as far as the merger cares.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Other(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Other(other) => other,
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        match value {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            other => RecordType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider hosted zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    /// Fully qualified domain suffix, with trailing dot.
    pub name: String,
}

impl Zone {
    /// Whether `host` (fully qualified) lies strictly below this zone.
    pub fn contains(&self, host: &str) -> bool {
        let suffix = format!(".{}", self.name.to_ascii_lowercase());
        host.to_ascii_lowercase().ends_with(&suffix)
    }
}

/// One page of the zone listing.
#[derive(Debug, Clone, Default)]
pub struct ZonePage {
    pub zones: Vec<Zone>,
    /// Marker of the next page, if the listing was truncated.
    pub next_marker: Option<String>,
}

/// An existing record set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: Option<i64>,
    pub values: Vec<String>,
}

/// Position in a record set listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetCursor {
    pub name: String,
    pub record_type: Option<String>,
    pub identifier: Option<String>,
}

impl RecordSetCursor {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            record_type: None,
            identifier: None,
        }
    }
}

/// One page of a record set listing.
#[derive(Debug, Clone, Default)]
pub struct RecordSetPage {
    pub record_sets: Vec<RecordSet>,
    pub next: Option<RecordSetCursor>,
}

/// Upsert of a single record set value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: Option<i64>,
    pub value: String,
}

impl Change {
    /// Copy name, type and TTL of `current`, substituting the value.
    pub fn upsert(current: &RecordSet, value: String) -> Self {
        Self {
            name: current.name.clone(),
            record_type: current.record_type.clone(),
            ttl: current.ttl,
            value,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.record_type, self.value)
    }
}

/// Provider receipt for a submitted change batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInfo {
    pub id: String,
    pub status: String,
}

/// Provider API used by the merger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZoneApi: Send + Sync {
    /// List hosted zones, starting at `marker`.
    async fn list_zones(&self, marker: Option<String>) -> Result<ZonePage>;

    /// List record sets of a zone, starting at `cursor`.
    async fn list_record_sets(&self, zone_id: String, cursor: RecordSetCursor)
        -> Result<RecordSetPage>;

    /// Submit all changes as one batch.
    async fn submit_changes(&self, zone_id: String, changes: Vec<Change>) -> Result<ChangeInfo>;
}

/// Opens a provider API session from credentials.
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: &dyn Credentials) -> Result<Box<dyn ZoneApi>>;
}

/// Look up the hosted zone of `host` (fully qualified).
///
/// All listing pages are scanned and the most specific matching zone wins.
pub async fn lookup_zone(api: &dyn ZoneApi, host: &str) -> Result<Zone> {
    tracing::info!("Looking up zone for host '{}'...", host);

    let mut marker = None;
    let mut found: Option<Zone> = None;

    loop {
        let page = api.list_zones(marker).await?;

        for zone in page.zones.into_iter().filter(|zone| zone.contains(host)) {
            match &found {
                Some(current) if current.name.len() >= zone.name.len() => {
                    tracing::warn!(
                        "Zone '{}' also matches host '{}'; keeping more specific '{}'",
                        zone.name,
                        host,
                        current.name
                    );
                }
                Some(current) => {
                    tracing::warn!(
                        "Zone '{}' also matches host '{}'; preferring more specific '{}'",
                        current.name,
                        host,
                        zone.name
                    );
                    found = Some(zone);
                }
                None => found = Some(zone),
            }
        }

        match page.next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    let zone =
        found.ok_or_else(|| DdnsError::NotFound(format!("No zone found for host: {}", host)))?;
    tracing::info!("Found matching zone '{}'", zone.name);
    Ok(zone)
}

/// Look up the singular A/AAAA record sets of `host` within `zone`.
///
/// Record sets with zero or several values are logged and left out.
pub async fn lookup_record_sets(
    api: &dyn ZoneApi,
    zone: &Zone,
    host: &str,
) -> Result<HashMap<RecordType, RecordSet>> {
    tracing::info!("Looking up record sets for host '{}'...", host);

    let mut found = HashMap::new();
    let mut cursor = Some(RecordSetCursor::start(host));

    while let Some(start) = cursor.take() {
        let page = api.list_record_sets(zone.id.clone(), start).await?;
        let mut past_host = false;

        for record_set in page.record_sets {
            // Listings are sorted by name starting at the host.
            if !record_set.name.eq_ignore_ascii_case(host) {
                past_host = true;
                break;
            }
            if !matches!(record_set.record_type, RecordType::A | RecordType::Aaaa) {
                continue;
            }
            if record_set.values.len() != 1 {
                tracing::warn!(
                    "Ignoring non-singular record set {} {} ({} entries)",
                    record_set.name,
                    record_set.record_type,
                    record_set.values.len()
                );
                continue;
            }

            tracing::info!(
                " {} {} {}",
                record_set.name,
                record_set.record_type,
                record_set.values[0]
            );
            found.insert(record_set.record_type.clone(), record_set);
        }

        if !past_host {
            cursor = page.next;
        }
    }

    tracing::info!("{} record set(s) found for host '{}'", found.len(), host);
    Ok(found)
}

/// Result of a committed merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing to change; the provider was not modified.
    Unchanged,
    /// Changes computed and logged, but not applied.
    Pretended(Vec<Change>),
    /// Changes applied as one batch.
    Applied {
        changes: Vec<Change>,
        change_info: ChangeInfo,
    },
}

/// Merger state before [`DnsMerger::prepare`].
#[derive(Debug, Default)]
pub struct Idle;

/// Merger state after [`DnsMerger::prepare`].
pub struct Prepared {
    host: String,
    credentials: Arc<dyn Credentials>,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
}

/// DNS record merge transaction.
pub struct DnsMerger<S> {
    connector: Arc<dyn Connector>,
    state: S,
}

impl DnsMerger<Idle> {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            state: Idle,
        }
    }

    /// Bind the merge to `host` and `credentials`. The provider is not contacted yet.
    pub fn prepare(
        self,
        credentials: Arc<dyn Credentials>,
        host: &str,
    ) -> Result<DnsMerger<Prepared>> {
        let host = normalize_host(host);
        if host.is_empty() {
            return Err(DdnsError::Usage("Host must not be empty".to_string()));
        }

        Ok(DnsMerger {
            connector: self.connector,
            state: Prepared {
                host: format!("{}.", host),
                credentials,
                ipv4: None,
                ipv6: None,
            },
        })
    }
}

impl DnsMerger<Prepared> {
    /// Fully qualified host, with trailing dot.
    pub fn host(&self) -> &str {
        &self.state.host
    }

    /// Buffer the IPv4 address; `None` leaves the A record untouched.
    pub fn merge_ipv4(&mut self, address: Option<Ipv4Addr>) {
        self.state.ipv4 = address;
    }

    /// Buffer the IPv6 address; `None` leaves the AAAA record untouched.
    pub fn merge_ipv6(&mut self, address: Option<Ipv6Addr>) {
        self.state.ipv6 = address;
    }

    /// Apply the buffered addresses (or only log them when `pretend` is set).
    pub async fn commit(self, pretend: bool) -> Result<CommitOutcome> {
        let Prepared {
            host,
            credentials,
            ipv4,
            ipv6,
        } = self.state;

        if ipv4.is_none() && ipv6.is_none() {
            tracing::debug!("No addresses to merge for host '{}'", host);
            return Ok(CommitOutcome::Unchanged);
        }

        let api = self.connector.connect(credentials.as_ref())?;
        let zone = lookup_zone(api.as_ref(), &host).await?;
        let current = lookup_record_sets(api.as_ref(), &zone, &host).await?;

        let mut changes = Vec::new();
        prepare_change(
            &mut changes,
            &current,
            RecordType::A,
            ipv4.map(|a| a.to_string()),
        );
        prepare_change(
            &mut changes,
            &current,
            RecordType::Aaaa,
            ipv6.map(|a| a.to_string()),
        );

        if changes.is_empty() {
            tracing::info!("No record sets to update for host '{}'", host);
            return Ok(CommitOutcome::Unchanged);
        }

        tracing::info!(
            "Updating {} record set(s) for zone '{}'...",
            changes.len(),
            zone.name
        );
        for change in &changes {
            tracing::info!(" {}", change);
        }

        if pretend {
            tracing::warn!("Updates not applied while in pretend mode");
            return Ok(CommitOutcome::Pretended(changes));
        }

        let change_info = api.submit_changes(zone.id.clone(), changes.clone()).await?;
        tracing::info!(
            "Update(s) applied (change id/status: {}/{})",
            change_info.id,
            change_info.status
        );

        Ok(CommitOutcome::Applied {
            changes,
            change_info,
        })
    }
}

/// Lower-cased host name without surrounding whitespace or trailing dot.
pub fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn prepare_change(
    changes: &mut Vec<Change>,
    current: &HashMap<RecordType, RecordSet>,
    record_type: RecordType,
    address: Option<String>,
) {
    let Some(address) = address else {
        return;
    };

    match current.get(&record_type) {
        Some(record_set) => changes.push(Change::upsert(record_set, address)),
        None => tracing::warn!(
            "Ignoring {} record update due to missing current record",
            record_type
        ),
    }
}
