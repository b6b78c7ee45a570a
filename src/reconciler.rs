//! One reconciliation run: inquire, decide, merge, record.

use crate::credentials::Credentials;
use crate::error::{DdnsError, Result};
use crate::inquirer::{AddressResult, CombinedInquirer};
use crate::merger::{normalize_host, CommitOutcome, Connector, DnsMerger};
use crate::status::{ForceTimeout, StatusStore, UpdateStatusCache};
use std::sync::Arc;

/// Inputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub host: String,
    pub ipv4: bool,
    pub ipv6: bool,
    pub pretend: bool,
    pub force_timeout: ForceTimeout,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Cached state matches the current addresses.
    UpToDate(AddressResult),
    /// Provider left untouched: no record set to apply to.
    Unchanged(AddressResult),
    /// Changes computed but not applied.
    Pretended(AddressResult),
    /// Provider updated and status recorded.
    Updated(AddressResult),
}

/// Wires inquirer, status cache and merger together.
pub struct Reconciler<S: StatusStore> {
    inquirer: CombinedInquirer,
    store: S,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn Credentials>,
}

impl<S: StatusStore> Reconciler<S> {
    pub fn new(
        inquirer: CombinedInquirer,
        store: S,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn Credentials>,
    ) -> Self {
        Self {
            inquirer,
            store,
            connector,
            credentials,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run one reconciliation.
    ///
    /// On any error the status is left as it was, so the next run retries.
    pub async fn run(&self, options: &RunOptions) -> Result<RunOutcome> {
        if !options.ipv4 && !options.ipv6 {
            return Err(DdnsError::Usage(
                "Both IPv4 and IPv6 are disabled; nothing to update".to_string(),
            ));
        }

        let host = normalize_host(&options.host);
        if host.is_empty() {
            return Err(DdnsError::Usage("Host must not be empty".to_string()));
        }

        tracing::info!("Updating host '{}'", host);

        let addresses = self.inquirer.query(options.ipv4, options.ipv6).await?;
        if addresses.is_empty() {
            tracing::warn!("No addresses found, nothing to update");
            return Ok(RunOutcome::Unchanged(addresses));
        }

        let mut cache = UpdateStatusCache::new(&self.store, &host);
        if !cache.is_update_required(addresses.ipv4, addresses.ipv6, options.force_timeout)? {
            return Ok(RunOutcome::UpToDate(addresses));
        }

        let mut merger =
            DnsMerger::new(self.connector.clone()).prepare(self.credentials.clone(), &host)?;
        merger.merge_ipv4(addresses.ipv4);
        merger.merge_ipv6(addresses.ipv6);

        match merger.commit(options.pretend).await? {
            CommitOutcome::Pretended(_) => Ok(RunOutcome::Pretended(addresses)),
            CommitOutcome::Unchanged => {
                if !options.pretend {
                    cache.commit()?;
                }
                Ok(RunOutcome::Unchanged(addresses))
            }
            CommitOutcome::Applied { .. } => {
                cache.commit()?;
                Ok(RunOutcome::Updated(addresses))
            }
        }
    }
}
