//! Per-host record of the last applied addresses.
//!
//! The cache decides whether a run has to touch the provider at all. It is
//! read lazily on first use and written back only after a successful commit.

use crate::error::{DdnsError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Last applied state of one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub host: String,
    #[serde(default)]
    pub ipv4: Option<String>,
    #[serde(default)]
    pub ipv6: Option<String>,
    /// Epoch millis of the last successful update.
    #[serde(default)]
    pub last_update: i64,
}

impl HostStatus {
    /// Status of a host that was never updated.
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ipv4: None,
            ipv6: None,
            last_update: 0,
        }
    }
}

/// When an update is forced regardless of address changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceTimeout {
    /// Every run updates.
    Always,
    /// Update once the last update is at least this old.
    After(Duration),
}

impl ForceTimeout {
    fn is_elapsed(&self, last_update: i64, now: DateTime<Utc>) -> bool {
        match self {
            ForceTimeout::Always => true,
            ForceTimeout::After(timeout) => {
                now.timestamp_millis() - last_update >= timeout.num_milliseconds()
            }
        }
    }
}

/// Persistent host status storage.
pub trait StatusStore {
    /// Load a host's status; `None` on the first run for this host.
    fn load(&self, host: &str) -> Result<Option<HostStatus>>;

    /// Persist a host's status atomically.
    fn save(&self, status: &HostStatus) -> Result<()>;
}

/// JSON file holding the status of every host.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, HostStatus>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            DdnsError::Persistence(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            DdnsError::Persistence(format!("Corrupt status file {}: {}", self.path.display(), e))
        })
    }

    fn write_all(&self, statuses: &HashMap<String, HostStatus>) -> Result<()> {
        let persistence = |e: std::io::Error| write_error(&self.path, e);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(persistence)?;
            }
        }

        let content =
            serde_json::to_string_pretty(statuses).map_err(|e| write_error(&self.path, e))?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = std::fs::File::create(&temp_path).map_err(persistence)?;
        file.write_all(content.as_bytes()).map_err(persistence)?;
        file.sync_all().map_err(persistence)?;
        drop(file);

        std::fs::rename(&temp_path, &self.path).map_err(persistence)?;
        Ok(())
    }
}

fn write_error(path: &Path, e: impl fmt::Display) -> DdnsError {
    DdnsError::Persistence(format!("Failed to write {}: {}", path.display(), e))
}

impl StatusStore for FileStatusStore {
    fn load(&self, host: &str) -> Result<Option<HostStatus>> {
        Ok(self.read_all()?.remove(host))
    }

    fn save(&self, status: &HostStatus) -> Result<()> {
        let mut statuses = self.read_all()?;
        statuses.insert(status.host.clone(), status.clone());
        self.write_all(&statuses)
    }
}

/// In-memory store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    statuses: Mutex<HashMap<String, HostStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusStore for MemoryStatusStore {
    fn load(&self, host: &str) -> Result<Option<HostStatus>> {
        let statuses = self
            .statuses
            .lock()
            .map_err(|e| DdnsError::Persistence(e.to_string()))?;
        Ok(statuses.get(host).cloned())
    }

    fn save(&self, status: &HostStatus) -> Result<()> {
        let mut statuses = self
            .statuses
            .lock()
            .map_err(|e| DdnsError::Persistence(e.to_string()))?;
        statuses.insert(status.host.clone(), status.clone());
        Ok(())
    }
}

/// Update decision and write-back for one host.
pub struct UpdateStatusCache<'a, S: StatusStore + ?Sized> {
    store: &'a S,
    host: String,
    status: Option<HostStatus>,
    staged_ipv4: Option<String>,
    staged_ipv6: Option<String>,
}

impl<'a, S: StatusStore + ?Sized> UpdateStatusCache<'a, S> {
    pub fn new(store: &'a S, host: &str) -> Self {
        Self {
            store,
            host: host.to_string(),
            status: None,
            staged_ipv4: None,
            staged_ipv6: None,
        }
    }

    /// The cached status, loaded on first access.
    pub fn status(&mut self) -> Result<&HostStatus> {
        let status = match self.status.take() {
            Some(status) => status,
            None => self.store.load(&self.host)?.unwrap_or_else(|| {
                tracing::debug!("No status recorded yet for host '{}'", self.host);
                HostStatus::new(&self.host)
            }),
        };
        Ok(self.status.insert(status))
    }

    /// Decide whether the provider needs updating, staging the supplied addresses.
    pub fn is_update_required(
        &mut self,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
        force_timeout: ForceTimeout,
    ) -> Result<bool> {
        self.is_update_required_at(ipv4, ipv6, force_timeout, Utc::now())
    }

    pub(crate) fn is_update_required_at(
        &mut self,
        ipv4: Option<Ipv4Addr>,
        ipv6: Option<Ipv6Addr>,
        force_timeout: ForceTimeout,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let status = self.status()?.clone();
        let mut required = false;

        if force_timeout.is_elapsed(status.last_update, now) {
            tracing::info!("Last update is outdated; forcing update");
            required = true;
        }

        if let Some(address) = ipv4 {
            let current = address.to_string();
            if status.ipv4.as_deref() != Some(current.as_str()) {
                tracing::info!("IPv4 has changed; triggering update");
                required = true;
            }
            self.staged_ipv4 = Some(current);
        }

        if let Some(address) = ipv6 {
            let current = address.to_string();
            if status.ipv6.as_deref() != Some(current.as_str()) {
                tracing::info!("IPv6 has changed; triggering update");
                required = true;
            }
            self.staged_ipv6 = Some(current);
        }

        if !required {
            tracing::info!("DNS up-to-date; no update required");
        }
        Ok(required)
    }

    /// Record the staged addresses as applied now and flush the store.
    pub fn commit(&mut self) -> Result<HostStatus> {
        self.commit_at(Utc::now())
    }

    pub(crate) fn commit_at(&mut self, now: DateTime<Utc>) -> Result<HostStatus> {
        let mut status = self.status()?.clone();

        status.last_update = now.timestamp_millis();
        if let Some(ipv4) = self.staged_ipv4.take() {
            status.ipv4 = Some(ipv4);
        }
        if let Some(ipv6) = self.staged_ipv6.take() {
            status.ipv6 = Some(ipv6);
        }

        self.store.save(&status)?;
        tracing::debug!("Status for host '{}' flushed", self.host);
        self.status = Some(status.clone());
        Ok(status)
    }
}
