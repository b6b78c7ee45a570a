//! # ddns-updater
//!
//! Keeps a Route53 host record in sync with the machine's public addresses.
//!
//! ## Features
//!
//! - Redundant public address lookup (ipify, ip6.me, custom services) with ordered fallback
//! - Per-host status cache so unchanged addresses never reach the provider
//! - Merges into existing single valued A/AAAA records only; never creates or deletes
//! - Pretend mode and forced refresh after a configurable age
//!
//! ## Usage
//!
//! ```bash
//! # Update the host (typically from cron)
//! ddns-updater --host home.example.org
//!
//! # Show what would change
//! ddns-updater --host home.example.org --pretend
//!
//! # Show cached and current addresses
//! ddns-updater --host home.example.org status
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod inquirer;
pub mod merger;
pub mod reconciler;
pub mod status;

pub use config::Config;
pub use error::{DdnsError, Result};
pub use inquirer::{AddressInquirer, AddressResult, CombinedInquirer};
pub use merger::DnsMerger;
pub use reconciler::{Reconciler, RunOptions, RunOutcome};
pub use status::{FileStatusStore, ForceTimeout, UpdateStatusCache};
