//! Durable record of the installed package version.
//!
//! The [`VersionStore`] persists a [`VersionRecord`] as JSON in the install
//! root. The record is the only state that survives between launches, so it
//! carries a strict invariant: `local_version` names a build whose files are
//! completely on disk. The update session saves it once per finished stage
//! (full install or single patch hop), after that stage's writes, and never
//! before.
//!
//! Writes go through [`atomic_write`](crate::utils::fs::atomic_write), so a
//! crash during `save` leaves the previous record intact.
//!
//! # File Format
//!
//! ```json
//! {
//!   "local_version": 13,
//!   "origin_server_id": "https://cdn.example.com/nix",
//!   "updated_at": "2026-10-16T09:12:44Z"
//! }
//! ```

use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The locally installed build and the origin it was installed from.
///
/// The default record (`local_version == 0`, empty origin) stands for
/// "unknown": it never matches a configured origin, which forces a full
/// reinstall on first run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Build number of the installed package.
    pub local_version: u32,
    /// Origin identity the installed build came from.
    pub origin_server_id: String,
    /// When the record was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl VersionRecord {
    /// Record for `version` installed from `origin`, stamped with the current time.
    pub fn new(local_version: u32, origin: impl Into<String>) -> Self {
        Self {
            local_version,
            origin_server_id: origin.into(),
            updated_at: Some(Utc::now()),
        }
    }

    /// Whether this is the placeholder for a missing record.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.local_version == 0 && self.origin_server_id.is_empty()
    }
}

/// Loads and saves the [`VersionRecord`] file.
#[derive(Debug, Clone)]
pub struct VersionStore {
    path: PathBuf,
}

impl VersionStore {
    /// Store backed by the record file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Store for the default record location inside `install_root`.
    #[must_use]
    pub fn in_install_root(install_root: &Path) -> Self {
        Self::new(install_root.join(crate::constants::VERSION_FILE_NAME))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record.
    ///
    /// Never fails: a missing file yields the default record, and an
    /// unreadable or corrupt one is logged and treated the same way, which
    /// leads the planner to a full reinstall.
    #[must_use]
    pub fn load(&self) -> VersionRecord {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No version record at {}", self.path.display());
                return VersionRecord::default();
            }
            Err(e) => {
                warn!("Failed to read version record {}: {}", self.path.display(), e);
                return VersionRecord::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("Ignoring corrupt version record {}: {}", self.path.display(), e);
                VersionRecord::default()
            }
        }
    }

    /// Atomically replace the persisted record.
    pub fn save(&self, record: &VersionRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("Failed to serialize version record")?;
        atomic_write(&self.path, &json)
            .with_context(|| format!("Failed to write version record {}", self.path.display()))?;
        debug!(
            "Recorded version {} from {}",
            record.local_version, record.origin_server_id
        );
        Ok(())
    }

    /// Record `version` from `origin` as installed.
    pub fn record_installed(&self, version: u32, origin: &str) -> Result<VersionRecord> {
        let record = VersionRecord::new(version, origin);
        self.save(&record)?;
        Ok(record)
    }
}
