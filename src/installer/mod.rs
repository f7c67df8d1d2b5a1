//! Full package installation.
//!
//! A full package is an archive whose entries are laid out relative to the
//! install root (typically everything sits under the `package_dir`
//! directory). Installing it overwrites files in place; nothing is removed.
//!
//! # Containment
//!
//! Entry names are untrusted. Each one is resolved against the canonicalized
//! install root with [`contained_join_resolved`], which also follows directory
//! links already in the tree. The first entry that would land outside the root
//! aborts the install with
//! [`LauncherError::SecurityViolation`] before anything is written for it.
//! Entries already extracted stay on disk; the caller does not advance the
//! version record, so the next run reinstalls.
//!
//! # Durability
//!
//! Every extracted file is synced before it is closed, and every directory
//! written into is synced before [`PackageInstaller::install_full`] returns.
//! The caller may record the build as installed right after.

use crate::archive::{EntryHeader, count_entries, visit_entries};
use crate::core::LauncherError;
use crate::progress::ProgressSink;
use crate::utils::fs::{contained_join_resolved, ensure_dir, ensure_parent_dir, sync_dir};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Counts of what an install wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallSummary {
    /// Regular files written.
    pub files: u64,
    /// Directory entries ensured.
    pub directories: u64,
}

/// Installs full packages into an install root.
#[derive(Debug, Clone)]
pub struct PackageInstaller {
    package_dir: String,
}

impl PackageInstaller {
    /// Installer for packages rooted at `package_dir`.
    ///
    /// `package_dir` is only used to shorten progress labels.
    pub fn new(package_dir: impl Into<String>) -> Self {
        Self {
            package_dir: package_dir.into(),
        }
    }

    /// Extract every entry of `archive` under `destination_root`.
    ///
    /// Reports `Extracting <name>` before each entry and the processed/total
    /// entry ratio after it.
    ///
    /// # Errors
    ///
    /// [`LauncherError::SecurityViolation`] for an escaping entry,
    /// [`LauncherError::ArchiveError`] for an unreadable archive, or the IO
    /// error of a failed write.
    pub fn install_full(
        &self,
        archive: &Path,
        destination_root: &Path,
        sink: &ProgressSink,
    ) -> Result<InstallSummary> {
        ensure_dir(destination_root)?;
        let root = destination_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve install root {}", destination_root.display()))?;

        let total = count_entries(archive)?;
        info!("Installing {} entries from {} into {}", total, archive.display(), root.display());

        let mut summary = InstallSummary::default();
        let mut processed = 0;
        let mut touched: BTreeSet<PathBuf> = BTreeSet::new();
        visit_entries(archive, |header, reader| {
            let target = contained_join_resolved(&root, &header.name).ok_or_else(|| LauncherError::SecurityViolation {
                entry: header.name.clone(),
                root: root.display().to_string(),
            })?;

            sink.label(format!("Extracting {}", self.display_name(&header.name)));
            if header.is_dir {
                ensure_dir(&target)?;
                summary.directories += 1;
            } else {
                write_entry(&target, header, reader)?;
                summary.files += 1;
            }
            if let Some(parent) = target.parent() {
                touched.insert(parent.to_path_buf());
            }

            processed += 1;
            sink.ratio(processed, total);
            Ok(())
        })?;

        for dir in &touched {
            sync_dir(dir)?;
        }
        debug!("Installed {} files and {} directories", summary.files, summary.directories);
        Ok(summary)
    }

    fn display_name<'n>(&self, name: &'n str) -> &'n str {
        let trimmed = name.trim_start_matches("./");
        trimmed
            .strip_prefix(self.package_dir.as_str())
            .and_then(|rest| rest.strip_prefix(['/', '\\']))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(trimmed)
    }
}

fn write_entry(target: &Path, header: &EntryHeader, reader: &mut dyn Read) -> Result<()> {
    ensure_parent_dir(target)?;

    // Never write through a link left behind in the install tree.
    if target.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink()) {
        std::fs::remove_file(target)
            .with_context(|| format!("Failed to remove symlink {}", target.display()))?;
    }

    let mut file =
        File::create(target).with_context(|| format!("Failed to create file {}", target.display()))?;
    io::copy(reader, &mut file).with_context(|| format!("Failed to extract {}", header.name))?;

    #[cfg(unix)]
    if let Some(mode) = header.mode.filter(|m| *m != 0) {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions on {}", target.display()))?;
    }

    file.sync_all().with_context(|| format!("Failed to sync {}", target.display()))?;
    Ok(())
}
