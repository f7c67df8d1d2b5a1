//! Applying one patch archive to an installed package.
//!
//! A patch archive moves an installation from one build to the next. Its
//! entries are keyed relative to the package directory, and a leading
//! segment selects how the payload is interpreted:
//!
//! | Key | Payload | On-disk target |
//! |-----|---------|----------------|
//! | `bsdiff/<path>` | bsdiff delta | `<root>/<package_dir>/<path>` |
//! | `xdelta/<path>` | VCDIFF delta | `<root>/<package_dir>/<path>` |
//! | `<path>` | new file content | `<root>/<package_dir>/<path>` |
//!
//! Deltas are applied against the file currently on disk and the result is
//! written atomically, so an interrupted patch never leaves a half-written
//! file behind. Entries are processed strictly in archive order; the first
//! failure stops the archive and later entries are not touched.

pub mod codec;

pub use codec::{BsdiffCodec, Codec, CodecRegistry, DiffCodec};

use crate::archive::visit_entries;
use crate::core::LauncherError;
use crate::progress::ProgressSink;
use crate::utils::fs::{atomic_write, contained_join_resolved, ensure_dir};
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// One entry of a patch archive, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEntry {
    /// Path relative to the package directory.
    pub relative_path: String,
    /// How the payload is encoded.
    pub codec: Codec,
}

impl PatchEntry {
    /// Classify an archive key.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        let key = key.trim_start_matches("./");
        if let Some((first, rest)) = key.split_once(['/', '\\'])
            && let Some(codec) = Codec::from_segment(first)
        {
            return Self {
                relative_path: rest.to_string(),
                codec,
            };
        }
        Self {
            relative_path: key.to_string(),
            codec: Codec::None,
        }
    }
}

/// Counts of what a patch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchSummary {
    /// Files reconstructed from a delta.
    pub patched: u64,
    /// Files written verbatim.
    pub written: u64,
}

/// Applies patch archives to an install root.
#[derive(Debug, Clone)]
pub struct PatchApplier {
    package_dir: String,
    codecs: CodecRegistry,
}

impl PatchApplier {
    /// Applier for packages installed under `package_dir`, with the default codecs.
    pub fn new(package_dir: impl Into<String>) -> Self {
        Self {
            package_dir: package_dir.into(),
            codecs: CodecRegistry::default(),
        }
    }

    /// Use `codecs` instead of the built-in registry.
    #[must_use]
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Apply every entry of `archive` to the package under `destination_root`.
    ///
    /// Progress is the fraction of the archive consumed, sampled before each
    /// entry is written, labelled `Patching <path>`.
    ///
    /// # Errors
    ///
    /// - [`LauncherError::PatchBaseMissing`] when a delta has no file to apply to
    /// - [`LauncherError::SecurityViolation`] when a key escapes the package directory
    /// - [`LauncherError::CodecFailure`] / [`LauncherError::UnsupportedCodec`]
    /// - [`LauncherError::ArchiveError`] for an unreadable archive
    pub fn apply_patch(
        &self,
        archive: &Path,
        destination_root: &Path,
        sink: &ProgressSink,
    ) -> Result<PatchSummary> {
        ensure_dir(destination_root)?;
        let root = destination_root
            .canonicalize()
            .with_context(|| format!("Failed to resolve install root {}", destination_root.display()))?;
        let package_root = root.join(&self.package_dir);
        ensure_dir(&package_root)?;
        info!("Applying {} to {}", archive.display(), package_root.display());

        let mut summary = PatchSummary::default();
        visit_entries(archive, |header, reader| {
            let entry = PatchEntry::from_key(&header.name);
            let target = contained_join_resolved(&package_root, &entry.relative_path).ok_or_else(|| {
                LauncherError::SecurityViolation {
                    entry: header.name.clone(),
                    root: package_root.display().to_string(),
                }
            })?;

            if header.is_dir {
                ensure_dir(&target)?;
                return Ok(());
            }

            sink.label(format!("Patching {}", entry.relative_path));
            sink.progress(header.consumed_fraction());

            let mut payload = Vec::new();
            reader
                .read_to_end(&mut payload)
                .with_context(|| format!("Failed to read patch entry {}", header.name))?;

            match entry.codec {
                Codec::None => {
                    atomic_write(&target, &payload)?;
                    restore_mode(&target, header.mode)?;
                    summary.written += 1;
                }
                codec => {
                    let patched = self.apply_delta(codec, &target, &payload)?;
                    atomic_write(&target, &patched)?;
                    summary.patched += 1;
                }
            }
            debug!("{} {}", entry.codec, target.display());
            Ok(())
        })?;

        sink.progress(1.0);
        debug!("Patched {} files, wrote {} files", summary.patched, summary.written);
        Ok(summary)
    }

    fn apply_delta(&self, codec: Codec, target: &Path, diff: &[u8]) -> Result<Vec<u8>> {
        let implementation = self.codecs.get(codec)?;

        let base = match std::fs::read(target) {
            Ok(base) => base,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LauncherError::PatchBaseMissing {
                    path: target.display().to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read patch base {}", target.display()));
            }
        };

        implementation.apply(&base, diff).map_err(|reason| {
            LauncherError::CodecFailure {
                codec: codec.to_string(),
                path: target.display().to_string(),
                reason,
            }
            .into()
        })
    }
}

#[cfg(unix)]
fn restore_mode(target: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode.filter(|m| *m != 0) {
        std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to set permissions on {}", target.display()))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_mode(_target: &Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
