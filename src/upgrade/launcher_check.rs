//! Keeping the launcher itself up to date.

use super::SelfReplacer;
use crate::config::LauncherUpdateConfig;
use crate::constants::STAGED_EXECUTABLE_SUFFIX;
use crate::download::Downloader;
use crate::platform::Platform;
use crate::progress::ProgressSink;
use anyhow::{Context, Result};
use semver::Version;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of a launcher self-update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelfUpdateOutcome {
    /// The running launcher is the latest published one.
    Current,
    /// Checking, downloading, or clearing the stale copy failed; the running
    /// launcher carries on.
    Skipped,
    /// The executable was replaced with this version and started; the
    /// running process must exit.
    Relaunched(Version),
}

/// Checks for a newer launcher, stages it, and swaps it in.
#[derive(Debug)]
pub struct LauncherUpdater<'a> {
    config: &'a LauncherUpdateConfig,
    downloader: &'a Downloader,
    platform: &'a dyn Platform,
    replacer: SelfReplacer,
    current_version: Version,
}

impl<'a> LauncherUpdater<'a> {
    /// Updater for the launcher executable at `executable_path`.
    pub fn new(
        config: &'a LauncherUpdateConfig,
        downloader: &'a Downloader,
        platform: &'a dyn Platform,
        executable_path: PathBuf,
    ) -> Self {
        Self {
            config,
            downloader,
            platform,
            replacer: SelfReplacer::new(executable_path),
            current_version: Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0)),
        }
    }

    /// Compare against `version` instead of this build's own version.
    #[must_use]
    pub fn with_current_version(mut self, version: Version) -> Self {
        self.current_version = version;
        self
    }

    /// The replacer managing the executable path.
    #[must_use]
    pub const fn replacer(&self) -> &SelfReplacer {
        &self.replacer
    }

    /// Latest published version, if newer than the running one.
    pub async fn check(&self) -> Result<Option<Version>> {
        let body = self.downloader.fetch_text(&self.config.version_url, "check launcher version").await?;
        let raw = body.trim();
        let latest = Version::parse(raw.trim_start_matches('v'))
            .with_context(|| format!("Invalid launcher version '{raw}'"))?;

        debug!("Launcher {} running, {} published", self.current_version, latest);
        Ok((latest > self.current_version).then_some(latest))
    }

    /// Download `version` next to the running executable and make it runnable.
    pub async fn stage(&self, version: &Version, sink: &ProgressSink) -> Result<PathBuf> {
        let url = self.config.download_url.replace("{version}", &version.to_string());
        let staged = staged_path(self.replacer.current_path());

        sink.label(format!("Downloading launcher {version}"));
        let result = self
            .downloader
            .download_to(&url, &staged, &format!("download launcher {version}"), sink)
            .await
            .and_then(|_| self.platform.prepare_executable(&staged));

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&staged).await;
            return Err(e);
        }
        Ok(staged)
    }

    /// Check, stage, replace, and start the new launcher with `args` in `cwd`.
    ///
    /// Failures before the executable is touched are logged and reported as
    /// [`SelfUpdateOutcome::Skipped`].
    ///
    /// # Errors
    ///
    /// Only [`LauncherError::SelfReplaceFailure`](crate::core::LauncherError::SelfReplaceFailure)
    /// from the rename protocol or the relaunch.
    pub async fn update(&self, sink: &ProgressSink, args: &[OsString], cwd: &Path) -> Result<SelfUpdateOutcome> {
        let latest = match self.check().await {
            Ok(Some(latest)) => latest,
            Ok(None) => return Ok(SelfUpdateOutcome::Current),
            Err(e) => {
                warn!("Launcher update check failed: {:#}", e);
                return Ok(SelfUpdateOutcome::Skipped);
            }
        };

        info!("Updating launcher {} → {}", self.current_version, latest);
        let staged = match self.stage(&latest, sink).await {
            Ok(staged) => staged,
            Err(e) => {
                warn!("Launcher download failed: {:#}", e);
                return Ok(SelfUpdateOutcome::Skipped);
            }
        };

        if let Err(e) = self.replacer.clear_stale().await {
            warn!(
                "Cannot remove stale launcher {}, skipping update: {}",
                self.replacer.old_path().display(),
                e
            );
            let _ = tokio::fs::remove_file(&staged).await;
            return Ok(SelfUpdateOutcome::Skipped);
        }

        self.replacer.replace_and_relaunch(&staged, self.platform, args, cwd).await?;
        Ok(SelfUpdateOutcome::Relaunched(latest))
    }
}

fn staged_path(executable: &Path) -> PathBuf {
    let mut staged = executable.to_path_buf();
    staged.set_file_name(format!(
        "{}{}",
        executable.file_name().unwrap_or_default().to_string_lossy(),
        STAGED_EXECUTABLE_SUFFIX
    ));
    staged
}
