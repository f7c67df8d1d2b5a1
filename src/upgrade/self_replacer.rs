//! Swapping the launcher's own executable.
//!
//! A running executable cannot simply be overwritten on every platform, but it
//! can be renamed. Replacement is therefore a two-step rename:
//!
//! ```text
//! 1. patchlaunch      → patchlaunch.old     (current moved aside)
//! 2. patchlaunch.new  → patchlaunch         (new one moved in)
//! ```
//!
//! If step 2 fails, step 1 is undone. At every point at least one of the
//! executable path and its `.old` sibling holds a launchable binary. The
//! `.old` file is deleted by [`SelfReplacer::cleanup_stale_self`] on the next
//! start, once the old process is gone.

use crate::constants::STALE_EXECUTABLE_SUFFIX;
use crate::core::LauncherError;
use crate::platform::Platform;
use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Replaces and relaunches the launcher executable.
#[derive(Debug, Clone)]
pub struct SelfReplacer {
    current_path: PathBuf,
    old_path: PathBuf,
}

impl SelfReplacer {
    /// Replacer for the executable at `executable_path`.
    ///
    /// The stale copy lives next to it with `.old` appended to the full file
    /// name (`patchlaunch.exe` → `patchlaunch.exe.old`).
    ///
    /// ```rust,no_run
    /// use patchlaunch::upgrade::SelfReplacer;
    /// use std::path::PathBuf;
    ///
    /// let replacer = SelfReplacer::new(PathBuf::from("/opt/game/patchlaunch"));
    /// assert_eq!(replacer.old_path(), std::path::Path::new("/opt/game/patchlaunch.old"));
    /// ```
    pub fn new(executable_path: PathBuf) -> Self {
        let mut old_path = executable_path.clone();
        old_path.set_file_name(format!(
            "{}{}",
            executable_path.file_name().unwrap_or_default().to_string_lossy(),
            STALE_EXECUTABLE_SUFFIX
        ));

        Self {
            current_path: executable_path,
            old_path,
        }
    }

    /// Path of the live executable.
    #[must_use]
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Path the previous executable is moved to.
    #[must_use]
    pub fn old_path(&self) -> &Path {
        &self.old_path
    }

    /// Move `new_exe` into place, keeping the previous executable at [`old_path`](Self::old_path).
    ///
    /// `new_exe` must be on the same filesystem as the current executable.
    ///
    /// # Errors
    ///
    /// [`LauncherError::SelfReplaceFailure`] naming the step that failed. When
    /// the second rename fails the first is rolled back before returning.
    pub async fn replace(&self, new_exe: &Path) -> Result<()> {
        self.clear_stale()
            .await
            .map_err(|e| self.failure("remove stale executable", &self.old_path, &e.to_string()))?;

        fs::rename(&self.current_path, &self.old_path)
            .await
            .map_err(|e| self.failure("move current executable aside", &self.current_path, &e.to_string()))?;
        debug!("Moved {} to {}", self.current_path.display(), self.old_path.display());

        if let Err(e) = fs::rename(new_exe, &self.current_path).await {
            let mut reason = e.to_string();
            if let Err(rollback) = fs::rename(&self.old_path, &self.current_path).await {
                warn!(
                    "Could not restore {} from {}: {}",
                    self.current_path.display(),
                    self.old_path.display(),
                    rollback
                );
                reason = format!("{reason}; previous executable left at {}", self.old_path.display());
            }
            return Err(self.failure("install new executable", new_exe, &reason).into());
        }

        info!("Replaced launcher executable {}", self.current_path.display());
        Ok(())
    }

    /// Start the (replaced) executable with `args` in `cwd`.
    ///
    /// The caller is expected to exit with status 0 right after.
    ///
    /// # Errors
    ///
    /// [`LauncherError::SelfReplaceFailure`] if the process cannot be started.
    pub fn relaunch(&self, platform: &dyn Platform, args: &[OsString], cwd: &Path) -> Result<()> {
        platform
            .spawn(&self.current_path, cwd, args)
            .map_err(|e| self.failure("relaunch", &self.current_path, &format!("{e:#}")))?;
        info!("Relaunched {}", self.current_path.display());
        Ok(())
    }

    /// [`replace`](Self::replace) followed by [`relaunch`](Self::relaunch).
    ///
    /// # Errors
    ///
    /// [`LauncherError::SelfReplaceFailure`] from either step.
    pub async fn replace_and_relaunch(
        &self,
        new_exe: &Path,
        platform: &dyn Platform,
        args: &[OsString],
        cwd: &Path,
    ) -> Result<()> {
        self.replace(new_exe).await?;
        self.relaunch(platform, args, cwd)
    }

    /// Free [`old_path`](Self::old_path) for the next replacement.
    ///
    /// # Errors
    ///
    /// The IO error if a leftover there cannot be removed. The live
    /// executable is not touched either way.
    pub async fn clear_stale(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.old_path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Delete a leftover `.old` executable. Never fails and is safe to call
    /// repeatedly.
    pub async fn cleanup_stale_self(&self) {
        match fs::remove_file(&self.old_path).await {
            Ok(()) => debug!("Removed stale executable {}", self.old_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove {}: {}", self.old_path.display(), e),
        }
    }

    fn failure(&self, operation: &str, path: &Path, reason: &str) -> LauncherError {
        LauncherError::SelfReplaceFailure {
            operation: operation.to_string(),
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}
