//! Per-OS behaviour behind one capability trait.
//!
//! Everything the update session does differently per operating system is
//! collected in [`Platform`]: which package artifact to download, where the
//! install root lives, how executables are named and made runnable, and how
//! processes are started. The session receives a `&dyn Platform`, so tests
//! can substitute their own.
//!
//! | Platform | Package artifact | Default install root |
//! |----------|------------------|----------------------|
//! | Linux | `Linux.tar.gz` | directory of the launcher executable |
//! | macOS | `MacOS.tar.gz` | `~/Library/Application Support/patchlaunch` |
//! | Windows | `Win64.zip` | directory of the launcher executable |

use crate::constants::INSTALL_DIR_ENV;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use tracing::debug;

/// OS-specific capabilities used by the launcher.
pub trait Platform: Send + Sync + fmt::Debug {
    /// Short platform name for logs.
    fn name(&self) -> &'static str;

    /// File name of the full package on the origin (`<origin>/<build>/<artifact>`).
    fn package_artifact(&self) -> &'static str;

    /// Install root used when none is configured.
    fn default_install_root(&self, launcher_exe: &Path) -> Result<PathBuf>;

    /// On-disk name of an executable called `stem`.
    fn executable_name(&self, stem: &str) -> String {
        stem.to_string()
    }

    /// Make a freshly written executable runnable.
    fn prepare_executable(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Start `program` in `cwd` with `args`, without waiting for it.
    fn spawn(&self, program: &Path, cwd: &Path, args: &[OsString]) -> Result<Child> {
        debug!("Spawning {} in {} with {:?}", program.display(), cwd.display(), args);
        Command::new(program)
            .current_dir(cwd)
            .args(args)
            .spawn()
            .with_context(|| format!("Failed to start {}", program.display()))
    }
}

/// Linux: `.tar.gz` packages installed next to the launcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxPlatform;

/// macOS: `.tar.gz` packages installed under Application Support.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacPlatform;

/// Windows: `.zip` packages installed next to the launcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsPlatform;

fn exe_dir(launcher_exe: &Path) -> Result<PathBuf> {
    launcher_exe
        .parent()
        .map(Path::to_path_buf)
        .with_context(|| format!("Launcher path {} has no parent directory", launcher_exe.display()))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn package_artifact(&self) -> &'static str {
        "Linux.tar.gz"
    }

    fn default_install_root(&self, launcher_exe: &Path) -> Result<PathBuf> {
        exe_dir(launcher_exe)
    }

    fn prepare_executable(&self, path: &Path) -> Result<()> {
        make_executable(path)
    }
}

impl Platform for MacPlatform {
    fn name(&self) -> &'static str {
        "macos"
    }

    fn package_artifact(&self) -> &'static str {
        "MacOS.tar.gz"
    }

    fn default_install_root(&self, _launcher_exe: &Path) -> Result<PathBuf> {
        dirs::data_dir().map(|p| p.join("patchlaunch")).ok_or_else(|| {
            anyhow::anyhow!(
                "Could not determine data directory.\n\nOn macOS: Check that the HOME environment variable is set"
            )
        })
    }

    fn prepare_executable(&self, path: &Path) -> Result<()> {
        make_executable(path)
    }
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn package_artifact(&self) -> &'static str {
        "Win64.zip"
    }

    fn default_install_root(&self, launcher_exe: &Path) -> Result<PathBuf> {
        exe_dir(launcher_exe)
    }

    fn executable_name(&self, stem: &str) -> String {
        if stem.to_ascii_lowercase().ends_with(".exe") {
            stem.to_string()
        } else {
            format!("{stem}.exe")
        }
    }
}

/// The platform this binary was built for.
#[must_use]
pub fn current_platform() -> &'static dyn Platform {
    if cfg!(windows) {
        &WindowsPlatform
    } else if cfg!(target_os = "macos") {
        &MacPlatform
    } else {
        &LinuxPlatform
    }
}

/// Path of the running launcher executable.
pub fn current_exe() -> Result<PathBuf> {
    std::env::current_exe().context("Failed to determine launcher executable path")
}

/// Install root from `--install-dir`, `PATCHLAUNCH_INSTALL_DIR`, or the platform default.
pub fn resolve_install_root(explicit: Option<&Path>, platform: &dyn Platform) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(INSTALL_DIR_ENV)
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    platform.default_install_root(&current_exe()?)
}
