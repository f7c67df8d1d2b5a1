//! Starting the installed package.
//!
//! The package executable lives at `<install root>/<package_dir>/<executable>`
//! and is started with that directory as its working directory. Unless
//! `forward_launcher_path` is off, the launcher passes its own path first so
//! the package can restart it:
//!
//! ```text
//! <root>/app/app --launcher /opt/game/patchlaunch <forwarded args...>
//! ```

use crate::config::LauncherConfig;
use crate::constants::LAUNCHER_ARG;
use crate::platform::Platform;
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Child;
use tracing::info;

/// Program, working directory and arguments of a package launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Package executable.
    pub program: PathBuf,
    /// Working directory, the package directory.
    pub cwd: PathBuf,
    /// Full argument list.
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    /// Command starting the package configured in `config`.
    pub fn for_package(
        config: &LauncherConfig,
        platform: &dyn Platform,
        install_root: &Path,
        launcher_exe: &Path,
        forwarded: &[OsString],
    ) -> Self {
        let cwd = install_root.join(&config.package_dir);
        let program = cwd.join(platform.executable_name(&config.executable));

        let mut args = Vec::with_capacity(forwarded.len() + 2);
        if config.forward_launcher_path {
            args.push(OsString::from(LAUNCHER_ARG));
            args.push(launcher_exe.as_os_str().to_os_string());
        }
        args.extend(forwarded.iter().cloned());

        Self {
            program,
            cwd,
            args,
        }
    }
}

/// Make the package executable runnable and start it without waiting.
///
/// # Errors
///
/// Fails if the executable is missing or cannot be started.
pub fn launch_package(
    config: &LauncherConfig,
    platform: &dyn Platform,
    install_root: &Path,
    launcher_exe: &Path,
    forwarded: &[OsString],
) -> Result<Child> {
    let command = LaunchCommand::for_package(config, platform, install_root, launcher_exe, forwarded);

    if !command.program.is_file() {
        anyhow::bail!(
            "Package executable {} not found; run without --skip-update to install it",
            command.program.display()
        );
    }

    platform.prepare_executable(&command.program)?;
    let child = platform
        .spawn(&command.program, &command.cwd, &command.args)
        .with_context(|| format!("Failed to launch {}", config.executable))?;

    info!("Launched {} (pid {})", command.program.display(), child.id());
    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{LinuxPlatform, WindowsPlatform};
    use tempfile::tempdir;

    fn config() -> LauncherConfig {
        let mut config = LauncherConfig::new("https://cdn.example.com");
        config.executable = "ChroMapper".to_string();
        config
    }

    #[test]
    fn test_launcher_path_comes_first() {
        let command = LaunchCommand::for_package(
            &config(),
            &LinuxPlatform,
            Path::new("/opt/game"),
            Path::new("/opt/game/patchlaunch"),
            &[OsString::from("--windowed")],
        );

        assert_eq!(command.program, PathBuf::from("/opt/game/app/ChroMapper"));
        assert_eq!(command.cwd, PathBuf::from("/opt/game/app"));
        assert_eq!(
            command.args,
            vec![
                OsString::from("--launcher"),
                OsString::from("/opt/game/patchlaunch"),
                OsString::from("--windowed"),
            ]
        );
    }

    #[test]
    fn test_forwarding_can_be_disabled() {
        let mut config = config();
        config.forward_launcher_path = false;

        let command =
            LaunchCommand::for_package(&config, &WindowsPlatform, Path::new("C:/Game"), Path::new("C:/Game/pl.exe"), &[]);

        assert!(command.args.is_empty());
        assert_eq!(command.program, Path::new("C:/Game").join("app").join("ChroMapper.exe"));
    }

    #[test]
    fn test_missing_executable_is_reported() {
        let temp = tempdir().unwrap();
        let err = launch_package(&config(), &LinuxPlatform, temp.path(), Path::new("/usr/bin/patchlaunch"), &[])
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_runs_in_package_dir() {
        let temp = tempdir().unwrap();
        let package = temp.path().join("app");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(package.join("ChroMapper"), "#!/bin/sh\npwd > cwd.txt\necho \"$@\" > args.txt\n").unwrap();

        let mut child = launch_package(
            &config(),
            &LinuxPlatform,
            temp.path(),
            Path::new("/usr/bin/patchlaunch"),
            &[OsString::from("extra")],
        )
        .unwrap();
        assert!(child.wait().unwrap().success());

        let args = std::fs::read_to_string(package.join("args.txt")).unwrap();
        assert_eq!(args.trim(), "--launcher /usr/bin/patchlaunch extra");
        let cwd = std::fs::read_to_string(package.join("cwd.txt")).unwrap();
        assert_eq!(PathBuf::from(cwd.trim()).canonicalize().unwrap(), package.canonicalize().unwrap());
    }
}
