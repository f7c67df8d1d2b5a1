//! The default command: update, then launch.

use super::CliConfig;
use crate::channel::HttpReleaseChannels;
use crate::config::LauncherConfig;
use crate::download::Downloader;
use crate::index::HttpPatchIndex;
use crate::launch::launch_package;
use crate::platform::{Platform, current_exe, current_platform};
use crate::progress::ProgressSink;
use crate::session::{SessionOutcome, UpdateSession};
use crate::upgrade::{LauncherUpdater, SelfReplacer, SelfUpdateOutcome};
use anyhow::{Context, Result};
use clap::Args;
use std::ffi::OsString;
use std::path::Path;
use tracing::{debug, info, warn};

/// Update the package and launch it.
///
/// Startup order:
///
/// 1. Delete the `.old` executable left by a previous self-update
/// 2. Replace the launcher itself if a newer one is published, relaunch
/// 3. Run the update session for the package
/// 4. Start the package and exit
#[derive(Args, Debug, Default, Clone)]
pub struct RunCommand {
    /// Launch the installed package without checking for updates.
    #[arg(long)]
    pub skip_update: bool,

    /// Update to this build instead of the channel's current one.
    #[arg(long, value_name = "BUILD")]
    pub target: Option<u32>,

    /// Arguments passed through to the package, after `--`.
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<OsString>,
}

/// What happened before the package launch.
enum Startup {
    /// A replaced launcher was started; this process must exit.
    Relaunched,
    /// Launch the package.
    Ready,
}

impl RunCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let platform = current_platform();
        let launcher_exe = current_exe()?;
        let install_root = cli.install_root(platform)?;
        let config = cli.load_launcher_config(&install_root).await?;
        debug!("Using install root {} on {}", install_root.display(), platform.name());

        SelfReplacer::new(launcher_exe.clone()).cleanup_stale_self().await;

        let (sink, presenter) = cli.start_presenter();
        let startup = self.prepare(&config, platform, &launcher_exe, &install_root, &sink).await;
        drop(sink);
        if let Err(e) = presenter.await {
            debug!("Progress presenter ended abnormally: {}", e);
        }

        match startup? {
            Startup::Relaunched => Ok(()),
            Startup::Ready => {
                launch_package(&config, platform, &install_root, &launcher_exe, &self.args)?;
                Ok(())
            }
        }
    }

    async fn prepare(
        &self,
        config: &LauncherConfig,
        platform: &dyn Platform,
        launcher_exe: &Path,
        install_root: &Path,
        sink: &ProgressSink,
    ) -> Result<Startup> {
        if self.skip_update {
            info!("Skipping update");
            return Ok(Startup::Ready);
        }

        let downloader = Downloader::new()?;

        if let Some(update_config) = &config.launcher {
            let updater = LauncherUpdater::new(update_config, &downloader, platform, launcher_exe.to_path_buf());
            let args: Vec<OsString> = std::env::args_os().skip(1).collect();
            let cwd = std::env::current_dir().context("Failed to determine working directory")?;
            if let SelfUpdateOutcome::Relaunched(version) = updater.update(sink, &args, &cwd).await? {
                info!("Launcher updated to {}, restarted", version);
                return Ok(Startup::Relaunched);
            }
        }

        let index = HttpPatchIndex::new(config.clone())?;
        let channels = HttpReleaseChannels::new(config.clone())?;
        let session = UpdateSession::new(config, platform, &index, &channels, &downloader, install_root)
            .with_target(self.target);

        match session.run(sink).await? {
            SessionOutcome::UpToDate(build) => info!("Build {} is up to date", build),
            SessionOutcome::Updated(build) => info!("Updated to build {}", build),
            SessionOutcome::FellBackToStable(build) => warn!("Update failed, installed stable build {}", build),
            SessionOutcome::Abandoned(build) => warn!("Update failed, launching installed build {}", build),
        }
        Ok(Startup::Ready)
    }
}
