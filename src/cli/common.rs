//! Shared plumbing for CLI commands.

use crate::config::LauncherConfig;
use crate::constants::NO_PROGRESS_ENV;
use crate::platform::{Platform, resolve_install_root};
use crate::progress::{ConsoleRenderer, LogRenderer, ProgressReceiver, ProgressRenderer, ProgressSink};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::debug;

/// Runtime settings derived from the global flags.
///
/// Passed to every command instead of being written to the process
/// environment, so tests can build one directly.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log progress as plain lines instead of drawing bars.
    pub no_progress: bool,

    /// Explicit configuration file.
    pub config_path: Option<PathBuf>,

    /// Explicit install root.
    pub install_dir: Option<PathBuf>,
}

impl CliConfig {
    /// Resolve the install root for `platform`.
    pub fn install_root(&self, platform: &dyn Platform) -> Result<PathBuf> {
        resolve_install_root(self.install_dir.as_deref(), platform)
    }

    /// Locate and load the launcher configuration for `install_root`.
    pub async fn load_launcher_config(&self, install_root: &Path) -> Result<LauncherConfig> {
        let path = LauncherConfig::locate(self.config_path.as_deref(), install_root);
        debug!("Loading configuration from {}", path.display());
        LauncherConfig::load_from(&path).await
    }

    /// Progress channel with its presenter running on a separate task.
    ///
    /// Drop every clone of the returned sink, then await the handle, to let
    /// the presenter finish its last frame.
    pub fn start_presenter(&self) -> (ProgressSink, JoinHandle<()>) {
        let (sink, receiver) = ProgressSink::channel();
        let renderer: Box<dyn ProgressRenderer> = if self.no_progress {
            Box::new(LogRenderer)
        } else {
            Box::new(ConsoleRenderer::new())
        };
        (sink, tokio::spawn(present(receiver, renderer)))
    }
}

async fn present(receiver: ProgressReceiver, renderer: Box<dyn ProgressRenderer>) {
    receiver.run(renderer.as_ref()).await;
}

/// Whether `PATCHLAUNCH_NO_PROGRESS` is set to a non-empty value.
#[must_use]
pub fn is_progress_disabled_by_env() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some_and(|v| !v.is_empty())
}
