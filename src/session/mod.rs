//! The update session: bring the installed package to the desired build.
//!
//! One session runs per launch. It reads the [`VersionRecord`], resolves the
//! stable and desired builds, and then alternates planning and executing
//! until the package is current or a stage fails:
//!
//! ```text
//! load record ──▶ resolve channels ──▶ plan ──┬─ UpToDate ─────────────▶ done
//!                                             ├─ FullReinstall(stable) ─▶ install, save, re-plan
//!                                             ├─ PatchChain(plan) ──────▶ per hop: apply, save
//!                                             └─ Unreachable ───────────▶ fallback
//! ```
//!
//! # Bookkeeping
//!
//! The record is saved once per completed stage, after that stage's files are
//! written: once after a full install and once after every patch hop. A
//! failure mid-chain therefore leaves the record at the last hop that fully
//! applied, and the next launch resumes from there.
//!
//! # Failure policy
//!
//! A recoverable failure (network, missing patch path, missing patch base,
//! escaping archive entry, corrupt archive) ends the attempt. If the installed
//! build is not the stable one, a full install of stable is tried once; if
//! that fails too, the install is already on stable, or the failed stage was
//! that very install, the session is abandoned and whatever is installed gets
//! launched. Unrecoverable errors
//! (see [`LauncherError::is_recoverable`]) propagate.

use crate::channel::ReleaseChannels;
use crate::config::{LauncherConfig, ReleaseChannel};
use crate::core::{LauncherError, find_launcher_error};
use crate::download::Downloader;
use crate::index::PatchIndex;
use crate::installer::PackageInstaller;
use crate::patcher::PatchApplier;
use crate::planner::{PlanDecision, UpdatePlanner};
use crate::platform::Platform;
use crate::progress::ProgressSink;
use crate::version::{VersionRecord, VersionStore};
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a session ended. Each variant carries the build installed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The package was already at the desired build.
    UpToDate(u32),
    /// The package was brought to the desired build.
    Updated(u32),
    /// Updating failed and the stable build was installed instead.
    FellBackToStable(u32),
    /// Updating failed; the installed build is launched as is.
    Abandoned(u32),
}

impl SessionOutcome {
    /// Build installed when the session ended.
    #[must_use]
    pub const fn installed(self) -> u32 {
        match self {
            Self::UpToDate(v) | Self::Updated(v) | Self::FellBackToStable(v) | Self::Abandoned(v) => v,
        }
    }
}

/// Stage that was executing when [`UpdateSession::run`] stopped early.
#[derive(Debug, Clone, Copy)]
enum Stage {
    Planning,
    FullInstall(u32),
    Patch(u32, u32),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Planning => write!(f, "planning"),
            Self::FullInstall(version) => write!(f, "full install of build {version}"),
            Self::Patch(source, destination) => write!(f, "patch {source} -> {destination}"),
        }
    }
}

/// Dry-run view of what a session would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanReport {
    /// Current version record.
    pub record: VersionRecord,
    /// Build the stable channel points at.
    pub stable: u32,
    /// Build the session would aim for.
    pub desired: u32,
    /// First decision the planner makes.
    pub decision: PlanDecision,
}

/// Update orchestration for one launch.
pub struct UpdateSession<'a> {
    config: &'a LauncherConfig,
    platform: &'a dyn Platform,
    index: &'a dyn PatchIndex,
    channels: &'a dyn ReleaseChannels,
    downloader: &'a Downloader,
    install_root: PathBuf,
    store: VersionStore,
    installer: PackageInstaller,
    applier: PatchApplier,
    target: Option<u32>,
}

impl<'a> UpdateSession<'a> {
    /// Session updating the package installed under `install_root`.
    pub fn new(
        config: &'a LauncherConfig,
        platform: &'a dyn Platform,
        index: &'a dyn PatchIndex,
        channels: &'a dyn ReleaseChannels,
        downloader: &'a Downloader,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        let install_root = install_root.into();
        Self {
            config,
            platform,
            index,
            channels,
            downloader,
            store: VersionStore::in_install_root(&install_root),
            installer: PackageInstaller::new(config.package_dir.clone()),
            applier: PatchApplier::new(config.package_dir.clone()),
            install_root,
            target: None,
        }
    }

    /// Aim for `target` instead of the configured channel's build.
    #[must_use]
    pub const fn with_target(mut self, target: Option<u32>) -> Self {
        self.target = target;
        self
    }

    /// Install root this session writes to.
    #[must_use]
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Version record store of this install.
    #[must_use]
    pub const fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Run the session to completion.
    ///
    /// # Errors
    ///
    /// Only unrecoverable errors; everything else ends in
    /// [`SessionOutcome::FellBackToStable`] or [`SessionOutcome::Abandoned`].
    pub async fn run(&self, sink: &ProgressSink) -> Result<SessionOutcome> {
        let record = self.store.load();
        let mut current = record.local_version;
        let mut origin = record.origin_server_id;

        let (stable, desired) = match self.resolve_targets().await {
            Ok(targets) => targets,
            Err(e) => {
                warn!("Could not resolve release channels, skipping update: {:#}", e);
                return Ok(SessionOutcome::Abandoned(current));
            }
        };
        info!("Installed build {}, desired {}, stable {}", current, desired, stable);

        let (stage, error) = match self.advance(&mut current, &mut origin, desired, stable, sink).await {
            Ok(true) => return Ok(SessionOutcome::Updated(current)),
            Ok(false) => return Ok(SessionOutcome::UpToDate(current)),
            Err(failure) => failure,
        };

        if !is_recoverable(&error) {
            return Err(error);
        }
        warn!("Update to build {} failed during {}: {:#}", desired, stage, error);

        if matches!(stage, Stage::FullInstall(version) if version == stable) {
            debug!("Full install of stable build {} already failed, abandoning update", stable);
            return Ok(SessionOutcome::Abandoned(current));
        }
        if current == stable && origin == self.config.origin_id() {
            debug!("Already on stable build {}, abandoning update", stable);
            return Ok(SessionOutcome::Abandoned(current));
        }

        info!("Falling back to a full install of stable build {}", stable);
        match self.install_full(stable, sink).await {
            Ok(()) => Ok(SessionOutcome::FellBackToStable(stable)),
            Err(e) if is_recoverable(&e) => {
                warn!("Fallback install of build {} failed: {:#}", stable, e);
                Ok(SessionOutcome::Abandoned(current))
            }
            Err(e) => Err(e),
        }
    }

    /// Work out what [`run`](Self::run) would do first, without changing anything.
    pub async fn plan(&self) -> Result<PlanReport> {
        let record = self.store.load();
        let (stable, desired) = self.resolve_targets().await?;
        let decision = UpdatePlanner::new(self.index)
            .plan(record.local_version, desired, &record.origin_server_id, self.config.origin_id(), stable)
            .await?;

        Ok(PlanReport {
            record,
            stable,
            desired,
            decision,
        })
    }

    async fn resolve_targets(&self) -> Result<(u32, u32)> {
        let stable = self.channels.latest(ReleaseChannel::Stable).await?;
        let desired = match (self.target, self.config.channel) {
            (Some(target), _) => target,
            (None, ReleaseChannel::Stable) => stable,
            (None, channel) => self.channels.latest(channel).await?,
        };
        Ok((stable, desired))
    }

    /// Plan and execute until `desired` is installed. Returns whether
    /// anything changed, or the stage that failed. `current` and `origin`
    /// always reflect the last completed stage, also on error.
    async fn advance(
        &self,
        current: &mut u32,
        origin: &mut String,
        desired: u32,
        stable: u32,
        sink: &ProgressSink,
    ) -> std::result::Result<bool, (Stage, anyhow::Error)> {
        let planner = UpdatePlanner::new(self.index);
        let expected_origin = self.config.origin_id();
        let mut changed = false;

        loop {
            let decision = planner
                .plan(*current, desired, origin, expected_origin, stable)
                .await
                .map_err(|e| (Stage::Planning, e))?;
            info!("Plan: {}", decision);

            match decision {
                PlanDecision::UpToDate => return Ok(changed),
                PlanDecision::FullReinstall(version) => {
                    self.install_full(version, sink)
                        .await
                        .map_err(|e| (Stage::FullInstall(version), e))?;
                    *current = version;
                    *origin = expected_origin.to_string();
                    changed = true;
                    if *current >= desired {
                        return Ok(changed);
                    }
                }
                PlanDecision::PatchChain(plan) => {
                    for (source, destination) in plan.steps(*current) {
                        self.apply_hop(source, destination, sink)
                            .await
                            .map_err(|e| (Stage::Patch(source, destination), e))?;
                        *current = destination;
                        changed = true;
                    }
                    return Ok(changed);
                }
                PlanDecision::Unreachable => {
                    let error = LauncherError::ChainUnreachable {
                        current: *current,
                        desired,
                    };
                    return Err((Stage::Planning, error.into()));
                }
            }
        }
    }

    async fn install_full(&self, version: u32, sink: &ProgressSink) -> Result<()> {
        let url = self.config.package_url(version, self.platform.package_artifact());
        sink.label(format!("Downloading build {version}"));
        let archive = self.downloader.download_temp(&url, &format!("download build {version}"), sink).await?;

        sink.label(format!("Installing build {version}"));
        let installer = self.installer.clone();
        let path = archive.path().to_path_buf();
        let root = self.install_root.clone();
        let task_sink = sink.clone();
        tokio::task::spawn_blocking(move || installer.install_full(&path, &root, &task_sink))
            .await
            .context("Install task failed")??;
        drop(archive);

        self.store.record_installed(version, self.config.origin_id())?;
        info!("Installed build {}", version);
        Ok(())
    }

    async fn apply_hop(&self, source: u32, destination: u32, sink: &ProgressSink) -> Result<()> {
        let url = self.config.patch_url(source, destination);
        sink.label(format!("Downloading patch {source} -> {destination}"));
        let archive = self
            .downloader
            .download_temp(&url, &format!("download patch {source} -> {destination}"), sink)
            .await?;

        sink.label(format!("Applying patch {source} -> {destination}"));
        let applier = self.applier.clone();
        let path = archive.path().to_path_buf();
        let root = self.install_root.clone();
        let task_sink = sink.clone();
        tokio::task::spawn_blocking(move || applier.apply_patch(&path, &root, &task_sink))
            .await
            .context("Patch task failed")??;
        drop(archive);

        self.store.record_installed(destination, self.config.origin_id())?;
        info!("Patched {} → {}", source, destination);
        Ok(())
    }
}

fn is_recoverable(error: &anyhow::Error) -> bool {
    find_launcher_error(error).is_none_or(LauncherError::is_recoverable)
}

impl fmt::Debug for UpdateSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSession")
            .field("install_root", &self.install_root)
            .field("platform", &self.platform)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
