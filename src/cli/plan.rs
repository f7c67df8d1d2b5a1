//! Dry run of the update session.

use super::CliConfig;
use crate::channel::HttpReleaseChannels;
use crate::download::Downloader;
use crate::index::HttpPatchIndex;
use crate::planner::PlanDecision;
use crate::platform::current_platform;
use crate::session::{PlanReport, UpdateSession};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Print what `run` would do first, without downloading or writing anything.
#[derive(Args, Debug, Default)]
pub struct PlanCommand {
    /// Plan towards this build instead of the channel's current one.
    #[arg(long, value_name = "BUILD")]
    pub target: Option<u32>,
}

impl PlanCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let platform = current_platform();
        let install_root = cli.install_root(platform)?;
        let config = cli.load_launcher_config(&install_root).await?;

        let downloader = Downloader::new()?;
        let index = HttpPatchIndex::new(config.clone())?;
        let channels = HttpReleaseChannels::new(config.clone())?;
        let session = UpdateSession::new(&config, platform, &index, &channels, &downloader, &install_root)
            .with_target(self.target);

        print!("{}", render(&session.plan().await?));
        Ok(())
    }
}

fn render(report: &PlanReport) -> String {
    let installed = if report.record.is_unknown() {
        "none".to_string()
    } else {
        report.record.local_version.to_string()
    };

    let action = match &report.decision {
        PlanDecision::UpToDate => "nothing to do".green().to_string(),
        PlanDecision::FullReinstall(build) => format!("full install of build {build}").yellow().to_string(),
        PlanDecision::PatchChain(plan) => format!("apply {} patch(es): {}", plan.len(), plan),
        PlanDecision::Unreachable => "no patch path; would fall back to stable".red().to_string(),
    };

    format!(
        "{} {}\n{} {}\n{} {}\n{} {}\n",
        "Installed:".bold(),
        installed,
        "Stable:".bold(),
        report.stable,
        "Desired:".bold(),
        report.desired,
        "Action:".bold(),
        action
    )
}
