//! Show the installed build.

use super::CliConfig;
use crate::platform::current_platform;
use crate::version::{VersionRecord, VersionStore};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

/// Print the version record of the install.
#[derive(Args, Debug, Default)]
pub struct StatusCommand {
    /// Print the record as JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let install_root = cli.install_root(current_platform())?;
        let store = VersionStore::in_install_root(&install_root);
        let record = store.load();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            print!("{}", render(&install_root, &record));
        }
        Ok(())
    }
}

fn render(install_root: &Path, record: &VersionRecord) -> String {
    let mut out = format!("{} {}\n", "Install root:".bold(), install_root.display());

    if record.is_unknown() {
        out.push_str(&format!("{} {}\n", "Installed build:".bold(), "none".yellow()));
        return out;
    }

    out.push_str(&format!("{} {}\n", "Installed build:".bold(), record.local_version.to_string().green()));
    out.push_str(&format!("{} {}\n", "Origin:".bold(), record.origin_server_id));
    if let Some(updated_at) = record.updated_at {
        out.push_str(&format!("{} {}\n", "Updated:".bold(), updated_at.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    out
}
