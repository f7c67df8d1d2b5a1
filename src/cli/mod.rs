//! Command-line interface for patchlaunch.
//!
//! The launcher is normally started with no arguments (from a desktop
//! shortcut or a script), which runs the default `run` command: update the
//! package, then start it. The other commands inspect an install without
//! touching it.
//!
//! # Available Commands
//!
//! - `run` (default) - Clean up, self-update, update the package, launch it
//! - `status` - Show the installed build recorded in `version.json`
//! - `plan` - Show what an update would do, without downloading anything
//!
//! # Global Options
//!
//! All commands support these global options:
//! - `--verbose` - Enable debug output
//! - `--quiet` - Only warnings and errors
//! - `--no-progress` - Plain log lines instead of progress bars
//! - `--config` - Path to `patchlaunch.toml`
//! - `--install-dir` - Install root to manage
//!
//! # Example
//!
//! ```bash
//! # Update and start the package, passing arguments through
//! patchlaunch -- --windowed
//!
//! # Start whatever is installed right now
//! patchlaunch run --skip-update
//!
//! # Inspect an install
//! patchlaunch --install-dir /opt/game status
//! patchlaunch plan --target 14
//! ```

pub mod common;
mod plan;
mod run;
mod status;


pub use common::CliConfig;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Top-level command-line interface.
///
/// With no subcommand the arguments of [`run::RunCommand`] are accepted
/// directly, so `patchlaunch -- ARGS` behaves like `patchlaunch run -- ARGS`.
#[derive(Parser, Debug)]
#[command(
    name = "patchlaunch",
    about = "Keep an installed application current with binary patches, then launch it",
    version,
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    /// The subcommand to execute. Defaults to `run`.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments of the implicit `run` command.
    #[command(flatten)]
    run: run::RunCommand,

    /// Enable debug output.
    ///
    /// Equivalent to `RUST_LOG=debug`. Mutually exclusive with `--quiet`.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the launcher configuration file.
    ///
    /// Defaults to `PATCHLAUNCH_CONFIG_PATH`, then `<install root>/patchlaunch.toml`.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Install root to manage.
    ///
    /// Defaults to `PATCHLAUNCH_INSTALL_DIR`, then the platform default (the
    /// launcher's own directory on Linux and Windows).
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Log plain lines instead of drawing progress bars.
    ///
    /// Also enabled by setting `PATCHLAUNCH_NO_PROGRESS`.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update the package and launch it (default).
    Run(run::RunCommand),

    /// Show the installed build.
    Status(status::StatusCommand),

    /// Show what an update would do.
    Plan(plan::PlanCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Build a [`CliConfig`] from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress || self.quiet || common::is_progress_disabled_by_env(),
            config_path: self.config.clone(),
            install_dir: self.install_dir.clone(),
        }
    }

    /// Install the global tracing subscriber, writing to stderr.
    ///
    /// `RUST_LOG` takes precedence over the verbosity flags.
    pub fn init_logging(&self) {
        let config = self.build_config();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    /// Execute with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Some(Commands::Run(cmd)) => cmd.execute(&config).await,
            Some(Commands::Status(cmd)) => cmd.execute(&config).await,
            Some(Commands::Plan(cmd)) => cmd.execute(&config).await,
            None => self.run.execute(&config).await,
        }
    }
}
