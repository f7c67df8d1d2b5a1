//! patchlaunch - keep an installed application current, then launch it
//!
//! A launcher that sits next to a packaged application (a game, an editor,
//! any self-contained build) and, every time it is started, brings the
//! installed build up to date from a static HTTP origin before starting it.
//!
//! # Architecture Overview
//!
//! Builds are identified by monotonically increasing integers. The origin
//! serves full packages and forward binary patches:
//!
//! ```text
//! <origin>/<build>/Linux.tar.gz          full package (Win64.zip, MacOS.tar.gz)
//! <origin>/<to>/<from>.patch             patch archive from one build to another
//! <origin>/channels/<stable|dev>         current build number of a channel
//! <index>?prefix=<to>/                   S3-style bucket listing of patches
//! ```
//!
//! The installed build and its origin are recorded in `version.json` under the
//! install root. On every start the launcher plans a route from the installed
//! build to the desired one, preferring a chain of patches and falling back
//! to a full install of the stable build.
//!
//! ## Key Features
//!
//! - **Patch chains**: multi-hop forward patching with bsdiff and xdelta deltas
//! - **Resumable**: the version record is saved after every hop
//! - **Safe extraction**: archive entries can never escape the install root
//! - **Self-update**: the launcher replaces its own executable by renaming
//! - **Cross-platform**: Linux, macOS and Windows artifacts and conventions
//!
//! # Core Modules
//!
//! ## Update pipeline
//! - [`session`] - Orchestrates one update, including the fallback policy
//! - [`planner`] - Chooses between up-to-date, patch chain and full reinstall
//! - [`index`] - Discovers which patches exist from a bucket listing
//! - [`channel`] - Resolves release channels to build numbers
//! - [`download`] - Streams artifacts to disk with progress
//! - [`installer`] - Extracts full packages
//! - [`patcher`] - Applies patch archives entry by entry
//! - [`archive`] - Zip and tar(.gz) reading shared by both
//!
//! ## Launcher
//! - [`cli`] - Command-line interface
//! - [`launch`] - Starts the installed package
//! - [`upgrade`] - Self-update of the launcher executable
//! - [`platform`] - Per-OS artifacts, paths and process spawning
//! - [`progress`] - Progress events and their presentation
//!
//! ## Supporting Modules
//! - [`config`] - `patchlaunch.toml`
//! - [`version`] - The installed-build record
//! - [`core`] - Error types and user-facing error formatting
//! - [`constants`] - Timeouts, file names, environment variables
//! - [`utils`] - Filesystem helpers
//!
//! # Configuration (patchlaunch.toml)
//!
//! ```toml
//! origin = "https://cdn.example.com/nightly"
//! channel = "dev"
//! package_dir = "app"
//! executable = "ChroMapper"
//!
//! [launcher]
//! version_url = "https://cdn.example.com/launcher/version"
//! download_url = "https://cdn.example.com/launcher/{version}/patchlaunch"
//! ```
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Update, then start the package with extra arguments
//! patchlaunch -- --windowed
//!
//! # Inspect the install
//! patchlaunch status
//! patchlaunch plan
//! ```

// Update pipeline
pub mod archive;
pub mod channel;
pub mod download;
pub mod index;
pub mod installer;
pub mod patcher;
pub mod planner;
pub mod session;

// Launcher
pub mod cli;
pub mod launch;
pub mod platform;
pub mod progress;
pub mod upgrade;

// Supporting modules
pub mod config;
pub mod constants;
pub mod core;
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
