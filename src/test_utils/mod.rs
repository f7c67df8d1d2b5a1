//! Test utilities for patchlaunch
//!
//! This module provides helpers shared by unit tests and the integration
//! suite:
//! - Once-guarded tracing setup that plays well with the test harness
//! - Archive fixtures (zip, tar.gz, tar) including hostile entry names
//! - Binary patch payloads for the bsdiff and xdelta codecs
//! - S3-style bucket listings for the patch index
//!
//! # Example
//!
//! ```rust,no_run
//! use patchlaunch::test_utils::fixtures::{ArchiveBuilder, FixtureEntry};
//!
//! # fn example(dir: &std::path::Path) -> anyhow::Result<()> {
//! let package = ArchiveBuilder::new()
//!     .entry(FixtureEntry::file("app/app", b"#!/bin/sh\necho hi\n").mode(0o755))
//!     .write_tar_gz(&dir.join("Linux.tar.gz"))?;
//! # Ok(())
//! # }
//! ```

pub mod fixtures;

pub use fixtures::{ArchiveBuilder, FixtureEntry, bucket_listing};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. Uses `level` when given, otherwise
/// `RUST_LOG`; with neither, tests run silently.
///
/// ```bash
/// RUST_LOG=patchlaunch=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
