//! Self-update of the launcher executable.
//!
//! The launcher keeps two things current: the package it launches (see
//! [`crate::session`]) and its own executable, handled here.
//!
//! # Components
//!
//! - [`SelfReplacer`]: the rename-based swap of the running executable, the
//!   relaunch, and cleanup of the `.old` copy on the next start
//! - [`LauncherUpdater`]: compares the running version with the published one
//!   (semver), downloads a newer build next to the executable, and hands it to
//!   the replacer
//!
//! # Update Process Flow
//!
//! ```text
//! startup
//!   ├── cleanup_stale_self()          delete patchlaunch.old, ignore errors
//!   ├── check()                       GET version_url, compare with CARGO_PKG_VERSION
//!   ├── stage()                       download to patchlaunch.new, chmod 755
//!   ├── replace()                     patchlaunch → .old, .new → patchlaunch
//!   └── relaunch() + exit(0)          new process does the rest
//! ```
//!
//! Everything up to `replace()` is best effort: a failed check or download is
//! logged and startup continues with the running executable. A failure inside
//! `replace()` is fatal, since relaunching a half-swapped executable is unsafe.

pub mod launcher_check;
pub mod self_replacer;

pub use launcher_check::{LauncherUpdater, SelfUpdateOutcome};
pub use self_replacer::SelfReplacer;
