//! Core types shared by every stage of the launcher.
//!
//! The core module holds the error system: the strongly-typed
//! [`LauncherError`] used by the update session to pick between fallback and
//! fatal handling, and [`ErrorContext`] for the few errors that are shown to
//! the user.
//!
//! ```rust
//! use patchlaunch::core::{LauncherError, find_launcher_error};
//! use anyhow::Context;
//!
//! let result: anyhow::Result<()> = Err(LauncherError::ChainUnreachable {
//!     current: 5,
//!     desired: 20,
//! })
//! .context("planning failed");
//!
//! let err = result.unwrap_err();
//! assert!(find_launcher_error(&err).is_some_and(LauncherError::is_recoverable));
//! ```

pub mod error;

pub use error::{ErrorContext, LauncherError, find_launcher_error, user_friendly_error};
