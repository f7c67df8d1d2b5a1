//! File system utilities used by the installer, patcher and version store.
//!
//! All writes that replace existing content go through [`atomic_write`] so a
//! crash leaves either the old or the new file on disk, never a torn one.
//!
//! # Examples
//!
//! ```rust,no_run
//! use patchlaunch::utils::fs::{atomic_write, contained_join, ensure_dir};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let root = Path::new("/opt/app");
//! ensure_dir(root)?;
//! if let Some(target) = contained_join(root, "bin/app") {
//!     atomic_write(&target, b"contents")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;
pub mod paths;

pub use atomic::atomic_write;
pub use dirs::{ensure_dir, ensure_parent_dir, sync_dir};
pub use paths::{contained_join, contained_join_resolved, normalize_path};
