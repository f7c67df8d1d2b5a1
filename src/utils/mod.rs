//! Cross-platform utilities
//!
//! - [`fs`] - Atomic writes, directory creation and path containment checks

pub mod fs;

pub use fs::{atomic_write, contained_join, ensure_dir, normalize_path};
