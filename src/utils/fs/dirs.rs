//! Directory creation helpers.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Ensures a directory exists, creating it and all parents if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or if the path exists
/// but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Flushes the entries of directory `path` to disk, so files created or
/// renamed in it survive a crash.
///
/// A no-op on platforms that cannot open directories for syncing.
pub fn sync_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    fs::File::open(path)
        .and_then(|dir| dir.sync_all())
        .with_context(|| format!("Failed to sync directory: {}", path.display()))?;
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

/// Ensures the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_nested() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("x").join("y");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
        // Second call is a no-op
        ensure_dir(&nested).unwrap();
    }

    #[test]
    fn test_ensure_dir_on_file_fails() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(ensure_dir(&file).is_err());
    }

    #[test]
    fn test_sync_dir() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("file"), "x").unwrap();
        sync_dir(temp.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_missing_dir_fails() {
        let temp = tempdir().unwrap();
        assert!(sync_dir(&temp.path().join("missing")).is_err());
    }

    #[test]
    fn test_ensure_parent_dir() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("p").join("file.txt");
        ensure_parent_dir(&file).unwrap();
        assert!(temp.path().join("p").is_dir());
    }
}
