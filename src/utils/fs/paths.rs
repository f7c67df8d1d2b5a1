//! Path normalization and containment checks.
//!
//! Archive entries name their destination with untrusted relative paths.
//! [`contained_join`] resolves such a name against a destination root and
//! refuses anything that would land outside it (zip-slip).

use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a path, resolving `.` and `..` components.
///
/// Does not touch the filesystem, so it works for paths that do not exist
/// yet. A `..` at the root is dropped, as the OS would.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {} // Skip .
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if components.is_empty() {
                    components.push(component);
                }
            }
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Joins an untrusted entry name onto `root` and returns the resulting path
/// only if it stays inside `root`.
///
/// `root` should already be canonical (absolute, symlinks resolved); the
/// joined path is normalized lexically because it usually does not exist yet.
/// Absolute entry names and names that climb out with `..` yield `None`.
/// Both `/` and `\` are accepted as separators in the entry name.
///
/// # Examples
///
/// ```rust
/// use patchlaunch::utils::fs::contained_join;
/// use std::path::Path;
///
/// let root = Path::new("/opt/app");
/// assert!(contained_join(root, "bin/tool").is_some());
/// assert!(contained_join(root, "../etc/passwd").is_none());
/// ```
#[must_use]
pub fn contained_join(root: &Path, entry: &str) -> Option<PathBuf> {
    let root = normalize_path(root);
    let relative: PathBuf = entry.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    if entry.starts_with(['/', '\\']) || relative.has_root() {
        return None;
    }

    let joined = normalize_path(&root.join(relative));
    joined.starts_with(&root).then_some(joined)
}

/// [`contained_join`], then also require the deepest existing ancestor of
/// the result to resolve inside `root` on disk.
///
/// This rejects entries routed through a directory symlink in the tree that
/// points elsewhere (`app/data -> /etc`). The final component is not followed;
/// writers replace a link there instead of writing through it.
#[must_use]
pub fn contained_join_resolved(root: &Path, entry: &str) -> Option<PathBuf> {
    let joined = contained_join(root, entry)?;
    let real_root = root.canonicalize().ok()?;

    let mut ancestor = joined.parent();
    while let Some(dir) = ancestor {
        if dir.symlink_metadata().is_ok() {
            let real = dir.canonicalize().ok()?;
            return real.starts_with(&real_root).then_some(joined);
        }
        ancestor = dir.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/foo/./bar/../baz")), PathBuf::from("/foo/baz"));
        assert_eq!(normalize_path(Path::new("/foo/bar/..")), PathBuf::from("/foo"));
        assert_eq!(normalize_path(Path::new("./foo/bar")), PathBuf::from("foo/bar"));
        assert_eq!(normalize_path(Path::new("/..")), PathBuf::from("/"));
    }

    #[test]
    fn test_contained_join_accepts_nested() {
        let root = Path::new("/opt/app");
        assert_eq!(contained_join(root, "pkg/bin/tool"), Some(PathBuf::from("/opt/app/pkg/bin/tool")));
        assert_eq!(contained_join(root, "pkg/./x/../y"), Some(PathBuf::from("/opt/app/pkg/y")));
        assert_eq!(contained_join(root, "pkg\\win\\file.dll"), Some(PathBuf::from("/opt/app/pkg/win/file.dll")));
    }

    #[test]
    fn test_contained_join_rejects_escape() {
        let root = Path::new("/opt/app");
        assert!(contained_join(root, "../outside").is_none());
        assert!(contained_join(root, "pkg/../../outside").is_none());
        assert!(contained_join(root, "/etc/passwd").is_none());
        assert!(contained_join(root, "\\windows\\system32").is_none());
    }

    #[test]
    fn test_contained_join_rejects_sibling_prefix() {
        // "/opt/app-evil" shares a string prefix with "/opt/app" but is not inside it
        let root = Path::new("/opt/app");
        assert!(contained_join(root, "../app-evil/file").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_contained_join_resolved_rejects_symlinked_directory() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("root");
        let outside = temp.path().join("outside");
        std::fs::create_dir_all(root.join("app")).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, root.join("app/data")).unwrap();
        let root = root.canonicalize().unwrap();

        assert!(contained_join_resolved(&root, "app/data/level.dat").is_none());
        assert!(contained_join_resolved(&root, "app/data/deeper/level.dat").is_none());
        assert_eq!(contained_join_resolved(&root, "app/level.dat"), Some(root.join("app/level.dat")));
        assert_eq!(contained_join_resolved(&root, "app/new/dir/file"), Some(root.join("app/new/dir/file")));
        // A link at the leaf is replaced by writers, not followed.
        assert!(contained_join_resolved(&root, "app/data").is_some());
    }

    #[test]
    fn test_contained_join_resolved_keeps_lexical_checks() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().canonicalize().unwrap();
        assert!(contained_join_resolved(&root, "../outside").is_none());
        assert!(contained_join_resolved(&root, "/etc/passwd").is_none());
    }
}
