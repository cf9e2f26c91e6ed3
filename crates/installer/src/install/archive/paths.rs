//! Safe resolution of untrusted archive entry names

use std::path::{Component, Path, PathBuf};

use crate::install::error::{InstallError, Result};

/// Join `entry_name` onto `root`, rejecting anything that would land outside
/// of it
///
/// Backslashes are treated as separators. `..` is allowed only while it stays
/// within the entries already pushed; absolute names, drive prefixes and names
/// that collapse to the root itself are rejected.
pub fn resolve_entry_path(root: &Path, entry_name: &str) -> Result<PathBuf> {
    let normalized = entry_name.replace('\\', "/");
    let traversal = || InstallError::PathTraversal {
        entry: entry_name.to_string(),
        root: root.to_path_buf(),
    };

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(traversal());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(traversal()),
        }
    }

    // "C:" survives as a normal component on unix
    if parts.is_empty() || parts.iter().any(|p| p.to_string_lossy().contains(':')) {
        return Err(traversal());
    }

    let mut resolved = root.to_path_buf();
    resolved.extend(parts);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn plain_names_resolve_under_root() {
        let root = Path::new("/game/data");
        assert_eq!(resolve_entry_path(root, "a/b.pack").unwrap(), root.join("a").join("b.pack"));
        assert_eq!(resolve_entry_path(root, "./a\\b.pack").unwrap(), root.join("a").join("b.pack"));
        assert_eq!(resolve_entry_path(root, "a/../b.pack").unwrap(), root.join("b.pack"));
        assert_eq!(resolve_entry_path(root, "dir/").unwrap(), root.join("dir"));
    }

    #[test]
    fn escaping_names_are_rejected() {
        let root = Path::new("/game/data");
        for name in ["../../evil.txt", "a/../../evil", "/etc/passwd", "\\evil", "..", ".", "", "C:\\evil", "C:evil"] {
            let err = resolve_entry_path(root, name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::PathTraversal, "{name}");
        }
    }

    #[test]
    fn resolved_paths_are_descendants() {
        let root = Path::new("/r");
        let names = ["x", "a/b/c", "a/./b", "a/b/../c", "..a", "a..b/c"];
        for name in names {
            let path = resolve_entry_path(root, name).unwrap();
            assert!(path.starts_with(root) && path != root, "{name}");
        }
    }
}
