// src/path_guard.rs
// Confines every tool-visible path to a workspace root (C1).

use std::path::{Path, PathBuf};

use crate::error::PathGuardError;

/// Resolves `path` against `root`, expanding `~`, collapsing `.`/`..`, and
/// following existing symlinks, then verifies the canonical result still
/// lives under the canonical `root`. Every tool handler that touches the
/// filesystem calls this before any I/O.
pub fn resolve(path: &str, root: &Path) -> Result<PathBuf, PathGuardError> {
    let expanded = expand_home(path);

    let canonical_root = root
        .canonicalize()
        .map_err(PathGuardError::Canonicalize)?;

    let candidate = if expanded.is_absolute() {
        expanded
    } else {
        canonical_root.join(expanded)
    };

    // Collapse `.`/`..` lexically first, over the *whole* path (including the
    // root's own components): a `..` that walks past the root must be caught
    // even when the intervening directory does not exist on disk.
    let lexical = normalize_lexically(&candidate);

    // Then resolve symlinks for whatever prefix of that lexical path actually
    // exists; a `write_file` to a not-yet-created path is the common case
    // that never fully exists.
    let resolved = resolve_existing_prefix(&lexical)?;

    if is_within(&resolved, &canonical_root) {
        Ok(resolved)
    } else {
        Err(PathGuardError::Escape(path.to_string()))
    }
}

/// Canonicalizes the longest existing ancestor of `path` and rejoins the
/// (already lexically-normalized) remaining components verbatim.
fn resolve_existing_prefix(path: &Path) -> Result<PathBuf, PathGuardError> {
    let mut existing = path;
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(base) => {
                let mut result = base;
                for component in tail.into_iter().rev() {
                    result.push(component);
                }
                return Ok(result);
            }
            Err(e) => {
                let Some(parent) = existing.parent() else {
                    return Err(PathGuardError::Canonicalize(e));
                };
                if let Some(name) = existing.file_name() {
                    tail.push(name);
                }
                if parent == existing {
                    return Err(PathGuardError::Canonicalize(e));
                }
                existing = parent;
            }
        }
    }
}

fn normalize_lexically(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn is_within(candidate: &Path, root: &Path) -> bool {
    candidate == root || candidate.starts_with(root)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs_home() {
            return home;
        }
    }
    PathBuf::from(path)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn accepts_path_inside_root() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), "hi").unwrap();

        let resolved = resolve("a.txt", root.path()).unwrap();
        assert!(resolved.starts_with(root.path().canonicalize().unwrap()));
    }

    #[test]
    fn rejects_parent_traversal() {
        let root = TempDir::new().unwrap();
        let err = resolve("../../etc/passwd", root.path()).unwrap_err();
        assert!(matches!(err, PathGuardError::Escape(_)));
    }

    #[test]
    fn allows_new_file_in_existing_subdir() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("sub")).unwrap();

        let resolved = resolve("sub/new.txt", root.path()).unwrap();
        assert!(resolved.starts_with(root.path().canonicalize().unwrap()));
        assert_eq!(resolved.file_name().unwrap(), "new.txt");
    }

    #[test]
    fn rejects_traversal_through_nonexistent_subdir() {
        let root = TempDir::new().unwrap();
        let err = resolve("nope/../../outside.txt", root.path()).unwrap_err();
        assert!(matches!(err, PathGuardError::Escape(_)));
    }
}
