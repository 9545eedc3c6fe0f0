// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Source-tree walker
//!
//! Enumerates the relative paths of a source tree in a stable order, leaving
//! out quilt patch-state bookkeeping (`.pc/`) and VCS metadata directories —
//! neither is subject to three-way merge.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Directory names whose entire subtree is excluded from the walk.
const EXCLUDED_DIRS: &[&str] = &[".pc", ".git", ".bzr", ".svn", ".hg", "CVS"];

/// Walk `root`, returning every file, directory, and symlink beneath it as a
/// path relative to `root`, in `walkdir`'s default (depth-first,
/// lexicographically sorted per directory) order. `root` itself is not
/// included.
pub fn walk(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.path() == root
                || !entry
                    .file_name()
                    .to_str()
                    .map(|name| EXCLUDED_DIRS.contains(&name))
                    .unwrap_or(false)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path() != root)
        .map(|entry| {
            entry
                .path()
                .strip_prefix(root)
                .expect("walkdir always yields paths under root")
                .to_path_buf()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn excludes_quilt_and_vcs_metadata() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("debian")).unwrap();
        fs::write(dir.path().join("debian/changelog"), "").unwrap();
        fs::create_dir_all(dir.path().join(".pc/applied-patches")).unwrap();
        fs::write(dir.path().join(".pc/applied-patches/foo"), "").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "").unwrap();

        let paths = walk(dir.path());
        assert!(paths.contains(&PathBuf::from("debian")));
        assert!(paths.contains(&PathBuf::from("debian/changelog")));
        assert!(!paths.iter().any(|p| p.starts_with(".pc")));
        assert!(!paths.iter().any(|p| p.starts_with(".git")));
    }

    #[test]
    fn empty_tree_yields_no_paths() {
        let dir = tempdir().unwrap();
        assert!(walk(dir.path()).is_empty());
    }
}
