// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Tree merger
//!
//! Walks the union of `base` (if any), `left`, and `right` source trees,
//! dispatches each path to [`super::file`]'s per-file strategy, applies the
//! result to the merged tree, and reconciles permissions. Conflicts are
//! collected and sorted before being handed back — the order of the
//! underlying filesystem walk is not observable in the report (spec §5).

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::attrs;
use super::file::{self, Decision, FileMergeError, Presence};
use crate::identity::{self, IdentityError};
use crate::tools::Tools;
use crate::walk;

#[derive(Debug, Error)]
pub enum TreeMergeError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    FileMerge(#[from] FileMergeError),
}

fn io_err(path: &Path, source: std::io::Error) -> TreeMergeError {
    TreeMergeError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Result of merging an entire tree.
#[derive(Debug, Default)]
pub struct TreeMergeOutcome {
    /// Relative paths recorded as conflicts, sorted for reviewability.
    pub conflicts: Vec<PathBuf>,
}

/// Merge `left` and `right` (against optional `base`) into `merged`, which
/// must already exist and be empty. `left_label`/`right_label` are used as
/// `diff3` labels and as the upper-cased `.<SIDE>` conflict-sibling tags.
pub fn merge_tree(
    base: Option<&Path>,
    left: &Path,
    right: &Path,
    merged: &Path,
    left_label: &str,
    right_label: &str,
    tools: &dyn Tools,
) -> Result<TreeMergeOutcome, TreeMergeError> {
    let mut conflicts = BTreeSet::new();
    let mut deferred_po = Vec::new();

    let ordered_paths = ordered_union(base, left, right);

    for rel in &ordered_paths {
        let base_path = base.map(|b| b.join(rel));
        let left_path = left.join(rel);
        let right_path = right.join(rel);

        let base_exists = base_path.as_deref().map(exists).unwrap_or(false);
        let left_exists = exists(&left_path);
        let right_exists = exists(&right_path);

        if !left_exists && !right_exists {
            continue; // dropped; nothing to materialize
        }

        let base_presence = Presence {
            exists: base_exists,
            is_regular: base_exists && is_regular(base_path.as_deref().unwrap()),
        };
        let left_presence = Presence {
            exists: left_exists,
            is_regular: left_exists && is_regular(&left_path),
        };
        let right_presence = Presence {
            exists: right_exists,
            is_regular: right_exists && is_regular(&right_path),
        };

        let base_eq_left = base_exists && left_exists && identity::same(base_path.as_deref().unwrap(), &left_path)?;
        let base_eq_right = base_exists && right_exists && identity::same(base_path.as_deref().unwrap(), &right_path)?;
        let left_eq_right = left_exists && right_exists && identity::same(&left_path, &right_path)?;

        let decision = match file::presence_action(
            base_presence,
            left_presence,
            right_presence,
            base_eq_left,
            base_eq_right,
            left_eq_right,
        ) {
            Some(decision) => decision,
            None => file::dispatch_regular(
                rel,
                base_path.as_deref(),
                &left_path,
                &right_path,
                left_label,
                right_label,
                tools,
            )?,
        };

        if matches!(decision, Decision::DeferPo) {
            deferred_po.push(rel.clone());
            continue;
        }

        apply_decision(
            &decision,
            merged,
            rel,
            base_path.as_deref(),
            &left_path,
            &right_path,
            left_exists,
            right_exists,
            left_label,
            right_label,
            &mut conflicts,
        )?;
    }

    for rel in &deferred_po {
        merge_deferred_po(
            rel,
            base,
            left,
            right,
            merged,
            left_label,
            right_label,
            tools,
            &mut conflicts,
        )?;
    }

    Ok(TreeMergeOutcome {
        conflicts: conflicts.into_iter().collect(),
    })
}

/// Build the path set in base-walk, then left-only, then right-only order
/// (spec §5: "base walk first, then left-only, then right-only").
fn ordered_union(base: Option<&Path>, left: &Path, right: &Path) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();

    if let Some(base) = base {
        for p in walk::walk(base) {
            if seen.insert(p.clone()) {
                ordered.push(p);
            }
        }
    }
    for p in walk::walk(left) {
        if seen.insert(p.clone()) {
            ordered.push(p);
        }
    }
    for p in walk::walk(right) {
        if seen.insert(p.clone()) {
            ordered.push(p);
        }
    }
    ordered
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn is_regular(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
fn apply_decision(
    decision: &Decision,
    merged: &Path,
    rel: &Path,
    base_path: Option<&Path>,
    left_path: &Path,
    right_path: &Path,
    left_exists: bool,
    right_exists: bool,
    left_label: &str,
    right_label: &str,
    conflicts: &mut BTreeSet<PathBuf>,
) -> Result<(), TreeMergeError> {
    let dest = merged.join(rel);
    match decision {
        Decision::Drop => {}
        Decision::TakeLeft | Decision::TakeEither if left_exists => {
            copy_entry(left_path, &dest)?;
            reconcile_and_apply(&dest, base_path, Some(left_path), Some(left_path))?;
        }
        Decision::TakeLeft | Decision::TakeEither => {
            copy_entry(right_path, &dest)?;
            reconcile_and_apply(&dest, base_path, Some(right_path), Some(right_path))?;
        }
        Decision::TakeRight => {
            copy_entry(right_path, &dest)?;
            reconcile_and_apply(&dest, base_path, Some(right_path), Some(right_path))?;
        }
        Decision::Merged(bytes) => {
            write_regular(&dest, bytes)?;
            reconcile_and_apply(
                &dest,
                base_path,
                left_exists.then_some(left_path),
                right_exists.then_some(right_path),
            )?;
        }
        Decision::ConflictMarkers(bytes) => {
            write_regular(&dest, bytes)?;
            reconcile_and_apply(
                &dest,
                base_path,
                left_exists.then_some(left_path),
                right_exists.then_some(right_path),
            )?;
            conflicts.insert(rel.to_path_buf());
        }
        Decision::ConflictMaterialize => {
            materialize_conflict(
                &dest,
                left_exists.then_some(left_path),
                right_exists.then_some(right_path),
                left_label,
                right_label,
            )?;
            conflicts.insert(rel.to_path_buf());
        }
        Decision::DeferPo => unreachable!("handled by caller before apply_decision"),
    }
    Ok(())
}

fn copy_entry(src: &Path, dest: &Path) -> Result<(), TreeMergeError> {
    ensure_parent(dest)?;
    let meta = fs::symlink_metadata(src).map_err(|e| io_err(src, e))?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(src).map_err(|e| io_err(src, e))?;
        symlink(target, dest).map_err(|e| io_err(dest, e))?;
    } else if meta.is_dir() {
        fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
    } else {
        fs::copy(src, dest).map_err(|e| io_err(dest, e))?;
    }
    Ok(())
}

fn write_regular(dest: &Path, bytes: &[u8]) -> Result<(), TreeMergeError> {
    ensure_parent(dest)?;
    fs::write(dest, bytes).map_err(|e| io_err(dest, e))
}

fn ensure_parent(dest: &Path) -> Result<(), TreeMergeError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    Ok(())
}

/// Apply permission reconciliation (spec §4.5) to a freshly-written
/// destination entry. Symlinks are skipped; directories use their own mode
/// too (the reconciler doesn't distinguish).
fn reconcile_and_apply(
    dest: &Path,
    base_path: Option<&Path>,
    left_path: Option<&Path>,
    right_path: Option<&Path>,
) -> Result<(), TreeMergeError> {
    let dest_meta = fs::symlink_metadata(dest).map_err(|e| io_err(dest, e))?;
    if dest_meta.file_type().is_symlink() {
        return Ok(());
    }

    let base_mode = match base_path {
        Some(p) if exists(p) && !is_symlink(p) => Some(mode_of(p)?),
        _ => None,
    };
    let fallback = base_mode.unwrap_or(dest_meta.mode());
    let left_mode = match left_path {
        Some(p) if exists(p) && !is_symlink(p) => mode_of(p)?,
        _ => fallback,
    };
    let right_mode = match right_path {
        Some(p) if exists(p) && !is_symlink(p) => mode_of(p)?,
        _ => fallback,
    };

    let merged_mode = attrs::reconcile(base_mode, left_mode, right_mode);
    fs::set_permissions(dest, fs::Permissions::from_mode(merged_mode)).map_err(|e| io_err(dest, e))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

fn mode_of(path: &Path) -> Result<u32, TreeMergeError> {
    fs::symlink_metadata(path)
        .map(|m| m.mode())
        .map_err(|e| io_err(path, e))
}

/// Remove `dest` if present, copy whichever of `left`/`right` exist to
/// `name.<LEFT>`/`name.<RIGHT>` siblings (uppercased labels), and if one
/// side is a directory, leave a symlink at the base name pointing at its
/// sibling so the tree stays walkable.
fn materialize_conflict(
    dest: &Path,
    left: Option<&Path>,
    right: Option<&Path>,
    left_label: &str,
    right_label: &str,
) -> Result<(), TreeMergeError> {
    ensure_parent(dest)?;
    if exists(dest) {
        if fs::symlink_metadata(dest).map(|m| m.is_dir()).unwrap_or(false) {
            fs::remove_dir_all(dest).map_err(|e| io_err(dest, e))?;
        } else {
            fs::remove_file(dest).map_err(|e| io_err(dest, e))?;
        }
    }

    let mut dir_sibling: Option<PathBuf> = None;
    if let Some(left) = left {
        let sibling = sibling_path(dest, left_label);
        copy_entry(left, &sibling)?;
        if fs::symlink_metadata(left).map(|m| m.is_dir()).unwrap_or(false) {
            dir_sibling = Some(sibling);
        }
    }
    if let Some(right) = right {
        let sibling = sibling_path(dest, right_label);
        copy_entry(right, &sibling)?;
        if fs::symlink_metadata(right).map(|m| m.is_dir()).unwrap_or(false) {
            dir_sibling = Some(sibling);
        }
    }

    if let Some(target) = dir_sibling {
        let target_name = target
            .file_name()
            .expect("sibling path always has a file name")
            .to_owned();
        symlink(target_name, dest).map_err(|e| io_err(dest, e))?;
    }

    Ok(())
}

fn sibling_path(dest: &Path, label: &str) -> PathBuf {
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    dest.with_file_name(format!("{file_name}.{}", label.to_uppercase()))
}

#[allow(clippy::too_many_arguments)]
fn merge_deferred_po(
    rel: &Path,
    base: Option<&Path>,
    left: &Path,
    right: &Path,
    merged: &Path,
    left_label: &str,
    right_label: &str,
    tools: &dyn Tools,
    conflicts: &mut BTreeSet<PathBuf>,
) -> Result<(), TreeMergeError> {
    let left_path = left.join(rel);
    let right_path = right.join(rel);
    let left_exists = exists(&left_path);
    let right_exists = exists(&right_path);

    if !left_exists && !right_exists {
        return Ok(());
    }
    if !left_exists || !right_exists {
        // Presence-matrix handling already ran for this path in the main
        // pass's terms, but .po deferral is only reached when both regular
        // sides exist; guard defensively.
        let base_path = base.map(|b| b.join(rel));
        let decision = if left_exists {
            Decision::TakeLeft
        } else {
            Decision::TakeRight
        };
        return apply_decision(
            &decision,
            merged,
            rel,
            base_path.as_deref(),
            &left_path,
            &right_path,
            left_exists,
            right_exists,
            left_label,
            right_label,
            conflicts,
        );
    }

    let closest_pot = find_closest_pot(merged, rel);
    let decision = file::merge_po(&left_path, &right_path, closest_pot.as_deref(), tools)?;

    let base_path = base.map(|b| b.join(rel));
    apply_decision(
        &decision,
        merged,
        rel,
        base_path.as_deref(),
        &left_path,
        &right_path,
        left_exists,
        right_exists,
        left_label,
        right_label,
        conflicts,
    )
}

/// Find a `*.pot` file already materialized alongside `rel` in the merged
/// tree's directory.
fn find_closest_pot(merged: &Path, rel: &Path) -> Option<PathBuf> {
    let dir = merged.join(rel.parent().unwrap_or_else(|| Path::new("")));
    let entries = fs::read_dir(&dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("pot") {
            return Some(path);
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tools::ProcessTools;
    use tempfile::tempdir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn identical_trees_merge_cleanly_with_no_conflicts() {
        let root = tempdir().unwrap();
        let left = root.path().join("left");
        let right = root.path().join("right");
        let merged = root.path().join("merged");
        fs::create_dir_all(&merged).unwrap();

        write(&left.join("debian/control"), "Source: pkg\n");
        write(&right.join("debian/control"), "Source: pkg\n");

        let outcome =
            merge_tree(None, &left, &right, &merged, "ours", "theirs", &ProcessTools::new())
                .unwrap();

        assert!(outcome.conflicts.is_empty());
        assert_eq!(
            fs::read_to_string(merged.join("debian/control")).unwrap(),
            "Source: pkg\n"
        );
    }

    #[test]
    fn delete_vs_modify_conflict_leaves_right_sibling_only() {
        let root = tempdir().unwrap();
        let base = root.path().join("base");
        let left = root.path().join("left");
        let right = root.path().join("right");
        let merged = root.path().join("merged");
        fs::create_dir_all(&merged).unwrap();

        write(&base.join("F"), "a\nb\nc\n");
        write(&right.join("F"), "a\nb\nC\n");
        fs::create_dir_all(&left).unwrap(); // left deletes F

        let outcome = merge_tree(
            Some(&base),
            &left,
            &right,
            &merged,
            "ours",
            "theirs",
            &ProcessTools::new(),
        )
        .unwrap();

        assert_eq!(outcome.conflicts, vec![PathBuf::from("F")]);
        assert!(!merged.join("F").exists());
        assert!(merged.join("F.THEIRS").exists());
        assert!(!merged.join("F.OURS").exists());
    }

    #[test]
    fn new_file_on_right_only_is_taken() {
        let root = tempdir().unwrap();
        let left = root.path().join("left");
        let right = root.path().join("right");
        let merged = root.path().join("merged");
        fs::create_dir_all(&left).unwrap();
        fs::create_dir_all(&merged).unwrap();
        write(&right.join("NEWS"), "new file\n");

        let outcome =
            merge_tree(None, &left, &right, &merged, "ours", "theirs", &ProcessTools::new())
                .unwrap();

        assert!(outcome.conflicts.is_empty());
        assert_eq!(fs::read_to_string(merged.join("NEWS")).unwrap(), "new file\n");
    }
}
