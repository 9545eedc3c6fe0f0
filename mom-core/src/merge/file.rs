// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Three-way file merger
//!
//! Dispatches a single path present in some subset of `{base, left, right}`
//! to the appropriate merge strategy (spec §4.3): presence-matrix handling
//! for files that exist on fewer than three sides, then filename-specific
//! handling (changelog knit, gettext po/pot, `diff3`, binary fallback) for
//! the regular-regular-regular case.

use std::path::Path;

use thiserror::Error;

use crate::changelog;
use crate::identity::{self, IdentityError};
use crate::tools::{Diff3Outcome, ToolError, Tools};

#[derive(Debug, Error)]
pub enum FileMergeError {
    #[error("io error merging {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// What to do with a path once a merge strategy has been chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The path is absent from the merge result.
    Drop,
    /// Take left's version of the file verbatim.
    TakeLeft,
    /// Take right's version of the file verbatim.
    TakeRight,
    /// Both sides are identical; either suffices.
    TakeEither,
    /// Clean merge result, no conflict.
    Merged(Vec<u8>),
    /// `diff3` left conflict markers in clean-exit-1 output; this *is* the
    /// content to write, and the path is also recorded as a conflict.
    ConflictMarkers(Vec<u8>),
    /// Conflict with no single merged content; materialize as
    /// `name.<LEFT>`/`name.<RIGHT>` siblings from whichever of the inputs
    /// exist.
    ConflictMaterialize,
    /// A `*.po` file, merged in a second pass once the closest `*.pot` in
    /// its directory (if any) is known.
    DeferPo,
}

/// Presence of a path on one side, with equality to the other sides already
/// resolved by the caller (via [`crate::identity::same`]).
#[derive(Debug, Clone, Copy)]
pub struct Presence {
    pub exists: bool,
    pub is_regular: bool,
}

/// Decide the presence-matrix action (spec §4.3 table) for a path that is
/// absent from at least one side, or whose existing sides are not all
/// regular files. Returns `None` when all three sides exist and are regular
/// files, meaning the caller should fall through to [`dispatch_regular`].
#[allow(clippy::too_many_arguments)]
pub fn presence_action(
    base: Presence,
    left: Presence,
    right: Presence,
    base_eq_left: bool,
    base_eq_right: bool,
    left_eq_right: bool,
) -> Option<Decision> {
    match (left.exists, right.exists, base.exists) {
        (false, false, _) => Some(Decision::Drop),
        (false, true, false) => Some(Decision::TakeRight),
        (true, false, false) => Some(Decision::TakeLeft),
        (false, true, true) => {
            if base_eq_right {
                Some(Decision::Drop)
            } else {
                Some(Decision::ConflictMaterialize)
            }
        }
        (true, false, true) => {
            if base_eq_left {
                Some(Decision::Drop)
            } else {
                Some(Decision::ConflictMaterialize)
            }
        }
        (true, true, _) => {
            if left_eq_right {
                return Some(Decision::TakeEither);
            }
            let all_regular =
                left.is_regular && right.is_regular && (!base.exists || base.is_regular);
            if all_regular {
                // Regular-regular-(regular-or-absent base): always dispatch
                // by filename, never short-circuit on base equality here —
                // changelog knit and po/pot handling must see both sides
                // even when one side matches base.
                return None;
            }
            if base.exists {
                if base_eq_left {
                    return Some(Decision::TakeRight);
                }
                if base_eq_right {
                    return Some(Decision::TakeLeft);
                }
            }
            Some(Decision::ConflictMaterialize)
        }
    }
}

/// Dispatch a path present (and regular, or regular enough) on both `left`
/// and `right`, with an optional regular `base`, by filename.
pub fn dispatch_regular(
    relative_path: &Path,
    base: Option<&Path>,
    left: &Path,
    right: &Path,
    left_label: &str,
    right_label: &str,
    tools: &dyn Tools,
) -> Result<Decision, FileMergeError> {
    if relative_path == Path::new("debian/changelog") {
        return Ok(knit_changelog(left, right)?);
    }

    let name = relative_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.ends_with(".po") {
        return Ok(Decision::DeferPo);
    }

    if name.ends_with(".pot") {
        return merge_pot(left, right, tools);
    }

    match base {
        Some(base) => diff3_dispatch(left, base, right, left_label, right_label, tools),
        None => {
            if identity::same(left, right)? {
                Ok(Decision::TakeEither)
            } else {
                Ok(Decision::ConflictMaterialize)
            }
        }
    }
}

fn knit_changelog(left: &Path, right: &Path) -> Result<Decision, FileMergeError> {
    let left_text = match std::fs::read_to_string(left) {
        Ok(t) => t,
        Err(_) => return Ok(Decision::ConflictMaterialize),
    };
    let right_text = match std::fs::read_to_string(right) {
        Ok(t) => t,
        Err(_) => return Ok(Decision::ConflictMaterialize),
    };
    let left_entries = changelog::parse(&left_text);
    let right_entries = changelog::parse(&right_text);
    let knitted = changelog::knit(&left_entries, &right_entries);
    Ok(Decision::Merged(knitted.into_bytes()))
}

fn merge_pot(left: &Path, right: &Path, tools: &dyn Tools) -> Result<Decision, FileMergeError> {
    let tmp = tempfile::NamedTempFile::new().map_err(|source| FileMergeError::Io {
        path: "<tmp pot output>".to_string(),
        source,
    })?;
    let ok = tools.msgcat(right, left, tmp.path())?;
    if !ok {
        return Ok(Decision::ConflictMaterialize);
    }
    read_as_decision(tmp.path())
}

/// Merge a `*.po` file against the closest `*.pot` in its directory, if any;
/// otherwise fall back to the same `msgcat` handling as a bare `.pot`.
pub fn merge_po(
    left: &Path,
    right: &Path,
    closest_pot: Option<&Path>,
    tools: &dyn Tools,
) -> Result<Decision, FileMergeError> {
    match closest_pot {
        Some(pot) => {
            let tmp = tempfile::NamedTempFile::new().map_err(|source| FileMergeError::Io {
                path: "<tmp po output>".to_string(),
                source,
            })?;
            let ok = tools.msgmerge(right, pot, left, tmp.path())?;
            if !ok {
                return Ok(Decision::ConflictMaterialize);
            }
            read_as_decision(tmp.path())
        }
        None => merge_pot(left, right, tools),
    }
}

fn read_as_decision(path: &Path) -> Result<Decision, FileMergeError> {
    std::fs::read(path)
        .map(Decision::Merged)
        .map_err(|source| FileMergeError::Io {
            path: path.display().to_string(),
            source,
        })
}

fn diff3_dispatch(
    left: &Path,
    base: &Path,
    right: &Path,
    left_label: &str,
    right_label: &str,
    tools: &dyn Tools,
) -> Result<Decision, FileMergeError> {
    match tools.diff3(left, base, right, left_label, right_label)? {
        Diff3Outcome::Clean(out) => Ok(Decision::Merged(out)),
        Diff3Outcome::Conflicts(out) => Ok(Decision::ConflictMarkers(out)),
        Diff3Outcome::ToolError => {
            // Binary-conflict fallback: if any two of {base, left, right}
            // are byte-identical, take the third; otherwise conflict.
            let base_eq_left = identity::same(base, left)?;
            let base_eq_right = identity::same(base, right)?;
            let left_eq_right = identity::same(left, right)?;
            if base_eq_left && !left_eq_right {
                Ok(Decision::TakeRight)
            } else if base_eq_right && !left_eq_right {
                Ok(Decision::TakeLeft)
            } else if left_eq_right {
                Ok(Decision::TakeEither)
            } else {
                Ok(Decision::ConflictMaterialize)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tools::test_stub::StubTools;
    use std::fs;
    use tempfile::tempdir;

    fn presence(exists: bool, is_regular: bool) -> Presence {
        Presence { exists, is_regular }
    }

    #[test]
    fn absent_on_both_sides_drops() {
        let d = presence_action(presence(true, true), presence(false, false), presence(false, false), false, false, false);
        assert_eq!(d, Some(Decision::Drop));
    }

    #[test]
    fn new_on_right_only_takes_right() {
        let d = presence_action(presence(false, false), presence(false, false), presence(true, true), false, false, false);
        assert_eq!(d, Some(Decision::TakeRight));
    }

    #[test]
    fn deleted_on_left_unchanged_on_right_drops() {
        let d = presence_action(presence(true, true), presence(false, false), presence(true, true), false, true, false);
        assert_eq!(d, Some(Decision::Drop));
    }

    #[test]
    fn deleted_on_left_modified_on_right_conflicts() {
        let d = presence_action(presence(true, true), presence(false, false), presence(true, true), false, false, false);
        assert_eq!(d, Some(Decision::ConflictMaterialize));
    }

    #[test]
    fn identical_on_both_sides_takes_either() {
        let d = presence_action(presence(true, true), presence(true, true), presence(true, true), true, true, true);
        assert_eq!(d, Some(Decision::TakeEither));
    }

    #[test]
    fn left_only_changed_takes_left_for_non_regular_triple() {
        // Non-regular (e.g. symlink) triple: the base-equality shortcut
        // still applies here, since dispatch_regular only handles files.
        let d = presence_action(presence(true, false), presence(true, false), presence(true, false), false, true, false);
        assert_eq!(d, Some(Decision::TakeLeft));
    }

    #[test]
    fn all_three_present_and_regular_falls_through() {
        let d = presence_action(presence(true, true), presence(true, true), presence(true, true), false, false, false);
        assert_eq!(d, None);
    }

    #[test]
    fn regular_triple_unchanged_on_left_still_falls_through() {
        // base == left, left != right: a naive base-equality shortcut would
        // take right here, skipping changelog knit / po gettext merge.
        let d = presence_action(presence(true, true), presence(true, true), presence(true, true), true, false, false);
        assert_eq!(d, None);
    }

    #[test]
    fn regular_triple_unchanged_on_right_still_falls_through() {
        let d = presence_action(presence(true, true), presence(true, true), presence(true, true), false, true, false);
        assert_eq!(d, None);
    }

    #[test]
    fn changelog_dispatch_knits() {
        let dir = tempdir().unwrap();
        let left = dir.path().join("left_changelog");
        let right = dir.path().join("right_changelog");
        fs::write(&left, "pkg (1.0-1) unstable; urgency=low\n\n  * L\n\n -- A <a@a>  Mon, 01 Jan 2024 00:00:00 +0000\n").unwrap();
        fs::write(&right, "pkg (1.0-2) unstable; urgency=low\n\n  * R\n\n -- B <b@b>  Tue, 02 Jan 2024 00:00:00 +0000\n").unwrap();
        let tools = StubTools::default();
        let decision = dispatch_regular(
            Path::new("debian/changelog"),
            None,
            &left,
            &right,
            "ours",
            "theirs",
            &tools,
        )
        .unwrap();
        match decision {
            Decision::Merged(bytes) => {
                let text = String::from_utf8(bytes).unwrap();
                assert!(text.starts_with("pkg (1.0-2)"));
                assert!(text.contains("pkg (1.0-1)"));
            }
            other => panic!("expected Merged, got {other:?}"),
        }
    }

    #[test]
    fn po_file_is_deferred() {
        let dir = tempdir().unwrap();
        let left = dir.path().join("left.po");
        let right = dir.path().join("right.po");
        fs::write(&left, "").unwrap();
        fs::write(&right, "").unwrap();
        let tools = StubTools::default();
        let decision = dispatch_regular(
            Path::new("po/de.po"),
            None,
            &left,
            &right,
            "ours",
            "theirs",
            &tools,
        )
        .unwrap();
        assert_eq!(decision, Decision::DeferPo);
    }

    #[test]
    fn diff3_clean_merge_yields_merged_content() {
        let dir = tempdir().unwrap();
        let left = dir.path().join("left");
        let base = dir.path().join("base");
        let right = dir.path().join("right");
        fs::write(&left, b"").unwrap();
        fs::write(&base, b"").unwrap();
        fs::write(&right, b"").unwrap();
        let tools = StubTools {
            diff3_outcome: std::cell::RefCell::new(Some(Diff3Outcome::Clean(b"merged".to_vec()))),
        };
        let decision = dispatch_regular(
            Path::new("src.c"),
            Some(&base),
            &left,
            &right,
            "ours",
            "theirs",
            &tools,
        )
        .unwrap();
        assert_eq!(decision, Decision::Merged(b"merged".to_vec()));
    }

    #[test]
    fn diff3_tool_error_falls_back_to_binary_conflict_policy() {
        let dir = tempdir().unwrap();
        let left = dir.path().join("left");
        let base = dir.path().join("base");
        let right = dir.path().join("right");
        fs::write(&left, b"same").unwrap();
        fs::write(&base, b"same").unwrap();
        fs::write(&right, b"different").unwrap();
        let tools = StubTools {
            diff3_outcome: std::cell::RefCell::new(Some(Diff3Outcome::ToolError)),
        };
        // base == left, left != right -> take right
        let decision = dispatch_regular(
            Path::new("bin.dat"),
            Some(&base),
            &left,
            &right,
            "ours",
            "theirs",
            &tools,
        )
        .unwrap();
        assert_eq!(decision, Decision::TakeRight);
    }
}
