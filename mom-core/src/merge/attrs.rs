// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Permission reconciler
//!
//! Reconciles the nine low mode bits (`rwxrwxrwx`) of a file across a
//! three-way merge. Symlinks' modes are never touched; this module only
//! applies to regular files, directories, and other non-symlink entries.

const MODE_MASK: u32 = 0o777;

/// Reconcile the merged mode from `base` (`None` if the file is absent from
/// base, or base's entry is a symlink), `left`, and `right`.
///
/// When `base` is present: seed the merged bits from base, then for each of
/// `left` and `right`, add any bit that side set but base didn't, and clear
/// any bit that side cleared but base had set.
///
/// When `base` is absent (or was a symlink): seed from `right` instead, and
/// apply only `left`'s delta against `right`.
pub fn reconcile(base: Option<u32>, left: u32, right: u32) -> u32 {
    let left = left & MODE_MASK;
    let right = right & MODE_MASK;

    match base {
        Some(base) => {
            let base = base & MODE_MASK;
            let mut merged = base;
            for side in [left, right] {
                let added = side & !base & MODE_MASK;
                let removed = !side & base & MODE_MASK;
                merged |= added;
                merged &= !removed;
            }
            merged & MODE_MASK
        }
        None => {
            let added = left & !right & MODE_MASK;
            let removed = !left & right & MODE_MASK;
            let mut merged = right | added;
            merged &= !removed;
            merged & MODE_MASK
        }
    }
}
