// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Pool expiry
//!
//! The retention sweep (spec §4.8): for each package, partition its pool's
//! source stanzas around the merge report's recorded base version, keep
//! everything at or above it (plus the newest ancestor below it when no
//! stanza matches exactly), and delete the rest — unless a filename is
//! still referenced by a stanza being kept.

use std::collections::HashSet;

use log::{debug, warn};

use crate::model::{Distro, PoolDirectory, PoolStanza};
use crate::report::{MergeReport, MergeResult, ReportError};
use crate::version::Version;

/// Results in this set are the only ones a package's base version is
/// trusted from (spec §4.8: "skipped if ... the package's last result is
/// not in {SYNC_THEIRS, KEEP_OURS, MERGED, CONFLICTS}").
fn base_is_trusted(result: MergeResult) -> bool {
    matches!(
        result,
        MergeResult::SyncTheirs | MergeResult::KeepOurs | MergeResult::Merged | MergeResult::Conflicts
    )
}

/// Per-package merge history lookup, abstracting over how reports are
/// stored (a real implementation reads `REPORT.json` under the merges
/// tree; spec.md treats this as part of the pool/report model rather than
/// a fresh Non-goal).
pub trait MergeHistory {
    /// The most recently written report for `package_name`, if any.
    fn last_report(&self, package_name: &str) -> Option<MergeReport>;
}

/// Reads `<merges_root>/<package_name>/REPORT.json` (or the legacy text
/// form) via [`MergeReport::read`].
pub struct FilesystemMergeHistory {
    pub merges_root: std::path::PathBuf,
}

impl MergeHistory for FilesystemMergeHistory {
    fn last_report(&self, package_name: &str) -> Option<MergeReport> {
        let dir = self.merges_root.join(package_name);
        match MergeReport::read(&dir) {
            Ok(report) => Some(report),
            Err(ReportError::Malformed { .. }) => None,
            Err(err) => {
                debug!("no usable report for {package_name}: {err}");
                None
            }
        }
    }
}

/// Split `stanzas` into those to keep and those to drop, given a trusted
/// base version (spec §4.8).
fn partition(base: &Version, stanzas: &[PoolStanza]) -> (Vec<PoolStanza>, Vec<PoolStanza>) {
    let mut keep: Vec<PoolStanza> = stanzas.iter().filter(|s| &s.version >= base).cloned().collect();

    let has_exact = keep.iter().any(|s| &s.version == base);
    if !has_exact {
        if let Some(newest_below) = stanzas
            .iter()
            .filter(|s| &s.version < base)
            .max_by(|a, b| a.version.cmp(&b.version))
        {
            keep.push(newest_below.clone());
        }
    }

    let keep_versions: HashSet<&Version> = keep.iter().map(|s| &s.version).collect();
    let drop = stanzas
        .iter()
        .filter(|s| !keep_versions.contains(&s.version))
        .cloned()
        .collect();

    (keep, drop)
}

/// Outcome of sweeping a single package's pool directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpirySummary {
    pub stanzas_kept: usize,
    pub stanzas_removed: usize,
}

/// Sweep one package's pool directory against its recorded base version.
/// Returns `None` when the package has no trusted base and was therefore
/// skipped (spec §4.8).
pub fn sweep_package(pool: &dyn PoolDirectory, base: Option<&Version>, last_result: Option<MergeResult>) -> Option<ExpirySummary> {
    let base = base?;
    match last_result {
        Some(result) if base_is_trusted(result) => {}
        _ => return None,
    }

    let stanzas = pool.source_stanzas();
    let (keep, drop) = partition(base, &stanzas);
    if drop.is_empty() {
        return Some(ExpirySummary {
            stanzas_kept: keep.len(),
            stanzas_removed: 0,
        });
    }

    let keep_filenames: HashSet<String> = keep
        .iter()
        .flat_map(|s| s.files.iter().map(|f| f.filename.clone()))
        .collect();

    let mut removed = 0;
    for stanza in &drop {
        match pool.remove_stanza(stanza, &keep_filenames) {
            Ok(()) => removed += 1,
            Err(err) => warn!(
                "failed to remove pool stanza {} at {}: {err}",
                stanza.version,
                pool.path().display()
            ),
        }
    }

    if removed > 0 {
        if let Err(err) = pool.refresh_index() {
            warn!("failed to refresh pool index at {}: {err}", pool.path().display());
        }
    }

    Some(ExpirySummary {
        stanzas_kept: keep.len(),
        stanzas_removed: removed,
    })
}

/// Sweep of an entire distro across the given components, gated by
/// [`Distro::should_expire`] (spec §4.8, ambient per-distro/per-component
/// loop per SPEC_FULL.md §3).
#[derive(Debug, Default, Clone)]
pub struct DistroExpiryReport {
    pub packages_swept: usize,
    pub packages_skipped: usize,
    pub stanzas_removed: usize,
}

/// Drive the full sweep for one `(distro, dist)` across `components`,
/// looking up each package's base via `history`. Never aborts the sweep on
/// a single package's error (spec §7: "Expiry IO errors ... the package is
/// skipped, never crash the sweep").
pub fn sweep_distro(
    distro: &dyn Distro,
    dist: &str,
    components: &[String],
    history: &dyn MergeHistory,
) -> DistroExpiryReport {
    let mut report = DistroExpiryReport::default();
    if !distro.should_expire() {
        debug!("distro {} opts out of expiry", distro.name());
        return report;
    }

    for component in components {
        for package in distro.packages(dist, component) {
            let last = history.last_report(package.name());
            let (base, result) = match &last {
                Some(r) => (r.base.as_ref().map(|b| &b.version), Some(r.result)),
                None => (None, None),
            };

            match sweep_package(package.pool_directory().as_ref(), base, result) {
                Some(summary) => {
                    report.packages_swept += 1;
                    report.stanzas_removed += summary.stanzas_removed;
                }
                None => report.packages_skipped += 1,
            }
        }
    }

    report
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{ModelError, StanzaFile};
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    fn stanza(version: &str, filename: &str) -> PoolStanza {
        PoolStanza {
            version: Version::parse(version).unwrap(),
            files: vec![StanzaFile {
                filename: filename.to_string(),
                size: 0,
                md5: String::new(),
            }],
        }
    }

    struct FakePool {
        path: PathBuf,
        stanzas: Vec<PoolStanza>,
        removed: RefCell<Vec<Version>>,
        refreshed: RefCell<bool>,
    }

    impl PoolDirectory for FakePool {
        fn path(&self) -> &Path {
            &self.path
        }
        fn source_stanzas(&self) -> Vec<PoolStanza> {
            self.stanzas.clone()
        }
        fn remove_stanza(&self, stanza: &PoolStanza, keep_filenames: &HashSet<String>) -> Result<(), ModelError> {
            for file in &stanza.files {
                assert!(
                    !keep_filenames.contains(&file.filename),
                    "must never remove a filename still referenced by a kept stanza"
                );
            }
            self.removed.borrow_mut().push(stanza.version.clone());
            Ok(())
        }
        fn refresh_index(&self) -> Result<(), ModelError> {
            *self.refreshed.borrow_mut() = true;
            Ok(())
        }
    }

    #[test]
    fn keeps_everything_at_or_above_base_and_drops_below() {
        let base = Version::parse("2.0-1").unwrap();
        let stanzas = vec![
            stanza("1.0-1", "pkg_1.0-1.dsc"),
            stanza("2.0-1", "pkg_2.0-1.dsc"),
            stanza("3.0-1", "pkg_3.0-1.dsc"),
        ];
        let (keep, drop) = partition(&base, &stanzas);
        assert_eq!(keep.len(), 2);
        assert_eq!(drop.len(), 1);
        assert_eq!(drop[0].version, Version::parse("1.0-1").unwrap());
    }

    #[test]
    fn keeps_newest_below_base_when_no_exact_match() {
        let base = Version::parse("2.0-1").unwrap();
        let stanzas = vec![
            stanza("1.0-1", "pkg_1.0-1.dsc"),
            stanza("1.5-1", "pkg_1.5-1.dsc"),
            stanza("3.0-1", "pkg_3.0-1.dsc"),
        ];
        let (keep, drop) = partition(&base, &stanzas);
        let kept_versions: HashSet<_> = keep.iter().map(|s| s.version.to_string()).collect();
        assert!(kept_versions.contains("1.5-1"));
        assert!(kept_versions.contains("3.0-1"));
        assert_eq!(drop.len(), 1);
        assert_eq!(drop[0].version, Version::parse("1.0-1").unwrap());
    }

    #[test]
    fn never_deletes_a_filename_shared_with_a_kept_stanza() {
        let base = Version::parse("2.0-1").unwrap();
        let pool = FakePool {
            path: PathBuf::from("/pool/pkg"),
            stanzas: vec![
                stanza("1.0-1", "pkg_1.0.orig.tar.gz"),
                stanza("2.0-1", "pkg_1.0.orig.tar.gz"),
            ],
            removed: RefCell::new(vec![]),
            refreshed: RefCell::new(false),
        };

        let summary = sweep_package(&pool, Some(&base), Some(MergeResult::Merged)).unwrap();
        assert_eq!(summary.stanzas_removed, 1);
        assert_eq!(*pool.removed.borrow(), vec![Version::parse("1.0-1").unwrap()]);
    }

    #[test]
    fn no_base_skips_the_package() {
        let pool = FakePool {
            path: PathBuf::from("/pool/pkg"),
            stanzas: vec![stanza("1.0-1", "pkg_1.0-1.dsc")],
            removed: RefCell::new(vec![]),
            refreshed: RefCell::new(false),
        };
        assert!(sweep_package(&pool, None, Some(MergeResult::Merged)).is_none());
    }

    #[test]
    fn untrusted_last_result_skips_the_package() {
        let base = Version::parse("1.0-1").unwrap();
        let pool = FakePool {
            path: PathBuf::from("/pool/pkg"),
            stanzas: vec![stanza("1.0-1", "pkg_1.0-1.dsc")],
            removed: RefCell::new(vec![]),
            refreshed: RefCell::new(false),
        };
        assert!(sweep_package(&pool, Some(&base), Some(MergeResult::NoBase)).is_none());
        assert!(sweep_package(&pool, Some(&base), Some(MergeResult::Failed)).is_none());
        assert!(sweep_package(&pool, Some(&base), None).is_none());
    }
}
