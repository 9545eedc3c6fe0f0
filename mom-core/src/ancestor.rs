// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Ancestor finder
//!
//! Locates the newest version appearing in both the left and right
//! package's changelogs that can actually be materialized from some
//! source (spec §4.6). Changelog-intersection is used instead of pool
//! listings because it is robust to rebuilt/epoched versions and yields
//! the newest *true* common ancestor.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::changelog::Entry;
use crate::model::{Distro, ModelError, PackageVersion, Source, Target};
use crate::version::Version;

/// Outcome of an ancestor search.
pub struct AncestorOutcome {
    /// The materialized base, if any version in the intersection could be
    /// unpacked from some source.
    pub base: Option<Box<dyn PackageVersion>>,
    /// Every version that appeared in both changelogs but failed to
    /// materialize, newest first.
    pub bases_not_found: Vec<Version>,
}

/// A [`PackageVersion`] found in a catalogue, overridden with the directory
/// it was actually unpacked into.
struct Materialized {
    inner: Box<dyn PackageVersion>,
    dir: PathBuf,
}

impl PackageVersion for Materialized {
    fn id(&self) -> &crate::model::PackageId {
        self.inner.id()
    }
    fn version(&self) -> &Version {
        self.inner.version()
    }
    fn component(&self) -> &str {
        self.inner.component()
    }
    fn files(&self) -> &[crate::model::StanzaFile] {
        self.inner.files()
    }
    fn source_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

/// Find the common ancestor of `left_entries` and `right_entries`'
/// changelogs for `package_name`.
///
/// `target_distro`/`target_dist` are searched first; `sources` (the
/// target's configured upstream source list for this package) are searched
/// in order afterwards. `resolve_distro` maps a distro name to the `Distro`
/// implementation that serves it.
pub fn find_ancestor(
    package_name: &str,
    left_entries: &[Entry],
    right_entries: &[Entry],
    target_distro: &dyn Distro,
    target_dist: &str,
    sources: &[Source],
    resolve_distro: &dyn Fn(&str) -> Option<&dyn Distro>,
    target: &dyn Target,
) -> AncestorOutcome {
    let right_versions: HashSet<Version> = right_entries
        .iter()
        .filter_map(|e| e.version.clone())
        .collect();

    let mut bases_not_found = Vec::new();

    for left_entry in left_entries {
        // An entry with no version (a truncated/malformed trailing entry)
        // has nothing to intersect against; skip it.
        let Some(v) = &left_entry.version else {
            continue;
        };
        if !right_versions.contains(v) {
            continue;
        }

        match materialize(
            package_name,
            v,
            target_distro,
            target_dist,
            sources,
            resolve_distro,
            target,
        ) {
            Some(materialized) => {
                return AncestorOutcome {
                    base: Some(materialized),
                    bases_not_found,
                };
            }
            None => bases_not_found.push(v.clone()),
        }
    }

    AncestorOutcome {
        base: None,
        bases_not_found,
    }
}

fn materialize(
    package_name: &str,
    version: &Version,
    target_distro: &dyn Distro,
    target_dist: &str,
    sources: &[Source],
    resolve_distro: &dyn Fn(&str) -> Option<&dyn Distro>,
    target: &dyn Target,
) -> Option<Box<dyn PackageVersion>> {
    let candidate = find_candidate(package_name, version, target_distro, target_dist)
        .or_else(|| {
            sources.iter().find_map(|source| {
                let distro = resolve_distro(&source.distro)?;
                find_candidate(package_name, version, distro, &source.dist)
            })
        })?;

    if candidate.files().is_empty()
        && target
            .fetch_missing_version(package_name, version)
            .is_err()
    {
        return None;
    }

    let dir = target.unpack(candidate.as_ref()).ok()?;
    Some(Box::new(Materialized {
        inner: candidate,
        dir,
    }))
}

fn find_candidate(
    package_name: &str,
    version: &Version,
    distro: &dyn Distro,
    dist: &str,
) -> Option<Box<dyn PackageVersion>> {
    match distro.find_package(package_name, dist, Some(version)) {
        Ok(mut matches) if !matches.is_empty() => Some(matches.remove(0)),
        Ok(_) => None,
        Err(ModelError::PackageNotFound { .. }) => None,
        Err(_) => None,
    }
}
