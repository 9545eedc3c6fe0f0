// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Package orchestrator
//!
//! Drives a single package through version selection, ancestor discovery,
//! the three-way tree merge, artifact packaging, and report generation
//! (spec §4.7). Resolving the *left* `PackageVersion` (newest, or an
//! explicit `--version` override) is left to the caller, since it depends
//! on how the concrete `Distro`/`Package` implementation is wired; this
//! module determines *right* (the newest version across all configured
//! upstream sources), then owns every step from there on.

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::changelog;
use crate::merge::tree::{merge_tree, TreeMergeError};
use crate::model::{Distro, ModelError, Package, PackageVersion, Target};
use crate::report::{BaseSide, MergeReport, MergeResult, ReportError, Side};
use crate::tools::{ToolError, Tools};
use crate::version::Version;
use crate::ancestor::find_ancestor;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("tree merge error: {0}")]
    TreeMerge(#[from] TreeMergeError),
    #[error("report error: {0}")]
    Report(#[from] ReportError),
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("invalid merged version: {0}")]
    Version(#[from] crate::version::VersionError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> OrchestratorError {
    OrchestratorError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Identity strings for generated changelog entries, and the vendor suffix
/// appended to upstream versions (spec §6 "Configuration").
pub struct OrchestratorConfig {
    pub local_suffix: String,
    pub mom_name: String,
    pub mom_email: String,
}

/// Step 1 of §4.7: explicit `--package`, `--include`/`--exclude` lists, and
/// the target's own blacklist.
#[derive(Debug, Default, Clone)]
pub struct PackageFilters {
    pub only: Option<HashSet<String>>,
    pub include: Option<HashSet<String>>,
    pub exclude: HashSet<String>,
}

impl PackageFilters {
    pub fn should_process(&self, package_name: &str, blacklist: &HashSet<String>) -> bool {
        if let Some(only) = &self.only {
            if !only.contains(package_name) {
                return false;
            }
        }
        if let Some(include) = &self.include {
            if !include.contains(package_name) {
                return false;
            }
        }
        if self.exclude.contains(package_name) {
            return false;
        }
        !blacklist.contains(package_name)
    }
}

/// Parse the `--include`/`--exclude` file format: one package name per
/// line, blank lines and `#`-comments ignored (spec §6, SPEC_FULL.md).
pub fn read_package_list(path: &Path) -> Result<HashSet<String>, OrchestratorError> {
    let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Step 2 (second half): the newest version across every configured
/// upstream source for `package_name`.
pub fn find_right(
    package_name: &str,
    target: &dyn Target,
    resolve_distro: &dyn Fn(&str) -> Option<&dyn Distro>,
) -> Option<Box<dyn PackageVersion>> {
    let mut best: Option<Box<dyn PackageVersion>> = None;
    for source_list in target.get_source_lists(package_name) {
        for source in source_list {
            let Some(distro) = resolve_distro(&source.distro) else {
                continue;
            };
            let candidates = match distro.find_package(package_name, &source.dist, None) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for candidate in candidates {
                let better = match &best {
                    Some(b) => candidate.version() > b.version(),
                    None => true,
                };
                if better {
                    best = Some(candidate);
                }
            }
        }
    }
    best
}

fn keep_ours(
    left: &dyn PackageVersion,
    left_distro_name: &str,
    left_component: &str,
    right: Option<&dyn PackageVersion>,
    right_distro_name: Option<&str>,
    output_dir: &Path,
) -> Result<MergeReport, OrchestratorError> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;
    }
    let right_side = right.map(|r| Side {
        distro: right_distro_name.unwrap_or_default().to_string(),
        component: r.component().to_string(),
        version: r.version().clone(),
        files: r.files().iter().map(|f| f.filename.clone()).collect(),
    });
    let report = MergeReport {
        source_package: left.id().name.clone(),
        merge_date: Utc::now(),
        result: MergeResult::KeepOurs,
        left: Side {
            distro: left_distro_name.to_string(),
            component: left_component.to_string(),
            version: left.version().clone(),
            files: left.files().iter().map(|f| f.filename.clone()).collect(),
        },
        left_patch: None,
        bases_not_found: Vec::new(),
        base: None,
        right: right_side.unwrap_or_else(|| Side {
            distro: String::new(),
            component: String::new(),
            version: left.version().clone(),
            files: Vec::new(),
        }),
        right_patch: None,
        merged_version: Some(left.version().clone()),
        merged_dir: String::new(),
        merged_files: None,
        merged_patch: None,
        merge_failure_tarball: None,
        conflicts: Vec::new(),
        build_metadata_changed: false,
        genchanges: None,
        committed: false,
        message: None,
    };
    report.write(output_dir)?;
    Ok(report)
}

/// Run the full per-package orchestration (spec §4.7 steps 3-13; step 1-2
/// are [`PackageFilters::should_process`] / [`find_right`]).
///
/// Steps 6 onward (unpack, ancestor search, tree merge, packaging) are
/// delegated to [`run_merge_steps`]; an unexpected error from any of them
/// never propagates out of this function — it is caught, the partial
/// scratch directory is cleaned, and a terminal `MergeReport{result:
/// Failed}` is written and returned instead (spec §4.7 step 13 / §9).
#[allow(clippy::too_many_arguments)]
pub fn merge_package(
    left: &dyn PackageVersion,
    left_distro: &dyn Distro,
    left_component: &str,
    target: &dyn Target,
    resolve_distro: &dyn Fn(&str) -> Option<&dyn Distro>,
    scratch_root: &Path,
    output_dir: &Path,
    config: &OrchestratorConfig,
    tools: &dyn Tools,
    force: bool,
) -> Result<MergeReport, OrchestratorError> {
    let package_name = &left.id().name;
    let left_distro_name = left_distro.name();

    // Step 2 (right) + step 3.
    let right = match find_right(package_name, target, resolve_distro) {
        Some(r) => r,
        None => return keep_ours(left, left_distro_name, left_component, None, None, output_dir),
    };
    let right_distro_name = right.id().distro.clone();

    // Step 4: idempotency.
    if !force {
        if let Ok(existing) = MergeReport::read(output_dir) {
            if existing.left.version == *left.version()
                && existing.right.version == *right.version()
                && existing.result.is_terminal()
            {
                return Ok(existing);
            }
        }
    }

    // Step 5.
    if left.version() >= right.version() {
        return keep_ours(
            left,
            left_distro_name,
            left_component,
            Some(right.as_ref()),
            Some(&right_distro_name),
            output_dir,
        );
    }

    let merged_dir = scratch_root.join(format!("{package_name}-merged"));
    match run_merge_steps(
        left,
        left_distro,
        left_distro_name,
        left_component,
        target,
        resolve_distro,
        right.as_ref(),
        &right_distro_name,
        &merged_dir,
        output_dir,
        config,
        tools,
    ) {
        Ok(report) => Ok(report),
        Err(err) => {
            warn!("{package_name}: unexpected merge error: {err}");
            if merged_dir.exists() {
                let _ = fs::remove_dir_all(&merged_dir);
            }
            let report = MergeReport {
                source_package: package_name.clone(),
                merge_date: Utc::now(),
                result: MergeResult::Failed,
                left: side_of(left, left_distro_name, left_component),
                left_patch: None,
                bases_not_found: Vec::new(),
                base: None,
                right: side_of(right.as_ref(), &right_distro_name, right.component()),
                right_patch: None,
                merged_version: None,
                merged_dir: String::new(),
                merged_files: None,
                merged_patch: None,
                merge_failure_tarball: None,
                conflicts: Vec::new(),
                build_metadata_changed: false,
                genchanges: None,
                committed: false,
                message: Some(err.to_string()),
            };
            report.write(output_dir)?;
            Ok(report)
        }
    }
}

/// Steps 6-13 of §4.7: unpack, ancestor search, the sync/tree-merge split,
/// packaging, and report generation. Any `?` here is an *unexpected* error
/// that [`merge_package`] turns into a `Failed` report; expected terminal
/// outcomes (`NoBase`, `SyncTheirs`, `Merged`, `Conflicts`) are all `Ok`.
#[allow(clippy::too_many_arguments)]
fn run_merge_steps(
    left: &dyn PackageVersion,
    left_distro: &dyn Distro,
    left_distro_name: &str,
    left_component: &str,
    target: &dyn Target,
    resolve_distro: &dyn Fn(&str) -> Option<&dyn Distro>,
    right: &dyn PackageVersion,
    right_distro_name: &str,
    merged_dir: &Path,
    output_dir: &Path,
    config: &OrchestratorConfig,
    tools: &dyn Tools,
) -> Result<MergeReport, OrchestratorError> {
    let package_name = &left.id().name;

    // Step 6: unpack both, compute merged_version.
    let left_dir = target.unpack(left)?;
    let right_dir = target.unpack(right)?;
    let merged_version = Version::parse(&format!("{}{}", right.version(), config.local_suffix))?;

    // Step 7: ancestor finder.
    let left_entries = changelog::read_file(&left_dir.join("debian/changelog")).map_err(|e| io_err(&left_dir, e))?;
    let right_entries = changelog::read_file(&right_dir.join("debian/changelog")).map_err(|e| io_err(&right_dir, e))?;

    let sources: Vec<_> = target.get_source_lists(package_name).into_iter().flatten().collect();
    let outcome = find_ancestor(
        package_name,
        &left_entries,
        &right_entries,
        left_distro,
        left_distro_name,
        &sources,
        resolve_distro,
        target,
    );

    let base = match outcome.base {
        Some(b) => b,
        None => {
            let report = MergeReport {
                source_package: package_name.clone(),
                merge_date: Utc::now(),
                result: MergeResult::NoBase,
                left: side_of(left, left_distro_name, left_component),
                left_patch: None,
                bases_not_found: outcome.bases_not_found,
                base: None,
                right: side_of(right, right_distro_name, right.component()),
                right_patch: None,
                merged_version: Some(merged_version),
                merged_dir: String::new(),
                merged_files: None,
                merged_patch: None,
                merge_failure_tarball: None,
                conflicts: Vec::new(),
                build_metadata_changed: false,
                genchanges: None,
                committed: false,
                message: None,
            };
            report.write(output_dir)?;
            return Ok(report);
        }
    };

    // Step 8.
    if base.version() >= right.version() {
        return keep_ours(
            left,
            left_distro_name,
            left_component,
            Some(right),
            Some(right_distro_name),
            output_dir,
        );
    }

    // Step 9: sync.
    if base.version() == left.version() {
        if output_dir.exists() {
            fs::remove_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;
        }
        let report = MergeReport {
            source_package: package_name.clone(),
            merge_date: Utc::now(),
            result: MergeResult::SyncTheirs,
            left: side_of(left, left_distro_name, left_component),
            left_patch: None,
            bases_not_found: outcome.bases_not_found,
            base: Some(BaseSide {
                distro: base.id().distro.clone(),
                version: base.version().clone(),
                files: base.files().iter().map(|f| f.filename.clone()).collect(),
            }),
            right: side_of(right, right_distro_name, right.component()),
            right_patch: None,
            merged_version: Some(merged_version),
            merged_dir: String::new(),
            merged_files: Some(right.files().iter().map(|f| f.filename.clone()).collect()),
            merged_patch: None,
            merge_failure_tarball: None,
            conflicts: Vec::new(),
            build_metadata_changed: false,
            genchanges: None,
            committed: false,
            message: None,
        };
        report.write(output_dir)?;
        return Ok(report);
    }

    // Step 10: tree merge.
    info!("merging {package_name}: {} .. {} onto {}", right.version(), base.version(), left.version());
    if merged_dir.exists() {
        fs::remove_dir_all(merged_dir).map_err(|e| io_err(merged_dir, e))?;
    }
    fs::create_dir_all(merged_dir).map_err(|e| io_err(merged_dir, e))?;

    let base_dir = base.source_dir().map(Path::to_path_buf);
    let outcome_tree = merge_tree(
        base_dir.as_deref(),
        &left_dir,
        &right_dir,
        merged_dir,
        left_distro_name,
        right_distro_name,
        tools,
    )?;

    append_changelog_entry(merged_dir, package_name, &merged_version, right_distro_name, config)
        .map_err(|e| io_err(merged_dir, e))?;

    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;
    }
    fs::create_dir_all(output_dir).map_err(|e| io_err(output_dir, e))?;

    // Step 11: packaging.
    let without_epoch = merged_version.without_epoch();
    let mut merge_failure_tarball = None;
    let mut merged_patch = None;
    let mut build_metadata_changed = false;

    if !outcome_tree.conflicts.is_empty() {
        make_debian_rules_executable(merged_dir);
        let tarball = output_dir.join(format!("{package_name}_{without_epoch}.src.tar.gz"));
        tools.tar_czf(&tarball, merged_dir)?;
        merge_failure_tarball = Some(tarball.display().to_string());
    } else {
        let needs_sa = merged_version.revision().is_some() && left.version().upstream() != merged_version.upstream();
        let built = tools.dpkg_source_build(merged_dir, needs_sa)?;
        if built {
            merged_patch = Some(tools.diff_pruN(&right_dir, merged_dir)?);
            build_metadata_changed = control_metadata_changed(&left_dir, merged_dir);
        } else {
            warn!("dpkg-source -b failed for {package_name}, falling back to tarball packaging");
            make_debian_rules_executable(merged_dir);
            let tarball = output_dir.join(format!("{package_name}_{without_epoch}.src.tar.gz"));
            tools.tar_czf(&tarball, merged_dir)?;
            merge_failure_tarball = Some(tarball.display().to_string());
        }
    }

    // Step 12/13.
    let result = if outcome_tree.conflicts.is_empty() {
        MergeResult::Merged
    } else {
        MergeResult::Conflicts
    };

    let mut report = MergeReport {
        source_package: package_name.clone(),
        merge_date: Utc::now(),
        result,
        left: side_of(left, left_distro_name, left_component),
        left_patch: None,
        bases_not_found: outcome.bases_not_found,
        base: Some(BaseSide {
            distro: base.id().distro.clone(),
            version: base.version().clone(),
            files: base.files().iter().map(|f| f.filename.clone()).collect(),
        }),
        right: side_of(right, right_distro_name, right.component()),
        right_patch: None,
        merged_version: Some(merged_version.clone()),
        merged_dir: merged_dir.display().to_string(),
        merged_files: None,
        merged_patch: merged_patch.map(|p| String::from_utf8_lossy(&p).into_owned()),
        merge_failure_tarball,
        conflicts: outcome_tree
            .conflicts
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        build_metadata_changed,
        genchanges: None,
        committed: false,
        message: None,
    };
    report.genchanges = report.compute_genchanges();
    report.write(output_dir)?;

    if merged_dir.exists() {
        let _ = fs::remove_dir_all(merged_dir);
    }

    Ok(report)
}

fn side_of(pv: &dyn PackageVersion, distro_name: &str, component: &str) -> Side {
    Side {
        distro: distro_name.to_string(),
        component: component.to_string(),
        version: pv.version().clone(),
        files: pv.files().iter().map(|f| f.filename.clone()).collect(),
    }
}

fn make_debian_rules_executable(merged_dir: &Path) {
    let rules = merged_dir.join("debian/rules");
    if let Ok(meta) = fs::metadata(&rules) {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o111);
        let _ = fs::set_permissions(&rules, perms);
    }
}

/// Template a new top changelog entry naming the remaining-changes
/// placeholder (`produce_merges.py:add_changelog`).
fn append_changelog_entry(
    merged_dir: &Path,
    package: &str,
    merged_version: &Version,
    right_distro_name: &str,
    config: &OrchestratorConfig,
) -> std::io::Result<()> {
    let path = merged_dir.join("debian/changelog");
    let existing = fs::read_to_string(&path)?;
    let title_case_distro = {
        let mut c = right_distro_name.chars();
        match c.next() {
            Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
            None => String::new(),
        }
    };
    let entry = format!(
        "{package} ({merged_version}) UNRELEASED; urgency=low\n\n  * Merge from {title_case_distro}.  Remaining changes:\n    - SUMMARISE HERE\n\n -- {} <{}>  {}\n\n",
        config.mom_name,
        config.mom_email,
        Utc::now().to_rfc2822(),
    );
    fs::write(&path, entry + &existing)
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
struct ControlFields {
    #[serde(rename = "Binary", default)]
    binary: Option<String>,
    #[serde(rename = "Architecture", default)]
    architecture: Option<String>,
    #[serde(rename = "Build-Depends", default)]
    build_depends: Option<String>,
    #[serde(rename = "Build-Depends-Indep", default)]
    build_depends_indep: Option<String>,
    #[serde(rename = "Build-Conflicts", default)]
    build_conflicts: Option<String>,
    #[serde(rename = "Build-Conflicts-Indep", default)]
    build_conflicts_indep: Option<String>,
}

/// Field-wise comparison of the source stanza's build metadata (spec §4.7
/// step 12).
fn control_metadata_changed(left_dir: &Path, merged_dir: &Path) -> bool {
    let left = read_source_stanza(&left_dir.join("debian/control"));
    let merged = read_source_stanza(&merged_dir.join("debian/control"));
    match (left, merged) {
        (Some(l), Some(m)) => l != m,
        _ => false,
    }
}

fn read_source_stanza(path: &Path) -> Option<ControlFields> {
    let content = fs::read_to_string(path).ok()?;
    let stanzas: Vec<ControlFields> = rfc822_like::from_str(&content).ok()?;
    stanzas.into_iter().next()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::testkit::{FakeCatalogue, FakePackageVersion, FakeTarget};
    use crate::model::{PackageId, Source, StanzaFile};
    use crate::tools::test_stub::StubTools;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn write_changelog(dir: &Path, entries: &str) {
        fs::create_dir_all(dir.join("debian")).unwrap();
        fs::write(dir.join("debian/changelog"), entries).unwrap();
    }

    fn sample_package_version(name: &str, distro: &str, version: &str, dir: &Path) -> FakePackageVersion {
        FakePackageVersion {
            id: PackageId {
                distro: distro.to_string(),
                name: name.to_string(),
            },
            version: Version::parse(version).unwrap(),
            component: "main".to_string(),
            files: vec![StanzaFile {
                filename: format!("{name}_{version}.dsc"),
                size: 0,
                md5: String::new(),
            }],
            source_dir: Some(dir.to_path_buf()),
        }
    }

    struct FakeDistro {
        name: String,
        catalogue: FakeCatalogue,
    }

    impl Distro for FakeDistro {
        fn name(&self) -> &str {
            &self.name
        }
        fn packages(&self, _dist: &str, _component: &str) -> Vec<Box<dyn Package>> {
            Vec::new()
        }
        fn find_package(
            &self,
            _name: &str,
            _search_dist: &str,
            version: Option<&Version>,
        ) -> Result<Vec<Box<dyn PackageVersion>>, ModelError> {
            match version {
                Some(v) => Ok(self
                    .catalogue
                    .find(v)
                    .into_iter()
                    .map(|pv| Box::new(pv) as Box<dyn PackageVersion>)
                    .collect()),
                None => Ok(self
                    .catalogue
                    .versions
                    .borrow()
                    .iter()
                    .cloned()
                    .map(|pv| Box::new(pv) as Box<dyn PackageVersion>)
                    .collect()),
            }
        }
    }

    struct EmptyDistro {
        name: String,
    }

    impl Distro for EmptyDistro {
        fn name(&self) -> &str {
            &self.name
        }
        fn packages(&self, _dist: &str, _component: &str) -> Vec<Box<dyn Package>> {
            Vec::new()
        }
        fn find_package(
            &self,
            name: &str,
            _search_dist: &str,
            _version: Option<&Version>,
        ) -> Result<Vec<Box<dyn PackageVersion>>, ModelError> {
            Err(ModelError::PackageNotFound {
                distro: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    #[test]
    fn no_right_version_keeps_ours() {
        let scratch = tempdir().unwrap();
        let left_dir = scratch.path().join("left");
        fs::create_dir_all(&left_dir).unwrap();
        let left = sample_package_version("pkg", "ubuntu", "1.0-1", &left_dir);

        let target = FakeTarget {
            name: "ubuntu".to_string(),
            blacklist: Default::default(),
            source_lists: HashMap::new(),
            scratch_root: scratch.path().to_path_buf(),
        };
        let config = OrchestratorConfig {
            local_suffix: "ubuntu1".to_string(),
            mom_name: "Merge-o-Matic".to_string(),
            mom_email: "mom@example.org".to_string(),
        };
        let tools = StubTools::default();
        let output_dir = scratch.path().join("out");
        let left_distro = EmptyDistro {
            name: "ubuntu".to_string(),
        };

        let report = merge_package(
            &left,
            &left_distro,
            "main",
            &target,
            &|_| None,
            scratch.path(),
            &output_dir,
            &config,
            &tools,
            false,
        )
        .unwrap();

        assert_eq!(report.result, MergeResult::KeepOurs);
        assert_eq!(report.merged_version, Some(Version::parse("1.0-1").unwrap()));
    }

    #[test]
    fn left_already_newest_keeps_ours() {
        let scratch = tempdir().unwrap();
        let left_dir = scratch.path().join("left");
        let right_dir = scratch.path().join("right");
        fs::create_dir_all(&left_dir).unwrap();
        fs::create_dir_all(&right_dir).unwrap();

        let left = sample_package_version("pkg", "ubuntu", "2.0-1ubuntu1", &left_dir);
        let right_version = sample_package_version("pkg", "debian", "1.0-1", &right_dir);

        let catalogue = FakeCatalogue::new(vec![right_version]);
        let debian = FakeDistro {
            name: "debian".to_string(),
            catalogue,
        };

        let mut source_lists = HashMap::new();
        source_lists.insert(
            "pkg".to_string(),
            vec![vec![crate::model::Source {
                distro: "debian".to_string(),
                dist: "unstable".to_string(),
            }]],
        );
        let target = FakeTarget {
            name: "ubuntu".to_string(),
            blacklist: Default::default(),
            source_lists,
            scratch_root: scratch.path().to_path_buf(),
        };
        let config = OrchestratorConfig {
            local_suffix: "ubuntu1".to_string(),
            mom_name: "Merge-o-Matic".to_string(),
            mom_email: "mom@example.org".to_string(),
        };
        let tools = StubTools::default();
        let output_dir = scratch.path().join("out");
        let left_distro = EmptyDistro {
            name: "ubuntu".to_string(),
        };

        let report = merge_package(
            &left,
            &left_distro,
            "main",
            &target,
            &|name| if name == "debian" { Some(&debian as &dyn Distro) } else { None },
            scratch.path(),
            &output_dir,
            &config,
            &tools,
            false,
        )
        .unwrap();

        assert_eq!(report.result, MergeResult::KeepOurs);
    }

    #[test]
    fn package_filters_respect_only_include_exclude_and_blacklist() {
        let filters = PackageFilters {
            only: Some(["pkg-a".to_string()].into_iter().collect()),
            include: None,
            exclude: HashSet::new(),
        };
        assert!(filters.should_process("pkg-a", &HashSet::new()));
        assert!(!filters.should_process("pkg-b", &HashSet::new()));

        let blacklist: HashSet<String> = ["pkg-a".to_string()].into_iter().collect();
        assert!(!filters.should_process("pkg-a", &blacklist));
    }

    #[test]
    fn unexpected_merge_error_yields_failed_report_instead_of_propagating() {
        let scratch = tempdir().unwrap();
        // No debian/changelog under left_dir: the ancestor-search step's
        // changelog read fails with an io error, which must surface as a
        // Failed report rather than a bare Err out of merge_package.
        let left_dir = scratch.path().join("left");
        let right_dir = scratch.path().join("right");
        fs::create_dir_all(&left_dir).unwrap();
        write_changelog(&right_dir, "pkg (1.0-2) unstable; urgency=low\n\n  * r\n\n -- B <b@b>  Tue, 02 Jan 2024 00:00:00 +0000\n");

        let left = sample_package_version("pkg", "ubuntu", "1.0-1", &left_dir);
        let right_version = sample_package_version("pkg", "debian", "1.0-2", &right_dir);

        let catalogue = FakeCatalogue::new(vec![right_version]);
        let debian = FakeDistro {
            name: "debian".to_string(),
            catalogue,
        };

        let mut source_lists = HashMap::new();
        source_lists.insert(
            "pkg".to_string(),
            vec![vec![crate::model::Source {
                distro: "debian".to_string(),
                dist: "unstable".to_string(),
            }]],
        );
        let target = FakeTarget {
            name: "ubuntu".to_string(),
            blacklist: Default::default(),
            source_lists,
            scratch_root: scratch.path().to_path_buf(),
        };
        let config = OrchestratorConfig {
            local_suffix: "ubuntu1".to_string(),
            mom_name: "Merge-o-Matic".to_string(),
            mom_email: "mom@example.org".to_string(),
        };
        let tools = StubTools::default();
        let output_dir = scratch.path().join("out");
        let left_distro = EmptyDistro {
            name: "ubuntu".to_string(),
        };

        let report = merge_package(
            &left,
            &left_distro,
            "main",
            &target,
            &|name| if name == "debian" { Some(&debian as &dyn Distro) } else { None },
            scratch.path(),
            &output_dir,
            &config,
            &tools,
            false,
        )
        .unwrap();

        assert_eq!(report.result, MergeResult::Failed);
        assert!(report.message.is_some());
        assert!(MergeReport::read(&output_dir).is_ok());
    }
}
