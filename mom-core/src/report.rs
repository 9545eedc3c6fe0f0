// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Merge report
//!
//! `MergeReport` is the single source of truth for downstream tooling
//! (spec §7): written once per merge attempt as authoritative JSON
//! (tmp-file + atomic rename), with stable field ordering and `#`-prefixed
//! sibling keys carrying human-readable captions. A read-only legacy
//! plain-text reader is kept for one release's worth of backwards
//! compatibility (spec §9).

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::version::{Version, VersionError};

/// The seven merge outcome classes driving downstream automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MergeResult {
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "NO_BASE")]
    NoBase,
    #[serde(rename = "SYNC_THEIRS")]
    SyncTheirs,
    #[serde(rename = "KEEP_OURS")]
    KeepOurs,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "MERGED")]
    Merged,
    #[serde(rename = "CONFLICTS")]
    Conflicts,
}

impl MergeResult {
    fn as_str(&self) -> &'static str {
        match self {
            MergeResult::Unknown => "UNKNOWN",
            MergeResult::NoBase => "NO_BASE",
            MergeResult::SyncTheirs => "SYNC_THEIRS",
            MergeResult::KeepOurs => "KEEP_OURS",
            MergeResult::Failed => "FAILED",
            MergeResult::Merged => "MERGED",
            MergeResult::Conflicts => "CONFLICTS",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "UNKNOWN" => MergeResult::Unknown,
            "NO_BASE" => MergeResult::NoBase,
            "SYNC_THEIRS" => MergeResult::SyncTheirs,
            "KEEP_OURS" => MergeResult::KeepOurs,
            "FAILED" => MergeResult::Failed,
            "MERGED" => MergeResult::Merged,
            "CONFLICTS" => MergeResult::Conflicts,
            _ => return None,
        })
    }

    /// Idempotency: these terminal results are skipped on re-run with the
    /// same `(left, right)`. `NO_BASE`, `FAILED`, `UNKNOWN` are always
    /// retried (spec §4.7 step 4, §9).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MergeResult::KeepOurs
                | MergeResult::SyncTheirs
                | MergeResult::Merged
                | MergeResult::Conflicts
        )
    }

    fn caption(&self, tarball_without_conflicts: bool) -> &'static str {
        match self {
            MergeResult::Unknown => "???",
            MergeResult::NoBase => {
                "Failed to merge because the base version required for a 3-way merge is missing from the pool."
            }
            MergeResult::SyncTheirs => {
                "Right version supersedes the left version and can be added to the left (target) distro with no changes."
            }
            MergeResult::KeepOurs => "Left version already newest, or no right version exists; nothing to do.",
            MergeResult::Failed if tarball_without_conflicts => {
                "merge failed somehow, a tarball was produced"
            }
            MergeResult::Failed => "Unexpected failure, no output",
            MergeResult::Merged => "Merge appears to have been successful",
            MergeResult::Conflicts => "3-way merge encountered conflicts",
        }
    }
}

/// One side's identity and file listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Side {
    pub distro: String,
    pub component: String,
    pub version: Version,
    pub files: Vec<String>,
}

/// The base side lacks a component (it is looked up by version alone).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSide {
    pub distro: String,
    pub version: Version,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub source_package: String,
    pub merge_date: DateTime<Utc>,
    pub result: MergeResult,
    pub left: Side,
    pub left_patch: Option<String>,
    pub bases_not_found: Vec<Version>,
    pub base: Option<BaseSide>,
    pub right: Side,
    pub right_patch: Option<String>,
    pub merged_version: Option<Version>,
    pub merged_dir: String,
    pub merged_files: Option<Vec<String>>,
    pub merged_patch: Option<String>,
    pub merge_failure_tarball: Option<String>,
    pub conflicts: Vec<String>,
    pub build_metadata_changed: bool,
    pub genchanges: Option<String>,
    pub committed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed report at {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("invalid version in report: {0}")]
    Version(#[from] VersionError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MergeReport {
    /// `genchanges` follows spec §4.9: populated for `{MERGED, CONFLICTS,
    /// FAILED}` as `"-S -v<left.version>[ -sa]"`, with `-sa` appended when
    /// `merged_version`'s revision is set and `left.upstream !=
    /// merged_version.upstream`.
    pub fn compute_genchanges(&self) -> Option<String> {
        if !matches!(
            self.result,
            MergeResult::Merged | MergeResult::Conflicts | MergeResult::Failed
        ) {
            return None;
        }
        let needs_sa = match &self.merged_version {
            Some(mv) => mv.revision().is_some() && mv.upstream() != self.left.version.upstream(),
            None => true,
        };
        Some(format!(
            "-S -v{}{}",
            self.left.version,
            if needs_sa { " -sa" } else { "" }
        ))
    }

    /// Serialize to the authoritative JSON form (spec §4.9), field order
    /// fixed for reviewability.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("source_package".into(), Value::String(self.source_package.clone()));
        map.insert(
            "merge_date".into(),
            Value::String(self.merge_date.to_rfc3339()),
        );

        let tarball_without_conflicts =
            self.result == MergeResult::Failed && self.conflicts.is_empty() && self.merge_failure_tarball.is_some();
        map.insert(
            "#result".into(),
            Value::String(self.result.caption(tarball_without_conflicts).to_string()),
        );
        map.insert("result".into(), Value::String(self.result.as_str().to_string()));

        map.insert("#left".into(), Value::String("'our' version".into()));
        insert_side(&mut map, "left", &self.left);
        if let Some(patch) = &self.left_patch {
            map.insert(
                "#left_patch".into(),
                Value::String("diff(base version ... left version)".into()),
            );
            map.insert("left_patch".into(), Value::String(patch.clone()));
        }

        if !self.bases_not_found.is_empty() {
            map.insert(
                "#bases_not_found".into(),
                Value::String("these common ancestors were unavailable".into()),
            );
            map.insert(
                "bases_not_found".into(),
                Value::Array(
                    self.bases_not_found
                        .iter()
                        .map(|v| Value::String(v.to_string()))
                        .collect(),
                ),
            );
        }

        map.insert(
            "#base".into(),
            Value::String("common ancestor of 'left' and 'right'".into()),
        );
        if let Some(base) = &self.base {
            map.insert("base_version".into(), Value::String(base.version.to_string()));
            map.insert("base_distro".into(), Value::String(base.distro.clone()));
            map.insert(
                "base_files".into(),
                Value::Array(base.files.iter().cloned().map(Value::String).collect()),
            );
        }

        map.insert("#right".into(), Value::String("'their' version".into()));
        insert_side(&mut map, "right", &self.right);
        if let Some(patch) = &self.right_patch {
            map.insert(
                "#right_patch".into(),
                Value::String("diff(base version ... right version)".into()),
            );
            map.insert("right_patch".into(), Value::String(patch.clone()));
        }

        if let Some(mv) = &self.merged_version {
            map.insert("merged_version".into(), Value::String(mv.to_string()));
        }
        map.insert("merged_dir".into(), Value::String(self.merged_dir.clone()));
        if let Some(files) = &self.merged_files {
            map.insert(
                "merged_files".into(),
                Value::Array(files.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(patch) = &self.merged_patch {
            map.insert(
                "#merged_patch".into(),
                Value::String("diff(left ... merged) for review".into()),
            );
            map.insert("merged_patch".into(), Value::String(patch.clone()));
        }
        if let Some(tarball) = &self.merge_failure_tarball {
            map.insert("merge_failure_tarball".into(), Value::String(tarball.clone()));
        }

        if self.result == MergeResult::Merged {
            map.insert(
                "build_metadata_changed".into(),
                Value::Bool(self.build_metadata_changed),
            );
        }

        if !self.conflicts.is_empty() {
            let mut sorted = self.conflicts.clone();
            sorted.sort();
            map.insert(
                "conflicts".into(),
                Value::Array(sorted.into_iter().map(Value::String).collect()),
            );
        }

        if let Some(genchanges) = &self.genchanges {
            map.insert(
                "#genchanges".into(),
                Value::String(
                    "Pass these arguments to dpkg-genchanges, dpkg-buildpackage or debuild when you have completed the merge".into(),
                ),
            );
            map.insert("genchanges".into(), Value::String(genchanges.clone()));
        }

        map.insert("committed".into(), Value::Bool(self.committed));
        if let Some(message) = &self.message {
            map.insert("message".into(), Value::String(message.clone()));
        }

        Value::Object(map)
    }

    /// Render the human-readable companion report (`produce_merges.py`
    /// writes this alongside the JSON so an operator can read a merge
    /// result without tooling). Never the write path of record; `REPORT.json`
    /// is authoritative.
    pub fn to_prose(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.source_package);
        out.push('\n');

        let merged_without_changes = self.result == MergeResult::SyncTheirs;

        if let Some(base) = &self.base {
            out.push_str(&format!("base: {}\n", base.version));
            for file in &base.files {
                out.push_str(&format!("    {file}\n"));
            }
        }

        out.push_str(&format!(
            "our distro ({}): {}\n",
            self.left.distro, self.left.version
        ));
        for file in &self.left.files {
            out.push_str(&format!("    {file}\n"));
        }

        out.push_str(&format!(
            "source distro ({}): {}\n",
            self.right.distro, self.right.version
        ));
        for file in &self.right.files {
            out.push_str(&format!("    {file}\n"));
        }

        if merged_without_changes {
            out.push_str("generated:\n");
            for file in &self.right.files {
                out.push_str(&format!("    {file}\n"));
            }
        } else if let Some(files) = &self.merged_files {
            out.push_str("generated:\n");
            for file in files {
                out.push_str(&format!("    {file}\n"));
            }
        }

        if !self.conflicts.is_empty() {
            out.push_str("Conflicts in:\n");
            let mut sorted = self.conflicts.clone();
            sorted.sort();
            for conflict in sorted {
                out.push_str(&format!("    {conflict}\n"));
            }
        }

        out.push_str(&format!(
            "Merged without changes: {}\n",
            if merged_without_changes { "YES" } else { "NO" }
        ));
        out.push_str(&format!(
            "Build-time metadata changed: {}\n",
            if self.build_metadata_changed { "YES" } else { "NO" }
        ));
        out.push_str(&format!(
            "Merge committed: {}\n",
            if self.committed { "YES" } else { "NO" }
        ));

        out
    }

    /// Write as `REPORT.json` (authoritative, via a `.tmp` sibling plus
    /// atomic rename; spec §4.9). The legacy plain-text `REPORT` is
    /// read-only (spec §9) — [`Self::to_prose`] exists for display, never
    /// for this write path.
    pub fn write(&self, output_dir: &Path) -> Result<(), ReportError> {
        let final_path = output_dir.join("REPORT.json");
        let tmp_path = output_dir.join("REPORT.json.tmp");
        std::fs::create_dir_all(output_dir).map_err(|source| ReportError::Io {
            path: output_dir.display().to_string(),
            source,
        })?;
        let json = self.to_json();
        let text = serde_json::to_string_pretty(&json)?;
        std::fs::write(&tmp_path, text).map_err(|source| ReportError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, &final_path).map_err(|source| ReportError::Io {
            path: final_path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    /// Read a report from `output_dir`, preferring `REPORT.json` and
    /// falling back to the legacy plain-text `REPORT` (read-only).
    pub fn read(output_dir: &Path) -> Result<MergeReport, ReportError> {
        let json_path = output_dir.join("REPORT.json");
        if json_path.is_file() {
            let text = std::fs::read_to_string(&json_path).map_err(|source| ReportError::Io {
                path: json_path.display().to_string(),
                source,
            })?;
            let value: Value = serde_json::from_str(&text)?;
            return from_json(&value, &json_path);
        }
        let text_path = output_dir.join("REPORT");
        if text_path.is_file() {
            let text = std::fs::read_to_string(&text_path).map_err(|source| ReportError::Io {
                path: text_path.display().to_string(),
                source,
            })?;
            return read_legacy_text(&text, &text_path);
        }
        Err(ReportError::Malformed {
            path: output_dir.display().to_string(),
            reason: "no REPORT.json or REPORT exists".to_string(),
        })
    }
}

fn insert_side(map: &mut Map<String, Value>, prefix: &str, side: &Side) {
    map.insert(format!("{prefix}_distro"), Value::String(side.distro.clone()));
    map.insert(
        format!("{prefix}_component"),
        Value::String(side.component.clone()),
    );
    map.insert(
        format!("{prefix}_version"),
        Value::String(side.version.to_string()),
    );
    map.insert(
        format!("{prefix}_files"),
        Value::Array(side.files.iter().cloned().map(Value::String).collect()),
    );
}

fn from_json(value: &Value, path: &Path) -> Result<MergeReport, ReportError> {
    let obj = value.as_object().ok_or_else(|| ReportError::Malformed {
        path: path.display().to_string(),
        reason: "top-level value is not an object".to_string(),
    })?;

    let required_str = |key: &str| -> Result<String, ReportError> {
        obj.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ReportError::Malformed {
                path: path.display().to_string(),
                reason: format!("missing or non-string field {key:?}"),
            })
    };
    let opt_str = |key: &str| -> Option<String> {
        obj.get(key).and_then(Value::as_str).map(str::to_string)
    };
    let str_array = |key: &str| -> Vec<String> {
        obj.get(key)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };

    let source_package = required_str("source_package")?;
    let merge_date = obj
        .get("merge_date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ReportError::Malformed {
            path: path.display().to_string(),
            reason: "missing or invalid merge_date".to_string(),
        })?;
    let result = obj
        .get("result")
        .and_then(Value::as_str)
        .and_then(MergeResult::from_str)
        .ok_or_else(|| ReportError::Malformed {
            path: path.display().to_string(),
            reason: "missing or invalid result".to_string(),
        })?;

    let left = Side {
        distro: required_str("left_distro")?,
        component: opt_str("left_component").unwrap_or_default(),
        version: Version::parse(&required_str("left_version")?)?,
        files: str_array("left_files"),
    };
    let right = Side {
        distro: required_str("right_distro")?,
        component: opt_str("right_component").unwrap_or_default(),
        version: Version::parse(&required_str("right_version")?)?,
        files: str_array("right_files"),
    };
    let base = match opt_str("base_version") {
        Some(v) => Some(BaseSide {
            distro: opt_str("base_distro").unwrap_or_default(),
            version: Version::parse(&v)?,
            files: str_array("base_files"),
        }),
        None => None,
    };

    let bases_not_found = obj
        .get("bases_not_found")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| Version::parse(s).ok())
                .collect()
        })
        .unwrap_or_default();

    let merged_version = opt_str("merged_version")
        .map(|s| Version::parse(&s))
        .transpose()?;

    Ok(MergeReport {
        source_package,
        merge_date,
        result,
        left,
        left_patch: opt_str("left_patch"),
        bases_not_found,
        base,
        right,
        right_patch: opt_str("right_patch"),
        merged_version,
        merged_dir: opt_str("merged_dir").unwrap_or_default(),
        merged_files: obj.get("merged_files").map(|_| str_array("merged_files")),
        merged_patch: opt_str("merged_patch"),
        merge_failure_tarball: opt_str("merge_failure_tarball"),
        conflicts: str_array("conflicts"),
        build_metadata_changed: obj
            .get("build_metadata_changed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        genchanges: opt_str("genchanges"),
        committed: obj.get("committed").and_then(Value::as_bool).unwrap_or(false),
        message: opt_str("message"),
    })
}

/// Read-only support for the pre-JSON `REPORT` text format
/// (`merge_report.py:_read_report_text`).
fn read_legacy_text(text: &str, path: &Path) -> Result<MergeReport, ReportError> {
    let mut fields: HashMap<&str, String> = HashMap::new();
    let mut base_files = Vec::new();
    let mut left_files = Vec::new();
    let mut right_files = Vec::new();
    let mut merged_files = Vec::new();
    let mut merged_is_right = false;
    let mut build_metadata_changed = true;
    let mut committed = false;

    let mut lines = text.lines();
    let source_package = lines.next().unwrap_or_default().trim().to_string();

    let header_re = {
        use once_cell::sync::Lazy;
        use regex::Regex;
        static OUR: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^our distro \(([^)]+)\): (.+)$").unwrap());
        static THEIR: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^source distro \(([^)]+)\): (.+)$").unwrap());
        (OUR.clone(), THEIR.clone())
    };

    let mut in_list: Option<&str> = None;
    for line in lines {
        if line.starts_with("    ") {
            let value = line.trim().to_string();
            match in_list {
                Some("base") => base_files.push(value),
                Some("left") => left_files.push(value),
                Some("right") => right_files.push(value),
                Some("merged") => merged_files.push(value),
                _ => {}
            }
        } else {
            in_list = None;
        }

        if let Some(rest) = line.strip_prefix("base:") {
            fields.insert("base_version", rest.trim().to_string());
            in_list = Some("base");
        } else if let Some(caps) = header_re.0.captures(line) {
            fields.insert("left_distro", caps[1].to_string());
            fields.insert("left_version", caps[2].trim().to_string());
            in_list = Some("left");
        } else if let Some(caps) = header_re.1.captures(line) {
            fields.insert("right_distro", caps[1].to_string());
            fields.insert("right_version", caps[2].trim().to_string());
            in_list = Some("right");
        } else if line.starts_with("generated:") {
            in_list = Some("merged");
        } else if line.starts_with("Merged without changes: YES") {
            merged_is_right = true;
        } else if line.starts_with("Build-time metadata changed: NO") {
            build_metadata_changed = false;
        } else if line.starts_with("Merge committed: YES") {
            committed = true;
        }
    }

    let left_distro = fields.get("left_distro").cloned().ok_or_else(|| ReportError::Malformed {
        path: path.display().to_string(),
        reason: "missing left distro line".to_string(),
    })?;
    let right_distro = fields
        .get("right_distro")
        .cloned()
        .ok_or_else(|| ReportError::Malformed {
            path: path.display().to_string(),
            reason: "missing right distro line".to_string(),
        })?;
    let left_version = Version::parse(fields.get("left_version").map(String::as_str).unwrap_or_default())?;
    let right_version = Version::parse(fields.get("right_version").map(String::as_str).unwrap_or_default())?;

    let base = fields.get("base_version").map(|v| -> Result<BaseSide, ReportError> {
        Ok(BaseSide {
            distro: String::new(),
            version: Version::parse(v)?,
            files: base_files.clone(),
        })
    }).transpose()?;

    let (merged_files_opt, merged_dir) = if merged_is_right {
        (Some(right_files.clone()), String::new())
    } else {
        (
            if merged_files.is_empty() { None } else { Some(merged_files) },
            path.parent().map(|p| p.display().to_string()).unwrap_or_default(),
        )
    };

    let result = if merged_is_right {
        MergeResult::SyncTheirs
    } else if base.is_none() {
        MergeResult::NoBase
    } else {
        MergeResult::Unknown
    };

    Ok(MergeReport {
        source_package,
        merge_date: Utc::now(),
        result,
        left: Side {
            distro: left_distro,
            component: String::new(),
            version: left_version,
            files: left_files,
        },
        left_patch: None,
        bases_not_found: Vec::new(),
        base,
        right: Side {
            distro: right_distro,
            component: String::new(),
            version: right_version,
            files: right_files,
        },
        right_patch: None,
        merged_version: None,
        merged_dir,
        merged_files: merged_files_opt,
        merged_patch: None,
        merge_failure_tarball: None,
        conflicts: Vec::new(),
        build_metadata_changed,
        genchanges: None,
        committed,
        message: None,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn sample_side(v: &str) -> Side {
        Side {
            distro: "ubuntu".to_string(),
            component: "main".to_string(),
            version: Version::parse(v).unwrap(),
            files: vec![format!("pkg_{v}.dsc")],
        }
    }

    fn sample_report() -> MergeReport {
        MergeReport {
            source_package: "pkg".to_string(),
            merge_date: Utc::now(),
            result: MergeResult::Merged,
            left: sample_side("1.0-1"),
            left_patch: None,
            bases_not_found: vec![],
            base: Some(BaseSide {
                distro: "debian".to_string(),
                version: Version::parse("1.0-1").unwrap(),
                files: vec!["pkg_1.0-1.dsc".to_string()],
            }),
            right: sample_side("1.0-2"),
            right_patch: None,
            merged_version: Some(Version::parse("1.0-2ubuntu1").unwrap()),
            merged_dir: "/merges/ubuntu/pkg".to_string(),
            merged_files: Some(vec!["pkg_1.0-2ubuntu1.dsc".to_string()]),
            merged_patch: None,
            merge_failure_tarball: None,
            conflicts: vec![],
            build_metadata_changed: false,
            genchanges: None,
            committed: false,
            message: None,
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let mut report = sample_report();
        report.genchanges = report.compute_genchanges();
        report.write(dir.path()).unwrap();

        assert!(dir.path().join("REPORT.json").is_file());
        assert!(!dir.path().join("REPORT.json.tmp").exists());
        assert!(!dir.path().join("REPORT").exists());

        let read_back = MergeReport::read(dir.path()).unwrap();
        assert_eq!(read_back.source_package, "pkg");
        assert_eq!(read_back.result, MergeResult::Merged);
        assert_eq!(read_back.left.version, Version::parse("1.0-1").unwrap());
        assert_eq!(read_back.right.version, Version::parse("1.0-2").unwrap());
        assert_eq!(read_back.genchanges.as_deref(), Some("-S -v1.0-1 -sa"));
    }

    #[test]
    fn prose_report_lists_sides_and_generated_files() {
        let report = sample_report();
        let prose = report.to_prose();
        assert!(prose.starts_with("pkg\n"));
        assert!(prose.contains("base: 1.0-1"));
        assert!(prose.contains("our distro (ubuntu): 1.0-1"));
        assert!(prose.contains("source distro (ubuntu): 1.0-2"));
        assert!(prose.contains("generated:"));
        assert!(prose.contains("pkg_1.0-2ubuntu1.dsc"));
        assert!(prose.contains("Merged without changes: NO"));
        assert!(prose.contains("Build-time metadata changed: NO"));
        assert!(prose.contains("Merge committed: NO"));
    }

    #[test]
    fn json_uses_caption_siblings_and_stable_ordering() {
        let report = sample_report();
        let value = report.to_json();
        let obj = value.as_object().unwrap();
        let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        assert_eq!(keys[0], "source_package");
        assert_eq!(keys[1], "merge_date");
        assert_eq!(keys[2], "#result");
        assert_eq!(keys[3], "result");
        assert!(obj.contains_key("#left"));
        assert!(obj.contains_key("#base"));
        assert!(obj.contains_key("#right"));
    }

    #[test]
    fn genchanges_adds_sa_when_upstream_changes() {
        let mut report = sample_report();
        report.merged_version = Some(Version::parse("2.0-1ubuntu1").unwrap());
        assert_eq!(report.compute_genchanges().unwrap(), "-S -v1.0-1 -sa");

        report.merged_version = Some(Version::parse("1.0-2ubuntu1").unwrap());
        // left upstream "1.0" == merged upstream "1.0" -> no -sa despite revision
        assert_eq!(report.compute_genchanges().unwrap(), "-S -v1.0-1");
    }

    #[test]
    fn genchanges_is_none_for_non_terminal_results() {
        let mut report = sample_report();
        report.result = MergeResult::KeepOurs;
        assert_eq!(report.compute_genchanges(), None);
    }

    #[test]
    fn legacy_text_report_parses_sync_theirs() {
        let text = "\
pkg
Mon Jan  1 00:00:00 2024

our distro (ubuntu): 1.0-1
    pkg_1.0-1.dsc

source distro (debian): 1.0-2
    pkg_1.0-2.dsc

Merged without changes: YES
";
        let dir = tempdir().unwrap();
        let path = dir.path().join("REPORT");
        std::fs::write(&path, text).unwrap();
        let report = MergeReport::read(dir.path()).unwrap();
        assert_eq!(report.source_package, "pkg");
        assert_eq!(report.result, MergeResult::SyncTheirs);
        assert_eq!(report.left.distro, "ubuntu");
        assert_eq!(report.right.version, Version::parse("1.0-2").unwrap());
        assert_eq!(report.merged_files, Some(vec!["pkg_1.0-2.dsc".to_string()]));
    }
}
