// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # External tool abstraction
//!
//! The merger shells out to a handful of well-known Debian tools. Exit codes
//! are the primary signal; stdout/stderr are logged but never parsed. Tests
//! stub this trait instead of invoking real subprocesses.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of a `diff3`-style three-way text merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diff3Outcome {
    /// Exit 0: merged cleanly, `output` holds the merged text.
    Clean(Vec<u8>),
    /// Exit 1: merged with conflict markers left in `output`.
    Conflicts(Vec<u8>),
    /// Exit 2, or any other unexpected failure: tool error.
    ToolError,
}

/// Abstraction over the external tools consumed by the merge engine
/// (spec §6). A real implementation shells out; tests substitute a
/// deterministic stub.
pub trait Tools {
    /// `diff3 -E -m -L<left_label> -L BASE -L<right_label> left base right`.
    fn diff3(
        &self,
        left: &Path,
        base: &Path,
        right: &Path,
        left_label: &str,
        right_label: &str,
    ) -> Result<Diff3Outcome, ToolError>;

    /// `msgmerge --force-po -o out -C left right pot`.
    fn msgmerge(&self, right: &Path, pot: &Path, left: &Path, out: &Path) -> Result<bool, ToolError>;

    /// `msgcat --force-po --use-first -o out right left` (right preferred).
    fn msgcat(&self, right: &Path, left: &Path, out: &Path) -> Result<bool, ToolError>;

    /// `dpkg-source -b [-sa] dir`. Returns whether it succeeded.
    fn dpkg_source_build(&self, dir: &Path, include_orig: bool) -> Result<bool, ToolError>;

    /// `diff -pruN a b`, returning the raw patch text (empty if identical).
    fn diff_pruN(&self, a: &Path, b: &Path) -> Result<Vec<u8>, ToolError>;

    /// `tar czf out -C dir .`
    fn tar_czf(&self, out: &Path, dir: &Path) -> Result<bool, ToolError>;
}

/// Real `Tools` implementation, invoking the host's installed binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTools;

impl ProcessTools {
    pub fn new() -> Self {
        Self
    }
}

fn run(mut cmd: Command) -> Result<std::process::Output, ToolError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    cmd.output().map_err(|source| ToolError::Spawn { program, source })
}

impl Tools for ProcessTools {
    fn diff3(
        &self,
        left: &Path,
        base: &Path,
        right: &Path,
        left_label: &str,
        right_label: &str,
    ) -> Result<Diff3Outcome, ToolError> {
        let mut cmd = Command::new("diff3");
        cmd.arg("-E")
            .arg("-m")
            .arg("-L")
            .arg(left_label)
            .arg("-L")
            .arg("BASE")
            .arg("-L")
            .arg(right_label)
            .arg(left)
            .arg(base)
            .arg(right);
        let output = run(cmd)?;
        match output.status.code() {
            Some(0) => Ok(Diff3Outcome::Clean(output.stdout)),
            Some(1) => Ok(Diff3Outcome::Conflicts(output.stdout)),
            _ => {
                log::warn!(
                    "diff3 exited with status {:?}; stderr: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                );
                Ok(Diff3Outcome::ToolError)
            }
        }
    }

    fn msgmerge(&self, right: &Path, pot: &Path, left: &Path, out: &Path) -> Result<bool, ToolError> {
        let mut cmd = Command::new("msgmerge");
        cmd.arg("--force-po")
            .arg("-o")
            .arg(out)
            .arg("-C")
            .arg(left)
            .arg(right)
            .arg(pot);
        let output = run(cmd)?;
        if !output.status.success() {
            log::warn!(
                "msgmerge failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(output.status.success())
    }

    fn msgcat(&self, right: &Path, left: &Path, out: &Path) -> Result<bool, ToolError> {
        let mut cmd = Command::new("msgcat");
        cmd.arg("--force-po")
            .arg("--use-first")
            .arg("-o")
            .arg(out)
            .arg(right)
            .arg(left);
        let output = run(cmd)?;
        if !output.status.success() {
            log::warn!("msgcat failed: {}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(output.status.success())
    }

    fn dpkg_source_build(&self, dir: &Path, include_orig: bool) -> Result<bool, ToolError> {
        let mut cmd = Command::new("dpkg-source");
        cmd.arg("-b");
        if include_orig {
            cmd.arg("-sa");
        }
        cmd.arg(dir);
        let output = run(cmd)?;
        if !output.status.success() {
            log::warn!(
                "dpkg-source -b failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(output.status.success())
    }

    fn diff_pruN(&self, a: &Path, b: &Path) -> Result<Vec<u8>, ToolError> {
        let mut cmd = Command::new("diff");
        cmd.arg("-pruN").arg(a).arg(b);
        let output = run(cmd)?;
        // diff exits 1 when files differ; that's expected, not a failure.
        Ok(output.stdout)
    }

    fn tar_czf(&self, out: &Path, dir: &Path) -> Result<bool, ToolError> {
        let mut cmd = Command::new("tar");
        cmd.arg("czf").arg(out).arg("-C").arg(dir).arg(".");
        let output = run(cmd)?;
        if !output.status.success() {
            log::warn!("tar czf failed: {}", String::from_utf8_lossy(&output.stderr));
        }
        Ok(output.status.success())
    }
}
