// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # `debian/changelog` parsing and knitting
//!
//! A changelog is a sequence of entries, newest first. Each entry starts with
//! a header line (`package (version) distro(s); urgency=...`) and ends with a
//! trailer line (`  -- Maintainer <email>  date`). Everything in between,
//! including the header and trailer themselves, is the entry's raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::version::Version;

/// Errors returned while reading a changelog.
#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Header line: `package (version) dist1 dist2...; urgency=...`.
static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w[-+0-9a-z.]*) \(([^() \t]+)\)((\s+[-0-9a-z]+)+)\s*;").unwrap());

/// A single changelog entry: its version, and the entry's full raw text,
/// trailer included. `version` is `None` only for a trailing entry that
/// never reaches a footer line before EOF (a truncated or malformed
/// changelog) — callers searching for a common ancestor skip such entries
/// rather than treating them as a real version `"0"`. An entry whose header
/// failed to parse but whose footer *is* present still defaults to `"0"`,
/// matching the original tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub version: Option<Version>,
    pub text: String,
}

/// Parse a changelog's full text into entries, newest-first, matching the
/// file's own order.
pub fn parse(contents: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    let mut version: Option<Version> = None;
    let mut text = String::new();
    let mut seen_header = false;

    for line in split_keep_newlines(contents) {
        if let Some(caps) = HEADER_RE.captures(line) {
            version = caps
                .get(2)
                .and_then(|m| Version::parse(m.as_str()).ok());
            text.push_str(line);
            seen_header = true;
        } else if line.starts_with(" -- ") {
            let ver = version.take().unwrap_or_else(|| {
                Version::new(None, "0", None).expect("\"0\" is a valid upstream version")
            });
            text.push_str(line);
            entries.push(Entry { version: Some(ver), text });
            text = String::new();
            seen_header = false;
        } else if !line.trim().is_empty() || seen_header {
            text.push_str(line);
        }
    }

    if !text.is_empty() {
        // No footer before EOF: a truncated/malformed trailing entry.
        // Unlike the footer-closed branch above, this is left as `None`
        // rather than defaulted to version `"0"`, so callers can skip it.
        entries.push(Entry { version, text });
    }

    entries
}

/// Split into lines, keeping each line's trailing `\n` (or `\r\n`) attached,
/// so re-assembled entry text reproduces the original bytes exactly.
fn split_keep_newlines(s: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = s.as_bytes();
    for (idx, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&s[start..=idx]);
            start = idx + 1;
        }
    }
    if start < s.len() {
        lines.push(&s[start..]);
    }
    lines
}

/// Read and parse a changelog file from disk.
pub fn read_file(path: &std::path::Path) -> Result<Vec<Entry>, ChangelogError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ChangelogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse(&contents))
}

/// Knit two changelogs into one, newest-first, by right-scan-with-supersession:
/// walk `right`'s entries newest-first; for each, first drain every `left`
/// entry strictly newer than it (they have no counterpart on the right and
/// are kept verbatim), then drop any `left` entries at exactly the same
/// version (the right side's entry for that version wins), then emit the
/// right entry. Whatever remains of `left` once `right` is exhausted — i.e.
/// entries older than anything on `right` — is appended verbatim.
pub fn knit(left: &[Entry], right: &[Entry]) -> String {
    let mut left: std::collections::VecDeque<&Entry> = left.iter().collect();
    let mut out = String::new();

    for right_entry in right {
        while left.front().map_or(false, |e| e.version > right_entry.version) {
            let entry = left.pop_front().unwrap();
            out.push_str(&entry.text);
        }
        while left.front().map_or(false, |e| e.version == right_entry.version) {
            left.pop_front();
        }
        out.push_str(&right_entry.text);
    }

    for entry in left {
        out.push_str(&entry.text);
    }

    out
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "\
foo (1.2-1) unstable; urgency=low

  * New release.

 -- A B <a@b.org>  Mon, 01 Jan 2024 00:00:00 +0000

foo (1.1-1) unstable; urgency=low

  * Older release.

 -- A B <a@b.org>  Sun, 01 Jan 2023 00:00:00 +0000
";

    #[test]
    fn parses_entries_newest_first() {
        let entries = parse(SAMPLE);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].version, Some(Version::parse("1.2-1").unwrap()));
        assert_eq!(entries[1].version, Some(Version::parse("1.1-1").unwrap()));
        assert!(entries[0].text.starts_with("foo (1.2-1)"));
        assert!(entries[0].text.trim_end().ends_with("+0000"));
    }

    #[test]
    fn round_trips_exact_text() {
        let entries = parse(SAMPLE);
        let reassembled: String = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(reassembled, SAMPLE);
    }

    #[test]
    fn unparseable_header_falls_back_to_version_zero() {
        let text = "foo (???) unstable; urgency=low\n\n -- A B <a@b.org>  Mon, 01 Jan 2024 00:00:00 +0000\n";
        let entries = parse(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].version, Some(Version::new(None, "0", None).unwrap()));
    }

    #[test]
    fn knit_keeps_entries_unique_to_each_side_and_right_wins_on_overlap() {
        let left = parse(
            "\
pkg (1.3-1) unstable; urgency=low

  * Left only, newer than right's head.

 -- L <l@l.org>  Wed, 03 Jan 2024 00:00:00 +0000

pkg (1.2-1) unstable; urgency=low

  * Left's version of 1.2, should be superseded by right.

 -- L <l@l.org>  Tue, 02 Jan 2024 00:00:00 +0000

pkg (1.0-1) unstable; urgency=low

  * Left only, older than anything on right.

 -- L <l@l.org>  Mon, 01 Jan 2022 00:00:00 +0000
",
        );
        let right = parse(
            "\
pkg (1.2-1) unstable; urgency=low

  * Right's version of 1.2.

 -- R <r@r.org>  Tue, 02 Jan 2024 01:00:00 +0000
",
        );

        let knitted = knit(&left, &right);
        let entries = parse(&knitted);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].version, Some(Version::parse("1.3-1").unwrap()));
        assert!(entries[0].text.contains("Left only, newer"));
        assert_eq!(entries[1].version, Some(Version::parse("1.2-1").unwrap()));
        assert!(entries[1].text.contains("Right's version of 1.2"));
        assert_eq!(entries[2].version, Some(Version::parse("1.0-1").unwrap()));
        assert!(entries[2].text.contains("Left only, older"));
    }

    #[test]
    fn knit_appends_remaining_left_entries_when_right_is_exhausted() {
        let left = parse(SAMPLE);
        let knitted = knit(&left, &[]);
        assert_eq!(knitted, SAMPLE);
    }
}
