// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Merge-o-Matic core
//!
//! The domain logic behind an automated three-way merger of Debian source
//! packages: version algebra, changelog knitting, source-tree walking and
//! file-identity probing, the three-way file and tree mergers, an ancestor
//! finder, the merge report model, the per-package orchestrator, and the
//! pool expiry sweep. Mirror fetching, archive parsing, and the full
//! repository model are out of scope here — [`model`] exposes them as
//! traits for a caller to implement against a real archive.

pub mod ancestor;
pub mod changelog;
pub mod expiry;
pub mod identity;
pub mod merge;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod tools;
pub mod version;
pub mod walk;
