// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Three-way merge engine
//!
//! [`file`] dispatches a single path to a merge strategy; [`attrs`]
//! reconciles permission bits; [`tree`] drives both across an entire
//! source tree and materializes conflicts.

pub mod attrs;
pub mod file;
pub mod tree;
