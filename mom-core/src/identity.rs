// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # File-identity probe
//!
//! Two filesystem entries are "the same" for merge purposes per spec §4.3:
//! same top-level type; regular files additionally equal in size and MD5;
//! directories/FIFOs/sockets always equal (their content is their children,
//! handled separately by the tree merger); char/block devices equal in
//! `rdev`; symlinks equal in link target.

use std::fs;
use std::io::Read;
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::path::Path;

use md5::{Digest, Md5};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to stat {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read link {path}: {source}")]
    ReadLink {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Whether `a` and `b` (both must exist) are the "same" filesystem object.
pub fn same(a: &Path, b: &Path) -> Result<bool, IdentityError> {
    let meta_a = fs::symlink_metadata(a).map_err(|source| IdentityError::Stat {
        path: a.display().to_string(),
        source,
    })?;
    let meta_b = fs::symlink_metadata(b).map_err(|source| IdentityError::Stat {
        path: b.display().to_string(),
        source,
    })?;

    let ty_a = meta_a.file_type();
    let ty_b = meta_b.file_type();

    if type_tag(&ty_a) != type_tag(&ty_b) {
        return Ok(false);
    }

    if ty_a.is_symlink() {
        let target_a = fs::read_link(a).map_err(|source| IdentityError::ReadLink {
            path: a.display().to_string(),
            source,
        })?;
        let target_b = fs::read_link(b).map_err(|source| IdentityError::ReadLink {
            path: b.display().to_string(),
            source,
        })?;
        return Ok(target_a == target_b);
    }

    if ty_a.is_char_device() || ty_a.is_block_device() {
        return Ok(meta_a.rdev() == meta_b.rdev());
    }

    if ty_a.is_dir() || ty_a.is_fifo() || ty_a.is_socket() {
        return Ok(true);
    }

    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    Ok(digest(a)? == digest(b)?)
}

/// A coarse `S_IFMT`-equivalent tag distinguishing top-level types.
fn type_tag(ty: &fs::FileType) -> u8 {
    if ty.is_dir() {
        0
    } else if ty.is_symlink() {
        1
    } else if ty.is_char_device() {
        2
    } else if ty.is_block_device() {
        3
    } else if ty.is_fifo() {
        4
    } else if ty.is_socket() {
        5
    } else {
        6 // regular file
    }
}

/// MD5 digest of a regular file's contents.
pub fn digest(path: &Path) -> Result<[u8; 16], IdentityError> {
    let mut file = fs::File::open(path).map_err(|source| IdentityError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|source| IdentityError::Read {
            path: path.display().to_string(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}
