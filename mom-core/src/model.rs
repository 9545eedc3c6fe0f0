// Copyright 2026 Merge-o-Matic contributors
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # External interfaces (spec §6)
//!
//! The repository model, mirror fetching, and archive parsing are explicit
//! Non-goals — the orchestrator consumes them only through these traits.
//! [`testkit`] provides a minimal filesystem-backed implementation so the
//! orchestrator and ancestor finder can be exercised end-to-end in tests
//! without a real archive mirror.

use std::path::PathBuf;

use thiserror::Error;

use crate::version::Version;

/// One file belonging to a [`PackageVersion`]'s source stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StanzaFile {
    pub filename: String,
    pub size: u64,
    pub md5: String,
}

/// `(distro name, source package name)` identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId {
    pub distro: String,
    pub name: String,
}

/// An immutable `(package identity, version, stanza handle)` tuple.
pub trait PackageVersion {
    fn id(&self) -> &PackageId;
    fn version(&self) -> &Version;
    fn component(&self) -> &str;
    fn files(&self) -> &[StanzaFile];
    /// The on-disk directory holding the unpacked source tree, if already
    /// unpacked (the orchestrator unpacks lazily via [`Target`]).
    fn source_dir(&self) -> Option<&std::path::Path>;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("package {name} not found in {distro}")]
    PackageNotFound { distro: String, name: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source of packages: an upstream distro/dist pair configured for a
/// target (spec §6 `Target.getSourceLists`).
#[derive(Debug, Clone)]
pub struct Source {
    pub distro: String,
    pub dist: String,
}

/// A package within a distro/component, exposing its newest version and
/// pool directory.
pub trait Package {
    fn name(&self) -> &str;
    fn newest_version(&self) -> Box<dyn PackageVersion>;
    fn pool_directory(&self) -> Box<dyn PoolDirectory>;
}

/// A pool directory: versioned source files for one package, plus a
/// `Sources` index (spec §6).
pub trait PoolDirectory {
    fn path(&self) -> &std::path::Path;
    fn source_stanzas(&self) -> Vec<PoolStanza>;
    /// Remove the files of `stanza` from disk, unless `keep_filenames`
    /// still references them (shared orig tarballs).
    fn remove_stanza(&self, stanza: &PoolStanza, keep_filenames: &std::collections::HashSet<String>) -> Result<(), ModelError>;
    /// Rewrite the pool's `Sources` index after a removal.
    fn refresh_index(&self) -> Result<(), ModelError>;
}

/// A single `Sources`-file stanza: a package version plus its filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStanza {
    pub version: Version,
    pub files: Vec<StanzaFile>,
}

/// A distribution: enumerates packages, and can locate a specific
/// `(name, version)` elsewhere in its catalogue (used by the ancestor
/// finder to search for materializable base candidates).
pub trait Distro {
    fn name(&self) -> &str;
    fn packages(&self, dist: &str, component: &str) -> Vec<Box<dyn Package>>;
    fn find_package(
        &self,
        name: &str,
        search_dist: &str,
        version: Option<&Version>,
    ) -> Result<Vec<Box<dyn PackageVersion>>, ModelError>;
    /// Per-distro expiry gate: some distros (e.g. ones that don't retain a
    /// local pool, or are mid-import) opt out of the expiry sweep entirely.
    fn should_expire(&self) -> bool {
        true
    }
}

/// The downstream target being merged into: knows its own blacklist, its
/// configured upstream source lists, and how to fetch/unpack a version it
/// doesn't yet have on disk.
pub trait Target {
    fn name(&self) -> &str;
    fn blacklist(&self) -> &std::collections::HashSet<String>;
    fn get_source_lists(&self, package_name: &str) -> Vec<Vec<Source>>;
    /// Idempotent: ensure `version`'s files are present in its pool.
    fn fetch_missing_version(&self, package: &str, version: &Version) -> Result<(), ModelError>;
    /// Unpack a catalogued version's sources into a fresh scratch directory,
    /// returning its path.
    fn unpack(&self, version: &dyn PackageVersion) -> Result<PathBuf, ModelError>;
}

/// Minimal in-memory/filesystem-backed implementations sufficient to drive
/// the orchestrator and ancestor finder in tests, without a real mirror.
#[cfg(test)]
pub mod testkit {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Debug, Clone)]
    pub struct FakePackageVersion {
        pub id: PackageId,
        pub version: Version,
        pub component: String,
        pub files: Vec<StanzaFile>,
        pub source_dir: Option<PathBuf>,
    }

    impl PackageVersion for FakePackageVersion {
        fn id(&self) -> &PackageId {
            &self.id
        }
        fn version(&self) -> &Version {
            &self.version
        }
        fn component(&self) -> &str {
            &self.component
        }
        fn files(&self) -> &[StanzaFile] {
            &self.files
        }
        fn source_dir(&self) -> Option<&std::path::Path> {
            self.source_dir.as_deref()
        }
    }

    /// A package with a fixed catalogue of versions, keyed by distro.
    #[derive(Debug, Clone, Default)]
    pub struct FakeCatalogue {
        pub versions: Rc<RefCell<Vec<FakePackageVersion>>>,
    }

    impl FakeCatalogue {
        pub fn new(versions: Vec<FakePackageVersion>) -> Self {
            Self {
                versions: Rc::new(RefCell::new(versions)),
            }
        }

        pub fn newest(&self) -> FakePackageVersion {
            self.versions
                .borrow()
                .iter()
                .max_by(|a, b| a.version.cmp(&b.version))
                .cloned()
                .expect("catalogue is non-empty by construction")
        }

        pub fn find(&self, version: &Version) -> Option<FakePackageVersion> {
            self.versions
                .borrow()
                .iter()
                .find(|v| &v.version == version)
                .cloned()
        }
    }

    pub struct FakeTarget {
        pub name: String,
        pub blacklist: HashSet<String>,
        pub source_lists: std::collections::HashMap<String, Vec<Vec<Source>>>,
        pub scratch_root: PathBuf,
    }

    impl Target for FakeTarget {
        fn name(&self) -> &str {
            &self.name
        }
        fn blacklist(&self) -> &HashSet<String> {
            &self.blacklist
        }
        fn get_source_lists(&self, package_name: &str) -> Vec<Vec<Source>> {
            self.source_lists.get(package_name).cloned().unwrap_or_default()
        }
        fn fetch_missing_version(&self, _package: &str, _version: &Version) -> Result<(), ModelError> {
            Ok(())
        }
        fn unpack(&self, version: &dyn PackageVersion) -> Result<PathBuf, ModelError> {
            match version.source_dir() {
                Some(dir) => Ok(dir.to_path_buf()),
                None => Err(ModelError::PackageNotFound {
                    distro: version.id().distro.clone(),
                    name: version.id().name.clone(),
                }),
            }
        }
    }
}
