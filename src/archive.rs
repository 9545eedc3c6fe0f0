//! Filesystem-backed `Distro`/`Target`/`Package` model.
//!
//! `mom-core` treats the repository model, mirror fetching, and archive
//! index parsing as external collaborators (pluggable traits); this module
//! is the CLI's minimal real implementation of them, against the pool
//! layout from spec §6: `pool/<distro>/<component>/<package>/{Sources,*}`.
//! It does not fetch from a remote mirror — only the local pool is
//! consulted, consistent with mirror fetching being out of scope.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};
use serde::Deserialize;

use mom_core::model::{
    Distro, ModelError, Package, PackageId, PackageVersion, PoolDirectory, PoolStanza, Source,
    StanzaFile, Target,
};
use mom_core::version::Version;

#[derive(Debug, Deserialize)]
struct SourceStanzaRaw {
    #[serde(rename = "Package")]
    package: String,
    #[serde(rename = "Version")]
    version: String,
    #[serde(rename = "Files", default)]
    files: String,
}

fn parse_file_reference(line: &str) -> Option<(String, u64, String)> {
    let mut parts = line.split_ascii_whitespace();
    let md5 = parts.next()?.to_string();
    let size: u64 = parts.next()?.parse().ok()?;
    let filename = parts.next()?.to_string();
    Some((md5, size, filename))
}

/// Read a package's `Sources` index, tolerating a missing file (spec §7:
/// "a missing pool Sources file is silent").
fn read_pool_stanzas(path: &Path) -> Vec<PoolStanza> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no Sources index at {}", path.display());
            return Vec::new();
        }
        Err(e) => {
            warn!("failed to read {}: {e}", path.display());
            return Vec::new();
        }
    };
    let raw: Vec<SourceStanzaRaw> = match rfc822_like::from_str(&content) {
        Ok(r) => r,
        Err(e) => {
            warn!("failed to parse {}: {e}", path.display());
            return Vec::new();
        }
    };
    raw.into_iter()
        .filter_map(|stanza| {
            let version = match Version::parse(&stanza.version) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        "skipping {} stanza with invalid version {:?} in {}: {e}",
                        stanza.package,
                        stanza.version,
                        path.display()
                    );
                    return None;
                }
            };
            let files = stanza
                .files
                .lines()
                .filter_map(parse_file_reference)
                .map(|(md5, size, filename)| StanzaFile { filename, size, md5 })
                .collect();
            Some(PoolStanza { version, files })
        })
        .collect()
}

fn render_pool_stanzas(package: &str, stanzas: &[PoolStanza]) -> String {
    let mut out = String::new();
    for stanza in stanzas {
        out.push_str(&format!("Package: {package}\n"));
        out.push_str(&format!("Version: {}\n", stanza.version));
        out.push_str("Files:\n");
        for file in &stanza.files {
            out.push_str(&format!(" {} {} {}\n", file.md5, file.size, file.filename));
        }
        out.push('\n');
    }
    out
}

pub struct FsPoolDirectory {
    package: String,
    path: PathBuf,
}

impl PoolDirectory for FsPoolDirectory {
    fn path(&self) -> &Path {
        &self.path
    }

    fn source_stanzas(&self) -> Vec<PoolStanza> {
        read_pool_stanzas(&self.path.join("Sources"))
    }

    fn remove_stanza(&self, stanza: &PoolStanza, keep_filenames: &HashSet<String>) -> Result<(), ModelError> {
        for file in &stanza.files {
            if keep_filenames.contains(&file.filename) {
                continue;
            }
            match fs::remove_file(self.path.join(&file.filename)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ModelError::Io(e)),
            }
        }
        Ok(())
    }

    fn refresh_index(&self) -> Result<(), ModelError> {
        let remaining: Vec<PoolStanza> = read_pool_stanzas(&self.path.join("Sources"))
            .into_iter()
            .filter(|s| s.files.iter().all(|f| self.path.join(&f.filename).is_file()))
            .collect();
        let text = render_pool_stanzas(&self.package, &remaining);
        let tmp = self.path.join("Sources.tmp");
        fs::write(&tmp, text).map_err(ModelError::Io)?;
        fs::rename(&tmp, self.path.join("Sources")).map_err(ModelError::Io)?;
        Ok(())
    }
}

#[derive(Clone)]
struct FsPackageVersion {
    id: PackageId,
    version: Version,
    component: String,
    files: Vec<StanzaFile>,
}

impl PackageVersion for FsPackageVersion {
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
    fn source_dir(&self) -> Option<&Path> {
        None
    }
}

struct FsPackage {
    id: PackageId,
    component: String,
    pool_dir: PathBuf,
    stanzas: Vec<PoolStanza>,
}

impl Package for FsPackage {
    fn name(&self) -> &str {
        &self.id.name
    }

    fn newest_version(&self) -> Box<dyn PackageVersion> {
        let newest = self
            .stanzas
            .iter()
            .max_by(|a, b| a.version.cmp(&b.version))
            .expect("FsDistro::packages only yields packages with at least one stanza");
        Box::new(FsPackageVersion {
            id: self.id.clone(),
            version: newest.version.clone(),
            component: self.component.clone(),
            files: newest.files.clone(),
        })
    }

    fn pool_directory(&self) -> Box<dyn PoolDirectory> {
        Box::new(FsPoolDirectory {
            package: self.id.name.clone(),
            path: self.pool_dir.clone(),
        })
    }
}

/// A distro served entirely out of a local pool directory tree
/// (`<root>/pool/<distro>/<component>/<package>/`); never contacts a mirror.
pub struct FsDistro {
    name: String,
    pool_root: PathBuf,
    expire: bool,
}

impl FsDistro {
    pub fn new(name: impl Into<String>, pool_root: PathBuf, expire: bool) -> Self {
        Self {
            name: name.into(),
            pool_root,
            expire,
        }
    }
}

impl Distro for FsDistro {
    fn name(&self) -> &str {
        &self.name
    }

    fn packages(&self, _dist: &str, component: &str) -> Vec<Box<dyn Package>> {
        let component_dir = self.pool_root.join(component);
        let entries = match fs::read_dir(&component_dir) {
            Ok(e) => e,
            Err(e) => {
                debug!("no pool component directory {}: {e}", component_dir.display());
                return Vec::new();
            }
        };

        entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let stanzas = read_pool_stanzas(&entry.path().join("Sources"));
                if stanzas.is_empty() {
                    return None;
                }
                Some(Box::new(FsPackage {
                    id: PackageId {
                        distro: self.name.clone(),
                        name,
                    },
                    component: component.to_string(),
                    pool_dir: entry.path(),
                    stanzas,
                }) as Box<dyn Package>)
            })
            .collect()
    }

    fn find_package(
        &self,
        name: &str,
        _search_dist: &str,
        version: Option<&Version>,
    ) -> Result<Vec<Box<dyn PackageVersion>>, ModelError> {
        let mut found = Vec::new();
        let components = fs::read_dir(&self.pool_root).map_err(ModelError::Io)?;
        for component_entry in components.flatten() {
            if !component_entry.path().is_dir() {
                continue;
            }
            let component = component_entry.file_name().to_string_lossy().into_owned();
            let pool_dir = component_entry.path().join(name);
            let stanzas = read_pool_stanzas(&pool_dir.join("Sources"));
            for stanza in stanzas {
                if let Some(v) = version {
                    if &stanza.version != v {
                        continue;
                    }
                }
                found.push(Box::new(FsPackageVersion {
                    id: PackageId {
                        distro: self.name.clone(),
                        name: name.to_string(),
                    },
                    version: stanza.version,
                    component: component.clone(),
                    files: stanza.files,
                }) as Box<dyn PackageVersion>);
            }
        }

        if found.is_empty() {
            return Err(ModelError::PackageNotFound {
                distro: self.name.clone(),
                name: name.to_string(),
            });
        }
        Ok(found)
    }

    fn should_expire(&self) -> bool {
        self.expire
    }
}

/// A merge target: its blacklist, configured upstream source lists (applied
/// uniformly to every package, matching how `DISTRO_TARGETS` configures a
/// target's sources), and how to unpack a pool version.
pub struct FsTarget {
    name: String,
    blacklist: HashSet<String>,
    source_lists: Vec<Vec<Source>>,
    pool_root: PathBuf,
    scratch_root: PathBuf,
}

impl FsTarget {
    pub fn new(
        name: impl Into<String>,
        blacklist: HashSet<String>,
        source_lists: Vec<Vec<Source>>,
        pool_root: PathBuf,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            name: name.into(),
            blacklist,
            source_lists,
            pool_root,
            scratch_root,
        }
    }
}

impl Target for FsTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn blacklist(&self) -> &HashSet<String> {
        &self.blacklist
    }

    fn get_source_lists(&self, _package_name: &str) -> Vec<Vec<Source>> {
        self.source_lists.clone()
    }

    fn fetch_missing_version(&self, package: &str, version: &Version) -> Result<(), ModelError> {
        warn!(
            "{package} {version} is missing from the local pool; fetching from a remote mirror is not implemented, relying on what is already on disk"
        );
        Ok(())
    }

    fn unpack(&self, version: &dyn PackageVersion) -> Result<PathBuf, ModelError> {
        if let Some(dir) = version.source_dir() {
            return Ok(dir.to_path_buf());
        }

        let dsc_name = version
            .files()
            .iter()
            .find(|f| f.filename.ends_with(".dsc"))
            .map(|f| f.filename.clone())
            .ok_or_else(|| ModelError::PackageNotFound {
                distro: version.id().distro.clone(),
                name: version.id().name.clone(),
            })?;
        let dsc_path = self
            .pool_root
            .join(version.component())
            .join(&version.id().name)
            .join(&dsc_name);

        let dest = self
            .scratch_root
            .join(format!("{}-{}", version.id().name, version.version()));
        fs::create_dir_all(&self.scratch_root).map_err(ModelError::Io)?;
        if dest.exists() {
            fs::remove_dir_all(&dest).map_err(ModelError::Io)?;
        }

        let status = Command::new("dpkg-source")
            .arg("-x")
            .arg(&dsc_path)
            .arg(&dest)
            .status()
            .map_err(ModelError::Io)?;
        if !status.success() {
            return Err(ModelError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("dpkg-source -x {} failed", dsc_path.display()),
            )));
        }
        Ok(dest)
    }
}
