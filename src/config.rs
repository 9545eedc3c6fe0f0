use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// One configured downstream target: the distro it merges into, the
/// upstream sources consulted for every package, and packages it never
/// touches (spec §6 "Configuration": `DISTRO_TARGETS`, `Target.blacklist`).
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub distro: String,
    #[serde(default)]
    pub dists: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Vec<SourceConfig>>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub distro: String,
    pub dist: String,
}

/// The recognized configuration keys from spec §6, loaded from a YAML file
/// the way the teacher loads `excuses.yaml` via `serde_yaml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub root: PathBuf,
    #[serde(default)]
    pub local_suffix: String,
    pub distro_targets: HashMap<String, TargetConfig>,
    pub mom_name: String,
    pub mom_email: String,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading configuration file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing configuration file {}", path.display()))?;
        Ok(config)
    }

    pub fn pool_root(&self) -> PathBuf {
        self.root.join("pool")
    }

    pub fn merges_root(&self, target: &str) -> PathBuf {
        self.root.join("merges").join(target)
    }

    pub fn scratch_root(&self, target: &str) -> PathBuf {
        self.root.join("scratch").join(target)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_minimal_yaml() {
        let yaml = r#"
ROOT: /srv/mom
LOCAL_SUFFIX: ubuntu
MOM_NAME: Merge-o-Matic
MOM_EMAIL: mom@example.org
DISTRO_TARGETS:
  ubuntu:
    distro: ubuntu
    dists: [noble]
    components: [main, universe]
    blacklist: [frozen-package]
    sources:
      - - distro: debian
          dist: unstable
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/mom"));
        assert_eq!(config.local_suffix, "ubuntu");
        let target = &config.distro_targets["ubuntu"];
        assert_eq!(target.dists, vec!["noble".to_string()]);
        assert_eq!(target.blacklist, vec!["frozen-package".to_string()]);
        assert_eq!(target.sources[0][0].distro, "debian");
    }
}
