mod archive;
mod config;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use archive::{FsDistro, FsTarget};
use config::{Config, TargetConfig};
use mom_core::expiry::{sweep_distro, FilesystemMergeHistory};
use mom_core::model::{Distro, Package, Source, Target};
use mom_core::orchestrator::{self, OrchestratorConfig, PackageFilters};
use mom_core::tools::ProcessTools;
use mom_core::version::Version;

/// Automated three-way source-package merger.
#[derive(Debug, Parser)]
#[command(name = "mom", version, about, long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the YAML configuration file
    #[arg(long, default_value = "mom.yaml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Merge every eligible package of a target from its upstream sources.
    Merge(MergeArgs),
    /// Sweep pool directories, retaining only source versions needed as a
    /// merge base or newer.
    Expire(ExpireArgs),
}

#[derive(Debug, Args)]
struct MergeArgs {
    /// Distribution target to use
    #[arg(short, long)]
    target: String,

    /// Only process this package (repeatable)
    #[arg(long = "package")]
    package: Vec<String>,

    /// Version to obtain from the target distro, instead of its newest
    #[arg(short = 'V', long)]
    version: Option<String>,

    /// Only process packages listed in this file (repeatable)
    #[arg(short = 'I', long = "include")]
    include: Vec<PathBuf>,

    /// Exclude packages listed in this file (repeatable)
    #[arg(short = 'X', long = "exclude")]
    exclude: Vec<PathBuf>,

    /// Force creation of merges even if a terminal report already exists
    #[arg(short, long)]
    force: bool,

    /// Restrict upstream sources to these distros (all configured sources if
    /// empty)
    distros: Vec<String>,
}

#[derive(Debug, Args)]
struct ExpireArgs {
    /// Only sweep this target's configured distros (all targets if absent)
    #[arg(short, long)]
    target: Option<String>,

    /// Restrict the sweep to these distros (every distro the target
    /// references if empty)
    distros: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stderrlog::new()
        .module(module_path!())
        .verbosity(usize::from(cli.verbose) + 2)
        .init()
        .context("initializing logger")?;

    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Merge(args) => run_merge(&config, args),
        Command::Expire(args) => run_expire(&config, args),
    }
}

fn run_merge(config: &Config, args: MergeArgs) -> Result<()> {
    let target_config = config
        .distro_targets
        .get(&args.target)
        .ok_or_else(|| anyhow!("no DISTRO_TARGETS entry named {:?}", args.target))?;

    let only = if args.package.is_empty() {
        None
    } else {
        Some(args.package.iter().cloned().collect::<HashSet<_>>())
    };
    let include = merge_package_lists(&args.include)?;
    let exclude = merge_package_lists(&args.exclude)?.unwrap_or_default();
    let filters = PackageFilters { only, include, exclude };

    let version_override = args
        .version
        .as_deref()
        .map(Version::parse)
        .transpose()
        .context("parsing --version")?;

    let left_distro = FsDistro::new(
        target_config.distro.clone(),
        config.pool_root().join(&target_config.distro),
        true,
    );

    let source_lists = restricted_sources(target_config, &args.distros);
    let target = FsTarget::new(
        args.target.clone(),
        target_config.blacklist.iter().cloned().collect(),
        source_lists,
        config.pool_root(),
        config.scratch_root(&args.target),
    );

    let distro_pools: Vec<FsDistro> = all_referenced_distros(config)
        .into_iter()
        .map(|name| FsDistro::new(name.clone(), config.pool_root().join(&name), true))
        .collect();
    let resolve_distro = |name: &str| -> Option<&dyn Distro> {
        distro_pools
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d as &dyn Distro)
    };

    let orchestrator_config = OrchestratorConfig {
        local_suffix: config.local_suffix.clone(),
        mom_name: config.mom_name.clone(),
        mom_email: config.mom_email.clone(),
    };
    let tools = ProcessTools::new();
    let output_root = config.merges_root(&args.target);

    let mut merged = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for dist in &target_config.dists {
        for component in &target_config.components {
            for package in left_distro.packages(dist, component) {
                let package_name = package.name().to_string();
                if !filters.should_process(&package_name, target.blacklist()) {
                    continue;
                }

                let left = match &version_override {
                    Some(v) => match left_distro.find_package(&package_name, dist, Some(v)) {
                        Ok(mut versions) => versions.pop(),
                        Err(err) => {
                            warn!("{package_name}: requested version {v} not found: {err}");
                            None
                        }
                    },
                    None => Some(package.newest_version()),
                };
                let Some(left) = left else {
                    skipped += 1;
                    continue;
                };

                let output_dir = output_root.join(&package_name);
                match orchestrator::merge_package(
                    left.as_ref(),
                    &left_distro,
                    component,
                    &target,
                    &resolve_distro,
                    &config.scratch_root(&args.target),
                    &output_dir,
                    &orchestrator_config,
                    &tools,
                    args.force,
                ) {
                    Ok(report) => {
                        info!("{package_name}: {:?}", report.result);
                        merged += 1;
                    }
                    Err(err) => {
                        warn!("{package_name}: merge failed: {err}");
                        failed += 1;
                    }
                }
            }
        }
    }

    info!("processed {merged} package(s), {skipped} skipped, {failed} failed");
    Ok(())
}

fn run_expire(config: &Config, args: ExpireArgs) -> Result<()> {
    let targets: Vec<(&String, &TargetConfig)> = match &args.target {
        Some(name) => {
            let target_config = config
                .distro_targets
                .get(name)
                .ok_or_else(|| anyhow!("no DISTRO_TARGETS entry named {name:?}"))?;
            vec![(name, target_config)]
        }
        None => config.distro_targets.iter().collect(),
    };

    for (target_name, target_config) in targets {
        let history = FilesystemMergeHistory {
            merges_root: config.merges_root(target_name),
        };

        let distro_names = if args.distros.is_empty() {
            referenced_distros(target_config)
        } else {
            args.distros.clone()
        };

        for distro_name in distro_names {
            let distro = FsDistro::new(
                distro_name.clone(),
                config.pool_root().join(&distro_name),
                true,
            );
            let dist = resolve_dist_for(target_config, &distro_name)
                .unwrap_or_else(|| target_config.dists.first().cloned().unwrap_or_default());

            let report = sweep_distro(&distro, &dist, &target_config.components, &history);
            info!(
                "{target_name}/{distro_name}: swept {} package(s), skipped {}, removed {} stanza(s)",
                report.packages_swept, report.packages_skipped, report.stanzas_removed
            );
        }
    }

    Ok(())
}

fn merge_package_lists(paths: &[PathBuf]) -> Result<Option<HashSet<String>>> {
    if paths.is_empty() {
        return Ok(None);
    }
    let mut combined = HashSet::new();
    for path in paths {
        combined.extend(orchestrator::read_package_list(path)?);
    }
    Ok(Some(combined))
}

fn flatten_sources(target_config: &TargetConfig) -> Vec<Source> {
    target_config
        .sources
        .iter()
        .flatten()
        .map(|s| Source {
            distro: s.distro.clone(),
            dist: s.dist.clone(),
        })
        .collect()
}

fn restricted_sources(target_config: &TargetConfig, distros: &[String]) -> Vec<Vec<Source>> {
    target_config
        .sources
        .iter()
        .map(|list| {
            list.iter()
                .map(|s| Source {
                    distro: s.distro.clone(),
                    dist: s.dist.clone(),
                })
                .filter(|s| distros.is_empty() || distros.contains(&s.distro))
                .collect()
        })
        .collect()
}

fn all_referenced_distros(config: &Config) -> Vec<String> {
    let mut names: HashSet<String> = HashSet::new();
    for target in config.distro_targets.values() {
        names.insert(target.distro.clone());
        for source in flatten_sources(target) {
            names.insert(source.distro);
        }
    }
    names.into_iter().collect()
}

fn referenced_distros(target_config: &TargetConfig) -> Vec<String> {
    let mut names: HashSet<String> = HashSet::new();
    names.insert(target_config.distro.clone());
    for source in flatten_sources(target_config) {
        names.insert(source.distro);
    }
    names.into_iter().collect()
}

fn resolve_dist_for(target_config: &TargetConfig, distro_name: &str) -> Option<String> {
    if distro_name == target_config.distro {
        return target_config.dists.first().cloned();
    }
    flatten_sources(target_config)
        .into_iter()
        .find(|s| s.distro == distro_name)
        .map(|s| s.dist)
}
