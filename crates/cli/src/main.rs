//! Thin demonstration harness for the installation engine. Loads an `InstallerConfig` from
//! disk, detects the distro family from `/etc/os-release`, assembles a workflow via
//! `WorkflowBuilder`, and drives it through the `Orchestrator`. Distro/GPU detection is
//! intentionally minimal here: both collaborators are out of the engine's specified scope, and
//! this binary exists to exercise the engine, not to replace a real detection layer.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{anyhow, Context as _, Result};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};

use nv_installer_engine::{
    builder::{DistroFamily, WorkflowBuilder},
    context::{Context as EngineContext, HostFacts},
    logger::LogLogger,
    orchestrator::{Orchestrator, OrchestratorOptions},
    InstallerConfig,
};
use nv_installer_pkgmgr::{
    adapter_for, executor::SystemExecutor, privilege::SystemPrivilegeManager, Family,
};

/// CLI version, read from this crate's own manifest.
pub const NV_INSTALLER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(version = NV_INSTALLER_VERSION)]
struct Cli {
    /// Logging verbosity [off, error, warn, info, debug, trace]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    verbosity: LevelFilter,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the workflow for this host and print its step sequence without running it
    Plan {
        /// Path to an InstallerConfig YAML document
        #[clap(index = 1)]
        config: PathBuf,
    },
    /// Build and execute the workflow for this host
    Install {
        /// Path to an InstallerConfig YAML document
        #[clap(index = 1)]
        config: PathBuf,

        /// Roll back automatically on the first step failure
        #[clap(long)]
        auto_rollback: bool,

        /// Validate and log steps without making persistent host changes
        #[clap(long)]
        dry_run: bool,
    },
}

/// Installs both logging backends the engine stack relies on: `env_logger` for the `log`
/// facade used by step bodies and `Logger`, and a bare `tracing-subscriber` fmt layer so the
/// `#[tracing::instrument]` spans on `Workflow::execute`/`Orchestrator::execute` are visible
/// rather than silently discarded for lack of a subscriber.
fn setup_logging(verbosity: LevelFilter) {
    env_logger::builder().format_timestamp(None).filter_level(verbosity).init();

    let tracing_level = match verbosity {
        LevelFilter::Off => tracing::level_filters::LevelFilter::OFF,
        LevelFilter::Error => tracing::level_filters::LevelFilter::ERROR,
        LevelFilter::Warn => tracing::level_filters::LevelFilter::WARN,
        LevelFilter::Info => tracing::level_filters::LevelFilter::INFO,
        LevelFilter::Debug => tracing::level_filters::LevelFilter::DEBUG,
        LevelFilter::Trace => tracing::level_filters::LevelFilter::TRACE,
    };
    let _ = tracing_subscriber::fmt().with_max_level(tracing_level).try_init();
}

fn detect_family() -> Result<Family> {
    let contents = std::fs::read_to_string("/etc/os-release")
        .context("failed to read /etc/os-release")?;
    family_from_os_release(&contents)
}

fn family_from_os_release(contents: &str) -> Result<Family> {
    let id_like = parse_os_release_field(contents, "ID_LIKE").unwrap_or_default();
    let id = parse_os_release_field(contents, "ID").unwrap_or_default();
    let haystack = format!("{id} {id_like}").to_lowercase();

    if haystack.contains("debian") || haystack.contains("ubuntu") {
        Ok(Family::Debian)
    } else if haystack.contains("arch") {
        Ok(Family::Arch)
    } else if haystack.contains("suse") {
        Ok(Family::Suse)
    } else if haystack.contains("rhel") || haystack.contains("fedora") || haystack.contains("centos") {
        Ok(Family::Rhel)
    } else {
        Err(anyhow!("could not classify distro family from ID='{id}' ID_LIKE='{id_like}'"))
    }
}

fn parse_os_release_field(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        if k.trim() != key {
            return None;
        }
        Some(v.trim().trim_matches('"').to_string())
    })
}

fn load_config(path: &PathBuf) -> Result<InstallerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    InstallerConfig::from_yaml_str(&contents).map_err(|e| anyhow!(e.to_string()))
}

fn resolve_family(config: &InstallerConfig) -> Result<Family> {
    match config.family.as_deref() {
        Some("debian") => Ok(Family::Debian),
        Some("rhel") => Ok(Family::Rhel),
        Some("arch") => Ok(Family::Arch),
        Some("suse") => Ok(Family::Suse),
        Some(other) => Err(anyhow!("unrecognized family override '{other}' in config")),
        None => detect_family(),
    }
}

fn build_workflow(config: &InstallerConfig, family: Family) -> Result<(nv_installer_engine::Workflow, EngineContext)> {
    let executor = Arc::new(SystemExecutor);
    let privilege = Arc::new(SystemPrivilegeManager::new());
    let package_adapter: Arc<dyn nv_installer_pkgmgr::PackageManager> =
        Arc::from(adapter_for(family, executor.clone(), privilege.clone()));
    let logger = Arc::new(LogLogger::new());

    let host_facts = HostFacts {
        family: Some(family),
        gpu_present: true,
        gpu_model: None,
        kernel_version: std::env::consts::ARCH.to_string(),
        disk_space_mb: config.required_disk_mb.max(1),
    };

    let mut ctx = EngineContext::new(host_facts.clone(), package_adapter, executor, privilege, logger);
    ctx.driver_version = config.driver_version.clone();
    ctx.selected_components = config.components.clone();
    ctx.additional_packages = config.additional_packages.clone();
    ctx.dry_run = config.dry_run;

    let builder = WorkflowBuilder::new(config.to_builder_config());
    let workflow = builder
        .build(DistroFamily::from(family), Some(&host_facts), Vec::new())
        .map_err(|e| anyhow!(e.to_string()))?;

    Ok((workflow, ctx))
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Plan { config } => {
            let config = load_config(config)?;
            let family = resolve_family(&config)?;
            let (workflow, _ctx) = build_workflow(&config, family)?;
            println!("{}", workflow.name);
            for step in workflow.steps() {
                println!("  - {step}");
            }
            Ok(())
        }
        Commands::Install {
            config,
            auto_rollback,
            dry_run,
        } => {
            let mut config = load_config(config)?;
            config.dry_run = config.dry_run || *dry_run;
            let family = resolve_family(&config)?;
            let (workflow, mut ctx) = build_workflow(&config, family)?;

            let options = OrchestratorOptions::new().with_auto_rollback(*auto_rollback || config.auto_rollback);
            let orchestrator = Orchestrator::new(workflow, options);
            let report = orchestrator.execute(&mut ctx);

            info!(
                "workflow '{}' finished with status {:?}: {} completed, {} skipped, {} failed",
                report.workflow_name,
                report.status,
                report.steps_completed,
                report.steps_skipped,
                report.steps_failed
            );
            if let Some(err) = &report.error {
                error!("terminal error: {err}");
                return Err(anyhow!("{err}"));
            }
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbosity);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("nv-installer failed: {e:?}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debian_like_os_release_is_classified_debian() {
        let contents = "ID=ubuntu\nID_LIKE=debian\nVERSION_ID=\"22.04\"\n";
        assert_eq!(family_from_os_release(contents).unwrap(), Family::Debian);
    }

    #[test]
    fn arch_os_release_is_classified_arch() {
        let contents = "ID=arch\n";
        assert_eq!(family_from_os_release(contents).unwrap(), Family::Arch);
    }

    #[test]
    fn unrecognized_os_release_is_an_error() {
        let contents = "ID=plan9\n";
        assert!(family_from_os_release(contents).is_err());
    }
}
