// src/main.rs

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use perf_tool::{
    cli::{Cli, Commands},
    config::EngineConfig,
    logging::init_logging,
    memory,
    orchestrator::{self, CycleReport, Session, SystemBackend},
    profile::ProfileCatalog,
    state::StateStore,
};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref());

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command fully succeeded.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = EngineConfig::resolve(cli.state_file.clone(), cli.profiles_dir.clone());

    match &cli.command {
        Commands::Status => {
            let store = StateStore::load(&config.state_file);
            println!("State file: {}", store.path().display());
            if store.exists() {
                println!("Backup present with {} entries:", store.len());
                for key in store.keys() {
                    println!("  {}", key);
                }
            } else {
                println!("No backup. The system has not been optimized.");
            }
            Ok(true)
        }
        Commands::Profiles => {
            let catalog = ProfileCatalog::load(&config.profiles_dir);
            for profile in catalog.iter() {
                let enabled = profile.enabled_modules();
                println!("{:<14} {}", profile.id, profile.name);
                if !profile.description.is_empty() {
                    println!("{:<14} {}", "", profile.description);
                }
                println!("{:<14} modules: {}", "", enabled.join(", "));
            }
            Ok(true)
        }
        Commands::Optimize { profile, force } => {
            let store = StateStore::load(&config.state_file);
            if store.exists() && !force {
                anyhow::bail!(
                    "A backup from an earlier optimize exists at '{}'. Run `restore` first, or pass --force to keep it and optimize again.",
                    store.path().display()
                );
            }
            let catalog = ProfileCatalog::load(&config.profiles_dir);
            let profile = catalog
                .resolve(profile)
                .context("Failed to select profile")?;

            warn_if_not_elevated();
            let report = with_system_backend(|backend| {
                let mut session = Session::new(store, backend);
                orchestrator::optimize(&mut session, &profile, &config.temp_dirs)
            })?;
            Ok(print_report(&report))
        }
        Commands::Restore => {
            let store = StateStore::load(&config.state_file);
            if !store.exists() {
                info!("No backup found, nothing to restore.");
                return Ok(true);
            }

            warn_if_not_elevated();
            let report = with_system_backend(|backend| {
                let mut session = Session::new(store, backend);
                orchestrator::restore(&mut session)
            })?;
            Ok(print_report(&report))
        }
        Commands::DiscardBackup => {
            let mut store = StateStore::load(&config.state_file);
            if !store.exists() {
                info!("No backup to discard.");
                return Ok(true);
            }
            store.clear().context("Failed to discard backup")?;
            warn!("Backup discarded. The captured original settings can no longer be restored.");
            Ok(true)
        }
        Commands::FreeRam => {
            warn_if_not_elevated();
            let report = memory::free_ram().context("Failed to free RAM")?;
            println!("{}", report);
            Ok(true)
        }
    }
}

fn print_report(report: &CycleReport) -> bool {
    print!("{}", report);
    if !report.is_success() {
        warn!("Some changes failed; see the log above.");
    }
    report.is_success()
}

#[cfg(windows)]
fn warn_if_not_elevated() {
    if !perf_tool::utils::windows::is_elevated() {
        warn!("Not running as administrator. Machine-wide settings will likely be denied.");
    }
}

#[cfg(not(windows))]
fn warn_if_not_elevated() {}

#[cfg(windows)]
fn with_system_backend<T>(f: impl FnOnce(SystemBackend<'_>) -> T) -> anyhow::Result<T> {
    use perf_tool::{
        power::WindowsPower,
        utils::{registry::RegistryAccessor, services::WindowsServiceControl},
    };

    let registry = RegistryAccessor::new();
    let services = WindowsServiceControl::new();
    let power = WindowsPower::new();
    Ok(f(SystemBackend {
        registry: &registry,
        interfaces: &registry,
        services: &services,
        power: &power,
    }))
}

#[cfg(not(windows))]
fn with_system_backend<T>(_f: impl FnOnce(SystemBackend<'_>) -> T) -> anyhow::Result<T> {
    anyhow::bail!("Unsupported platform: system tweaks require Windows")
}
