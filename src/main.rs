//! authconf - Main entry point

use anyhow::Context;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use authconf::backup::BackupManager;
use authconf::cli::{Cli, Mode};
use authconf::engine::write::{calculate_write_plan, Engine, WriteMode};
use authconf::logic::resolver::{self, KnownRealms};
use authconf::logic::services::SystemctlManager;
use authconf::settings::store;
use authconf::{
    sanity, AuthconfError, CaCertStore, CapabilitySet, CommandJoiner, ExitStatus, ShellVarsBackend,
    ToolConfig,
};

/// Initialize tracing on stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);
    debug!("CLI arguments parsed: {:?}", cli.mode());

    match run(&cli) {
        Ok(status) => status.into(),
        Err(e) => {
            let status = match e.downcast_ref::<AuthconfError>() {
                Some(err) => err.exit_status(),
                None => ExitStatus::Usage,
            };
            error!("{:#}", e);
            eprintln!("authconf: {:#}", e);
            status.into()
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ExitStatus> {
    let mut config = ToolConfig::load(cli.config.as_deref()).context("Cannot load tool configuration")?;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    config.validate().context("Invalid tool configuration")?;
    let mode = cli.mode();

    if mode == Mode::Probe {
        for line in authconf::probe::probe_network_defaults(&config.root, config.probe_timeout()).lines() {
            println!("{}", line);
        }
        return Ok(ExitStatus::Success);
    }

    if mode.needs_privileges() {
        sanity::require_privileges(config.is_live_root())?;
    }

    let backend = ShellVarsBackend::new(&config.root);
    let backups = BackupManager::new(&backend, config.under_root(&config.backup_dir));

    let backup_status = |ok: bool| if ok { ExitStatus::Success } else { ExitStatus::Failure };
    match &mode {
        Mode::SaveBackup(name) => return Ok(backup_status(backups.save_backup(name))),
        Mode::RestoreBackup(name) => return Ok(backup_status(backups.restore_backup(name))),
        Mode::RestoreLast => return Ok(backup_status(backups.restore_last())),
        _ => {}
    }

    let pristine = store::load(&backend);
    let mut current = pristine.clone();
    let caps = CapabilitySet::probe(&config.root);
    let realms = KnownRealms::from_settings(&pristine);
    let resolution = resolver::apply(&mut current, &cli.change_set(), &caps, &realms);
    let mut status = resolution.status();

    let write_mode = match mode {
        Mode::Update => WriteMode::ChangedOnly,
        Mode::UpdateAll => WriteMode::All,
        _ => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&current)?);
            } else {
                print!("{}", current);
            }
            return Ok(status);
        }
    };

    let manage_services = config.manage_services && !cli.nostart && config.is_live_root();
    if !manage_services {
        info!("Service management disabled for this run");
    }
    let plan = calculate_write_plan(
        &pristine,
        &current,
        write_mode,
        &resolution.joins,
        &caps,
        manage_services,
    );

    let certs = CaCertStore::new(config.under_root(&config.cacert_dir));
    let engine = Engine {
        backend: &backend,
        backups: &backups,
        certs: &certs,
        joiner: &CommandJoiner,
        services: &SystemctlManager,
    };
    let report = engine.write(&mut current, &plan);
    status = status.worst(report.status);
    Ok(status)
}
