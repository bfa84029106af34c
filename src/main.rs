// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use deb_installer::backend::{AptBackend, BackendFuture, PackageDatabase};
use deb_installer::config::{Config, DEFAULT_CONFIG_PATH};
use deb_installer::installer::{
    CommandKind, DependsInstallCoordinator, InstallerCommand, InstallerEvent, PrivilegedInstaller, ProcessInstaller,
};
use deb_installer::manager::{InstallStatus, OperateStatus, PackagesManager, WorkerStatus};
use deb_installer::resolver::{DependsStatus, InstalledConflicts, PackageDependsStatus, Resolver};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "deb-installer")]
#[command(author, version, about = "Check and install local Debian packages against the system package database", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Index cache database (overrides the configuration)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether package archives can be installed
    Check {
        /// Paths to .deb files
        #[arg(required = true)]
        debs: Vec<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show installed packages that depend on a package
    Rdepends {
        /// Package name
        package: String,

        /// Architecture (default: native)
        #[arg(short, long)]
        arch: Option<String>,
    },
    /// Install package archives through the privileged helper
    Install {
        /// Paths to .deb files
        #[arg(required = true)]
        debs: Vec<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// One line of `check` output
#[derive(Serialize)]
struct CheckReport {
    path: PathBuf,
    name: String,
    version: String,
    architecture: String,
    install_status: InstallStatus,
    installed_version: Option<String>,
    depends: PackageDependsStatus,
    available_depends: Vec<String>,
    failure: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(cache) = &cli.cache {
        config.backend.index_cache = Some(cache.clone());
    }
    Ok(config)
}

fn open_manager(config: &Config, debs: &[PathBuf]) -> Result<PackagesManager<AptBackend>> {
    let backend_config = config.backend.clone();
    let backend = BackendFuture::spawn(move || AptBackend::load(backend_config));
    let mut manager = PackagesManager::new(backend, &config.installer);

    for deb in debs {
        if !manager.append_package(deb)? {
            warn!("Skipping {}: already added", deb.display());
        }
    }
    Ok(manager)
}

fn check_reports(manager: &mut PackagesManager<AptBackend>) -> Result<Vec<CheckReport>> {
    let statuses = manager.check_all_depends()?;
    let mut reports = Vec::with_capacity(statuses.len());

    for (index, depends) in statuses.into_iter().enumerate() {
        let available_depends = if depends.is_available() {
            manager.package_available_depends(index)?
        } else {
            Vec::new()
        };
        let failure = manager.package_failure(index)?.map(|f| f.to_string());
        let install_status = manager.package_install_status(index)?;
        let installed_version = manager.package_installed_version(index)?;
        let archive = manager.archive(index)?;

        reports.push(CheckReport {
            path: archive.path().to_path_buf(),
            name: archive.name().to_string(),
            version: archive.version().to_string(),
            architecture: archive.architecture().to_string(),
            install_status,
            installed_version,
            depends,
            available_depends,
            failure,
        });
    }
    Ok(reports)
}

fn print_report(report: &CheckReport) {
    println!("{} {} ({})", report.name, report.version, report.architecture);
    println!("  File: {}", report.path.display());
    match (&report.install_status, &report.installed_version) {
        (InstallStatus::NotInstalled, _) | (_, None) => println!("  Installed: no"),
        (InstallStatus::InstalledSameVersion, Some(_)) => println!("  Installed: same version"),
        (InstallStatus::InstalledEarlierVersion, Some(v)) => println!("  Installed: earlier version {}", v),
        (InstallStatus::InstalledLaterVersion, Some(v)) => println!("  Installed: later version {}", v),
    }
    println!("  Depends: {}", report.depends.status);
    if !report.available_depends.is_empty() {
        println!("  Will install: {}", report.available_depends.join(", "));
    }
    if let Some(failure) = &report.failure {
        println!("  Reason: {}", failure);
    }
}

fn cmd_check(config: &Config, debs: &[PathBuf], json: bool) -> Result<()> {
    let mut manager = open_manager(config, debs)?;
    let reports = check_reports(&mut manager)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    let blocked = reports
        .iter()
        .filter(|r| !matches!(r.depends.status, DependsStatus::Ok | DependsStatus::Available))
        .count();
    if blocked > 0 {
        return Err(anyhow::anyhow!("{} package(s) cannot be installed", blocked));
    }
    Ok(())
}

fn cmd_rdepends(config: &Config, package: &str, arch: Option<&str>) -> Result<()> {
    let backend = AptBackend::load(config.backend.clone())?;
    let conflicts = InstalledConflicts::default();
    let arch = arch.unwrap_or_else(|| backend.native_architecture()).to_string();

    let dependents = Resolver::new(&backend, &conflicts).reverse_dependencies(package, &arch);
    if dependents.is_empty() {
        println!("No installed packages depend on {}", package);
    } else {
        println!("Installed packages depending on {}:", package);
        for name in &dependents {
            println!("  {}", name);
        }
        println!("\nTotal: {} package(s)", dependents.len());
    }
    Ok(())
}

fn cmd_install(config: &Config, debs: &[PathBuf]) -> Result<()> {
    let mut manager = open_manager(config, debs)?;
    let installer = ProcessInstaller::from_config(&config.installer);

    manager.check_all_depends()?;
    let mut coordinator = DependsInstallCoordinator::new(installer.clone());
    for result in coordinator.run_to_completion(&mut manager)? {
        info!("Dependency install finished: {:?}", result);
    }

    manager.start_install()?;
    while let Some(index) = manager.next_operation()? {
        let archive = manager.archive(index)?;
        println!("Installing {} {}", archive.name(), archive.version());

        let templates = archive.deb().debconf_templates().unwrap_or_else(|e| {
            warn!("Could not read DebConf templates of {}: {}", archive.name(), e);
            Vec::new()
        });
        let command = InstallerCommand::new(
            CommandKind::InstallConfig,
            vec![archive.install_path().to_string_lossy().to_string()],
        )
        .with_debconf_templates(templates);

        let result = installer.start(&command)?.wait(|event| match event {
            InstallerEvent::Progress { percentage, message } => println!("  [{:>3}%] {}", percentage, message),
            InstallerEvent::DebConfPrompt(question) => println!("  Waiting for configuration: {}", question),
            InstallerEvent::Output(line) => info!("{}", line),
            InstallerEvent::Started | InstallerEvent::Finished(_) => {}
        });

        manager.on_operation_finished(index, result.exit_code())?;
        if manager.worker_status() == WorkerStatus::Prepare {
            return Err(anyhow::anyhow!("Authorization cancelled"));
        }
    }

    let mut failed = 0;
    for index in 0..manager.len() {
        let name = manager.archive(index)?.name().to_string();
        match manager.operate_status(index) {
            OperateStatus::Success => println!("Installed {}", name),
            _ => {
                failed += 1;
                println!("Failed {}: {}", name, manager.package_failed_reason(index)?);
            }
        }
    }

    if failed > 0 {
        return Err(anyhow::anyhow!("{} package(s) failed to install", failed));
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Check { debs, json }) => cmd_check(&load_config(&cli)?, debs, *json),
        Some(Commands::Rdepends { package, arch }) => cmd_rdepends(&load_config(&cli)?, package, arch.as_deref()),
        Some(Commands::Install { debs }) => cmd_install(&load_config(&cli)?, debs),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "deb-installer", &mut io::stdout());
            Ok(())
        }
        None => {
            println!("deb-installer v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'deb-installer --help' for usage information");
            Ok(())
        }
    }
}
