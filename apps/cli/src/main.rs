use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mod_installer::{
    BackupManager, ContentCache, InstallProgress, InstallProgressCallback, InstallState, InstallerConfig, JsonFileCatalog, MetaTreeCatalog,
    ModCatalog, ModInstaller, VanillaStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mod-installer")]
#[command(about = "Download, back up and install game mods")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user cache directory)
    #[arg(long, global = true, env = "MOD_INSTALLER_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog: a JSON file of mods or a directory of metadata documents
    #[arg(long, global = true, env = "MOD_INSTALLER_CATALOG")]
    catalog: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install mods from the catalog, in the order given
    Install {
        #[arg(value_name = "KEY", required = true)]
        keys: Vec<String>,
    },

    /// List the mods known to the catalog
    List,

    /// Manage pre-install snapshots
    Backups {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Inspect or clear the archive cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Preserve or restore the game's original files
    Vanilla {
        #[command(subcommand)]
        command: VanillaCommands,
    },

    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommands {
    List,
    Restore { name: String },
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    Info,
    Clear,
}

#[derive(Subcommand, Debug)]
enum VanillaCommands {
    Backup,
    Restore,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    Show,
    SetGamePath { path: PathBuf },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn open_catalog(path: Option<PathBuf>) -> Result<Box<dyn ModCatalog>> {
    let Some(path) = path else {
        bail!("No catalog given; pass --catalog or set MOD_INSTALLER_CATALOG");
    };
    if path.is_dir() {
        Ok(Box::new(MetaTreeCatalog::new(path)))
    } else {
        Ok(Box::new(JsonFileCatalog::new(path)))
    }
}

fn report_progress() -> InstallProgressCallback {
    Arc::new(|progress: InstallProgress| match progress.state {
        InstallState::Downloading if progress.total > 0 => {
            let percent = progress.processed as f64 / progress.total as f64 * 100.0;
            tracing::debug!("{}: {:.1}%", progress.mod_id, percent);
        }
        InstallState::Extracting => {
            tracing::debug!("{}: {} ({}/{})", progress.mod_id, progress.current_item, progress.processed, progress.total);
        }
        state => info!("{}: {}", progress.mod_id, state),
    })
}

async fn install(config: InstallerConfig, catalog: Box<dyn ModCatalog>, keys: Vec<String>) -> Result<ExitCode> {
    let mods = catalog.select(&keys).await?;

    config
        .ensure_directories()
        .context("Failed to create installer directories")?;
    let installer = ModInstaller::new(config)?.with_progress_callback(report_progress());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    let report = installer.install_batch(&mods, &cancel).await?;
    for outcome in &report.outcomes {
        match &outcome.error {
            Some(error) => println!("{:<30} {:<10} {}", outcome.mod_name, outcome.state, error),
            None => println!("{:<30} {}", outcome.mod_name, outcome.state),
        }
        for warning in &outcome.warnings {
            println!("  warning: {}", warning);
        }
    }
    println!("{} installed, {} failed", report.succeeded(), report.failed());

    Ok(if report.is_complete_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run(args: Args) -> Result<ExitCode> {
    let config_path = args.config.clone().unwrap_or_else(InstallerConfig::default_path);
    let mut config = InstallerConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    match args.command {
        Commands::Install { keys } => return install(config, open_catalog(args.catalog)?, keys).await,
        Commands::List => {
            let mods = open_catalog(args.catalog)?.fetch_mods().await?;
            let mut keys: Vec<_> = mods.keys().collect();
            keys.sort();
            for key in keys {
                let m = &mods[key];
                println!("{:<30} {:<10} {}", key, m.version, m.display_name());
            }
        }
        Commands::Backups { command } => {
            let backups = BackupManager::from_config(&config);
            match command {
                BackupCommands::List => {
                    for name in backups.list_backups()? {
                        println!("{}", name);
                    }
                }
                BackupCommands::Restore { name } => {
                    backups.restore_backup(&name)?;
                    println!("Restored {}", name);
                }
                BackupCommands::Delete { name } => {
                    backups.delete_backup(&name)?;
                    println!("Deleted {}", name);
                }
            }
        }
        Commands::Cache { command } => {
            let cache = ContentCache::new(&config.cache_dir);
            match command {
                CacheCommands::Info => {
                    let stats = cache.stats();
                    println!("{}: {} files, {} bytes", stats.dir.display(), stats.file_count, stats.total_bytes);
                }
                CacheCommands::Clear => {
                    cache.clear().await?;
                    println!("Cleared {}", cache.dir().display());
                }
            }
        }
        Commands::Vanilla { command } => {
            let store = VanillaStore::from_config(&config);
            match command {
                VanillaCommands::Backup => println!("Preserved {} files", store.backup_missing()?),
                VanillaCommands::Restore => println!("Restored {} files", store.restore()?),
            }
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => println!("{}", serde_json::to_string_pretty(&config)?),
            ConfigCommands::SetGamePath { path } => {
                if !path.join("data").is_dir() {
                    bail!("{} has no data directory", path.display());
                }
                config.set_game_path(path);
                config.save(&config_path)?;
                println!("Saved {}", config_path.display());
            }
        },
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
