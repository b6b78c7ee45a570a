//! ddns-updater - keeps a Route53 host record in sync with the public IP.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ddns_updater::config::Config;
use ddns_updater::credentials::FileCredentials;
use ddns_updater::inquirer::create_inquirer;
use ddns_updater::merger::{
    lookup_record_sets, lookup_zone, normalize_host, Connector, Route53Connector,
};
use ddns_updater::status::UpdateStatusCache;
use ddns_updater::{FileStatusStore, ForceTimeout, Reconciler, RunOptions, RunOutcome};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ddns-updater")]
#[command(about = "Keeps a Route53 host record in sync with the public IP address")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Host to update (e.g. home.example.org)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Path to credentials file
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Path to status file
    #[arg(long, global = true)]
    status_file: Option<PathBuf>,

    /// Only show changes, do not apply them
    #[arg(long, global = true)]
    pretend: bool,

    /// Update even if the addresses have not changed
    #[arg(long, global = true)]
    force: bool,

    /// Do not update the A record
    #[arg(long, global = true)]
    noipv4: bool,

    /// Do not update the AAAA record
    #[arg(long, global = true)]
    noipv6: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with_all = ["verbose", "debug"])]
    quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the DNS record if required (default)
    Update,

    /// Show cached status and current public addresses
    Status,

    /// Check credentials and show the host's current records
    Validate,

    /// Write an example configuration file
    Init,
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        LevelFilter::TRACE
    } else if cli.verbose {
        LevelFilter::DEBUG
    } else if cli.quiet {
        LevelFilter::WARN
    } else {
        LevelFilter::INFO
    };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        Config::default_path().ok(),
        Some(PathBuf::from("/etc/ddns-updater/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    Config::default_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// Merge command line overrides into the loaded configuration.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.host = Some(host.clone());
    }
    if let Some(path) = &cli.credentials {
        config.credentials = Some(path.clone());
    }
    if let Some(path) = &cli.status_file {
        config.status_file = Some(path.clone());
    }
    if cli.noipv4 {
        config.ipv4 = false;
    }
    if cli.noipv6 {
        config.ipv6 = false;
    }
}

fn run_options(config: &Config, cli: &Cli) -> anyhow::Result<RunOptions> {
    let host = config
        .host
        .as_deref()
        .map(normalize_host)
        .filter(|host| !host.is_empty())
        .context("No host given (use --host or set 'host' in the config file)")?;

    let force_timeout = if cli.force {
        ForceTimeout::Always
    } else {
        let timeout = i64::try_from(config.force_timeout_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .context("force_timeout_secs too large")?;
        ForceTimeout::After(timeout)
    };

    Ok(RunOptions {
        host,
        ipv4: config.ipv4,
        ipv6: config.ipv6,
        pretend: cli.pretend,
        force_timeout,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let config_path = get_config_path(cli.config.clone());

    match run(&cli, &config_path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config_path: &Path) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init) => cmd_init(config_path),
        Some(Commands::Status) => cmd_status(load_config(config_path, cli)?, cli).await,
        Some(Commands::Validate) => cmd_validate(load_config(config_path, cli)?, cli).await,
        Some(Commands::Update) | None => cmd_update(load_config(config_path, cli)?, cli).await,
    }
}

fn load_config(path: &Path, cli: &Cli) -> anyhow::Result<Config> {
    tracing::debug!("Using config file '{}'", path.display());

    let mut config = Config::load_from(path)
        .with_context(|| format!("Failed to load config file '{}'", path.display()))?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

async fn cmd_update(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let options = run_options(&config, cli)?;
    let credentials_path = config.credentials_path()?;
    tracing::info!("Using credentials file '{}'", credentials_path.display());

    let reconciler = Reconciler::new(
        create_inquirer(&config.inquirers)?,
        FileStatusStore::new(config.status_path()?),
        Arc::new(Route53Connector::new(config.region.clone())),
        Arc::new(FileCredentials::load(&credentials_path)?),
    );

    match reconciler.run(&options).await? {
        RunOutcome::Updated(addresses) => {
            println!(
                "Updated {} ({})",
                options.host,
                describe(addresses.ipv4, addresses.ipv6)
            );
        }
        RunOutcome::Pretended(addresses) => {
            println!(
                "Would update {} ({})",
                options.host,
                describe(addresses.ipv4, addresses.ipv6)
            );
        }
        RunOutcome::UpToDate(_) | RunOutcome::Unchanged(_) => {}
    }

    Ok(())
}

async fn cmd_status(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let options = run_options(&config, cli)?;
    let store = FileStatusStore::new(config.status_path()?);

    println!("ddns-updater Status");
    println!("===================\n");
    println!("Host:        {}", options.host);
    println!("Status file: {}", store.path().display());

    let mut cache = UpdateStatusCache::new(&store, &options.host);
    let status = cache.status()?.clone();

    if status.last_update > 0 {
        let last_update = chrono::DateTime::from_timestamp_millis(status.last_update)
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| status.last_update.to_string());
        println!("Last update: {}", last_update);
    } else {
        println!("Last update: never");
    }
    println!(
        "Cached:      A {} / AAAA {}",
        status.ipv4.as_deref().unwrap_or("-"),
        status.ipv6.as_deref().unwrap_or("-")
    );

    let inquirer = create_inquirer(&config.inquirers)?;
    match inquirer.query(options.ipv4, options.ipv6).await {
        Ok(current) => println!("Current:     {}", describe(current.ipv4, current.ipv6)),
        Err(e) => println!("Current:     lookup failed - {}", e),
    }

    Ok(())
}

async fn cmd_validate(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let options = run_options(&config, cli)?;
    let credentials = FileCredentials::load(&config.credentials_path()?)?;
    let host = format!("{}.", options.host);

    println!("Validating access for '{}'...\n", host);

    let api = Route53Connector::new(config.region.clone()).connect(&credentials)?;
    let zone = lookup_zone(api.as_ref(), &host).await?;
    println!("  Zone: {} ({})", zone.name, zone.id);

    let record_sets = lookup_record_sets(api.as_ref(), &zone, &host).await?;
    if record_sets.is_empty() {
        println!("  No singular A/AAAA record sets; nothing would be updated.");
    }
    for record_set in record_sets.values() {
        println!(
            "  {} {} {} (ttl {})",
            record_set.name,
            record_set.record_type,
            record_set.values.join(","),
            record_set
                .ttl
                .map(|ttl| ttl.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    Ok(())
}

fn cmd_init(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("Config file '{}' already exists", path.display());
    }

    Config::example().save_to(path)?;
    println!("Wrote example configuration to {}", path.display());
    Ok(())
}

fn describe(ipv4: Option<std::net::Ipv4Addr>, ipv6: Option<std::net::Ipv6Addr>) -> String {
    let ipv4 = ipv4.map_or_else(|| "-".to_string(), |a| a.to_string());
    let ipv6 = ipv6.map_or_else(|| "-".to_string(), |a| a.to_string());
    format!("A {} / AAAA {}", ipv4, ipv6)
}
