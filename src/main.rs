// src/main.rs - CLI entry point

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use soleworks::app::ApplicationCore;
use soleworks::config::ConfigManager;
use soleworks::error::Result;
use soleworks::Manager;

#[derive(Parser)]
#[command(
    name = "soleworks",
    version = soleworks::VERSION,
    about = "An in-memory e-commerce storefront core",
    long_about = None
)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the storefront core until interrupted
    Run,
    /// Show application statistics
    Status,
    /// Check application health
    Health,
    /// Validate configuration
    ValidateConfig {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The run command hands logging to the LoggingManager; the inspection
    // commands get a plain subscriber when asked for one.
    if !matches!(&cli.command, None | Some(Commands::Run)) && (cli.verbose || cli.debug) {
        setup_logging(&cli);
    }

    match &cli.command {
        Some(Commands::Run) | None => run_application(&cli).await,
        Some(Commands::Status) => show_status(&cli).await,
        Some(Commands::Health) => check_health(&cli).await,
        Some(Commands::ValidateConfig { config }) => {
            validate_config(config.clone().or_else(|| cli.config.clone())).await
        }
    }
}

fn setup_logging(cli: &Cli) {
    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn build_core(cli: &Cli) -> ApplicationCore {
    match &cli.config {
        Some(config_path) => ApplicationCore::with_config_file(config_path),
        None => ApplicationCore::new(),
    }
}

async fn run_application(cli: &Cli) -> Result<()> {
    let mut app = build_core(cli);
    app.initialize().await?;
    tracing::info!("Soleworks core v{} running, press ctrl-c to stop", soleworks::VERSION);

    app.wait_for_shutdown().await?;
    app.shutdown().await
}

async fn show_status(cli: &Cli) -> Result<()> {
    let mut app = build_core(cli);
    app.initialize().await?;

    let stats = app.get_stats().await;
    println!("Soleworks core v{}", stats.version);
    println!("  state:              {:?}", stats.state);
    println!("  managers:           {}", stats.manager_count);
    println!("  products:           {}", stats.product_count);
    println!("  cart items:         {}", stats.cart_item_count);
    println!("  generation enabled: {}", stats.generation_enabled);

    app.shutdown().await
}

async fn check_health(cli: &Cli) -> Result<()> {
    let mut app = build_core(cli);
    app.initialize().await?;

    let health = app.get_health().await;
    println!("overall: {}", health.status);
    let mut names: Vec<_> = health.managers.keys().collect();
    names.sort();
    for name in names {
        println!("  {}: {}", name, health.managers[name]);
    }

    app.shutdown().await
}

async fn validate_config(config_path: Option<PathBuf>) -> Result<()> {
    let mut manager = match &config_path {
        Some(path) => ConfigManager::with_config_file(path),
        None => ConfigManager::new(),
    };
    manager.initialize().await?;

    let issues = manager.validate().await?;
    manager.shutdown().await?;

    if issues.is_empty() {
        println!("Configuration is valid");
        Ok(())
    } else {
        for issue in &issues {
            eprintln!("{}: {}", issue.key, issue.message);
        }
        process::exit(1);
    }
}
