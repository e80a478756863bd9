//! WolfBrowse - Directory Browser and Download Gateway for S3 Buckets
//!
//! Serves a browsable view of one bucket over HTTP.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfbrowse::api::HttpServer;
use wolfbrowse::browser::Browser;
use wolfbrowse::config::{BrowserConfig, MAX_PRESIGN_EXPIRY_SECS};
use wolfbrowse::error::Result;
use wolfbrowse::storage::S3Storage;
use wolfbrowse::version::BuildInfo;

/// WolfBrowse - Directory Browser and Download Gateway for S3 Buckets
#[derive(Parser)]
#[command(name = "wolfbrowse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional; environment variables also apply)
    #[arg(short, long, default_value = "wolfbrowse.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfbrowse.toml")]
        output: PathBuf,

        /// Bucket to browse
        #[arg(long, default_value = "my-bucket")]
        bucket: String,
    },

    /// Validate configuration file
    Validate,

    /// Show effective configuration and build information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = BrowserConfig::load(Some(cli.config.as_path()))?;
            let level = cli.log_level.unwrap_or_else(|| config.logging.level.clone());
            init_logging(&level, &config.logging.format);
            run_serve(config).await
        }
        Commands::Init { output, bucket } => run_init(&output, &bucket),
        Commands::Validate => run_validate(&cli.config),
        Commands::Info => run_info(&cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the server
async fn run_serve(config: BrowserConfig) -> Result<()> {
    let build = BuildInfo::current();
    tracing::info!("Starting WolfBrowse {}", build.version_string());

    let storage = S3Storage::new(&config.storage)?;
    let browser = Arc::new(Browser::new(Arc::new(storage), &config.browse));

    if !config.base_directory().is_empty() {
        tracing::info!("Browsing restricted to {}/", config.base_directory());
    }
    tracing::info!(
        "Presigned URLs expire after {}s",
        config.presign_expiry().as_secs()
    );

    let server = HttpServer::new(config.server, browser);
    server.start().await
}

/// Write a starter configuration file
fn run_init(output: &Path, bucket: &str) -> Result<()> {
    let config_content = format!(r#"# WolfBrowse Configuration
# Generated configuration file
#
# Every storage setting can also come from the environment:
# AWS_REGION, AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_BUCKET,
# AWS_ENDPOINT, SERVER_PORT, BASE_DIRECTORY

[storage]
bucket = "{bucket}"
region = "us-east-1"
# endpoint = "http://127.0.0.1:9000"
# path_style = true
# access_key_id = "..."
# secret_access_key = "..."

[server]
bind_address = "0.0.0.0:8080"
cors_enabled = false
# static_dir = "/usr/share/wolfbrowse/ui"

[browse]
# Only keys under this directory are visible
base_directory = ""
# 1 to {max_expiry} seconds
presign_expiry_secs = 3600
# Concurrent per-file tasks during a listing, 0 for no limit
listing_concurrency = 0

[logging]
level = "info"
format = "pretty"
"#, max_expiry = MAX_PRESIGN_EXPIRY_SECS);

    std::fs::write(output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to point at your bucket and credentials.");
    println!("Then start with: wolfbrowse --config {} serve", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: &Path) -> Result<()> {
    match BrowserConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Bucket: {}", config.storage.bucket);
            println!("  Region: {}", config.storage.region);
            if let Some(endpoint) = &config.storage.endpoint {
                println!("  Endpoint: {}", endpoint);
            }
            println!("  Bind Address: {}", config.server.bind_address);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show effective configuration and build information
fn run_info(config_path: &Path) -> Result<()> {
    let config = BrowserConfig::load(Some(config_path))?;
    let build = BuildInfo::current();

    println!("WolfBrowse Information");
    println!("======================");
    println!();
    println!("Version:          {}", build.version_string());
    println!("Commit:           {}", build.git_commit);
    println!("Built:            {}", build.build_time);
    println!();
    println!("Storage:");
    println!("  Bucket:         {}", config.storage.bucket);
    println!("  Region:         {}", config.storage.region);
    println!(
        "  Endpoint:       {}",
        config.storage.endpoint.as_deref().unwrap_or("(AWS default)")
    );
    println!("  Path Style:     {}", config.storage.path_style);
    println!(
        "  Credentials:    {}",
        if config.storage.access_key_id.is_some() { "static" } else { "environment" }
    );
    println!();
    println!("Server:");
    println!("  Bind Address:   {}", config.server.bind_address);
    println!("  CORS:           {}", config.server.cors_enabled);
    if let Some(dir) = &config.server.static_dir {
        println!("  Static UI:      {}", dir.display());
    }
    println!();
    println!("Browsing:");
    println!(
        "  Base Directory: {}",
        if config.base_directory().is_empty() { "(bucket root)" } else { config.base_directory() }
    );
    println!("  Presign Expiry: {} s", config.browse.presign_expiry_secs);
    println!("  Fan-out Limit:  {}", config.browse.listing_concurrency);

    Ok(())
}
