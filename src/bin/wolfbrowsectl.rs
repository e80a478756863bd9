//! WolfBrowseCtl - Command line client for a running WolfBrowse server
//!
//! Usage:
//!   wolfbrowsectl ls [PATH]      - List a directory
//!   wolfbrowsectl info FILE      - Show file metadata
//!   wolfbrowsectl url FILE       - Print the presigned URL for a file
//!   wolfbrowsectl version        - Show server build information

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use wolfbrowse::browser::{DirectoryListing, FileInfo};
use wolfbrowse::version::BuildInfo;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

/// WolfBrowse Control Tool
#[derive(Parser)]
#[command(name = "wolfbrowsectl")]
#[command(about = "Browse a bucket through a running WolfBrowse server", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wolfbrowse.toml")]
    config: PathBuf,

    /// API endpoint to connect to (overrides config)
    #[arg(short, long)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        /// Virtual path, defaults to the root
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show metadata for one file
    Info {
        /// Full file key
        file: String,
    },
    /// Print the presigned URL a browser would be redirected to
    Url {
        /// Full file key
        file: String,

        /// Use the download (attachment) route instead of open
        #[arg(long)]
        download: bool,
    },
    /// Show server build information
    Version,
}

// ============ Config ============

#[derive(Debug, Deserialize)]
struct Config {
    #[serde(default)]
    server: ServerSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_bind")]
    bind_address: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let endpoint = match &cli.endpoint {
        Some(e) => e.trim_end_matches('/').to_string(),
        None => endpoint_from_config(&cli.config),
    };

    let result = match &cli.command {
        Commands::Ls { path } => list(&endpoint, path).await,
        Commands::Info { file } => info(&endpoint, file).await,
        Commands::Url { file, download } => presigned_url(&endpoint, file, *download).await,
        Commands::Version => version(&endpoint).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Derive the endpoint from the server's bind address
fn endpoint_from_config(path: &Path) -> String {
    let Ok(content) = std::fs::read_to_string(path) else {
        return DEFAULT_ENDPOINT.to_string();
    };
    match toml::from_str::<Config>(&content) {
        Ok(config) => endpoint_for_bind(&config.server.bind_address),
        Err(_) => DEFAULT_ENDPOINT.to_string(),
    }
}

fn endpoint_for_bind(addr: &str) -> String {
    // Wildcard binds are reachable on loopback
    if addr.starts_with("0.0.0.0") {
        format!("http://127.0.0.1:{}", addr.rsplit(':').next().unwrap_or("8080"))
    } else {
        format!("http://{}", addr)
    }
}

// ============ Commands ============

async fn list(endpoint: &str, path: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/list", endpoint))
        .query(&[("path", path)])
        .send()
        .await
        .with_context(|| format!("cannot reach {}", endpoint))?;

    let listing: DirectoryListing = check(response).await?.json().await?;

    println!();
    println!("{}", listing.path);
    println!();
    println!("{:<40} {:>10} {:<30}", "NAME", "SIZE", "TYPE");
    println!("{}", "-".repeat(82));

    for entry in &listing.files {
        if entry.is_directory {
            println!("\x1b[1;34m{:<40}\x1b[0m {:>10} {:<30}", format!("{}/", entry.name), "-", "directory");
        } else {
            println!(
                "{:<40} {:>10} {:<30}",
                entry.name,
                format_size(entry.size),
                entry.mime_type.as_deref().unwrap_or("")
            );
        }
    }

    println!();
    println!(
        "{} directories, {} files",
        listing.directories().count(),
        listing.regular_files().count()
    );

    Ok(())
}

async fn info(endpoint: &str, file: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/info", endpoint))
        .query(&[("file", file)])
        .send()
        .await
        .with_context(|| format!("cannot reach {}", endpoint))?;

    let info: FileInfo = check(response).await?.json().await?;

    println!();
    println!("Name:          {}", info.name);
    println!("Key:           {}", info.path);
    println!("Size:          {} ({} bytes)", format_size(info.size), info.size);
    println!("Content Type:  {}", info.mime_type.as_deref().unwrap_or("-"));
    if let Some(modified) = info.last_modified {
        println!("Modified:      {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(etag) = &info.etag {
        println!("ETag:          {}", etag);
    }
    println!();

    Ok(())
}

async fn presigned_url(endpoint: &str, file: &str, download: bool) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let route = if download { "download" } else { "open" };
    let response = client
        .get(format!("{}/api/{}", endpoint, route))
        .query(&[("file", file)])
        .send()
        .await
        .with_context(|| format!("cannot reach {}", endpoint))?;

    if !response.status().is_redirection() {
        check(response).await?;
        bail!("server did not redirect");
    }

    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .ok_or_else(|| anyhow!("redirect without Location header"))?
        .to_str()
        .context("Location header is not valid text")?;

    println!("{}", location);
    Ok(())
}

async fn version(endpoint: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/api/version", endpoint))
        .send()
        .await
        .with_context(|| format!("cannot reach {}", endpoint))?;

    let server: BuildInfo = check(response).await?.json().await?;

    println!("Server:  {}", server);
    println!("Client:  {}", BuildInfo::current());
    Ok(())
}

/// Turn an error status into an error carrying the server's message
async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match response.json::<ErrorBody>().await {
        Ok(body) => bail!("{} ({})", body.error, status),
        Err(_) => bail!("API error: {}", status),
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
