//! taskearn-offline - operator tool for the TaskEarn offline shell cache.
//!
//! Provisions and activates cache generations against a live origin, and
//! resolves URLs through the same cache-first policy the shell uses.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskearn_core::cache::{CacheStore, GenerationId};
use taskearn_core::{CacheController, Config, DiskCacheStore, HttpFetcher, Request};

type Controller = CacheController<DiskCacheStore, HttpFetcher>;

#[derive(Parser, Debug)]
#[command(name = "taskearn-offline")]
#[command(about = "Manage the TaskEarn offline shell cache")]
#[command(version)]
struct Args {
    /// Shell origin (overrides config and TASKEARN_ORIGIN)
    #[arg(short, long)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Provision the configured generation and activate it immediately
    Install,
    /// Fetch the shell manifest into the configured generation without activating it
    Provision,
    /// Activate a provisioned generation, deleting all others
    Activate {
        /// Generation to activate (defaults to the configured one)
        generation: Option<String>,
    },
    /// Resolve a URL through the cache
    Resolve {
        url: String,
        /// Extra request header, as NAME:VALUE (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Write the response body to stdout
        #[arg(long)]
        body: bool,
    },
    /// List generations held on disk
    Generations,
    /// Print the effective configuration
    Config {
        /// Rewrite the config file with all defaults filled in (overrides are not saved)
        #[arg(long)]
        save: bool,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {:?}", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn build_controller(config: &Config) -> Result<Controller> {
    let origin = config.origin_url()?;
    let cache_dir = config.cache_dir()?;
    let store = DiskCacheStore::new(cache_dir.clone())
        .with_context(|| format!("Failed to open cache directory: {}", cache_dir.display()))?;
    let fetcher = HttpFetcher::new(origin.clone())?;
    Ok(CacheController::new(store, fetcher, origin, config.api_hosts()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(origin) = args.origin {
        config.origin = origin;
    }

    match args.command {
        Command::Install => install(&config).await,
        Command::Provision => provision(&config).await,
        Command::Activate { generation } => activate(&config, generation).await,
        Command::Resolve { url, headers, body } => resolve(&config, &url, headers, body).await,
        Command::Generations => generations(&config).await,
        Command::Config { save } => show_config(&config, save),
    }
}

async fn install(config: &Config) -> Result<()> {
    let controller = build_controller(config)?;
    let generation = config.generation_id()?;
    controller.install(&generation, &config.manifest()).await?;
    eprintln!("Installed and activated {}", generation);
    Ok(())
}

async fn provision(config: &Config) -> Result<()> {
    let controller = build_controller(config)?;
    let generation = config.generation_id()?;
    controller
        .provision(&generation, &config.manifest())
        .await
        .with_context(|| format!("Provisioning {} failed", generation))?;
    eprintln!(
        "Provisioned {} ({} shell resources)",
        generation,
        config.manifest().len()
    );
    Ok(())
}

async fn activate(config: &Config, generation: Option<String>) -> Result<()> {
    let controller = build_controller(config)?;
    let generation = match generation {
        Some(id) => GenerationId::parse(id)?,
        None => config.generation_id()?,
    };
    controller.activate(&generation).await?;
    eprintln!("Activated {}", generation);
    Ok(())
}

async fn resolve(
    config: &Config,
    url: &str,
    headers: Vec<(String, String)>,
    print_body: bool,
) -> Result<()> {
    let controller = build_controller(config)?;
    let generation = config.generation_id()?;
    if !controller.resume(&generation).await? {
        info!(generation = %generation, "Generation not provisioned, resolving without cache");
    }

    let url = controller
        .origin()
        .join(url)
        .with_context(|| format!("Invalid URL: {}", url))?;
    let request = headers
        .iter()
        .fold(Request::get(url.clone()), |req, (name, value)| req.with_header(name, value));
    let resolved = controller.resolve(&request).await?;

    eprintln!(
        "{} {} via {:?} ({} bytes, {})",
        resolved.response.status,
        url,
        resolved.source,
        resolved.response.body.len(),
        resolved.response.header("content-type").unwrap_or("no content type")
    );
    if print_body {
        io::stdout().write_all(&resolved.response.body)?;
    }
    Ok(())
}

async fn generations(config: &Config) -> Result<()> {
    let controller = build_controller(config)?;
    let configured = config.generation_id()?;
    let store = controller.store();

    let ids = store.keys().await?;
    if ids.is_empty() {
        eprintln!("No generations in {}", store.root().display());
        return Ok(());
    }
    for id in ids {
        let entries = store.entries(&id).await?;
        let marker = if id == configured { "*" } else { " " };
        println!("{} {} ({} entries)", marker, id, entries.len());
    }
    Ok(())
}

fn show_config(config: &Config, save: bool) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    if save {
        let path = Config::config_path()?;
        Config::normalize_file(&path)?;
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Accept: text/html").unwrap(),
            ("Accept".to_string(), "text/html".to_string())
        );
        assert!(parse_header("no-separator").is_err());
    }
}
