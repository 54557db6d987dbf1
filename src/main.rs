mod catalog;
mod config;
mod loader;
mod models;
mod pipeline;
mod scraper;
mod utils;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{AppConfig, PaginationScheme};
use crate::loader::{load_csv, read_artifact, to_json, write_artifact};
use crate::models::CandidateRecord;
use crate::pipeline::Pipeline;
use crate::scraper::cleaner::{StockMarkers, TitleValidator};
use crate::scraper::http_client::HttpClient;
use crate::scraper::probe::diagnose;
use crate::scraper::selectors::SelectorChain;
use crate::scraper::site_origin;

#[derive(Parser)]
#[command(name = "storefront-sync", about = "Storefront listing scraper and catalog sync", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Print the records as JSON
    Print,
    /// Publish new records to the catalog
    Post,
    /// Write the records to a JSON file
    Savejson,
}

#[derive(Args)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = Mode::Print)]
    mode: Mode,

    /// Artifact path for `savejson` (default from config)
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Args)]
struct CatalogArgs {
    /// Catalog service base URL
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Key sent as the `api-key` header on writes
    #[arg(long, env = "API_KEYS", hide_env_values = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape a category listing and print, save, or publish the products
    Scrape {
        #[arg(short, long)]
        url: String,

        /// Number of listing pages to walk (default from config)
        #[arg(long)]
        pages: Option<u32>,

        #[arg(long, value_enum)]
        pagination: Option<PaginationScheme>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Import a CSV export from a scraping tool
    ImportCsv {
        #[arg(short, long)]
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Publish a previously saved JSON artifact
    Publish {
        #[arg(long)]
        from: PathBuf,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Fetch one page and report whether the storefront serves parseable HTML
    Probe {
        #[arg(short, long)]
        url: String,

        /// Save the fetched HTML here for manual inspection
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

impl CatalogArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(base) = &self.base_url {
            config.catalog.base_url = base.clone();
        }
        if let Some(key) = &self.api_key {
            config.catalog.api_key = Some(key.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "storefront_sync=info,warn",
        1 => "storefront_sync=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    let cancel = CancellationToken::new();
    spawn_ctrl_c(cancel.clone());

    match cli.command {
        Command::Scrape {
            url,
            pages,
            pagination,
            output,
        } => {
            let _t = utils::Timer::start("Scrape");
            if let Some(p) = pagination {
                config.scraper.pagination = p;
            }
            output.catalog.apply(&mut config);
            check_output(output.mode, &config)?;

            let pipeline = Pipeline::from_config(&config, &url)?;
            let pages = pages.unwrap_or(config.pipeline.max_pages);
            let records = pipeline.scrape(&url, pages, &cancel).await?;
            info!("Found {} valid products", records.len());

            emit(&config, &pipeline, records, &output, &cancel).await?;
        }

        Command::ImportCsv { file, output } => {
            let _t = utils::Timer::start("CSV import");
            output.catalog.apply(&mut config);
            check_output(output.mode, &config)?;

            let validator = TitleValidator::new(&config.scraper.badge_patterns)?;
            let markers = StockMarkers::new(&config.scraper.stock_markers);
            let records = load_csv(&file, &validator, &markers)?;

            let pipeline = Pipeline::for_catalog(&config)?;
            emit(&config, &pipeline, records, &output, &cancel).await?;
        }

        Command::Publish { from, catalog } => {
            let _t = utils::Timer::start("Publish artifact");
            catalog.apply(&mut config);
            require_api_key(&config)?;

            let records = read_artifact(&from)?;
            let report = Pipeline::for_catalog(&config)?.publish(records, &cancel).await;
            println!(
                "Posted {}/{} (skipped {}, failed {})",
                report.published,
                report.total(),
                report.skipped,
                report.failed
            );
        }

        Command::Probe { url, save } => {
            let site = match config.scraper.site_url.clone() {
                Some(site) => site,
                None => site_origin(&url)?.to_string(),
            };
            let client = HttpClient::new(&config.scraper, Some(site))?;
            let items = SelectorChain::parse("items", config.scraper.selectors.items.as_slice())?;

            match client.fetch(&url).await {
                Ok(page) => {
                    let report = diagnose(&page.body, &items);
                    println!("HTTP status      : {}", page.status);
                    println!("Attempts         : {}", page.attempts);
                    println!("Response length  : {}", report.body_len);
                    println!("Block markers    : {:?}", report.block_markers);
                    for (selector, hits) in &report.selector_hits {
                        println!("Selector {:<28} -> {} found", format!("'{}'", selector), hits);
                    }
                    if report.looks_blocked() {
                        warn!("Page looks like an anti-bot interstitial");
                    }
                    if let Some(path) = save {
                        std::fs::write(&path, &page.body)?;
                        println!("Saved full HTML to {:?}", path);
                    }
                }
                Err(e) => println!("Fetch failed: {}", e),
            }
        }
    }

    Ok(())
}

/// Print, save, or publish records according to `--mode`.
async fn emit(
    config: &AppConfig,
    pipeline: &Pipeline,
    records: Vec<CandidateRecord>,
    output: &OutputArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    match output.mode {
        Mode::Print => println!("{}", to_json(&records)?),
        Mode::Savejson => {
            let path = output
                .out
                .clone()
                .unwrap_or_else(|| config.pipeline.output_path.clone());
            write_artifact(&path, &records)?;
            println!("Saved: {}", path.display());
        }
        Mode::Post => {
            let total = records.len();
            let report = pipeline.publish(records, cancel).await;
            println!(
                "Posted {}/{} (skipped {}, failed {})",
                report.published, total, report.skipped, report.failed
            );
        }
    }
    Ok(())
}

/// Reject unusable output settings before any network work starts.
fn check_output(mode: Mode, config: &AppConfig) -> Result<()> {
    match mode {
        Mode::Post => require_api_key(config),
        Mode::Print | Mode::Savejson => Ok(()),
    }
}

fn require_api_key(config: &AppConfig) -> Result<()> {
    match config.catalog.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(()),
        _ => bail!("Missing API key: pass --api-key, set API_KEYS, or STOREFRONT__CATALOG__API_KEY"),
    }
}

/// First Ctrl-C cancels the run at the next page or record boundary; a second one exits.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, finishing the current request before stopping (Ctrl-C again to quit)");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });
}
