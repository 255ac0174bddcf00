mod check;
mod cli;
mod config;
mod fetch;
mod models;
mod output;
mod scrapers;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::{ScoutConfig, SiteConfig};
use fetch::{BrowserFetcher, HttpFetcher, PageSource};
use scrapers::{
    agriaffaires, farm_machinery_locator, mascus, AgriaffairesParser, DealerScraper,
    FarmMachineryLocatorParser, ListingScraper, MascusParser, ScrapeOptions, ScraperTrait,
    SiteParser,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("🚜 Machinery Scout");
    info!("==================");

    let mut config = ScoutConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.results_dir {
        config.output.results_dir = dir;
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }

    let scraper: Box<dyn ScraperTrait> = match cli.command {
        Commands::Check { url, debug_dir } => {
            let fetcher = HttpFetcher::new(config.http)?;
            check::check_url(&fetcher, &url, &debug_dir).await?;
            return Ok(());
        }
        Commands::Dealers { country, max_pages } => {
            if let Some(country) = country {
                config.dealers.country = country;
            }
            if max_pages.is_some() {
                config.dealers.max_pages = max_pages;
            }
            let mut http = config.http.clone();
            scrapers::dealers::pin_uk_edition(&mut http);
            let fetcher = Arc::new(HttpFetcher::new(http)?);
            Box::new(DealerScraper::new(fetcher, config.dealers.clone(), config.output.clone()))
        }
        Commands::Agriaffaires { site, details, browser } => {
            let mut site_config = config.agriaffaires.clone();
            site.apply(&mut site_config);
            site_config.details |= details;
            if browser {
                site_config.browser = Some(true);
            }
            let options = ScrapeOptions::from_config(&site_config, &config.http, agriaffaires::DEFAULT_START_URL);
            let parser = AgriaffairesParser::new(&options.start_url);
            Box::new(listing_scraper(&config, &site_config, Box::new(parser), options, false)?)
        }
        Commands::Fml { site, browser } => {
            let mut site_config = config.fml.clone();
            site.apply(&mut site_config);
            if browser {
                site_config.browser = Some(true);
            }
            let options = ScrapeOptions::from_config(&site_config, &config.http, farm_machinery_locator::DEFAULT_START_URL);
            Box::new(listing_scraper(&config, &site_config, Box::new(FarmMachineryLocatorParser), options, false)?)
        }
        Commands::Mascus { site, http } => {
            let mut site_config = config.mascus.clone();
            site.apply(&mut site_config);
            if http {
                site_config.browser = Some(false);
            }
            let options = ScrapeOptions::from_config(&site_config, &config.http, mascus::DEFAULT_START_URL);
            Box::new(listing_scraper(&config, &site_config, Box::new(MascusParser), options, true)?)
        }
    };

    info!("Starting {} scrape...", scraper.source_name());
    let summary = tokio::select! {
        result = scraper.scrape() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; rows written so far are kept");
            return Ok(());
        }
    };

    info!("");
    info!(
        "✅ Scraped {} rows from {} pages of {} ({})",
        summary.rows, summary.pages, summary.source, summary.stop
    );
    info!("💾 Saved results to {}", summary.output.display());
    if summary.stop.is_failure() {
        warn!("⚠️  Run ended early: {}", summary.stop);
    }

    Ok(())
}

/// Pick the page source for a site (headless Chrome or plain HTTP) and wrap it with its parser
fn listing_scraper(
    config: &ScoutConfig,
    site: &SiteConfig,
    parser: Box<dyn SiteParser>,
    options: ScrapeOptions,
    browser_by_default: bool,
) -> Result<ListingScraper> {
    let source: Arc<dyn PageSource> = if site.browser.unwrap_or(browser_by_default) {
        Arc::new(BrowserFetcher::new(
            config.browser.clone(),
            parser.ready_selector(),
            config.http.max_retries,
            config.http.error_delay_secs,
        )?)
    } else {
        Arc::new(HttpFetcher::new(config.http.clone())?)
    };

    Ok(ListingScraper::new(source, parser, options, config.output.clone()))
}
