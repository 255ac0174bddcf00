//! CLI definition using clap

use crate::config::{OutputFormat, SiteConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "machinery-scout")]
#[command(version)]
#[command(about = "Scrape used farm machinery listings into CSV files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML config file (defaults apply when omitted)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Directory for result files. Uses config value if not specified.
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Output format (csv, json). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape Agriaffaires results pages
    Agriaffaires {
        #[command(flatten)]
        site: SiteArgs,

        /// Visit each listing for price, dealer, phones and specifications
        #[arg(long)]
        details: bool,

        /// Render pages in headless Chrome instead of plain HTTP
        #[arg(long)]
        browser: bool,
    },

    /// Scrape FarmMachineryLocator search results
    Fml {
        #[command(flatten)]
        site: SiteArgs,

        /// Render pages in headless Chrome instead of plain HTTP
        #[arg(long)]
        browser: bool,
    },

    /// Scrape Mascus search results (headless Chrome by default)
    Mascus {
        #[command(flatten)]
        site: SiteArgs,

        /// Use plain HTTP instead of headless Chrome
        #[arg(long)]
        http: bool,
    },

    /// Scrape the Agriaffaires dealer directory for one country
    Dealers {
        /// Country slug as used in directory URLs (e.g. germany, france)
        #[arg(long)]
        country: Option<String>,

        /// Stop after this many directory pages
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Fetch one page, save it and report status and page markers
    Check {
        url: String,

        /// Where response.html is written
        #[arg(long, default_value = "debug")]
        debug_dir: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SiteArgs {
    /// First results page. Uses config value or the built-in search if not specified.
    #[arg(long)]
    pub url: Option<String>,

    /// Stop after this many results pages
    #[arg(long)]
    pub max_pages: Option<u32>,
}

impl SiteArgs {
    /// Command-line values win over the config file
    pub fn apply(self, site: &mut SiteConfig) {
        if let Some(url) = self.url {
            site.start_url = Some(url);
        }
        if let Some(max_pages) = self.max_pages {
            site.max_pages = Some(max_pages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_site_config() {
        let cli = Cli::parse_from([
            "machinery-scout",
            "--format",
            "json",
            "agriaffaires",
            "--url",
            "https://www.agriaffaires.co.uk/used/farm-tractor/1/4044/massey-ferguson.html",
            "--details",
        ]);
        assert_eq!(cli.format, Some(OutputFormat::Json));

        let Commands::Agriaffaires { site, details, browser } = cli.command else {
            panic!("expected agriaffaires");
        };
        assert!(details);
        assert!(!browser);

        let mut config = SiteConfig {
            max_pages: Some(4),
            ..SiteConfig::default()
        };
        site.apply(&mut config);
        assert!(config.start_url.unwrap().ends_with("massey-ferguson.html"));
        assert_eq!(config.max_pages, Some(4));
    }

    #[test]
    fn check_takes_positional_url() {
        let cli = Cli::parse_from(["machinery-scout", "check", "https://www.agriaffaires.co.uk/pros/list/1-france.html"]);
        let Commands::Check { url, debug_dir } = cli.command else {
            panic!("expected check");
        };
        assert!(url.ends_with("1-france.html"));
        assert_eq!(debug_dir, PathBuf::from("debug"));
    }
}
