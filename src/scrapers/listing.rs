use crate::config::OutputConfig;
use crate::fetch::PageSource;
use crate::output::{file_suffix, OutputSink};
use crate::scrapers::paginate::run_listing_pages;
use crate::scrapers::traits::{ScraperTrait, SiteParser};
use crate::scrapers::types::{ScrapeOptions, ScrapeSummary};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// A results-page scraper for one site: page source + site parser + output file
pub struct ListingScraper {
    source: Arc<dyn PageSource>,
    parser: Box<dyn SiteParser>,
    options: ScrapeOptions,
    output: OutputConfig,
}

impl ListingScraper {
    pub fn new(
        source: Arc<dyn PageSource>,
        parser: Box<dyn SiteParser>,
        options: ScrapeOptions,
        output: OutputConfig,
    ) -> Self {
        Self {
            source,
            parser,
            options,
            output,
        }
    }
}

#[async_trait]
impl ScraperTrait for ListingScraper {
    async fn scrape(&self) -> Result<ScrapeSummary> {
        let site = self.parser.source();
        let with_details = self.options.details && self.parser.supports_details();
        if self.options.details && !with_details {
            info!("{} has no detail pages; scraping results only", site.name());
        }

        let columns = site.columns(with_details);
        let headers: Vec<&str> = columns.iter().map(|c| c.header()).collect();
        let mut sink = OutputSink::create(
            &self.output.results_dir,
            &file_suffix(site.key(), &self.options.start_url),
            self.output.format,
            &headers,
        )?;

        info!(
            "Scraping {} via {} from {}",
            site.name(),
            self.source.name(),
            self.options.start_url
        );
        run_listing_pages(self.source.as_ref(), self.parser.as_ref(), &self.options, &mut sink).await
    }

    fn source_name(&self) -> &'static str {
        self.parser.source().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::fetch::stub::{Page, StubSource};
    use crate::scrapers::mascus::MascusParser;
    use crate::scrapers::types::StopReason;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_site_named_file() {
        let page = r#"
            <div class="SearchResult_searchResultItemWrapper__VVVnZ">
              <a class="SearchResult_assetHeaderUrl__EMde6" href="/agriculture/tractors/case-ih-puma/1.html">
                <h3 class="SearchResult_brandmodel__04K2L">Case IH Puma 150</h3>
              </a>
            </div>"#;
        let source = Arc::new(StubSource::new(vec![(
            "https://www.mascus.co.uk/agriculture/tractors/case_ih",
            Page::Html(page),
        )]));
        let dir = TempDir::new().unwrap();
        let scraper = ListingScraper::new(
            source,
            Box::new(MascusParser),
            ScrapeOptions {
                start_url: "https://www.mascus.co.uk/agriculture/tractors/case_ih".to_string(),
                max_pages: None,
                details: true,
                min_delay_secs: 0.0,
                max_delay_secs: 0.0,
                refresh_sessions_every: 0,
            },
            OutputConfig {
                results_dir: dir.path().to_path_buf(),
                format: OutputFormat::Csv,
            },
        );

        let summary = scraper.scrape().await.unwrap();
        assert_eq!(summary.source, "Mascus");
        assert_eq!(summary.rows, 1);
        assert_eq!(summary.stop, StopReason::LastPage);
        assert!(summary.output.to_string_lossy().ends_with("_mascus_case_ih.csv"));

        let text = std::fs::read_to_string(&summary.output).unwrap();
        assert!(text.starts_with("Title,Year,Hours,Company,Company URL,URL"));
        assert!(text.contains("Case IH Puma 150,N/A,N/A,N/A,N/A,https://www.mascus.co.uk/agriculture/tractors/case-ih-puma/1.html"));
    }
}
