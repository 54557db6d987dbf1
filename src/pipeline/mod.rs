//! Pipeline orchestrator: ties scraper → dedup → catalog together.
//!
//! ## Flow
//!
//! 1. `scrape()` walks the listing pages and returns validated candidates.
//!    Failed pages are skipped, never fatal.
//! 2. `publish()` reads the catalog's existing names once, drops candidates already
//!    there, and creates the rest one by one. Names published earlier in the same
//!    run are skipped, so a product listed on two pages is created once.
//!
//! Both steps stop between units of work (pages, records) when the cancellation
//! token fires.

pub mod publisher;
pub mod sync;

use crate::catalog::{Catalog, RestCatalog};
use crate::config::AppConfig;
use crate::models::CandidateRecord;
use crate::scraper::{site_origin, ListingSource, StorefrontScraper};
use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use self::publisher::{BatchPublisher, PublishOutcome, PublishReport};
use self::sync::SyncEngine;

pub struct Pipeline {
    source: Box<dyn ListingSource>,
    catalog: Box<dyn Catalog>,
}

impl Pipeline {
    pub fn new(source: Box<dyn ListingSource>, catalog: Box<dyn Catalog>) -> Self {
        Self { source, catalog }
    }

    /// Wire up the real scraper and REST catalog for `listing_url`.
    pub fn from_config(config: &AppConfig, listing_url: &str) -> Result<Self> {
        let site = match config.scraper.site_url.as_deref() {
            Some(site) => site.to_string(),
            None => site_origin(listing_url)?.to_string(),
        };
        let scraper = StorefrontScraper::new(&config.scraper, &site)
            .context("Failed to build scraper")?;
        let catalog = RestCatalog::new(&config.catalog).context("Failed to build catalog client")?;
        Ok(Self::new(Box::new(scraper), Box::new(catalog)))
    }

    /// Catalog-only pipeline for publishing records that were not scraped in this run.
    pub fn for_catalog(config: &AppConfig) -> Result<Self> {
        let catalog = RestCatalog::new(&config.catalog).context("Failed to build catalog client")?;
        Ok(Self::new(Box::new(NoListing), Box::new(catalog)))
    }

    pub async fn scrape(
        &self,
        listing_url: &str,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<CandidateRecord>> {
        info!("=== Scraping {} ({} pages) ===", listing_url, max_pages);
        self.source.scrape_category(listing_url, max_pages, cancel).await
    }

    pub async fn publish(
        &self,
        candidates: Vec<CandidateRecord>,
        cancel: &CancellationToken,
    ) -> PublishReport {
        info!("=== Publishing {} candidates ===", candidates.len());
        let mut report = PublishReport::start();

        let mut engine = SyncEngine::load(self.catalog.as_ref()).await;
        let filtered = engine.filter_new(candidates);
        for name in &filtered.duplicates {
            report.record(name, PublishOutcome::SkippedDuplicate);
        }
        info!(
            "{} new candidates, {} already in catalog",
            filtered.publish_set.len(),
            filtered.duplicates.len()
        );

        BatchPublisher::new(self.catalog.as_ref())
            .publish(&mut engine, filtered.publish_set, cancel, &mut report)
            .await;

        let report = report.finish();
        info!(
            "=== Done: {} published | {} skipped | {} failed | {} names known ===",
            report.published,
            report.skipped,
            report.failed,
            engine.known_count()
        );
        report
    }
}

/// Listing source for catalog-only runs; yields nothing.
struct NoListing;

#[async_trait::async_trait]
impl ListingSource for NoListing {
    async fn scrape_category(
        &self,
        _listing_url: &str,
        _max_pages: u32,
        _cancel: &CancellationToken,
    ) -> Result<Vec<CandidateRecord>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CatalogConfig, ScraperConfig};
    use crate::models::StockStatus;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(name: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.into(),
            price: Some(9.5),
            brand: None,
            status: StockStatus::InStock,
            product_url: None,
        }
    }

    fn config(server: &MockServer) -> AppConfig {
        AppConfig {
            scraper: ScraperConfig {
                max_attempts: 1,
                page_delay_ms: 0,
                ..ScraperConfig::default()
            },
            catalog: CatalogConfig {
                base_url: server.uri(),
                api_key: Some("k".into()),
                ..CatalogConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_duplicate_scraped_names_published_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Old"}])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/products/"))
            .and(body_partial_json(json!({"name": "Twin"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = Pipeline::for_catalog(&config(&server)).unwrap();
        let report = pipeline
            .publish(
                vec![record("Old"), record("Twin"), record("Twin")],
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report.published, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 0);
        assert!(report.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_failure_attempts_every_distinct_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/products/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;

        let pipeline = Pipeline::for_catalog(&config(&server)).unwrap();
        let report = pipeline
            .publish(
                vec![record("A"), record("B"), record("C"), record("A")],
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(report.published, 3);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_scrape_then_publish_end_to_end() {
        let server = MockServer::start().await;
        let html = r#"<ul class="products">
            <li class="product"><a href="/p/a/"><h2>Alpha</h2></a><bdi>10,00€</bdi><span class="stock">Në stok</span></li>
            <li class="product"><a href="/p/b/"><h2>Beta</h2></a><bdi>12,00€</bdi></li>
        </ul>"#;
        Mock::given(method("GET"))
            .and(path("/shop/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/products/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7, "name": "Beta"}])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/products/"))
            .and(body_partial_json(json!({"name": "Alpha", "status": "in stock", "price": 10.0})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let listing = format!("{}/shop/", server.uri());
        let pipeline = Pipeline::from_config(&config(&server), &listing).unwrap();
        let cancel = CancellationToken::new();

        let records = pipeline.scrape(&listing, 1, &cancel).await.unwrap();
        assert_eq!(records.len(), 2);

        let report = pipeline.publish(records, &cancel).await;
        assert_eq!((report.published, report.skipped), (1, 1));
    }
}
