pub mod cleaner;
pub mod http_client;
pub mod parsers;
pub mod probe;
pub mod selectors;

use crate::config::{PaginationScheme, ScraperConfig};
use crate::models::{CandidateRecord, RawListingEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use self::cleaner::{normalise_whitespace, parse_price, StockMarkers, TitleValidator};
use self::http_client::HttpClient;
use self::parsers::{detect_pagination, page_url, parse_detail_title, parse_listing_page};
use self::selectors::ListingSelectors;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable listing source abstraction.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Walk up to `max_pages` listing pages and return every entry that yielded a valid
    /// record. Page failures are skipped; only an unusable listing URL is an error.
    async fn scrape_category(
        &self,
        listing_url: &str,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<CandidateRecord>>;
}

/// Scheme + host of `url`, used as the warm-up target and link base.
pub fn site_origin(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("Invalid URL {:?}", url))?;
    Url::parse(&format!("{}/", parsed.origin().ascii_serialization()))
        .with_context(|| format!("URL {:?} has no usable origin", url))
}

// ── WooCommerce-style storefront scraper ──────────────────────────────────────

pub struct StorefrontScraper {
    client: HttpClient,
    site_base: Url,
    selectors: ListingSelectors,
    validator: TitleValidator,
    stock: StockMarkers,
    pagination: PaginationScheme,
    page_delay: Duration,
    jitter_ms: u64,
}

impl StorefrontScraper {
    /// `site_url` is the storefront root; relative product links resolve against it.
    pub fn new(config: &ScraperConfig, site_url: &str) -> Result<Self> {
        let site_base = site_origin(site_url)?;
        Ok(Self {
            client: HttpClient::new(config, Some(site_base.to_string()))?,
            site_base,
            selectors: ListingSelectors::from_config(&config.selectors)?,
            validator: TitleValidator::new(&config.badge_patterns)?,
            stock: StockMarkers::new(&config.stock_markers),
            pagination: config.pagination,
            page_delay: Duration::from_millis(config.page_delay_ms),
            jitter_ms: config.jitter_ms,
        })
    }

    /// Turn one raw entry into a record, or drop it if no valid title can be found.
    /// The detail-page fallback is skipped once `cancel` has fired.
    async fn build_record(
        &self,
        entry: RawListingEntry,
        cancel: &CancellationToken,
    ) -> Option<CandidateRecord> {
        let listed = match entry.title.as_deref().map(|t| self.validator.check(t)) {
            Some(Ok(title)) => Some(title),
            Some(Err(rejection)) => {
                debug!("Listing title rejected: {}", rejection);
                None
            }
            None => None,
        };

        let name = match listed {
            Some(name) => name,
            None if cancel.is_cancelled() => {
                debug!("Cancelled; not fetching detail page for {:?}", entry.snippet);
                return None;
            }
            None => match self.detail_title(entry.link.as_deref()).await {
                Some(name) => name,
                None => {
                    info!("  Skipping entry without a usable title. snippet: {:?}", entry.snippet);
                    return None;
                }
            },
        };

        let price = entry.price.as_deref().and_then(parse_price);
        let price = match price {
            Some(p) if p < 0.0 => {
                debug!("{}: ignoring negative price {}", name, p);
                None
            }
            other => other,
        };

        Some(CandidateRecord {
            price,
            brand: entry
                .brand
                .map(|b| normalise_whitespace(&b))
                .filter(|b| !b.is_empty()),
            status: entry
                .stock
                .map(|s| self.stock.classify(&s))
                .unwrap_or_default(),
            product_url: entry.link,
            name,
        })
    }

    /// Fallback for entries whose listing title is missing or a badge.
    async fn detail_title(&self, link: Option<&str>) -> Option<String> {
        let link = link?;
        debug!("Title fallback: fetching detail page {}", link);

        let page = match self.client.fetch(link).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Detail page {} unavailable: {}", link, e);
                return None;
            }
        };

        let heading = parse_detail_title(&page.body, &self.selectors.detail_title)?;
        match self.validator.check(&heading) {
            Ok(title) => Some(title),
            Err(rejection) => {
                debug!("Detail title rejected for {}: {}", link, rejection);
                None
            }
        }
    }

    /// Sleep for the configured delay + random jitter, or less if cancelled.
    async fn polite_delay(&self, cancel: &CancellationToken) {
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        let total = self.page_delay + Duration::from_millis(jitter);
        tokio::select! {
            _ = sleep(total) => {}
            _ = cancel.cancelled() => {}
        }
    }
}

#[async_trait]
impl ListingSource for StorefrontScraper {
    async fn scrape_category(
        &self,
        listing_url: &str,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<CandidateRecord>> {
        let listing = Url::parse(listing_url)
            .with_context(|| format!("Invalid listing URL {:?}", listing_url))?;
        let max_pages = max_pages.max(1);
        let mut scheme = self.pagination;
        let mut records = Vec::new();
        let mut skipped_pages = 0usize;

        for page in 1..=max_pages {
            if cancel.is_cancelled() {
                warn!("Cancelled before page {}; keeping {} records", page, records.len());
                break;
            }

            let url = page_url(&listing, page, scheme);
            info!("Fetching listing page {} ({})", page, url);

            match self.client.fetch(url.as_str()).await {
                Ok(fetched) => {
                    if !fetched.backoffs.is_empty() {
                        info!(
                            "  Page {} ({}) recovered after {} attempts, waited {:?}",
                            page, fetched.url, fetched.attempts, fetched.backoffs
                        );
                    }
                    if scheme == PaginationScheme::Auto {
                        scheme = detect_pagination(&listing, &fetched.body);
                        debug!("Pagination scheme resolved to {:?}", scheme);
                    }

                    let parsed = parse_listing_page(&fetched.body, &self.selectors, &self.site_base);
                    if parsed.entries.is_empty() {
                        warn!("  Page {}: no product entries found", page);
                    }

                    let mut kept = 0usize;
                    let found = parsed.entries.len();
                    for entry in parsed.entries {
                        if let Some(record) = self.build_record(entry, cancel).await {
                            records.push(record);
                            kept += 1;
                        }
                    }
                    info!(
                        "  Page {}: {} entries via {:?}, {} records",
                        page,
                        found,
                        parsed.matched_selector.as_deref().unwrap_or("-"),
                        kept
                    );
                }
                Err(e) => {
                    skipped_pages += 1;
                    warn!("Skipping page {} ({}): {}", page, url, e);
                }
            }

            if page < max_pages {
                self.polite_delay(cancel).await;
            }
        }

        info!(
            "Scrape finished: {} records, {} pages skipped",
            records.len(),
            skipped_pages
        );
        Ok(records)
    }
}
