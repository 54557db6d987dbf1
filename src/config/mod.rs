use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    /// Site root used for the cookie warm-up and for resolving relative links.
    /// Derived from the listing URL's origin when unset.
    #[serde(default)]
    pub site_url: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept")]
    pub accept: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    #[serde(default = "default_referer")]
    pub referer: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_warmup_timeout_secs")]
    pub warmup_timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    #[serde(default)]
    pub jitter_ms: u64,

    #[serde(default)]
    pub pagination: PaginationScheme,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default = "default_badge_patterns")]
    pub badge_patterns: Vec<String>,

    #[serde(default)]
    pub stock_markers: StockMarkerConfig,
}

/// How listing pages after the first are addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PaginationScheme {
    /// `{listing}/page/{n}/`
    Path,
    /// `?paged={n}`
    Query,
    /// Decide from the listing URL and the first page's links.
    #[default]
    Auto,
}

/// Ordered selector lists. Earlier entries win; later ones are looser fallbacks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectorConfig {
    #[serde(default = "default_item_selectors")]
    pub items: Vec<String>,
    #[serde(default = "default_title_selectors")]
    pub title: Vec<String>,
    #[serde(default = "default_price_selectors")]
    pub price: Vec<String>,
    #[serde(default = "default_stock_selectors")]
    pub stock: Vec<String>,
    #[serde(default = "default_brand_selectors")]
    pub brand: Vec<String>,
    #[serde(default = "default_link_selectors")]
    pub link: Vec<String>,
    #[serde(default = "default_detail_title_selectors")]
    pub detail_title: Vec<String>,
}

/// Lower-case substrings; out-of-stock markers are checked first.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StockMarkerConfig {
    #[serde(default = "default_out_of_stock_markers")]
    pub out_of_stock: Vec<String>,
    #[serde(default = "default_in_stock_markers")]
    pub in_stock: Vec<String>,
}

/// Remote catalog service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_catalog_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}
fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}
fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}
fn default_referer() -> String {
    "https://www.google.com/".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    6
}
fn default_read_timeout_secs() -> u64 {
    30
}
fn default_warmup_timeout_secs() -> u64 {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_page_delay_ms() -> u64 {
    450
}
fn default_badge_patterns() -> Vec<String> {
    vec![
        r"^\s*-\d+\s*%\s*$".to_string(),
        r"(?i)^\s*ska\s+n[eë]\s+stok\s*$".to_string(),
    ]
}
fn default_catalog_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_catalog_connect_timeout_secs() -> u64 {
    5
}
fn default_catalog_timeout_secs() -> u64 {
    15
}
fn default_max_pages() -> u32 {
    1
}
fn default_output_path() -> PathBuf {
    PathBuf::from("products.json")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_item_selectors() -> Vec<String> {
    strings(&[
        "ul.products li.product",
        "div.products div.product",
        "article.product",
        "li.product",
        "div.product",
        "div[class*=product]",
    ])
}
fn default_title_selectors() -> Vec<String> {
    strings(&[
        "h2.woocommerce-loop-product__title",
        "a > h2",
        "h2",
        "h3",
        ".product-title",
        "a",
    ])
}
fn default_price_selectors() -> Vec<String> {
    strings(&[
        "ins span.woocommerce-Price-amount bdi",
        "span.woocommerce-Price-amount bdi",
        "span.woocommerce-Price-amount",
        ".price bdi",
        ".price",
        "bdi",
    ])
}
fn default_stock_selectors() -> Vec<String> {
    strings(&[".stock", ".outofstock", ".availability"])
}
fn default_brand_selectors() -> Vec<String> {
    strings(&[".product-brand", ".pwb-brand-name", ".brand"])
}
fn default_link_selectors() -> Vec<String> {
    strings(&["a.woocommerce-LoopProduct-link[href]", "a[href]"])
}
fn default_detail_title_selectors() -> Vec<String> {
    strings(&["h1.product_title", "h1.entry-title", "h1"])
}
fn default_out_of_stock_markers() -> Vec<String> {
    strings(&["out of stock", "sold out", "unavailable", "ska", "out"])
}
fn default_in_stock_markers() -> Vec<String> {
    strings(&["in stock", "available", "në stok", "ne stok"])
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            site_url: None,
            user_agent: default_user_agent(),
            accept: default_accept(),
            accept_language: default_accept_language(),
            referer: default_referer(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            warmup_timeout_secs: default_warmup_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            page_delay_ms: default_page_delay_ms(),
            jitter_ms: 0,
            pagination: PaginationScheme::default(),
            selectors: SelectorConfig::default(),
            badge_patterns: default_badge_patterns(),
            stock_markers: StockMarkerConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            items: default_item_selectors(),
            title: default_title_selectors(),
            price: default_price_selectors(),
            stock: default_stock_selectors(),
            brand: default_brand_selectors(),
            link: default_link_selectors(),
            detail_title: default_detail_title_selectors(),
        }
    }
}

impl Default for StockMarkerConfig {
    fn default() -> Self {
        Self {
            out_of_stock: default_out_of_stock_markers(),
            in_stock: default_in_stock_markers(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            api_key: None,
            connect_timeout_secs: default_catalog_connect_timeout_secs(),
            timeout_secs: default_catalog_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            output_path: default_output_path(),
        }
    }
}

impl ScraperConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_secs(self.warmup_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("STOREFRONT").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid configuration")
    }
}
