//! Client for the remote product catalog service.
//!
//! Only two calls are used: list existing products and create one product.

use crate::config::CatalogConfig;
use crate::models::{NewProduct, RemoteProduct};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no API key configured for catalog writes")]
    MissingApiKey,
}

/// Narrow view of the catalog service the sync engine depends on.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Names of every product currently in the catalog.
    async fn list_names(&self) -> Result<HashSet<String>, CatalogError>;

    /// Create one product. Success means HTTP 200 or 201.
    async fn create(&self, product: &NewProduct) -> Result<(), CatalogError>;
}

// ── REST implementation ───────────────────────────────────────────────────────

pub struct RestCatalog {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RestCatalog {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build catalog HTTP client")?;

        Ok(Self {
            client,
            endpoint: products_endpoint(&config.base_url),
            api_key: config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        })
    }
}

/// `{base}/products/`, tolerant of a trailing slash on the base.
pub fn products_endpoint(base_url: &str) -> String {
    format!("{}/products/", base_url.trim_end_matches('/'))
}

#[async_trait]
impl Catalog for RestCatalog {
    async fn list_names(&self) -> Result<HashSet<String>, CatalogError> {
        let resp = self.client.get(&self.endpoint).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let items: Vec<RemoteProduct> = resp.json().await?;
        debug!("Catalog lists {} products", items.len());
        Ok(items
            .into_iter()
            .filter_map(|p| p.name)
            .filter(|n| !n.is_empty())
            .collect())
    }

    async fn create(&self, product: &NewProduct) -> Result<(), CatalogError> {
        let api_key = self.api_key.as_deref().ok_or(CatalogError::MissingApiKey)?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header("api-key", api_key)
            .json(product)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 200 || status == 201 {
            Ok(())
        } else {
            Err(CatalogError::Status {
                status,
                body: resp.text().await.unwrap_or_default(),
            })
        }
    }
}
