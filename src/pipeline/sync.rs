//! Deduplication against the remote catalog.
//!
//! The known-name set is read once per run and then only grows locally, one
//! successful publish at a time. `SyncEngine` is its single owner.

use crate::catalog::Catalog;
use crate::models::CandidateRecord;
use std::collections::HashSet;
use tracing::{info, warn};

/// Names already present in the catalog, plus those published during this run.
#[derive(Debug, Default, Clone)]
pub struct KnownNames(HashSet<String>);

impl KnownNames {
    /// Read the remote snapshot. Any failure yields an empty set: re-attempting a
    /// publish is preferable to silently dropping every candidate.
    pub async fn fetch(catalog: &dyn Catalog) -> Self {
        match catalog.list_names().await {
            Ok(names) => {
                info!("Catalog already has {} products", names.len());
                Self(names)
            }
            Err(e) => {
                warn!("Could not list existing products ({}); treating catalog as empty", e);
                Self::default()
            }
        }
    }

    /// Exact, case-sensitive match.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.0.insert(name.into())
    }
}

impl FromIterator<String> for KnownNames {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of filtering a candidate list against the known set.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub publish_set: Vec<CandidateRecord>,
    /// Names dropped because the catalog already had them.
    pub duplicates: Vec<String>,
}

pub struct SyncEngine {
    known: KnownNames,
}

impl SyncEngine {
    pub fn new(known: KnownNames) -> Self {
        Self { known }
    }

    pub async fn load(catalog: &dyn Catalog) -> Self {
        Self::new(KnownNames::fetch(catalog).await)
    }

    /// Drop candidates already in the catalog, preserving order. Repeats within
    /// `candidates` are kept here and caught at publish time.
    pub fn filter_new(&self, candidates: Vec<CandidateRecord>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        for candidate in candidates {
            if self.known.contains(&candidate.name) {
                outcome.duplicates.push(candidate.name);
            } else {
                outcome.publish_set.push(candidate);
            }
        }
        outcome
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Call only after the catalog confirmed the create.
    pub fn record_published(&mut self, name: &str) {
        self.known.insert(name);
    }

    pub fn known_count(&self) -> usize {
        self.known.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogError;
    use crate::models::{NewProduct, StockStatus};
    use async_trait::async_trait;

    struct DownCatalog;

    #[async_trait]
    impl Catalog for DownCatalog {
        async fn list_names(&self) -> Result<HashSet<String>, CatalogError> {
            Err(CatalogError::Status {
                status: 503,
                body: String::new(),
            })
        }
        async fn create(&self, _: &NewProduct) -> Result<(), CatalogError> {
            Ok(())
        }
    }

    fn record(name: &str) -> CandidateRecord {
        CandidateRecord {
            name: name.into(),
            price: None,
            brand: None,
            status: StockStatus::Unknown,
            product_url: None,
        }
    }

    #[test]
    fn test_filter_new_is_exact_and_ordered() {
        let engine = SyncEngine::new(["Mouse".to_string()].into_iter().collect());
        let out = engine.filter_new(vec![
            record("Keyboard"),
            record("Mouse"),
            record("mouse"),
            record("Mouse "),
            record("Keyboard"),
        ]);
        let names: Vec<_> = out.publish_set.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Keyboard", "mouse", "Mouse ", "Keyboard"]);
        assert_eq!(out.duplicates, vec!["Mouse".to_string()]);
    }

    #[test]
    fn test_record_published_extends_known_set() {
        let mut engine = SyncEngine::new(KnownNames::default());
        assert!(!engine.is_known("Pad"));
        engine.record_published("Pad");
        assert!(engine.is_known("Pad"));
        assert_eq!(engine.known_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_fails_open() {
        let engine = SyncEngine::load(&DownCatalog).await;
        assert_eq!(engine.known_count(), 0);
        let out = engine.filter_new(vec![record("A"), record("B")]);
        assert_eq!(out.publish_set.len(), 2);
    }
}
