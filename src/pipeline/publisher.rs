//! Sequential batch publication with per-item accounting.

use crate::catalog::Catalog;
use crate::models::{CandidateRecord, NewProduct};
use crate::pipeline::sync::SyncEngine;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    SkippedDuplicate,
    Failed(String),
}

#[derive(Debug)]
pub struct PublishReport {
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<(String, PublishOutcome)>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PublishReport {
    pub fn start() -> Self {
        Self {
            published: 0,
            skipped: 0,
            failed: 0,
            outcomes: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, name: &str, outcome: PublishOutcome) {
        match &outcome {
            PublishOutcome::Published => {
                self.published += 1;
                info!("  Published: {}", name);
            }
            PublishOutcome::SkippedDuplicate => {
                self.skipped += 1;
                debug!("  Skipping (exists): {}", name);
            }
            PublishOutcome::Failed(reason) => {
                self.failed += 1;
                warn!("  Failed to publish {}: {}", name, reason);
            }
        }
        self.outcomes.push((name.to_string(), outcome));
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

/// Submits records one at a time, in order. A failure never stops the batch.
pub struct BatchPublisher<'a> {
    catalog: &'a dyn Catalog,
}

impl<'a> BatchPublisher<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self { catalog }
    }

    pub async fn publish(
        &self,
        engine: &mut SyncEngine,
        publish_set: Vec<CandidateRecord>,
        cancel: &CancellationToken,
        report: &mut PublishReport,
    ) {
        let total = publish_set.len();
        for (i, record) in publish_set.into_iter().enumerate() {
            if cancel.is_cancelled() {
                warn!("Publish cancelled with {} of {} records left", total - i, total);
                report.cancelled = true;
                break;
            }

            if engine.is_known(&record.name) {
                report.record(&record.name, PublishOutcome::SkippedDuplicate);
                continue;
            }

            debug!("  POST -> {}", record.name);
            match self.catalog.create(&NewProduct::from(&record)).await {
                Ok(()) => {
                    engine.record_published(&record.name);
                    report.record(&record.name, PublishOutcome::Published);
                }
                Err(e) => report.record(&record.name, PublishOutcome::Failed(e.to_string())),
            }
        }
    }
}
