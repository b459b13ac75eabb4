//! Event processing pipeline
//!
//! Drives a raw record through decode, extraction, enrichment,
//! persistence, and alerting. Failures are isolated per record: a
//! malformed record is logged and counted, never aborts the batch.

use std::sync::Arc;
use thiserror::Error;

use crate::alerting::{build_alert, AlertPolicy, AlertQueue};
use crate::config::Config;
use crate::enrich::{EnrichError, EventEnricher, ExtractError};
use crate::ingest::{decode_record, CodecError};
use crate::models::{BatchSummary, EnrichedEvent};
use crate::storage::{DataLake, EventCatalog, FsObjectStore, StorageError};

/// Errors produced while processing a single record
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Enrichment error: {0}")]
    Enrich(#[from] EnrichError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The end-to-end enrichment pipeline
pub struct EventPipeline {
    enricher: EventEnricher,
    lake: DataLake,
    catalog: EventCatalog,
    policy: AlertPolicy,
    alerts: Option<AlertQueue>,
}

impl EventPipeline {
    /// Build a pipeline from configuration. The alert queue is
    /// optional; without one, alerts are recorded in the catalog but
    /// not dispatched.
    pub fn from_config(config: &Config, alerts: Option<AlertQueue>) -> Result<Self, PipelineError> {
        let enricher = EventEnricher::from_config(&config.enrichment)?;
        let store = Arc::new(FsObjectStore::new(&config.storage.data_lake_root)?);
        let lake = DataLake::new(store, config.storage.events_prefix.clone());
        let catalog = EventCatalog::new(&config.storage.catalog_path)?;

        Ok(EventPipeline {
            enricher,
            lake,
            catalog,
            policy: AlertPolicy::from_config(&config.alerting),
            alerts,
        })
    }

    /// Build a pipeline from already-constructed components
    pub fn new(
        enricher: EventEnricher,
        lake: DataLake,
        catalog: EventCatalog,
        policy: AlertPolicy,
        alerts: Option<AlertQueue>,
    ) -> Self {
        EventPipeline {
            enricher,
            lake,
            catalog,
            policy,
            alerts,
        }
    }

    /// Process one raw record end to end.
    ///
    /// Returns the enriched event and whether an alert was generated.
    pub fn process_record(&self, raw: &[u8]) -> Result<(EnrichedEvent, bool), PipelineError> {
        let decoded = decode_record(raw)?;
        let event = crate::enrich::extract_event(decoded)?;
        let enriched = self.enricher.enrich(event);

        let key = self.lake.write_event(&enriched)?;
        self.catalog.record_event(&enriched, &key)?;

        let alerted = self.policy.should_alert(&enriched);
        if alerted {
            let alert = build_alert(&enriched);
            log::warn!(
                "Alert generated for event {} (score {}, type {})",
                enriched.event.event_id,
                enriched.risk_score,
                enriched.event.type_label()
            );
            self.catalog.record_alert(&alert)?;
            if let Some(ref queue) = self.alerts {
                queue.queue_alert(alert);
            }
        }

        log::debug!(
            "Processed event {} -> {} (score {})",
            enriched.event.event_id,
            key,
            enriched.risk_score
        );

        Ok((enriched, alerted))
    }

    /// Process a batch of raw records, isolating per-record failures
    pub fn process_batch<I, R>(&self, records: I) -> BatchSummary
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u8]>,
    {
        let mut summary = BatchSummary::default();

        for record in records {
            match self.process_record(record.as_ref()) {
                Ok((_, alerted)) => {
                    summary.processed_records += 1;
                    if alerted {
                        summary.alerts_generated += 1;
                    }
                }
                Err(e) => {
                    log::error!("Failed to process record: {}", e);
                    summary.failed_records += 1;
                }
            }
        }

        log::info!(
            "Processing complete: {} successful, {} failed, {} alerts",
            summary.processed_records,
            summary.failed_records,
            summary.alerts_generated
        );

        summary
    }

    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    pub fn lake(&self) -> &DataLake {
        &self.lake
    }

    /// Delete events older than the retention cutoff from both the
    /// catalog and the data lake. Returns the number of pruned events.
    pub fn prune(&self, cutoff: i64) -> Result<usize, PipelineError> {
        let keys = self.catalog.prune_before(cutoff)?;
        let count = keys.len();

        for key in keys {
            if let Err(e) = self.lake.delete_event(&key) {
                log::warn!("Failed to delete pruned object {}: {}", key, e);
            }
        }

        if count > 0 {
            log::info!("Pruned {} events past retention", count);
        }
        Ok(count)
    }
}
