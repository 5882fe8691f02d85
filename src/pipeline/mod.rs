//! Upload -> staging -> cleaning -> features -> fact snapshot.

pub mod clean;
pub mod features;
pub mod staging;

use crate::config::PipelineConfig;
use crate::constants::{FACT_TABLE, STAGING_TABLE};
use crate::error::Result;
use crate::export::write_facts_csv;
use crate::ingest::{self, SourceFormat, Upload};
use crate::ledger::RunLedger;
use crate::metrics::{PipelineMetrics, TimingGuard, RUN_DURATION_SECONDS};
use crate::storage::Warehouse;
use crate::types::{FactRow, Table};
use chrono::{DateTime, Utc};
use clean::CleaningReport;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Everything a caller needs to show or download after a successful run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub source_name: String,
    pub format: SourceFormat,
    pub checksum: String,
    pub previously_published_at: Option<DateTime<Utc>>,
    /// First rows of the upload as parsed, before alignment.
    pub uploaded: Table,
    pub batch_rows: usize,
    pub staging_rows: usize,
    pub report: CleaningReport,
    pub facts: Vec<FactRow>,
    pub published_rows: u64,
    pub duration_secs: f64,
    preview_rows: usize,
}

impl PipelineOutcome {
    pub fn preview(&self) -> &[FactRow] {
        let n = self.preview_rows.min(self.facts.len());
        &self.facts[..n]
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        write_facts_csv(&self.facts)
    }
}

struct Staged {
    format: SourceFormat,
    uploaded: Table,
    batch_rows: usize,
    staging_rows: usize,
    report: CleaningReport,
    facts: Vec<FactRow>,
    published_rows: u64,
}

pub struct Pipeline {
    warehouse: Arc<dyn Warehouse>,
    ledger: Option<Arc<RunLedger>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        ledger: Option<Arc<RunLedger>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            warehouse,
            ledger,
            config,
        }
    }

    pub fn ledger(&self) -> Option<&Arc<RunLedger>> {
        self.ledger.as_ref()
    }

    /// Run the complete pipeline for one uploaded file
    pub async fn run(&self, upload: Upload) -> Result<PipelineOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id, file = %upload.file_name);
        self.run_with_id(run_id, upload).instrument(span).await
    }

    async fn run_with_id(&self, run_id: Uuid, upload: Upload) -> Result<PipelineOutcome> {
        info!("🚀 Starting pipeline for {}", upload.file_name);
        PipelineMetrics::record_run_started();
        let timer = TimingGuard::new(RUN_DURATION_SECONDS);

        let checksum = ingest::checksum(&upload.bytes);
        let format_label = SourceFormat::detect(&upload.file_name)
            .map(|f| f.as_str())
            .unwrap_or("unknown");
        let previously_published_at = self.previous_success(&checksum);
        if let Some(at) = previously_published_at {
            info!("Same file was already published at {}; processing again", at);
        }
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record_started(run_id, &upload.file_name, &checksum, format_label) {
                warn!("Failed to record run start in ledger: {}", e);
            }
        }

        match self.execute(&upload).await {
            Ok(staged) => {
                if let Some(ledger) = &self.ledger {
                    if let Err(e) = ledger.record_succeeded(
                        run_id,
                        staged.batch_rows,
                        staged.staging_rows,
                        staged.published_rows,
                    ) {
                        warn!("Failed to record run success in ledger: {}", e);
                    }
                }
                Ok(PipelineOutcome {
                    run_id,
                    source_name: upload.file_name,
                    format: staged.format,
                    checksum,
                    previously_published_at,
                    uploaded: staged.uploaded,
                    batch_rows: staged.batch_rows,
                    staging_rows: staged.staging_rows,
                    report: staged.report,
                    facts: staged.facts,
                    published_rows: staged.published_rows,
                    duration_secs: timer.elapsed_secs(),
                    preview_rows: self.config.preview_rows,
                })
            }
            Err(e) => {
                error!("Pipeline failed: {}", e);
                PipelineMetrics::record_failure(e.stage_label());
                if let Some(ledger) = &self.ledger {
                    if let Err(le) = ledger.record_failed(run_id, &e.to_string()) {
                        warn!("Failed to record run failure in ledger: {}", le);
                    }
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, upload: &Upload) -> Result<Staged> {
        // Step 1: parse the upload
        let (format, raw) = ingest::load(upload)?;
        info!(
            "📥 Loaded {} rows x {} columns ({})",
            raw.len(),
            raw.columns.len(),
            format.as_str()
        );
        PipelineMetrics::record_ingested(raw.len());

        // Step 2: align to the staging schema and replace staging
        let staging_columns = self.warehouse.staging_columns().await?;
        let aligned = staging::align_to_schema(&raw, &staging_columns)?;
        let staged = self.warehouse.replace_staging(&aligned).await?;
        let staging_rows = staged.len();
        info!("💾 Staged {} rows into {}", staging_rows, STAGING_TABLE);

        // Step 3: clean
        let (cleaned, report) = clean::clean(staged);
        PipelineMetrics::record_cleaning(&report);
        info!(
            "🔧 Cleaning kept {} rows ({} rejected)",
            report.output_rows,
            report.rejected_rows()
        );

        // Step 4: feature engineering
        let facts = features::engineer(&cleaned);

        // Step 5: publish the snapshot
        let published_rows = self.warehouse.replace_facts(&facts).await?;
        PipelineMetrics::record_published(published_rows);

        info!("✅ Pipeline finished successfully.");
        info!(" - Rows in staging: {}", staging_rows);
        info!(" - Rows in {}: {}", FACT_TABLE, published_rows);
        info!(" - Columns in {}: {:?}", FACT_TABLE, FactRow::COLUMNS);

        Ok(Staged {
            format,
            uploaded: raw.head(self.config.preview_rows),
            batch_rows: raw.len(),
            staging_rows,
            report,
            facts,
            published_rows,
        })
    }

    fn previous_success(&self, checksum: &str) -> Option<DateTime<Utc>> {
        let ledger = self.ledger.as_ref()?;
        match ledger.last_success_for_checksum(checksum) {
            Ok(record) => record.and_then(|r| r.started_at_utc()),
            Err(e) => {
                warn!("Failed to query run ledger: {}", e);
                None
            }
        }
    }
}
