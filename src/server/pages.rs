//! Askama views for the upload form and run results.

use crate::error::Result;
use crate::ledger::RunRecord;
use crate::pipeline::PipelineOutcome;
use crate::types::{FactRow, Table};
use askama::Template;

/// A plain header + rows table, rendered inside the page templates.
#[derive(Template)]
#[template(path = "table.html")]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn raw(table: &Table) -> Self {
        Self {
            headers: table.columns.clone(),
            rows: table
                .rows
                .iter()
                .map(|row| row.iter().map(|c| c.clone().unwrap_or_default()).collect())
                .collect(),
        }
    }

    fn facts(rows: &[FactRow]) -> Self {
        Self {
            headers: FactRow::COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(FactRow::display_cells).collect(),
        }
    }

    fn runs(runs: &[RunRecord]) -> Self {
        let headers = ["started", "file", "status", "staging rows", "fact rows", "error"];
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: runs
                .iter()
                .map(|r| {
                    vec![
                        r.started_at_utc()
                            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                            .unwrap_or_default(),
                        r.source_name.clone(),
                        format!("{:?}", r.status).to_lowercase(),
                        r.staging_rows.map(|v| v.to_string()).unwrap_or_default(),
                        r.fact_rows.map(|v| v.to_string()).unwrap_or_default(),
                        r.error.clone().unwrap_or_default(),
                    ]
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub max_upload_mib: usize,
    pub runs: TableView,
}

#[derive(Template)]
#[template(path = "result.html")]
pub struct ResultTemplate {
    pub run_id: String,
    pub source_name: String,
    pub batch_rows: usize,
    pub checksum: String,
    pub uploaded: TableView,
    pub previously_published: Option<String>,
    pub staging_rows: usize,
    pub published_rows: u64,
    pub duration: String,
    pub cleaning: TableView,
    pub preview_len: usize,
    pub preview: TableView,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}

pub fn index_page(recent: &[RunRecord], max_upload_bytes: usize) -> Result<String> {
    let template = IndexTemplate {
        max_upload_mib: max_upload_bytes / (1024 * 1024),
        runs: TableView::runs(recent),
    };
    Ok(template.render()?)
}

pub fn result_page(outcome: &PipelineOutcome) -> Result<String> {
    let report = &outcome.report;
    let mut steps: Vec<Vec<String>> = report
        .rejections()
        .iter()
        .map(|(reason, count)| vec![reason.replace('_', " "), count.to_string()])
        .collect();
    if !report.mirror_columns_dropped.is_empty() {
        steps.push(vec![
            "mirrored columns dropped".to_string(),
            report.mirror_columns_dropped.join(", "),
        ]);
    }

    let preview = outcome.preview();
    let template = ResultTemplate {
        run_id: outcome.run_id.to_string(),
        source_name: outcome.source_name.clone(),
        batch_rows: outcome.batch_rows,
        checksum: outcome.checksum.chars().take(12).collect(),
        uploaded: TableView::raw(&outcome.uploaded),
        previously_published: outcome
            .previously_published_at
            .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string()),
        staging_rows: outcome.staging_rows,
        published_rows: outcome.published_rows,
        duration: format!("{:.2}", outcome.duration_secs),
        cleaning: TableView {
            headers: vec!["step".to_string(), "removed".to_string()],
            rows: steps,
        },
        preview_len: preview.len(),
        preview: TableView::facts(preview),
    };
    Ok(template.render()?)
}

pub fn error_page(message: &str) -> Result<String> {
    let template = ErrorTemplate {
        message: message.to_string(),
    };
    Ok(template.render()?)
}
