//! Cleaning of the staged campaign table.

use crate::constants::{
    COL_DATE, COL_ID, COL_IMPRESSIONS, MIRROR_SUFFIX, NUMERIC_COLUMNS, REQUIRED_COLUMNS,
};
use crate::types::Table;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// What the cleaning pass removed, step by step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub mirror_columns_dropped: Vec<String>,
    pub duplicate_rows: usize,
    pub missing_required: usize,
    pub non_positive_impressions: usize,
    pub invalid_numeric: usize,
    pub invalid_dates: usize,
    pub superseded_ids: usize,
    pub output_rows: usize,
}

impl CleaningReport {
    pub fn rejected_rows(&self) -> usize {
        self.duplicate_rows
            + self.missing_required
            + self.non_positive_impressions
            + self.invalid_numeric
            + self.invalid_dates
            + self.superseded_ids
    }

    /// `(reason, count)` pairs for metrics and display.
    pub fn rejections(&self) -> [(&'static str, usize); 6] {
        [
            ("duplicate_row", self.duplicate_rows),
            ("missing_required", self.missing_required),
            ("non_positive_impressions", self.non_positive_impressions),
            ("invalid_numeric", self.invalid_numeric),
            ("invalid_date", self.invalid_dates),
            ("superseded_id", self.superseded_ids),
        ]
    }
}

/// Parse a numeric cell, tolerating thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a date cell in any of the accepted formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

pub fn clean(mut table: Table) -> (Table, CleaningReport) {
    let mut report = CleaningReport {
        input_rows: table.len(),
        ..Default::default()
    };

    // 1. columns mangled as "<base>.1" that mirror their base column
    let mirrors = mirror_columns(&table);
    if !mirrors.is_empty() {
        debug!("Dropping mirrored columns: {:?}", mirrors);
        table.drop_columns(&mirrors);
    }
    report.mirror_columns_dropped = mirrors;

    // 2. exact duplicate rows
    let before = table.len();
    let mut seen: HashSet<Vec<Option<String>>> = HashSet::with_capacity(before);
    table.rows.retain(|row| seen.insert(row.clone()));
    report.duplicate_rows = before - table.len();

    // 3. missing business-critical fields
    let required: Vec<usize> = REQUIRED_COLUMNS
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    report.missing_required = retain_counting(&mut table, |row| {
        required.iter().all(|i| row[*i].is_some())
    });

    // 4. impressions must be > 0
    if let Some(idx) = table.column_index(COL_IMPRESSIONS) {
        report.non_positive_impressions = retain_counting(&mut table, |row| {
            number_at(row, idx).map_or(false, |v| v > 0.0)
        });
    }

    // 5. numeric columns must be >= 0; missing values fail the comparison
    let numeric: Vec<usize> = NUMERIC_COLUMNS
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    report.invalid_numeric = retain_counting(&mut table, |row| {
        numeric
            .iter()
            .all(|i| number_at(row, *i).map_or(false, |v| v >= 0.0))
    });

    // 6. normalize dates to YYYY-MM-DD
    if let Some(idx) = table.column_index(COL_DATE) {
        let before = table.len();
        table.rows = std::mem::take(&mut table.rows)
            .into_iter()
            .filter_map(|mut row| {
                let date = row[idx].as_deref().and_then(parse_date)?;
                row[idx] = Some(date.format("%Y-%m-%d").to_string());
                Some(row)
            })
            .collect();
        report.invalid_dates = before - table.len();
    }

    // 7. one row per id, latest date wins
    if let Some(id_idx) = table.column_index(COL_ID) {
        let before = table.len();
        dedupe_latest_by_id(&mut table, id_idx);
        report.superseded_ids = before - table.len();
    }

    report.output_rows = table.len();
    debug!(
        "Cleaning kept {} of {} rows ({} rejected)",
        report.output_rows,
        report.input_rows,
        report.rejected_rows()
    );
    (table, report)
}

fn mirror_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(idx, col)| {
            let base = col.strip_suffix(MIRROR_SUFFIX)?;
            let base_idx = table.column_index(base)?;
            let identical = table.rows.iter().all(|row| row[base_idx] == row[idx]);
            identical.then(|| col.clone())
        })
        .collect()
}

fn number_at(row: &[Option<String>], idx: usize) -> Option<f64> {
    row[idx].as_deref().and_then(parse_number)
}

fn retain_counting<F>(table: &mut Table, mut keep: F) -> usize
where
    F: FnMut(&[Option<String>]) -> bool,
{
    let before = table.len();
    table.rows.retain(|row| keep(row));
    before - table.len()
}

fn dedupe_latest_by_id(table: &mut Table, id_idx: usize) {
    let date_idx = table.column_index(COL_DATE);
    let sort_key = |row: &Vec<Option<String>>| {
        date_idx.and_then(|i| row[i].as_deref().and_then(parse_date))
    };
    // stable: rows sharing a date keep input order, so the later one wins
    table.rows.sort_by_key(|row| sort_key(row));

    let mut last_for_id: HashMap<Option<String>, usize> = HashMap::new();
    for (pos, row) in table.rows.iter().enumerate() {
        last_for_id.insert(row[id_idx].clone(), pos);
    }
    let rows = std::mem::take(&mut table.rows);
    table.rows = rows
        .into_iter()
        .enumerate()
        .filter(|(pos, row)| last_for_id.get(&row[id_idx]) == Some(pos))
        .map(|(_, row)| row)
        .collect();
}
