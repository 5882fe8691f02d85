use super::{clean_cell, normalize_headers};
use crate::error::Result;
use crate::types::Table;
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Parse CSV bytes. The first record is the header; short rows are padded with
/// missing cells and long rows truncated to the header width.
pub fn read_csv(bytes: &[u8]) -> Result<Table> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut table = Table::new(normalize_headers(headers));
    let width = table.columns.len();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let mut row: Vec<Option<String>> = record.iter().take(width).map(clean_cell).collect();
        row.resize(width, None);
        table.rows.push(row);
    }

    debug!("Parsed CSV with {} columns and {} rows", width, table.len());
    Ok(table)
}
