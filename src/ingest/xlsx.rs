use super::{clean_cell, normalize_headers};
use crate::error::{PipelineError, Result};
use crate::types::Table;
use calamine::{Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use std::io::Cursor;
use tracing::debug;

/// Parse the first worksheet of an XLSX workbook held in memory.
pub fn read_xlsx(bytes: &[u8]) -> Result<Table> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes.to_vec()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(PipelineError::EmptyWorkbook)??;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(|c| cell_to_string(c).unwrap_or_default()).collect(),
        None => Vec::new(),
    };
    let mut table = Table::new(normalize_headers(headers));
    let width = table.columns.len();

    for row in rows {
        let mut cells: Vec<Option<String>> = row.iter().take(width).map(cell_to_string).collect();
        if cells.iter().all(Option::is_none) {
            continue;
        }
        cells.resize(width, None);
        table.rows.push(cells);
    }

    debug!("Parsed worksheet with {} columns and {} rows", width, table.len());
    Ok(table)
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => clean_cell(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(excel_serial_to_string(dt.as_f64())),
    }
}

fn format_float(f: f64) -> String {
    // Whole numbers are written without a fraction so "12.0" stages as "12"
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Convert an Excel 1900-system serial into `YYYY-MM-DD`, or
/// `YYYY-MM-DD HH:MM:SS` when the serial carries a time of day.
pub fn excel_serial_to_string(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return serial.to_string();
    };
    let total_secs = (serial * 86_400.0).round() as i64;
    let dt = epoch + Duration::seconds(total_secs);
    if total_secs % 86_400 == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_dates_convert() {
        assert_eq!(excel_serial_to_string(45292.0), "2024-01-01");
        assert_eq!(excel_serial_to_string(45292.5), "2024-01-01 12:00:00");
        assert_eq!(excel_serial_to_string(1.0), "1899-12-31");
    }

    #[test]
    fn cells_render_as_staging_text() {
        assert_eq!(cell_to_string(&Data::Float(12.0)), Some("12".into()));
        assert_eq!(cell_to_string(&Data::Float(12.25)), Some("12.25".into()));
        assert_eq!(cell_to_string(&Data::Int(7)), Some("7".into()));
        assert_eq!(cell_to_string(&Data::String("  ".into())), None);
        assert_eq!(cell_to_string(&Data::Bool(true)), Some("true".into()));
        assert_eq!(cell_to_string(&Data::Empty), None);
    }

    #[test]
    fn garbage_bytes_are_a_spreadsheet_error() {
        let err = read_xlsx(b"definitely not a zip archive").unwrap_err();
        assert!(matches!(err, PipelineError::Spreadsheet(_)));
    }
}
