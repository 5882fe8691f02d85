use crate::error::{PipelineError, Result};
use crate::types::FactRow;

/// Serialize the processed snapshot as CSV with a header row.
pub fn write_facts_csv(rows: &[FactRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(FactRow::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| PipelineError::Api {
        message: format!("Failed to finish CSV export: {e}"),
    })
}
