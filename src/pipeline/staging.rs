use crate::constants::STAGING_TABLE;
use crate::error::{PipelineError, Result};
use crate::types::Table;

/// Keep only the upload columns that exist in the staging schema, in upload order.
pub fn align_to_schema(batch: &Table, staging_columns: &[String]) -> Result<Table> {
    if staging_columns.is_empty() {
        return Err(PipelineError::Config(format!(
            "staging table {STAGING_TABLE} has no columns; run the `migrate` command first"
        )));
    }
    let keep: Vec<String> = batch
        .columns
        .iter()
        .filter(|c| staging_columns.contains(c))
        .cloned()
        .collect();
    if keep.is_empty() {
        return Err(PipelineError::MissingColumns(staging_columns.to_vec()));
    }
    Ok(batch.select(&keep))
}
