use crate::constants::DEFAULT_STAGING_COLUMNS;
use crate::error::Result;
use crate::types::{FactRow, Table};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Warehouse holding the raw staging table and the published fact snapshot.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Column names of the staging table, in table order.
    async fn staging_columns(&self) -> Result<Vec<String>>;

    /// Replace the staging contents with `batch` and read the staged rows back,
    /// limited to the columns the batch carried.
    async fn replace_staging(&self, batch: &Table) -> Result<Table>;

    /// Atomically replace the fact snapshot; returns the number of rows written.
    async fn replace_facts(&self, rows: &[FactRow]) -> Result<u64>;

    async fn fact_count(&self) -> Result<u64>;
}

/// In-memory warehouse for development, dry runs and tests
pub struct InMemoryWarehouse {
    staging_columns: Vec<String>,
    staging: Arc<Mutex<Table>>,
    facts: Arc<Mutex<Vec<FactRow>>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::with_staging_columns(DEFAULT_STAGING_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    pub fn with_staging_columns(columns: Vec<String>) -> Self {
        Self {
            staging: Arc::new(Mutex::new(Table::new(columns.clone()))),
            staging_columns: columns,
            facts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn staging_snapshot(&self) -> Table {
        self.staging.lock().unwrap().clone()
    }

    pub fn facts_snapshot(&self) -> Vec<FactRow> {
        self.facts.lock().unwrap().clone()
    }
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn staging_columns(&self) -> Result<Vec<String>> {
        Ok(self.staging_columns.clone())
    }

    async fn replace_staging(&self, batch: &Table) -> Result<Table> {
        // Columns missing from the batch are stored as NULL, like the SQL insert
        let mut staged = Table::new(self.staging_columns.clone());
        for row in 0..batch.len() {
            staged.rows.push(
                self.staging_columns
                    .iter()
                    .map(|c| batch.value(row, c).map(str::to_string))
                    .collect(),
            );
        }

        let mut staging = self.staging.lock().unwrap();
        *staging = staged;
        debug!("Replaced in-memory staging with {} rows", staging.len());
        Ok(staging.select(&batch.columns))
    }

    async fn replace_facts(&self, rows: &[FactRow]) -> Result<u64> {
        let mut facts = self.facts.lock().unwrap();
        *facts = rows.to_vec();
        debug!("Replaced in-memory fact snapshot with {} rows", facts.len());
        Ok(facts.len() as u64)
    }

    async fn fact_count(&self) -> Result<u64> {
        Ok(self.facts.lock().unwrap().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staging_fills_absent_columns_with_nulls() {
        let wh = InMemoryWarehouse::with_staging_columns(vec!["id".into(), "clicks".into()]);
        let batch = Table::from_rows(&["clicks"], &[&["4"]]);
        let staged = wh.replace_staging(&batch).await.unwrap();
        assert_eq!(staged.columns, vec!["clicks"]);

        let stored = wh.staging_snapshot();
        assert_eq!(stored.columns, vec!["id", "clicks"]);
        assert_eq!(stored.rows[0], vec![None, Some("4".into())]);
    }

    #[tokio::test]
    async fn staging_is_replaced_not_appended() {
        let wh = InMemoryWarehouse::new();
        let batch = Table::from_rows(&["id"], &[&["1"], &["2"]]);
        wh.replace_staging(&batch).await.unwrap();
        let staged = wh.replace_staging(&batch.head(1)).await.unwrap();
        assert_eq!(staged.len(), 1);
    }

    #[tokio::test]
    async fn facts_snapshot_is_replaced() {
        let wh = InMemoryWarehouse::new();
        wh.replace_facts(&[FactRow::default(), FactRow::default()]).await.unwrap();
        assert_eq!(wh.fact_count().await.unwrap(), 2);
        wh.replace_facts(&[FactRow::default()]).await.unwrap();
        assert_eq!(wh.fact_count().await.unwrap(), 1);
    }
}
