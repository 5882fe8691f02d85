use crate::config::DatabaseConfig;
use crate::constants::{FACT_TABLE, STAGING_ORDINAL, STAGING_TABLE};
use crate::error::Result;
use crate::storage::Warehouse;
use crate::types::{FactRow, Table};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::{debug, info};

const MIGRATION_SQL: &str = include_str!("../migrations/001_campaign_tables.sql");

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Warehouse backed by a (cloud-hosted) Postgres database
pub struct PostgresWarehouse {
    pool: PgPool,
    chunk_rows: usize,
}

impl PostgresWarehouse {
    /// Open a connection pool using the configured credentials
    pub async fn connect(config: &DatabaseConfig, chunk_rows: usize) -> Result<Self> {
        let url = config.connection_url()?;
        info!(
            host = config.host.as_deref().unwrap_or("DATABASE_URL"),
            database = config.name.as_deref().unwrap_or("-"),
            "Connecting to Postgres warehouse"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&url)
            .await?;

        Ok(Self::from_pool(pool, chunk_rows))
    }

    pub fn from_pool(pool: PgPool, chunk_rows: usize) -> Self {
        Self {
            pool,
            chunk_rows: chunk_rows.max(1),
        }
    }

    /// Create the staging and fact tables when they do not exist yet
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::raw_sql(MIGRATION_SQL).execute(&self.pool).await?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    fn rows_per_statement(&self, columns: usize) -> usize {
        self.chunk_rows.min(MAX_BIND_PARAMS / columns.max(1)).max(1)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Read back the staged columns in upload order.
fn staging_select_sql(columns: &[&String]) -> String {
    let select_list = columns
        .iter()
        .map(|c| {
            let q = quote_ident(c);
            format!("{q}::text AS {q}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {select_list} FROM {STAGING_TABLE} ORDER BY {STAGING_ORDINAL}")
}

fn parse_iso_date(value: &Option<String>) -> Option<NaiveDate> {
    value
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn staging_columns(&self) -> Result<Vec<String>> {
        let columns: Vec<String> = sqlx::query_scalar(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_name = $1 AND column_name <> $2 ORDER BY ordinal_position",
        )
        .bind(STAGING_TABLE)
        .bind(STAGING_ORDINAL)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }

    async fn replace_staging(&self, batch: &Table) -> Result<Table> {
        let columns = self.staging_columns().await?;
        let insert: Vec<(usize, &String)> = batch
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| columns.contains(c))
            .collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {STAGING_TABLE}"))
            .execute(&mut *tx)
            .await?;

        if !insert.is_empty() && !batch.is_empty() {
            let column_list = insert
                .iter()
                .map(|(_, c)| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            let chunk_rows = self.rows_per_statement(insert.len() + 1);
            for (chunk_no, chunk) in batch.rows.chunks(chunk_rows).enumerate() {
                let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                    "INSERT INTO {STAGING_TABLE} ({STAGING_ORDINAL}, {column_list}) "
                ));
                qb.push_values(chunk.iter().enumerate(), |mut b, (offset, row)| {
                    b.push_bind((chunk_no * chunk_rows + offset) as i64);
                    for (idx, _) in &insert {
                        b.push_bind(row.get(*idx).cloned().flatten());
                    }
                });
                qb.build().execute(&mut *tx).await?;
            }
        }

        // Read back only what this batch staged; the other columns are NULL
        let staged_columns: Vec<&String> = insert.iter().map(|(_, c)| *c).collect();
        let rows = sqlx::query(&staging_select_sql(&staged_columns))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;

        let mut staged = Table::new(staged_columns.iter().map(|c| (*c).clone()).collect());
        for row in rows {
            let mut cells = Vec::with_capacity(staged.columns.len());
            for idx in 0..staged.columns.len() {
                cells.push(row.try_get::<Option<String>, _>(idx)?);
            }
            staged.rows.push(cells);
        }
        debug!("Staging table now holds {} rows", staged.len());
        Ok(staged)
    }

    async fn replace_facts(&self, rows: &[FactRow]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("TRUNCATE TABLE {FACT_TABLE}"))
            .execute(&mut *tx)
            .await?;

        let column_list = FactRow::COLUMNS.join(", ");
        let mut written = 0u64;
        for chunk in rows.chunks(self.rows_per_statement(FactRow::COLUMNS.len())) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {FACT_TABLE} ({column_list}) "));
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.id.clone())
                    .push_bind(parse_iso_date(&r.c_date))
                    .push_bind(r.campaign_name.clone())
                    .push_bind(r.category.clone())
                    .push_bind(r.campaign_id.clone())
                    .push_bind(r.impressions)
                    .push_bind(r.mark_spent)
                    .push_bind(r.clicks)
                    .push_bind(r.leads)
                    .push_bind(r.orders)
                    .push_bind(r.revenue)
                    .push_bind(r.ctr_pct)
                    .push_bind(r.cpc)
                    .push_bind(r.cpa)
                    .push_bind(r.conversionrate_pct)
                    .push_bind(r.roas)
                    .push_bind(r.profit)
                    .push_bind(r.leadrate_pct)
                    .push_bind(r.year)
                    .push_bind(r.month.map(|m| m as i32))
                    .push_bind(r.weekday.clone())
                    .push_bind(r.is_weekend);
            });
            written += qb.build().execute(&mut *tx).await?.rows_affected();
        }
        tx.commit().await?;

        info!("Published {} rows to {}", written, FACT_TABLE);
        Ok(written)
    }

    async fn fact_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {FACT_TABLE}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}
