use anyhow::Context;
use campaign_pipeline::config::Config;
use campaign_pipeline::db::PostgresWarehouse;
use campaign_pipeline::ingest::Upload;
use campaign_pipeline::ledger::RunLedger;
use campaign_pipeline::logging;
use campaign_pipeline::metrics as pipeline_metrics;
use campaign_pipeline::pipeline::Pipeline;
use campaign_pipeline::server::{self, AppState};
use campaign_pipeline::storage::{InMemoryWarehouse, Warehouse};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "campaign_pipeline")]
#[command(about = "Marketing campaign cleaning and KPI pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the upload form
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the pipeline once for a local CSV/XLSX file
    Run {
        /// Spreadsheet to process
        #[arg(long)]
        file: PathBuf,
        /// Also write the processed snapshot to this CSV file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Use an in-memory warehouse instead of Postgres
        #[arg(long)]
        dry_run: bool,
    },
    /// Create the staging and fact tables if they are missing
    Migrate,
    /// Show recent pipeline runs from the local ledger
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

async fn connect_warehouse(config: &Config) -> anyhow::Result<Arc<dyn Warehouse>> {
    let warehouse = PostgresWarehouse::connect(&config.database, config.pipeline.insert_chunk_rows)
        .await
        .context("failed to connect to the Postgres warehouse")?;
    Ok(Arc::new(warehouse))
}

fn open_ledger(config: &Config) -> Option<Arc<RunLedger>> {
    match RunLedger::open_at_root(&config.pipeline.data_root) {
        Ok(ledger) => Some(Arc::new(ledger)),
        Err(e) => {
            warn!("Run ledger unavailable, history will not be recorded: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load()?;
    logging::init_logging(config.pipeline.data_root.join("logs"));

    match cli.command {
        Commands::Serve { port } => {
            let handle = match pipeline_metrics::install_recorder() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Prometheus recorder not installed: {}", e);
                    None
                }
            };
            let warehouse = connect_warehouse(&config).await?;
            let pipeline = Arc::new(Pipeline::new(
                warehouse,
                open_ledger(&config),
                config.pipeline.clone(),
            ));
            let state = Arc::new(AppState::new(pipeline, handle, config.server.max_upload_bytes));
            let port = port.unwrap_or(config.server.port);
            server::start_server(state, &config.server.host, port).await?;
        }
        Commands::Run {
            file,
            output,
            dry_run,
        } => {
            let warehouse: Arc<dyn Warehouse> = if dry_run {
                info!("Dry run: using in-memory warehouse");
                Arc::new(InMemoryWarehouse::new())
            } else {
                connect_warehouse(&config).await?
            };
            let pipeline = Pipeline::new(warehouse, open_ledger(&config), config.pipeline.clone());
            let upload = Upload::from_path(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let outcome = match pipeline.run(upload).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Pipeline run failed: {}", e);
                    return Err(e.into());
                }
            };

            println!("\n📊 Pipeline results for {}:", outcome.source_name);
            println!("   Rows uploaded:  {}", outcome.batch_rows);
            println!("   Rows in staging: {}", outcome.staging_rows);
            println!("   Rows rejected:  {}", outcome.report.rejected_rows());
            println!("   Rows published: {}", outcome.published_rows);
            for row in outcome.preview() {
                println!("   {}", row.display_cells().join(" | "));
            }

            if let Some(path) = output {
                std::fs::write(&path, outcome.to_csv()?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("💾 Saved processed output to {}", path.display());
            }
        }
        Commands::Migrate => {
            let warehouse =
                PostgresWarehouse::connect(&config.database, config.pipeline.insert_chunk_rows).await?;
            warehouse.run_migrations().await?;
            println!("✅ Tables are in place");
        }
        Commands::History { limit } => {
            let ledger = RunLedger::open_at_root(&config.pipeline.data_root)?;
            let runs = ledger.recent(limit)?;
            if runs.is_empty() {
                println!("No runs recorded yet.");
            }
            for run in runs {
                let started = run
                    .started_at_utc()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {:<10} {:<30} facts={} {}",
                    started,
                    format!("{:?}", run.status).to_lowercase(),
                    run.source_name,
                    run.fact_rows.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    run.error.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}
