pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod types;
