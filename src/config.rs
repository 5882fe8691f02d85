use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "CAMPAIGN_PIPELINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pipeline.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
}

/// Connection settings for the cloud Postgres warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: u16,
    pub name: Option<String>,
    pub sslmode: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            password: None,
            host: None,
            port: 5432,
            name: None,
            sslmode: "require".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_root: PathBuf,
    pub preview_rows: usize,
    pub insert_chunk_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            preview_rows: 5,
            insert_chunk_rows: 500,
        }
    }
}

impl Config {
    /// Load `.env`, then the optional TOML file, then environment overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_or_default(Path::new(&path))?;
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment-style overrides; `lookup` abstracts the environment for tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(user) = non_empty("PG_USER") {
            self.database.user = Some(user);
        }
        if let Some(pass) = non_empty("PG_PASS") {
            self.database.password = Some(pass);
        }
        if let Some(host) = non_empty("PG_HOST") {
            self.database.host = Some(host);
        }
        if let Some(port) = non_empty("PG_PORT") {
            self.database.port = parse_port("PG_PORT", &port)?;
        }
        if let Some(db) = non_empty("PG_DB") {
            self.database.name = Some(db);
        }
        if let Some(mode) = non_empty("PG_SSLMODE") {
            self.database.sslmode = mode;
        }
        if let Some(port) = non_empty("PIPELINE_PORT") {
            self.server.port = parse_port("PIPELINE_PORT", &port)?;
        }
        if let Some(root) = non_empty("PIPELINE_DATA_ROOT") {
            self.pipeline.data_root = PathBuf::from(root);
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Postgres connection URL, preferring an explicit `url`.
    pub fn connection_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let user = required(&self.user, "PG_USER")?;
        let password = required(&self.password, "PG_PASS")?;
        let host = required(&self.host, "PG_HOST")?;
        let name = required(&self.name, "PG_DB")?;
        Ok(format!(
            "postgresql://{}:{}@{}:{}/{}?sslmode={}",
            user, password, host, self.port, name, self.sslmode
        ))
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| PipelineError::Config(format!("{key} is not set and no DATABASE_URL given")))
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse::<u16>()
        .map_err(|_| PipelineError::Config(format!("{key} must be a port number, got '{value}'")))
}
