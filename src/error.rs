use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet parsing failed: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Run ledger error: {0}")]
    Ledger(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Page rendering failed: {0}")]
    Render(#[from] askama::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported file format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Workbook contains no worksheet")]
    EmptyWorkbook,

    #[error("Upload shares no columns with the staging table (expected any of: {})", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("API error: {message}")]
    Api { message: String },
}

impl PipelineError {
    /// Short label used as the `stage` metric label for failed runs.
    pub fn stage_label(&self) -> &'static str {
        match self {
            PipelineError::Io(_)
            | PipelineError::Csv(_)
            | PipelineError::Spreadsheet(_)
            | PipelineError::UnsupportedFormat(_)
            | PipelineError::EmptyUpload
            | PipelineError::EmptyWorkbook => "ingest",
            PipelineError::MissingColumns(_) => "align",
            PipelineError::Database(_) => "warehouse",
            PipelineError::Ledger(_) => "ledger",
            PipelineError::Toml(_) | PipelineError::Config(_) => "config",
            PipelineError::Render(_) | PipelineError::Api { .. } => "internal",
        }
    }

    /// Whether the failure was caused by the uploaded file rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Csv(_)
                | PipelineError::Spreadsheet(_)
                | PipelineError::UnsupportedFormat(_)
                | PipelineError::EmptyUpload
                | PipelineError::EmptyWorkbook
                | PipelineError::MissingColumns(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
