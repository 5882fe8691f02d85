//! Upload parsing: turns CSV or XLSX bytes into a raw string [`Table`].

mod csv_reader;
mod xlsx;

use crate::error::{PipelineError, Result};
use crate::types::Table;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

pub use csv_reader::read_csv;
pub use xlsx::{excel_serial_to_string, read_xlsx};

/// A file handed to the pipeline, from the web form or the CLI.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { file_name, bytes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    pub fn detect(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" | "xlsm" => Ok(SourceFormat::Xlsx),
            _ => Err(PipelineError::UnsupportedFormat(file_name.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Xlsx => "xlsx",
        }
    }
}

/// Parse an upload into a raw table.
pub fn load(upload: &Upload) -> Result<(SourceFormat, Table)> {
    let format = SourceFormat::detect(&upload.file_name)?;
    if upload.bytes.is_empty() {
        return Err(PipelineError::EmptyUpload);
    }
    let table = match format {
        SourceFormat::Csv => read_csv(&upload.bytes)?,
        SourceFormat::Xlsx => read_xlsx(&upload.bytes)?,
    };
    Ok((format, table))
}

/// Lowercase hex SHA-256 of the uploaded bytes.
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Trim header names, name blank ones `Unnamed: {i}` and mangle repeats as
/// `x`, `x.1`, `x.2`, ...
pub(crate) fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());
    for (i, header) in raw.into_iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {i}")
        } else {
            trimmed.to_string()
        };
        let mut name = base.clone();
        if let Some(mut n) = seen.get(&base).copied() {
            loop {
                n += 1;
                let candidate = format!("{base}.{n}");
                if !seen.contains_key(&candidate) {
                    name = candidate;
                    break;
                }
            }
            seen.insert(base, n);
        }
        seen.entry(name.clone()).or_insert(0);
        out.push(name);
    }
    out
}

pub(crate) fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_formats_by_extension() {
        assert_eq!(SourceFormat::detect("batch.CSV").unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::detect("export.xlsx").unwrap(), SourceFormat::Xlsx);
        assert!(matches!(
            SourceFormat::detect("notes.txt"),
            Err(PipelineError::UnsupportedFormat(_))
        ));
        assert!(SourceFormat::detect("no_extension").is_err());
    }

    #[test]
    fn empty_upload_is_rejected() {
        let upload = Upload::new("batch.csv", Vec::new());
        assert!(matches!(load(&upload), Err(PipelineError::EmptyUpload)));
    }

    #[test]
    fn duplicate_headers_are_mangled() {
        let headers = normalize_headers(vec![
            " clicks ".into(),
            "clicks".into(),
            "".into(),
            "clicks".into(),
        ]);
        assert_eq!(headers, vec!["clicks", "clicks.1", "Unnamed: 2", "clicks.2"]);
    }

    #[test]
    fn mangling_skips_names_already_taken() {
        let headers = normalize_headers(vec!["a".into(), "a.1".into(), "a".into()]);
        assert_eq!(headers, vec!["a", "a.1", "a.2"]);
    }

    #[test]
    fn checksum_is_stable_hex() {
        let sum = checksum(b"abc");
        assert_eq!(
            sum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
