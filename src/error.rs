use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the pipeline.
///
/// Lookup misses against the registry are not represented here: every lookup
/// returns an `Option` and the caller applies its documented default.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source fetch failed: {0}")]
    SourceFetch(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Write to table '{table}' failed: {message}")]
    SinkWrite { table: String, message: String },

    #[error("Transformation failed in stage '{stage}': {source}")]
    Transform {
        stage: &'static str,
        #[source]
        source: Box<EtlError>,
    },

    #[error("Ledger '{path}' could not be loaded: {message}")]
    Ledger { path: PathBuf, message: String },

    #[error("Reference table '{path}' unavailable: {message}")]
    ReferenceTable { path: PathBuf, message: String },
}

impl EtlError {
    pub fn schema(message: impl Into<String>) -> Self {
        EtlError::SchemaMismatch(message.into())
    }

    pub fn sink(table: &str, message: impl std::fmt::Display) -> Self {
        EtlError::SinkWrite {
            table: table.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
