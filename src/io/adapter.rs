//! Seams between the co-location core and per-mission product readers.
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::io::dataset::Dataset;
use crate::io::metadata::ProductMetadata;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed product document {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Can't recognize mission from product name: {name}")]
    UnknownMission { name: String },

    #[error("Can't extract acquisition times from {name}: {message}")]
    FilenameTime { name: String, message: String },

    #[error("Invalid time span for {source_ref}: start {start} is after stop {stop}")]
    InvalidTimeSpan {
        source_ref: String,
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },

    #[error("Empty footprint for {source_ref}")]
    EmptyFootprint { source_ref: String },

    #[error("Invalid footprint for {source_ref}: {message}")]
    InvalidFootprint { source_ref: String, message: String },

    #[error("Missing variable `{variable}` in {source_ref}")]
    MissingVariable {
        source_ref: String,
        variable: String,
    },

    #[error("Inconsistent dataset {source_ref}: {message}")]
    InconsistentDataset { source_ref: String, message: String },
}

/// Normalizes one product into `ProductMetadata`.
pub trait MetadataAdapter: Send + Sync {
    fn metadata(&self, source_ref: &str) -> Result<ProductMetadata, AdapterError>;
}

/// Loads the gridded content of a product for merging.
pub trait DatasetProvider: Send + Sync {
    fn dataset(&self, meta: &ProductMetadata) -> Result<Dataset, AdapterError>;
}
