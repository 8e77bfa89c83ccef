//! Result writers: the co-location listing and merged products, plus the
//! default naming of both.
use thiserror::Error;

use crate::types::Mission;

pub mod listing;
pub mod product;

pub use listing::ListingWriter;
pub use product::write_merged_dataset;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize merged dataset {path}: {source}")]
    Serialize {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl WriterError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        WriterError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// `listing_coloc_<M1>_<M2>_<delta>.txt`; every SAR mission renders as `SAR`.
pub fn listing_filename(primary: Mission, secondary: Mission, delta_minutes: i64) -> String {
    format!(
        "listing_coloc_{}_{}_{}.txt",
        primary.listing_name(),
        secondary.listing_name(),
        delta_minutes
    )
}
