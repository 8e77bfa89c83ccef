//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts adapter, configuration, finder, pair-table and writer errors, and provides semantic
//! variants for argument validation and processing failures.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata adapter error: {0}")]
    Adapter(#[from] crate::io::AdapterError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::io::ConfigError),

    #[error("Candidate finder error: {0}")]
    Finder(#[from] crate::io::FinderError),

    #[error("Pair table error: {0}")]
    Table(#[from] crate::io::TableError),

    #[error("Writer error: {0}")]
    Writer(#[from] crate::io::WriterError),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("External error: {0}")]
    External(String),
}

impl Error {
    pub fn external<E: std::fmt::Display>(e: E) -> Self {
        Error::External(e.to_string())
    }
}
