use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid minimal area: {value}. Expected a number followed by km2 or m2")]
    InvalidMinimalArea { value: String },

    #[error("Workers must be greater than 0, got: {workers}")]
    ZeroWorkers { workers: usize },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Configuration error: {0}")]
    Config(#[from] satcoloc::io::ConfigError),

    #[error(transparent)]
    Coloc(#[from] satcoloc::Error),
}
