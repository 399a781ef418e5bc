use std::path::PathBuf;

/// Errors surfaced by the forecasting library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("required input missing: {}", .0.display())]
    MissingInput(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;
