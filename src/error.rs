use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HuntOddsError>;

#[derive(Error, Debug)]
pub enum HuntOddsError {
    /// Input artifact (raw report, snapshot or config) does not exist.
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// A canonical column is absent after renaming.
    #[error("missing required column '{column}'")]
    SchemaMismatch { column: String },

    #[error("header row {index} is outside the report ({rows} rows)")]
    HeaderRowOutOfRange { index: usize, rows: usize },

    #[error("row {row}: column '{column}' holds '{value}', expected a non-negative integer")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("hunt code {code} not found")]
    CodeNotFound { code: String },

    #[error("cannot divide by zero (rTot value is 0)")]
    DivisionGuard,

    #[error("workbook error: {0}")]
    Workbook(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HuntOddsError {
    /// Maps a `NotFound` I/O failure on `path` to [`HuntOddsError::FileNotFound`].
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path: path.into() }
        } else {
            Self::Io(err)
        }
    }
}
