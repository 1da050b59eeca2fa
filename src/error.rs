use thiserror::Error;

#[derive(Error, Debug)]
pub enum CashmopError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unable to read spreadsheet: {0}")]
    Excel(String),

    #[error("Unsupported file type: {0}. Please use a .csv, .xlsx, or .xls file.")]
    UnsupportedFile(String),

    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("Mapping '{0}' not found as a file or saved mapping name")]
    UnknownMapping(String),

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid backup: {0}")]
    InvalidBackup(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CashmopError>;
