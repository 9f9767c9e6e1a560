use std::fmt;

use highway_core::HighwayError;

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    InvalidData(String),
    Io(std::io::Error),
    Config(String),
    Core(HighwayError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Config(msg) => write!(f, "config error: {msg}"),
            StoreError::Core(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Sqlite(e) => Some(e),
            StoreError::Io(e) => Some(e),
            StoreError::Core(e) => Some(e),
            StoreError::InvalidData(_) | StoreError::Config(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<HighwayError> for StoreError {
    fn from(e: HighwayError) -> Self {
        StoreError::Core(e)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
