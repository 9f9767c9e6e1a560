use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum HighwayError {
    /// Top-level text was blank or punctuation only.
    EmptyInput,
    /// A snapshot could not be restored into consistent tables.
    CorruptTables(String),
    /// A calibration, vector or frequency asset could not be parsed.
    InvalidAsset(String),
    /// No segmenter backend goes by this name.
    UnknownSegmenter(String),
}

impl fmt::Display for HighwayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HighwayError::EmptyInput => write!(f, "input has no registrable text"),
            HighwayError::CorruptTables(msg) => write!(f, "corrupt tables: {msg}"),
            HighwayError::InvalidAsset(msg) => write!(f, "invalid asset: {msg}"),
            HighwayError::UnknownSegmenter(name) => {
                write!(f, "unknown segmenter '{name}' (expected simple, char or jieba)")
            }
        }
    }
}

impl std::error::Error for HighwayError {}

pub type Result<T> = std::result::Result<T, HighwayError>;
