use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::{StationId, StationRecord};

#[derive(Debug, Error, Diagnostic)]
pub enum WetterfeeError {
    #[error("could not connect to archive {address}: {message}")]
    #[diagnostic(help("the archive only accepts anonymous FTP on port 21"))]
    Connection { address: String, message: String },

    #[error("remote path does not exist: {0}")]
    Path(String),

    #[error("remote file not found: {0}")]
    NotFound(String),

    #[error("no unique remote file for `{requested}` ({} candidates)", .candidates.len())]
    AmbiguousOrMissingFile {
        requested: String,
        candidates: Vec<String>,
    },

    #[error("no station matches `{0}`")]
    NoMatch(String),

    #[error("{} stations match `{query}`: {}", .candidates.len(), format_candidates(.candidates))]
    #[diagnostic(help("refine the query, or pass the numeric station id"))]
    AmbiguousMatch {
        query: String,
        candidates: Vec<StationRecord>,
    },

    #[error("archive container not found locally: {0}")]
    ContainerNotFound(PathBuf),

    #[error("no data file for station {0} in the remote directory")]
    StationFileNotFound(StationId),

    #[error("invalid station id: {0}")]
    InvalidStationId(String),

    #[error("invalid station query `{query}`: {message}")]
    InvalidQuery { query: String, message: String },

    #[error("no member matching `{pattern}` in {container}")]
    MemberNotFound { container: PathBuf, pattern: String },

    #[error("row {row}: cannot parse `{value}` in column {column} as a date")]
    DateParse {
        row: usize,
        column: String,
        value: String,
    },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("FTP error: {0}")]
    Ftp(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl WetterfeeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WetterfeeError::NotFound(_))
    }
}

fn format_candidates(candidates: &[StationRecord]) -> String {
    candidates
        .iter()
        .map(|record| format!("{} ({})", record.name, record.id.padded()))
        .collect::<Vec<_>>()
        .join(", ")
}
