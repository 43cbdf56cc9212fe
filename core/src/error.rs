use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Page fetch failed for rows [{start}, {end}) after {attempts} attempts: {reason}")]
    PageFetchFailure {
        start: usize,
        end: usize,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid range query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Region '{name}' not configured")]
    UnknownRegion { name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type RegionResult<T> = Result<T, RegionError>;
