use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("Talent metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("Failed to resolve talent '{name}': {reason}")]
    ResolutionFailed { name: String, reason: String },

    #[error("Specialization not found in talent metadata: {0}")]
    SpecializationNotFound(String),

    #[error("Talent tree for {spec} was rejected at load: {reason}")]
    MalformedTree { spec: String, reason: String },

    #[error("Unable to determine hero tree for {spec}: {reason}")]
    AmbiguousHeroSpec { spec: String, reason: String },

    #[error("Invalid talent token: {0:?}")]
    InvalidTalentToken(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl HashError {
    pub fn resolution(name: impl Into<String>, reason: impl Into<String>) -> Self {
        HashError::ResolutionFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HashError>;
