//! Error types for Inbox Assist.

use std::path::PathBuf;

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Q&A error: {0}")]
    Qa(#[from] QaError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors shared by the file-backed stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Storage IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        }
    }

    /// Whether this is a missing-entity error rather than a storage failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Prompt/template errors.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template {name} not found")]
    NotFound { name: String },

    #[error("Template {name} has unresolved placeholder {{{{{placeholder}}}}}")]
    UnresolvedPlaceholder { name: String, placeholder: String },

    #[error("Invalid template name: {0:?}")]
    InvalidName(String),

    #[error("Template store error: {0}")]
    Store(#[from] StoreError),
}

/// Processing pipeline errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Data integrity violation for email {email_id}: {reason}")]
    DataIntegrity { email_id: String, reason: String },

    #[error("Failed to commit processed state: {0}")]
    Store(#[from] StoreError),
}

/// Question-answering errors.
///
/// `ask` turns these into guidance text; `answer` returns them as-is.
#[derive(Debug, thiserror::Error)]
pub enum QaError {
    #[error("No processed data for email {email_id}; process the inbox first")]
    NoProcessedData { email_id: String },

    #[error("This question needs an email to be selected")]
    NoEmailSelected,

    #[error("Email {email_id} is not in the inbox")]
    UnknownEmail { email_id: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;
