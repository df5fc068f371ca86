//! Error types for survey operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Session cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Could not encode session value for {key}: {reason}")]
    Encode { key: String, reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Conflicting menu keys: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Recoverable interview errors. The state machine turns each of these into
/// a response instead of failing the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterviewError {
    #[error("Invalid selection: {input:?}")]
    InvalidSelection { input: String },

    #[error("Invalid answer for question {question_id}: {reason}")]
    InvalidAnswer { question_id: Uuid, reason: String },

    #[error("No data: {reason}")]
    NoData { reason: String },

    #[error("Inconsistent state: {entity_type:?} {id} no longer exists")]
    InconsistentState { entity_type: EntityType, id: Uuid },
}

/// Master error type for all survey errors.
#[derive(Debug, Clone, Error)]
pub enum SurveyError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Interview error: {0}")]
    Interview(#[from] InterviewError),
}

impl SurveyError {
    /// Whether the error comes from a backing store rather than the caller.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, SurveyError::Storage(_) | SurveyError::Session(_))
    }
}

/// Result type alias for survey operations.
pub type SurveyResult<T> = Result<T, SurveyError>;

// =============================================================================
// TESTS
// =============================================================================
