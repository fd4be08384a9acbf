//! Error types for the travel planner backend

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, TravelPlannerError>;

#[derive(Error, Debug)]
pub enum TravelPlannerError {

    // =============================
    // Domain Errors
    // =============================

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Chat model unavailable: {0}")]
    LlmUnavailable(String),

    #[error("Chat model returned no content")]
    LlmEmptyResponse,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
