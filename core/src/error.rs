use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response returned by the API.
/// Every error carries enough information for the caller to understand
/// what went wrong and how to fix it.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (e.g. "validation_failed", "not_found")
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const RATE_LIMITED: &str = "rate_limited";
}

/// Engine-level error taxonomy. Every variant is local to one conversation
/// turn; none may leave a preference record violating its invariants.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Malformed user input (bad disambiguation reply, out-of-range
    /// selection). Surfaced to the user as a clarification prompt, never as
    /// a system failure.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No user, session, or pending context to act on.
    #[error("not found: {0}")]
    NotFound(String),

    /// Parser or matcher timed out or errored. Callers degrade to
    /// "no fields extracted" / "no match" and keep the conversation going.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Store read/write failure after retries were exhausted.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A step transition outside the allowed table. A programming or
    /// configuration defect, not a user error.
    #[error("invalid step transition: {from} -> {to}")]
    StateTransition { from: String, to: String },
}
