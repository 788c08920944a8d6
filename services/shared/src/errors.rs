/// Shared error types for the snail racing services
///
/// Design:
/// - Standardized error codes so the chat command layer can react to engine
///   failures without matching on message text
/// - Categorized by error domain (Validation, NotFound, Unauthorized, Network, Internal)
/// - Includes context fields for debugging (code, message, context)
///
/// Usage:
/// - The engine's own error enum converts into ServiceError at the API edge
/// - Error codes follow pattern: <CATEGORY>_<SPECIFIC>_<DETAIL>
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error categories that decide how a failure is reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Caller supplied an invalid request (bad wager, wrong phase, duplicate join)
    Validation,

    /// Storage or wallet backend is unavailable
    Network,

    /// Unexpected failures, serialization problems, programming errors
    Internal,

    /// Race or snail not found
    NotFound,

    /// Caller acted on something it does not own
    Unauthorized,
}

/// Standard error codes used across all services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    // Validation errors
    pub const VALIDATION_WAGER_ARITY: ErrorCode = ErrorCode("VALIDATION_WAGER_ARITY");
    pub const VALIDATION_INVALID_ENTRANT: ErrorCode = ErrorCode("VALIDATION_INVALID_ENTRANT");
    pub const VALIDATION_INVALID_STAKE: ErrorCode = ErrorCode("VALIDATION_INVALID_STAKE");
    pub const VALIDATION_RACE_STATE: ErrorCode = ErrorCode("VALIDATION_RACE_STATE");
    pub const VALIDATION_ALREADY_JOINED: ErrorCode = ErrorCode("VALIDATION_ALREADY_JOINED");
    pub const VALIDATION_DUPLICATE_RACE: ErrorCode = ErrorCode("VALIDATION_DUPLICATE_RACE");
    pub const VALIDATION_INSUFFICIENT_BALANCE: ErrorCode =
        ErrorCode("VALIDATION_INSUFFICIENT_BALANCE");

    // Authorization errors
    pub const UNAUTHORIZED_NOT_OWNER: ErrorCode = ErrorCode("UNAUTHORIZED_NOT_OWNER");

    // Network errors
    pub const NETWORK_STORE_UNAVAILABLE: ErrorCode = ErrorCode("NETWORK_STORE_UNAVAILABLE");
    pub const NETWORK_WALLET_UNAVAILABLE: ErrorCode = ErrorCode("NETWORK_WALLET_UNAVAILABLE");

    // Internal errors
    pub const INTERNAL_SERIALIZATION: ErrorCode = ErrorCode("INTERNAL_SERIALIZATION");

    // Resource errors
    pub const NOT_FOUND_RACE: ErrorCode = ErrorCode("NOT_FOUND_RACE");
    pub const NOT_FOUND_SNAIL: ErrorCode = ErrorCode("NOT_FOUND_SNAIL");

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Standardized error structure used across all services
///
/// This provides consistent error reporting with:
/// - Structured error codes for programmatic handling
/// - Human-readable messages
/// - Optional context for debugging
/// - Category-based classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceError {
    /// Error category (determines log level and user visibility)
    pub category: ErrorCategory,

    /// Structured error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context (e.g., race ids, expected vs actual phase)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl ServiceError {
    /// Create a new ServiceError
    pub fn new(category: ErrorCategory, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            category,
            code: code.as_str().to_string(),
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn race_not_found(race_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::NotFound,
            ErrorCode::NOT_FOUND_RACE,
            format!("Race not found: {}", race_id),
        )
    }

    pub fn snail_not_found(snail_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::NotFound,
            ErrorCode::NOT_FOUND_SNAIL,
            format!("Snail not found: {}", snail_id),
        )
    }

    pub fn not_owner(snail_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Unauthorized,
            ErrorCode::UNAUTHORIZED_NOT_OWNER,
            "Not the owner of the snail",
        )
        .with_context(snail_id.to_string())
    }

    pub fn store_error(error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Network,
            ErrorCode::NETWORK_STORE_UNAVAILABLE,
            "Record store error",
        )
        .with_context(error.to_string())
    }

    pub fn wallet_error(error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Network,
            ErrorCode::NETWORK_WALLET_UNAVAILABLE,
            "Wallet error",
        )
        .with_context(error.to_string())
    }

    pub fn serialization_error(error: impl fmt::Display) -> Self {
        Self::new(
            ErrorCategory::Internal,
            ErrorCode::INTERNAL_SERIALIZATION,
            "Serialization error",
        )
        .with_context(error.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "[{}] {}: {}", self.code, self.message, context)
        } else {
            write!(f, "[{}] {}", self.code, self.message)
        }
    }
}

impl std::error::Error for ServiceError {}
