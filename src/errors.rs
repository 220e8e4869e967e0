//! # Error Types Module
//!
//! Error kinds produced while handling a chat event. None of them is fatal:
//! the router turns each one into a user-facing notice (or silence) and the
//! session stays usable afterwards.

use thiserror::Error;

/// Malformed free-text input. Always recoverable by re-prompting.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("input is empty")]
    Empty,
    #[error("input is longer than {max} characters")]
    TooLong { max: usize },
    #[error("input does not match the expected format")]
    BadFormat,
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("quantity must be greater than zero")]
    NonPositiveQuantity,
    #[error("calories must be zero or more")]
    NegativeCalories,
    #[error("date must look like YYYY-MM-DD")]
    MalformedDate,
    #[error("'{0}' is not a calendar date")]
    InvalidCalendarDate(String),
}

impl ValidationError {
    /// Localization key of the notice shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            ValidationError::Empty => "error-input-empty",
            ValidationError::TooLong { .. } => "error-input-too-long",
            ValidationError::BadFormat => "error-input-format",
            ValidationError::NotANumber(_) => "error-input-not-a-number",
            ValidationError::NonPositiveQuantity => "error-input-quantity",
            ValidationError::NegativeCalories => "error-input-calories",
            ValidationError::MalformedDate => "error-date-format",
            ValidationError::InvalidCalendarDate(_) => "error-date-calendar",
        }
    }
}

/// Failures of the external collaborators (chat transport, analysis service, store)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("analysis error: {0}")]
    Analysis(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("analysis service temporarily disabled after repeated failures")]
    CircuitOpen,
    #[error("unsupported image format")]
    UnsupportedImage,
}

impl AdapterError {
    /// Localization key of the notice shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            AdapterError::UnsupportedImage => "error-unsupported-format",
            AdapterError::Timeout(_) => "error-analysis-timeout",
            AdapterError::CircuitOpen => "error-analysis-unavailable",
            _ => "error-adapter",
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdapterError::Transport(_) | AdapterError::Analysis(_) | AdapterError::Timeout(_)
        )
    }
}

/// Everything a dialog handler can fail with
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BotError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("index {index} is out of range (ledger has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no account is linked to this chat")]
    AccountNotLinked,
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// The reply failed after the event's changes were already stored
    #[error("reply not delivered after a committed change: {0}")]
    Undelivered(AdapterError),
    #[error("unrecognized action: {0}")]
    UnrecognizedAction(String),
}
