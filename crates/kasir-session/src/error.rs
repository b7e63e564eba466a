//! # Session Error Types
//!
//! Errors surfaced by [`SaleSession`](crate::SaleSession) and its providers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Kasir POS                              │
//! │                                                                         │
//! │  Session operation                                                      │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Local check fails? ─── CoreError ─────────┐   (no network call made)   │
//! │         │                                  │                            │
//! │         ▼                                  ▼                            │
//! │  Provider fails?   ─── ProviderError ──► SessionError ──► ErrorResponse │
//! │         │                                  ▲              {code, msg}   │
//! │         ▼                                  │                            │
//! │  Another request in flight? ── AlreadyProcessing                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant leaves the session as it was before the call.

use std::fmt;

use kasir_core::{CoreError, ValidationError};
use serde::Serialize;
use thiserror::Error;

/// Result type for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

// =============================================================================
// Provider Error
// =============================================================================

/// What kind of failure a provider reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Network failure, timeout or 5xx. Safe to retry.
    Unavailable,
    /// The backend refused the request (4xx, validation).
    Rejected,
    /// The requested record does not exist.
    NotFound,
    /// The response could not be understood.
    InvalidResponse,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProviderErrorKind::Unavailable => "service unavailable",
            ProviderErrorKind::Rejected => "request rejected",
            ProviderErrorKind::NotFound => "not found",
            ProviderErrorKind::InvalidResponse => "invalid response",
        };
        f.write_str(label)
    }
}

/// A failure reported by one of the external providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// Message from the backend, or a description of the transport failure.
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        ProviderError {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        ProviderError::new(ProviderErrorKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        ProviderError::new(ProviderErrorKind::Rejected, message)
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        ProviderError::new(
            ProviderErrorKind::NotFound,
            format!("{} not found: {}", entity, id),
        )
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        ProviderError::new(ProviderErrorKind::InvalidResponse, message)
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::Unavailable
    }
}

// =============================================================================
// Session Error
// =============================================================================

/// Error returned from every session operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Local validation failed; no provider was called.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A provider call failed; local state was not changed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A start/end/finalize request is already in flight.
    #[error("Another request is already being processed")]
    AlreadyProcessing,
}

impl From<ValidationError> for SessionError {
    fn from(err: ValidationError) -> Self {
        SessionError::Core(CoreError::Validation(err))
    }
}

impl SessionError {
    /// Machine-readable code for the frontend.
    pub fn code(&self) -> ErrorCode {
        match self {
            SessionError::Core(err) => match err {
                CoreError::ShiftNotActive => ErrorCode::ShiftNotActive,
                CoreError::ShiftAlreadyOpen { .. } => ErrorCode::ShiftAlreadyOpen,
                CoreError::OutOfStock { .. } => ErrorCode::OutOfStock,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
                CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
                CoreError::IncompleteBankDetails { .. } => ErrorCode::IncompleteBankDetails,
                CoreError::IncompleteCreditDetails { .. } => ErrorCode::IncompleteCreditDetails,
                CoreError::EmptyCart => ErrorCode::EmptyCart,
                CoreError::LineNotFound(_) => ErrorCode::NotFound,
                CoreError::BreakdownRequired => ErrorCode::BreakdownRequired,
                CoreError::NegativeTotal(_) => ErrorCode::NegativeTotal,
                CoreError::PaymentMethodMismatch { .. } => ErrorCode::PaymentMethodMismatch,
                CoreError::Validation(_) => ErrorCode::ValidationError,
            },
            SessionError::Provider(err) => match err.kind {
                ProviderErrorKind::Unavailable => ErrorCode::ProviderUnavailable,
                ProviderErrorKind::Rejected => ErrorCode::ProviderRejected,
                ProviderErrorKind::NotFound => ErrorCode::NotFound,
                ProviderErrorKind::InvalidResponse => ErrorCode::InvalidResponse,
            },
            SessionError::AlreadyProcessing => ErrorCode::AlreadyProcessing,
        }
    }

    /// Whether the cashier can simply try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Provider(err) => err.is_retryable(),
            SessionError::AlreadyProcessing => true,
            SessionError::Core(_) => false,
        }
    }
}

// =============================================================================
// Frontend Payload
// =============================================================================

/// Error codes sent to the frontend.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_PAYMENT':
///     focusAmountPaid();
///     break;
///   case 'PROVIDER_UNAVAILABLE':
///     showRetry(e.message);
///     break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ShiftNotActive,
    ShiftAlreadyOpen,
    OutOfStock,
    InsufficientStock,
    InvalidAmount,
    InsufficientPayment,
    IncompleteBankDetails,
    IncompleteCreditDetails,
    EmptyCart,
    NotFound,
    BreakdownRequired,
    NegativeTotal,
    PaymentMethodMismatch,
    ValidationError,
    ProviderUnavailable,
    ProviderRejected,
    InvalidResponse,
    AlreadyProcessing,
}

/// What the frontend receives when an operation fails:
/// ```json
/// {
///   "code": "INSUFFICIENT_PAYMENT",
///   "message": "Amount paid (150,000) is less than total (199,800)"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl From<&SessionError> for ErrorResponse {
    fn from(err: &SessionError) -> Self {
        ErrorResponse {
            code: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<SessionError> for ErrorResponse {
    fn from(err: SessionError) -> Self {
        ErrorResponse::from(&err)
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}
