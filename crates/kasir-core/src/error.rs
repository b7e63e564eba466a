//! # Error Types
//!
//! Domain error taxonomy for the sale session.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kasir-core (this file)                                                │
//! │  ├── CoreError        - Business rule violations (local, pre-network)  │
//! │  └── ValidationError  - Malformed input                                │
//! │                                                                         │
//! │  kasir-session                                                         │
//! │  ├── ProviderError    - Backend/network failure (always retryable)     │
//! │  └── SessionError     - What the cashier screen sees                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SessionError → Frontend           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is detected before any provider call and never leaves
//! the session in a half-mutated state.

use thiserror::Error;

use crate::money::Money;
use crate::types::PaymentMethod;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by cart, payment and shift logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An operation that needs an open shift was attempted while closed.
    #[error("No active shift. Start a shift first")]
    ShiftNotActive,

    /// A shift is already open for this cashier and branch.
    #[error("Shift {shift_id} is already open")]
    ShiftAlreadyOpen { shift_id: String },

    /// The product has no stock at all.
    #[error("{product} is out of stock")]
    OutOfStock { product: String },

    /// The requested quantity exceeds the last known stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Click product (already 3 in cart, stock 3)
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Indomie", available: 3, requested: 4 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Indomie in stock", cart unchanged
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// A numeric input is missing, negative or not a number.
    #[error("Invalid {field}: {reason}")]
    InvalidAmount { field: String, reason: String },

    /// Cash tendered is less than the total due.
    #[error("Amount paid ({paid}) is less than total ({total})")]
    InsufficientPayment { total: Money, paid: Money },

    /// Transfer payment without account or reference number.
    #[error("Bank transfer requires {missing}")]
    IncompleteBankDetails { missing: String },

    /// Credit payment without a registered customer or due date.
    #[error("Credit sale requires {missing}")]
    IncompleteCreditDetails { missing: String },

    /// Finalize attempted on an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// The product is not in the cart.
    #[error("Product {0} is not in the cart")]
    LineNotFound(String),

    /// `end_shift` called before the shift-end breakdown was prepared.
    #[error("Shift breakdown has not been prepared")]
    BreakdownRequired,

    /// The voucher exceeds everything else on the sale.
    #[error("Grand total is negative ({0}); reduce the voucher")]
    NegativeTotal(Money),

    /// The payment request is for a different method than the one selected.
    #[error("Payment method {requested} does not match the selected method {selected}")]
    PaymentMethodMismatch {
        selected: PaymentMethod,
        requested: PaymentMethod,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for [`CoreError::InvalidAmount`].
    pub fn invalid_amount(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidAmount {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product: "Indomie Goreng".to_string(),
            available: 3,
            requested: 4,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Indomie Goreng: available 3, requested 4"
        );

        let err = CoreError::InsufficientPayment {
            total: Money::from_minor(199_800),
            paid: Money::from_minor(150_000),
        };
        assert_eq!(
            err.to_string(),
            "Amount paid (150,000) is less than total (199,800)"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "reference".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: reference is required");
    }
}
