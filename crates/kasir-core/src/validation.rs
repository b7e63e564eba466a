//! # Validation Module
//!
//! Input checks run before any state change or provider call.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend                                                     │
//! │  └── Immediate feedback while typing                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Amounts non-negative and numeric                                  │
//! │  ├── Quantities and cart size bounded                                  │
//! │  └── Required text fields present                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Backend API                                                  │
//! │  └── Authoritative stock / uniqueness checks                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kasir_core::validation::{parse_amount, validate_amount};
//!
//! let cash = parse_amount("initial cash", "100.000").unwrap();
//! assert_eq!(cash.minor(), 100_000);
//! assert!(validate_amount("initial cash", cash).is_ok());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Rate;
use crate::{MAX_CART_ITEMS, MAX_SEARCH_QUERY_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Validators
// =============================================================================

/// Parses an amount typed by the cashier.
///
/// ## Rules
/// - Must not be blank
/// - Grouping separators (`.`, `,`, `_`, spaces) are ignored, so
///   `"100.000"`, `"100,000"` and `"100000"` are the same amount
/// - Must contain only digits after that (no sign, no decimals)
pub fn parse_amount(field: &str, input: &str) -> CoreResult<Money> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_amount(field, "amount is required"));
    }

    if trimmed.starts_with('-') {
        return Err(CoreError::invalid_amount(field, "must not be negative"));
    }

    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '_' | ' '))
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::invalid_amount(field, "must be a number"));
    }

    digits
        .parse::<i64>()
        .map(Money::from_minor)
        .map_err(|_| CoreError::invalid_amount(field, "amount is too large"))
}

/// Validates an amount is zero or more.
pub fn validate_amount(field: &str, amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::invalid_amount(field, "must not be negative"));
    }
    Ok(())
}

/// Validates a percentage is within 0–100%.
pub fn validate_percentage(field: &str, rate: Rate) -> CoreResult<()> {
    if rate.bps() > Rate::FULL_BPS {
        return Err(CoreError::invalid_amount(field, "must be between 0 and 100"));
    }
    Ok(())
}

/// Validates a branch tax rate in basis points.
pub fn validate_tax_rate(rate: Rate) -> ValidationResult<()> {
    if rate.bps() > Rate::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: Rate::FULL_BPS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates there is room for one more distinct line.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Text Validators
// =============================================================================

/// Validates a search query and returns it trimmed.
///
/// Empty is fine: the catalog returns its first page.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_SEARCH_QUERY_LEN {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_SEARCH_QUERY_LEN,
        });
    }

    Ok(query.to_string())
}

/// Returns the trimmed value, or `None` when absent or blank.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validates a page number (1-based).
pub fn validate_page(page: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::MustBePositive {
            field: "page".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
