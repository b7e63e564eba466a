//! # Payment Resolution
//!
//! Turns what the cashier entered in the payment dialog into the amounts a
//! sale is recorded with, or explains what is missing.
//!
//! ## Payment Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payment Paths                                    │
//! │                                                                         │
//! │  CASH       amount_paid >= total ──► change = paid − total, PAID       │
//! │             amount_paid <  total ──► InsufficientPayment               │
//! │                                                                         │
//! │  TRANSFER   account + reference  ──► paid = total, change 0, PAID      │
//! │             anything missing     ──► IncompleteBankDetails             │
//! │                                                                         │
//! │  CARD/QRIS  settled on terminal  ──► paid = total, change 0, PAID      │
//! │                                                                         │
//! │  CREDIT     customer (+ due date)──► paid 0, outstanding = total,      │
//! │                                      UNPAID                            │
//! │             walk-in / no due date──► IncompleteCreditDetails           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shift and cart preconditions are checked by the session before it gets
//! here; this module only knows about the total and the inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{BankAccount, PaymentMethod};
use crate::validation::{non_blank, validate_amount};

// =============================================================================
// Request
// =============================================================================

/// Inputs from the payment dialog, one variant per method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentRequest {
    Cash {
        amount_paid: Money,
        /// Free-text name printed on the receipt; no customer record needed.
        customer_name: Option<String>,
    },
    Transfer {
        bank_account_id: Option<String>,
        reference: Option<String>,
    },
    Card {
        reference: Option<String>,
    },
    Qris {
        reference: Option<String>,
    },
    Credit {
        #[ts(as = "Option<String>")]
        due_date: Option<NaiveDate>,
    },
}

impl PaymentRequest {
    /// Exact-amount cash payment with no receipt name.
    pub fn cash(amount_paid: Money) -> Self {
        PaymentRequest::Cash {
            amount_paid,
            customer_name: None,
        }
    }

    pub fn transfer(bank_account_id: impl Into<String>, reference: impl Into<String>) -> Self {
        PaymentRequest::Transfer {
            bank_account_id: Some(bank_account_id.into()),
            reference: Some(reference.into()),
        }
    }

    pub fn credit(due_date: Option<NaiveDate>) -> Self {
        PaymentRequest::Credit { due_date }
    }

    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentRequest::Cash { .. } => PaymentMethod::Cash,
            PaymentRequest::Transfer { .. } => PaymentMethod::Transfer,
            PaymentRequest::Card { .. } => PaymentMethod::Card,
            PaymentRequest::Qris { .. } => PaymentMethod::Qris,
            PaymentRequest::Credit { .. } => PaymentMethod::Credit,
        }
    }
}

/// Session facts payment resolution depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentContext<'a> {
    /// Selected registered customer; `None` means walk-in.
    pub customer_id: Option<&'a str>,
    /// Whether credit sales must carry a due date.
    pub credit_requires_due_date: bool,
    /// Accounts the branch accepts transfers into. Empty accepts any id.
    pub bank_accounts: &'a [BankAccount],
    /// Method chosen on the payment screen; a request for any other method
    /// is refused. `None` accepts any method.
    pub selected_method: Option<PaymentMethod>,
}

// =============================================================================
// Resolution
// =============================================================================

/// Whether the sale is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
}

/// The amounts a sale will be recorded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentResolution {
    pub method: PaymentMethod,
    pub amount_paid: Money,
    pub change: Money,
    /// What the customer still owes (credit sales).
    pub outstanding: Money,
    pub status: PaymentStatus,
    pub walk_in_name: Option<String>,
    pub bank_account_id: Option<String>,
    pub reference: Option<String>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
}

impl PaymentResolution {
    fn settled(method: PaymentMethod, grand_total: Money) -> Self {
        PaymentResolution {
            method,
            amount_paid: grand_total,
            change: Money::zero(),
            outstanding: Money::zero(),
            status: PaymentStatus::Paid,
            walk_in_name: None,
            bank_account_id: None,
            reference: None,
            due_date: None,
        }
    }
}

/// Validates `request` against `grand_total` and computes paid/change/
/// outstanding.
///
/// ## Errors
/// - `NegativeTotal` when the voucher exceeds the rest of the sale
/// - `PaymentMethodMismatch` when the request is not for the selected method
/// - `InvalidAmount` for a negative cash amount
/// - `InsufficientPayment` when cash does not cover the total
/// - `IncompleteBankDetails` / `IncompleteCreditDetails` for missing inputs
pub fn resolve_payment(
    request: &PaymentRequest,
    grand_total: Money,
    ctx: &PaymentContext<'_>,
) -> CoreResult<PaymentResolution> {
    if grand_total.is_negative() {
        return Err(CoreError::NegativeTotal(grand_total));
    }

    if let Some(selected) = ctx.selected_method {
        if selected != request.method() {
            return Err(CoreError::PaymentMethodMismatch {
                selected,
                requested: request.method(),
            });
        }
    }

    match request {
        PaymentRequest::Cash {
            amount_paid,
            customer_name,
        } => {
            validate_amount("amount paid", *amount_paid)?;
            if *amount_paid < grand_total {
                return Err(CoreError::InsufficientPayment {
                    total: grand_total,
                    paid: *amount_paid,
                });
            }
            Ok(PaymentResolution {
                amount_paid: *amount_paid,
                change: *amount_paid - grand_total,
                walk_in_name: non_blank(customer_name.as_deref()),
                ..PaymentResolution::settled(PaymentMethod::Cash, grand_total)
            })
        }

        PaymentRequest::Transfer {
            bank_account_id,
            reference,
        } => {
            let account = non_blank(bank_account_id.as_deref()).ok_or_else(|| {
                CoreError::IncompleteBankDetails {
                    missing: "a bank account".to_string(),
                }
            })?;
            if !ctx.bank_accounts.is_empty() && !ctx.bank_accounts.iter().any(|a| a.id == account) {
                return Err(CoreError::IncompleteBankDetails {
                    missing: format!("a known bank account (got {})", account),
                });
            }
            let reference = non_blank(reference.as_deref()).ok_or_else(|| {
                CoreError::IncompleteBankDetails {
                    missing: "a reference number".to_string(),
                }
            })?;
            Ok(PaymentResolution {
                bank_account_id: Some(account),
                reference: Some(reference),
                ..PaymentResolution::settled(PaymentMethod::Transfer, grand_total)
            })
        }

        PaymentRequest::Card { reference } | PaymentRequest::Qris { reference } => {
            Ok(PaymentResolution {
                reference: non_blank(reference.as_deref()),
                ..PaymentResolution::settled(request.method(), grand_total)
            })
        }

        PaymentRequest::Credit { due_date } => {
            if ctx.customer_id.is_none() {
                return Err(CoreError::IncompleteCreditDetails {
                    missing: "a registered customer".to_string(),
                });
            }
            if ctx.credit_requires_due_date && due_date.is_none() {
                return Err(CoreError::IncompleteCreditDetails {
                    missing: "a due date".to_string(),
                });
            }
            Ok(PaymentResolution {
                method: PaymentMethod::Credit,
                amount_paid: Money::zero(),
                change: Money::zero(),
                outstanding: grand_total,
                status: PaymentStatus::Unpaid,
                walk_in_name: None,
                bank_account_id: None,
                reference: None,
                due_date: *due_date,
            })
        }
    }
}
