//! # Shift Reconciliation
//!
//! Shift-end math: per-method sales totals and the cash drawer count.
//!
//! ## Closing a Shift
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shift Close                                      │
//! │                                                                         │
//! │  1. prepare_end_shift                                                   │
//! │     sales for (branch, shift) ──► keep COMPLETED ──► sum per method    │
//! │                                                                         │
//! │        cash      75,000 + 50,000 = 125,000                              │
//! │        card / transfer / qris / credit                                  │
//! │        other     (unknown methods, never counted as cash)               │
//! │                                                                         │
//! │     expected_cash = starting_balance + cash                             │
//! │                                                                         │
//! │  2. end_shift(actual)                                                   │
//! │     difference = actual − expected   (negative = drawer is short)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::{PaymentMethod, Sale, SaleStatus, Shift};
use crate::validation::validate_amount;

/// Sales totals per payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct MethodTotals {
    pub cash: Money,
    pub card: Money,
    pub transfer: Money,
    pub qris: Money,
    pub credit: Money,
}

impl MethodTotals {
    /// Adds `amount` to the bucket for `method`.
    ///
    /// Returns `false` for [`PaymentMethod::Other`], which has no bucket here.
    pub fn add(&mut self, method: PaymentMethod, amount: Money) -> bool {
        let bucket = match method {
            PaymentMethod::Cash => &mut self.cash,
            PaymentMethod::Card => &mut self.card,
            PaymentMethod::Transfer => &mut self.transfer,
            PaymentMethod::Qris => &mut self.qris,
            PaymentMethod::Credit => &mut self.credit,
            PaymentMethod::Other => return false,
        };
        *bucket += amount;
        true
    }

    pub fn get(&self, method: PaymentMethod) -> Money {
        match method {
            PaymentMethod::Cash => self.cash,
            PaymentMethod::Card => self.card,
            PaymentMethod::Transfer => self.transfer,
            PaymentMethod::Qris => self.qris,
            PaymentMethod::Credit => self.credit,
            PaymentMethod::Other => Money::zero(),
        }
    }

    /// Sum over all buckets.
    pub fn total(&self) -> Money {
        self.cash + self.card + self.transfer + self.qris + self.credit
    }
}

/// Shift-end summary, computed by `prepare_end_shift`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftBreakdown {
    pub shift_id: String,
    pub starting_balance: Money,
    pub totals: MethodTotals,
    /// Completed sales whose method was not recognised.
    pub other: Money,
    /// Completed sales counted.
    pub sale_count: usize,
    /// Sales skipped because they were not completed.
    pub skipped_count: usize,
    pub expected_cash: Money,
    #[ts(as = "String")]
    pub prepared_at: DateTime<Utc>,
}

impl ShiftBreakdown {
    /// Summarizes the completed sales of `shift`.
    pub fn summarize(shift: &Shift, sales: &[Sale]) -> Self {
        let mut totals = MethodTotals::default();
        let mut other = Money::zero();
        let mut sale_count = 0;
        let mut skipped_count = 0;

        for sale in sales {
            if sale.status != SaleStatus::Completed {
                skipped_count += 1;
                continue;
            }
            sale_count += 1;
            if !totals.add(sale.payment_method, sale.total_amount) {
                warn!(
                    sale_id = %sale.id,
                    amount = %sale.total_amount,
                    "Sale has unrecognised payment method, counted as other"
                );
                other += sale.total_amount;
            }
        }

        ShiftBreakdown {
            shift_id: shift.id.clone(),
            starting_balance: shift.starting_balance,
            totals,
            other,
            sale_count,
            skipped_count,
            expected_cash: shift.starting_balance + totals.cash,
            prepared_at: Utc::now(),
        }
    }

    /// All completed sales, including the `other` bucket.
    pub fn total_sales(&self) -> Money {
        self.totals.total() + self.other
    }

    /// Compares the counted drawer with the expected cash.
    pub fn reconcile(&self, actual_cash: Money) -> CoreResult<Reconciliation> {
        validate_amount("actual cash", actual_cash)?;
        Ok(Reconciliation {
            expected: self.expected_cash,
            actual: actual_cash,
            difference: actual_cash - self.expected_cash,
        })
    }
}

/// Drawer count at shift close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub expected: Money,
    pub actual: Money,
    /// `actual − expected`.
    pub difference: Money,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.difference.is_zero()
    }

    pub fn is_short(&self) -> bool {
        self.difference.is_negative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::types::ShiftStatus;

    fn open_shift(starting: i64) -> Shift {
        Shift {
            id: "s-1".to_string(),
            user_id: "u-1".to_string(),
            branch_id: "b-1".to_string(),
            starting_balance: Money::from_minor(starting),
            status: ShiftStatus::Open,
            totals: MethodTotals::default(),
            ending_balance: None,
            actual_balance: None,
            cash_difference: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn sale(id: &str, method: PaymentMethod, status: SaleStatus, amount: i64) -> Sale {
        Sale {
            id: id.to_string(),
            invoice_number: None,
            branch_id: "b-1".to_string(),
            shift_id: Some("s-1".to_string()),
            customer_id: None,
            status,
            payment_method: method,
            total_amount: Money::from_minor(amount),
            amount_paid: Money::from_minor(amount),
            change: Money::zero(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_expected_cash_from_completed_sales() {
        let sales = vec![
            sale("1", PaymentMethod::Cash, SaleStatus::Completed, 50_000),
            sale("2", PaymentMethod::Cash, SaleStatus::Completed, 75_000),
        ];

        let breakdown = ShiftBreakdown::summarize(&open_shift(100_000), &sales);

        assert_eq!(breakdown.totals.cash, Money::from_minor(125_000));
        assert_eq!(breakdown.expected_cash, Money::from_minor(225_000));
        assert_eq!(breakdown.sale_count, 2);
    }

    #[test]
    fn test_non_completed_and_unknown_methods() {
        let sales = vec![
            sale("1", PaymentMethod::Cash, SaleStatus::Completed, 50_000),
            sale("2", PaymentMethod::Cash, SaleStatus::Cancelled, 40_000),
            sale("3", PaymentMethod::Cash, SaleStatus::Pending, 30_000),
            sale("4", PaymentMethod::Transfer, SaleStatus::Completed, 20_000),
            sale("5", PaymentMethod::Other, SaleStatus::Completed, 10_000),
        ];

        let breakdown = ShiftBreakdown::summarize(&open_shift(0), &sales);

        assert_eq!(breakdown.totals.cash, Money::from_minor(50_000));
        assert_eq!(breakdown.totals.transfer, Money::from_minor(20_000));
        assert_eq!(breakdown.other, Money::from_minor(10_000));
        assert_eq!(breakdown.expected_cash, Money::from_minor(50_000));
        assert_eq!(breakdown.total_sales(), Money::from_minor(80_000));
        assert_eq!(breakdown.sale_count, 3);
        assert_eq!(breakdown.skipped_count, 2);
    }

    #[test]
    fn test_reconcile() {
        let sales = vec![sale("1", PaymentMethod::Cash, SaleStatus::Completed, 125_000)];
        let breakdown = ShiftBreakdown::summarize(&open_shift(100_000), &sales);

        let short = breakdown.reconcile(Money::from_minor(220_000)).unwrap();
        assert_eq!(short.difference, Money::from_minor(-5_000));
        assert!(short.is_short());

        let exact = breakdown.reconcile(Money::from_minor(225_000)).unwrap();
        assert!(exact.is_balanced());

        assert!(matches!(
            breakdown.reconcile(Money::from_minor(-1)),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_method_totals() {
        let mut totals = MethodTotals::default();
        assert!(totals.add(PaymentMethod::Qris, Money::from_minor(5_000)));
        assert!(totals.add(PaymentMethod::Credit, Money::from_minor(7_000)));
        assert!(!totals.add(PaymentMethod::Other, Money::from_minor(1_000)));

        assert_eq!(totals.get(PaymentMethod::Qris), Money::from_minor(5_000));
        assert_eq!(totals.total(), Money::from_minor(12_000));
    }
}
