//! # Sale Totals
//!
//! Everything on the right-hand side of the cashier screen, derived from the
//! cart and the session-level adjustments.
//!
//! ```text
//! Σ line subtotal (after item discounts)        = subtotal
//! subtotal × tax rate                           = tax        (exclusive)
//! subtotal + tax + shipping − voucher           = grand_total
//! Σ item discount + voucher                     = total_discount
//! Σ cost × quantity                             = total_cost
//! ```
//!
//! Nothing here is cached: `SaleTotals::compute` runs on every read, so a
//! total can never drift from the lines it came from.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::money::Money;
use crate::types::{Rate, TaxMode};

/// Session-level inputs that sit on top of the cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleAdjustments {
    pub tax_rate: Rate,
    pub tax_mode: TaxMode,
    pub shipping: Money,
    /// Applied once to the whole sale, not per line.
    pub voucher: Money,
}

/// Derived totals for a cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    /// Σ original price × quantity.
    pub gross_subtotal: Money,
    /// Σ per-unit line discount × quantity.
    pub total_item_discount: Money,
    /// Σ line subtotal, i.e. after item discounts.
    pub subtotal: Money,
    pub voucher_discount: Money,
    /// Item discounts plus voucher.
    pub total_discount: Money,
    pub tax: Money,
    pub shipping: Money,
    /// Not floored; see [`SaleTotals::is_payable`].
    pub grand_total: Money,
    /// Σ cost × quantity, for margin reporting.
    pub total_cost: Money,
}

impl SaleTotals {
    /// Computes totals for `cart` under `adjustments`.
    pub fn compute(cart: &Cart, adjustments: &SaleAdjustments) -> Self {
        let lines = cart.lines();

        let gross_subtotal: Money = lines
            .iter()
            .map(|l| l.original_price().multiply_quantity(l.quantity()))
            .sum();
        let total_item_discount: Money = lines.iter().map(|l| l.discount_total()).sum();
        let subtotal: Money = lines.iter().map(|l| l.subtotal()).sum();
        let total_cost: Money = lines.iter().map(|l| l.cost_total()).sum();

        let (tax, grand_total) = match adjustments.tax_mode {
            TaxMode::Exclusive => {
                let tax = subtotal.calculate_tax(adjustments.tax_rate);
                (tax, subtotal + tax + adjustments.shipping - adjustments.voucher)
            }
            TaxMode::Inclusive => {
                let tax = subtotal.extract_tax(adjustments.tax_rate);
                (tax, subtotal + adjustments.shipping - adjustments.voucher)
            }
        };

        SaleTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            gross_subtotal,
            total_item_discount,
            subtotal,
            voucher_discount: adjustments.voucher,
            total_discount: total_item_discount + adjustments.voucher,
            tax,
            shipping: adjustments.shipping,
            grand_total,
            total_cost,
        }
    }

    /// A sale can only be settled for a total of zero or more.
    pub fn is_payable(&self) -> bool {
        !self.grand_total.is_negative()
    }
}

impl From<&Cart> for SaleTotals {
    /// Totals with no tax, shipping or voucher.
    fn from(cart: &Cart) -> Self {
        SaleTotals::compute(cart, &SaleAdjustments::default())
    }
}
