//! # Checkout
//!
//! The immutable sale request sent to the Sales Provider once payment is
//! confirmed, and the receipt view derived from it.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Checkout Flow                                   │
//! │                                                                         │
//! │   Cart ──► SaleTotals ──┐                                               │
//! │                         ├──► FinalizedSale::build ──► SalesProvider     │
//! │   PaymentResolution ────┤          │                       │            │
//! │                         │          │                       ▼            │
//! │   SaleContext ──────────┘          └──────────► Receipt (with sale id)  │
//! │   (branch, shift, user, customer, idempotency key)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every line is copied into a [`FinalizedLine`], so the request never
//! borrows from the cart that is about to be reset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{Cart, CartLine, LineDiscount};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::payment::{PaymentResolution, PaymentStatus};
use crate::totals::SaleTotals;
use crate::types::PaymentMethod;

/// Who and where the sale is recorded for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleContext {
    pub branch_id: String,
    pub shift_id: String,
    pub user_id: String,
    /// `None` for a walk-in sale.
    pub customer_id: Option<String>,
    /// Sent with the request so a retried create is de-duplicated.
    pub idempotency_key: String,
}

/// One sold line, frozen at finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinalizedLine {
    pub product_id: String,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub original_price: Money,
    /// Unit price after the line discount.
    pub unit_price: Money,
    pub discount: LineDiscount,
    /// Per-unit discount amount.
    pub discount_amount: Money,
    pub cost_price: Money,
    pub subtotal: Money,
}

impl From<&CartLine> for FinalizedLine {
    fn from(line: &CartLine) -> Self {
        FinalizedLine {
            product_id: line.product_id().to_string(),
            product_name: line.product_name().to_string(),
            sku: line.sku().map(str::to_string),
            quantity: line.quantity(),
            original_price: line.original_price(),
            unit_price: line.current_price(),
            discount: line.discount(),
            discount_amount: line.discount_amount(),
            cost_price: line.cost_price(),
            subtotal: line.subtotal(),
        }
    }
}

/// The request body for one sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FinalizedSale {
    pub idempotency_key: String,
    pub branch_id: String,
    pub shift_id: String,
    pub user_id: String,
    pub customer_id: Option<String>,
    pub items: Vec<FinalizedLine>,
    pub totals: SaleTotals,
    pub payment: PaymentResolution,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl FinalizedSale {
    /// Snapshots the cart with its totals and resolved payment.
    ///
    /// Fails with `EmptyCart` when there is nothing to sell.
    pub fn build(
        cart: &Cart,
        totals: &SaleTotals,
        payment: PaymentResolution,
        ctx: SaleContext,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        Ok(FinalizedSale {
            idempotency_key: ctx.idempotency_key,
            branch_id: ctx.branch_id,
            shift_id: ctx.shift_id,
            user_id: ctx.user_id,
            customer_id: ctx.customer_id,
            items: cart.lines().iter().map(FinalizedLine::from).collect(),
            totals: *totals,
            payment,
            created_at: Utc::now(),
        })
    }

    pub fn grand_total(&self) -> Money {
        self.totals.grand_total
    }

    pub fn method(&self) -> PaymentMethod {
        self.payment.method
    }

    pub fn is_walk_in(&self) -> bool {
        self.customer_id.is_none()
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// What the frontend renders after a sale is accepted.
///
/// Display data only; printing happens outside this library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receipt {
    pub store_name: String,
    pub branch_id: String,
    pub sale_id: String,
    pub invoice_number: Option<String>,
    /// Registered customer name, the cash walk-in name, or "Walk-in".
    pub customer: String,
    pub lines: Vec<FinalizedLine>,
    pub totals: SaleTotals,
    pub method: PaymentMethod,
    pub amount_paid: Money,
    pub change: Money,
    pub outstanding: Money,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub const WALK_IN: &'static str = "Walk-in";

    /// Builds the receipt for an accepted sale.
    ///
    /// `customer_name` is the registered customer's name, if one was
    /// selected.
    pub fn from_finalized(
        sale: &FinalizedSale,
        sale_id: impl Into<String>,
        invoice_number: Option<String>,
        store_name: impl Into<String>,
        customer_name: Option<&str>,
    ) -> Self {
        let customer = customer_name
            .map(str::to_string)
            .or_else(|| sale.payment.walk_in_name.clone())
            .unwrap_or_else(|| Self::WALK_IN.to_string());

        Receipt {
            store_name: store_name.into(),
            branch_id: sale.branch_id.clone(),
            sale_id: sale_id.into(),
            invoice_number,
            customer,
            lines: sale.items.clone(),
            totals: sale.totals,
            method: sale.payment.method,
            amount_paid: sale.payment.amount_paid,
            change: sale.payment.change,
            outstanding: sale.payment.outstanding,
            status: sale.payment.status,
            issued_at: sale.created_at,
        }
    }
}
