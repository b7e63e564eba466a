//! # Cart
//!
//! The lines the cashier has rung up, with stock rules and per-line
//! discounts.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Cashier Action           Method                  State Change          │
//! │  ──────────────           ──────                  ────────────          │
//! │                                                                         │
//! │  Click Product ─────────► add_product() ────────► push / qty + 1       │
//! │                                                                         │
//! │  Type Quantity ─────────► set_quantity() ───────► qty = n (clamped)    │
//! │                                                                         │
//! │  Edit Discount ─────────► apply_line_discount() ► current_price        │
//! │                                                                         │
//! │  Reset Discount ────────► clear_line_discount() ► current = original   │
//! │                                                                         │
//! │  Click Remove ──────────► remove_line() ────────► retain               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `product_id`
//! - `0 <= current_price <= original_price`
//! - `subtotal()` is always `current_price × quantity`; it is never stored
//! - A line's quantity is at least 1; reaching 0 removes the line

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Product, Rate};
use crate::validation::{validate_amount, validate_cart_size, validate_percentage};

// =============================================================================
// Line Discount
// =============================================================================

/// Which kind of discount a line carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    None,
    Nominal,
    Percentage,
}

/// A discount on a single unit of a line.
///
/// Serialized as `{"type": "percentage", "value": 1000}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum LineDiscount {
    #[default]
    None,
    /// Absolute amount off each unit.
    Nominal(Money),
    /// Percentage of the original unit price.
    Percentage(Rate),
}

impl LineDiscount {
    /// Nominal discount of `amount` per unit.
    pub const fn nominal(amount: Money) -> Self {
        LineDiscount::Nominal(amount)
    }

    /// Percentage discount.
    pub const fn percentage(rate: Rate) -> Self {
        LineDiscount::Percentage(rate)
    }

    pub fn kind(&self) -> DiscountKind {
        match self {
            LineDiscount::None => DiscountKind::None,
            LineDiscount::Nominal(_) => DiscountKind::Nominal,
            LineDiscount::Percentage(_) => DiscountKind::Percentage,
        }
    }

    /// Discount per unit for a given original price, clamped to
    /// `0..=original_price`.
    pub fn amount_for(&self, original_price: Money) -> Money {
        let raw = match self {
            LineDiscount::None => Money::zero(),
            LineDiscount::Nominal(amount) => *amount,
            LineDiscount::Percentage(rate) => original_price.percentage_of(*rate),
        };
        raw.max(Money::zero()).min(original_price.max(Money::zero()))
    }

    fn validate(&self) -> CoreResult<()> {
        match self {
            LineDiscount::None => Ok(()),
            LineDiscount::Nominal(amount) => validate_amount("discount", *amount),
            LineDiscount::Percentage(rate) => validate_percentage("discount", *rate),
        }
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One product in the cart.
///
/// ## Snapshot Fields
/// Name, prices and cost are frozen when the product is first added, so the
/// cart stays consistent while the catalog is re-fetched page by page.
/// `available_quantity` is refreshed on every successful add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    product_id: String,
    product_name: String,
    sku: Option<String>,
    original_price: Money,
    current_price: Money,
    quantity: i64,
    discount: LineDiscount,
    cost_price: Money,
    available_quantity: i64,
    #[ts(as = "String")]
    added_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a line with quantity 1 and no discount.
    pub fn from_product(product: &Product) -> Self {
        CartLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            sku: product.sku.clone(),
            original_price: product.price,
            current_price: product.price,
            quantity: 1,
            discount: LineDiscount::None,
            cost_price: product.cost,
            available_quantity: product.quantity,
            added_at: Utc::now(),
        }
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    /// Unit price when the product was added.
    pub fn original_price(&self) -> Money {
        self.original_price
    }

    /// Unit price after the line discount.
    pub fn current_price(&self) -> Money {
        self.current_price
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn discount(&self) -> LineDiscount {
        self.discount
    }

    pub fn cost_price(&self) -> Money {
        self.cost_price
    }

    /// Last known stock for this product.
    pub fn available_quantity(&self) -> i64 {
        self.available_quantity
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// Discount per unit.
    pub fn discount_amount(&self) -> Money {
        self.original_price - self.current_price
    }

    /// Discount across the whole line (per-unit discount × quantity).
    pub fn discount_total(&self) -> Money {
        self.discount_amount().multiply_quantity(self.quantity)
    }

    /// `current_price × quantity`.
    pub fn subtotal(&self) -> Money {
        self.current_price.multiply_quantity(self.quantity)
    }

    /// `cost_price × quantity`.
    pub fn cost_total(&self) -> Money {
        self.cost_price.multiply_quantity(self.quantity)
    }

    fn set_discount(&mut self, discount: LineDiscount) {
        let amount = discount.amount_for(self.original_price);
        self.discount = discount;
        self.current_price = (self.original_price - amount).max(Money::zero());
    }
}

// =============================================================================
// Quantity Change
// =============================================================================

/// Result of [`Cart::set_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuantityChange {
    /// Quantity set as requested.
    Updated { quantity: i64 },
    /// Requested quantity was 0 or less; the line is gone.
    Removed,
    /// Requested more than the last known stock; set to the stock level.
    /// The cashier should be told (insufficient stock), but the edit stands.
    Clamped { requested: i64, available: i64 },
}

impl QuantityChange {
    pub fn is_clamped(&self) -> bool {
        matches!(self, QuantityChange::Clamped { .. })
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The cart of the current sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    lines: Vec<CartLine>,

    /// When the cart was created/last cleared.
    #[ts(as = "String")]
    created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line(&self, product_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Adds one unit of `product`.
    ///
    /// ## Behavior
    /// - No stock at all: `OutOfStock`
    /// - Already in cart: quantity + 1, unless that exceeds the product's
    ///   stock, in which case the cart is left untouched and
    ///   `InsufficientStock` is returned
    /// - Otherwise: a new line with quantity 1 at the product's price
    ///
    /// ## Returns
    /// The line's quantity after the add.
    pub fn add_product(&mut self, product: &Product) -> CoreResult<i64> {
        if !product.in_stock() {
            return Err(CoreError::OutOfStock {
                product: product.name.clone(),
            });
        }

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let requested = line.quantity + 1;
            if requested > product.quantity {
                return Err(CoreError::InsufficientStock {
                    product: product.name.clone(),
                    available: product.quantity,
                    requested,
                });
            }

            line.quantity = requested;
            line.available_quantity = product.quantity;
            debug!(product_id = %product.id, quantity = requested, "Cart line incremented");
            return Ok(requested);
        }

        validate_cart_size(self.lines.len())?;
        self.lines.push(CartLine::from_product(product));
        debug!(product_id = %product.id, "Cart line added");
        Ok(1)
    }

    /// Sets the quantity of a line.
    ///
    /// ## Behavior
    /// - `quantity <= 0`: the line is removed
    /// - More than the last known stock: clamped to the stock
    /// - Unknown product: `LineNotFound`
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<QuantityChange> {
        let index = self
            .lines
            .iter()
            .position(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))?;

        if quantity <= 0 {
            self.lines.remove(index);
            return Ok(QuantityChange::Removed);
        }

        let line = &mut self.lines[index];
        if quantity > line.available_quantity {
            let available = line.available_quantity;
            line.quantity = available;
            return Ok(QuantityChange::Clamped {
                requested: quantity,
                available,
            });
        }

        line.quantity = quantity;
        Ok(QuantityChange::Updated { quantity })
    }

    /// Removes a line. Returns whether anything was removed.
    pub fn remove_line(&mut self, product_id: &str) -> bool {
        let initial_len = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.len() != initial_len
    }

    /// Applies a per-unit discount to a line.
    ///
    /// Percentages are taken of the original price. The resulting discount
    /// is capped at the original price, so the line can reach zero but never
    /// go below it.
    pub fn apply_line_discount(&mut self, product_id: &str, discount: LineDiscount) -> CoreResult<()> {
        discount.validate()?;
        let line = self.line_mut(product_id)?;
        line.set_discount(discount);
        Ok(())
    }

    /// Restores a line to its original price.
    pub fn clear_line_discount(&mut self, product_id: &str) -> CoreResult<()> {
        let line = self.line_mut(product_id)?;
        line.set_discount(LineDiscount::None);
        Ok(())
    }

    /// Clears all lines from the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.created_at = Utc::now();
    }

    /// Returns the number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn line_mut(&mut self, product_id: &str) -> CoreResult<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::LineNotFound(product_id.to_string()))
    }
}
