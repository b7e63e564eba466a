//! # Domain Types
//!
//! Reference data the session reads from its providers, plus the `Rate`
//! value type.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Shift       │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, name       │   │  id, user       │   │  id, shift_id   │       │
//! │  │  price, cost    │   │  branch         │   │  status         │       │
//! │  │  quantity       │   │  starting_bal   │   │  method, total  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │ PaymentMethod   │   │   Customer      │       │
//! │  │  bps (u32)      │   │  Cash, Card     │   │  id, name       │       │
//! │  │  1100 = 11%     │   │  Transfer, Qris │   │  phone          │       │
//! │  └─────────────────┘   │  Credit, Other  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these are owned by the session. They are snapshots of what the
//! backend returned on the last call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::shift::MethodTotals;

// =============================================================================
// Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%. Branch tax rates are configured as whole
/// percentages (11 → 1100 bps) while line discounts may carry fractions
/// (12.5% → 1250 bps); both fit without floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Creates a rate from a whole percentage (the branch `tax_rate` format).
    #[inline]
    pub const fn from_percent(pct: u32) -> Self {
        Rate(pct * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    /// Checks if the rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
        }
    }
}

// =============================================================================
// Tax Mode
// =============================================================================

/// How the branch tax rate applies to shelf prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Tax is added on top of the subtotal.
    #[default]
    Exclusive,
    /// Shelf prices already include tax; tax is back-calculated.
    Inclusive,
}

// =============================================================================
// Product
// =============================================================================

/// A product as returned by the catalog for the current branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Stock Keeping Unit, if the branch uses them.
    pub sku: Option<String>,

    /// Selling price per unit.
    pub price: Money,

    /// Purchase cost per unit (for margin reporting).
    pub cost: Money,

    /// Stock on hand at the branch when the page was fetched.
    pub quantity: i64,
}

impl Product {
    /// Checks if any stock is available.
    #[inline]
    pub fn in_stock(&self) -> bool {
        self.quantity > 0
    }
}

/// One page of catalog search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPage {
    pub items: Vec<Product>,
    /// Total matches across all pages.
    pub total: u64,
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer. Absence of a customer means walk-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A bank account the branch accepts transfers into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BankAccount {
    pub id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was (or will be) settled.
///
/// Deserialization is lenient: backend spellings like `bank_transfer` or
/// `debit` map onto the known variants, and anything unrecognised becomes
/// [`PaymentMethod::Other`] instead of failing the whole response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Qris,
    /// Sold on account; settled later through the receivables screen.
    Credit,
    Other,
}

impl PaymentMethod {
    /// Parses a backend method string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "cash" | "tunai" => PaymentMethod::Cash,
            "card" | "debit" | "debit_card" | "credit_card" | "edc" => PaymentMethod::Card,
            "transfer" | "bank_transfer" | "bank" => PaymentMethod::Transfer,
            "qris" => PaymentMethod::Qris,
            "credit" | "tempo" | "kredit" => PaymentMethod::Credit,
            _ => PaymentMethod::Other,
        }
    }

    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Qris => "qris",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PaymentMethod::parse(&raw))
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Status of a sale recorded by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    Completed,
    Cancelled,
    Other,
}

impl SaleStatus {
    /// Parses a backend status string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pending" | "draft" => SaleStatus::Pending,
            "completed" | "complete" | "paid" => SaleStatus::Completed,
            "cancelled" | "canceled" | "void" | "voided" => SaleStatus::Cancelled,
            _ => SaleStatus::Other,
        }
    }
}

impl<'de> Deserialize<'de> for SaleStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SaleStatus::parse(&raw))
    }
}

/// A sale as recorded by the Sales Provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub invoice_number: Option<String>,
    pub branch_id: String,
    pub shift_id: Option<String>,
    pub customer_id: Option<String>,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub change: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shift
// =============================================================================

/// Whether a shift is still taking sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A cashier's shift at one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub user_id: String,
    pub branch_id: String,

    /// Cash float in the drawer at open.
    pub starting_balance: Money,

    pub status: ShiftStatus,

    /// Per-method sales totals as last reported by the backend.
    #[serde(default)]
    pub totals: MethodTotals,

    /// Expected cash in drawer at close.
    pub ending_balance: Option<Money>,

    /// Cash actually counted at close.
    pub actual_balance: Option<Money>,

    /// `actual_balance - ending_balance`.
    pub cash_difference: Option<Money>,

    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,

    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl Shift {
    /// Checks if the shift is open.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_conversions() {
        let rate = Rate::from_percent(11);
        assert_eq!(rate.bps(), 1100);
        assert!((rate.percentage() - 11.0).abs() < 0.001);
        assert_eq!(rate.to_string(), "11%");
        assert_eq!(Rate::from_bps(1250).to_string(), "12.50%");
        assert!(Rate::default().is_zero());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!(PaymentMethod::parse("cash"), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::parse("Bank_Transfer"), PaymentMethod::Transfer);
        assert_eq!(PaymentMethod::parse("debit"), PaymentMethod::Card);
        assert_eq!(PaymentMethod::parse("qris"), PaymentMethod::Qris);
        assert_eq!(PaymentMethod::parse("credit"), PaymentMethod::Credit);
        assert_eq!(PaymentMethod::parse("gift_card"), PaymentMethod::Other);
    }

    #[test]
    fn test_payment_method_serde() {
        let method: PaymentMethod = serde_json::from_str("\"e_wallet\"").unwrap();
        assert_eq!(method, PaymentMethod::Other);
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Transfer).unwrap(),
            "\"transfer\""
        );
    }

    #[test]
    fn test_sale_status_parsing() {
        assert_eq!(SaleStatus::parse("completed"), SaleStatus::Completed);
        assert_eq!(SaleStatus::parse("canceled"), SaleStatus::Cancelled);
        assert_eq!(SaleStatus::parse("pending"), SaleStatus::Pending);
        assert_eq!(SaleStatus::parse("refunded"), SaleStatus::Other);
    }

    #[test]
    fn test_tax_mode_default() {
        assert_eq!(TaxMode::default(), TaxMode::Exclusive);
    }
}
