//! # kasir-core: Pure Sale Session Math
//!
//! This crate holds the calculations behind the cashier screen. Every
//! function is deterministic and free of I/O, so the whole checkout can be
//! exercised without a backend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kasir POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Cashier Frontend (React)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            kasir-session (SaleSession, providers)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kasir-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌────────┐ ┌────────┐ ┌────────┐ ┌─────────┐ ┌───────────┐   │   │
//! │  │   │ money  │ │  cart  │ │ totals │ │ payment │ │   shift   │   │   │
//! │  │   │ Money  │ │CartLine│ │  tax   │ │ cash/tf │ │ breakdown │   │   │
//! │  │   │  Rate  │ │discount│ │voucher │ │ credit  │ │ reconcile │   │   │
//! │  │   └────────┘ └────────┘ └────────┘ └─────────┘ └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer money in the smallest currency unit
//! - [`types`] - Reference data (Product, Customer, Shift, Sale) and `Rate`
//! - [`cart`] - Cart lines, stock rules, per-line discounts
//! - [`totals`] - Derived subtotal / tax / grand total
//! - [`payment`] - Cash, transfer and credit payment resolution
//! - [`checkout`] - The finalized sale request and its receipt view
//! - [`shift`] - Shift-end breakdown and cash reconciliation
//! - [`validation`] - Input checks shared by the layers above
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use kasir_core::money::Money;
//! use kasir_core::types::Rate;
//!
//! let subtotal = Money::from_minor(200_000);
//! let tax = subtotal.calculate_tax(Rate::from_percent(11));
//! assert_eq!(tax.minor(), 22_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod checkout;
pub mod error;
pub mod money;
pub mod payment;
pub mod shift;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, DiscountKind, LineDiscount, QuantityChange};
pub use checkout::{FinalizedLine, FinalizedSale, Receipt, SaleContext};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payment::{
    resolve_payment, PaymentContext, PaymentRequest, PaymentResolution, PaymentStatus,
};
pub use shift::{MethodTotals, Reconciliation, ShiftBreakdown};
pub use totals::{SaleAdjustments, SaleTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum length of a catalog or customer search query.
pub const MAX_SEARCH_QUERY_LEN: usize = 100;
