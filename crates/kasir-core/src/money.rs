//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    180000 * 0.11 = 19799.999999999996  ❌ WRONG!                        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    180000 × 1100 bps / 10000 = 19800   ✔                                │
//! │    Rounding happens exactly once, in one place, half away from zero    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A minor unit is the smallest unit the till handles. For rupiah that is a
//! whole rupiah, for dollars it would be a cent; nothing in this crate cares
//! which.
//!
//! ## Usage
//! ```rust
//! use kasir_core::money::Money;
//!
//! let price = Money::from_minor(100_000);
//! let line = price * 2;
//! assert_eq!(line.minor(), 200_000);
//! assert_eq!(line.to_string(), "200,000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: differences (cash over/short) and an unfloored grand
///   total can legitimately go negative
/// - **Single field tuple struct**: serializes as a bare JSON number
///
/// ## Where Money Flows
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► CartLine.original_price ──► CartLine.current_price  │
/// │                                                        │                │
/// │                                               × quantity = subtotal     │
/// │                                                        │                │
/// │  Σ subtotal ──► + tax + shipping − voucher ──► grand_total ──► change  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::Money;
    ///
    /// let price = Money::from_minor(15_500);
    /// assert_eq!(price.minor(), 15_500);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::Money;
    ///
    /// let unit_price = Money::from_minor(3_500);
    /// assert_eq!(unit_price.multiply_quantity(3).minor(), 10_500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `rate` of this amount, rounded half away from zero.
    ///
    /// Used for both percentage discounts and exclusive tax.
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::Money;
    /// use kasir_core::types::Rate;
    ///
    /// let price = Money::from_minor(100_000);
    /// assert_eq!(price.percentage_of(Rate::from_percent(10)).minor(), 10_000);
    /// ```
    pub fn percentage_of(&self, rate: Rate) -> Money {
        // i128 so large carts cannot overflow the intermediate product
        let scaled = self.0 as i128 * rate.bps() as i128;
        Money::from_minor(div_round_half_away(scaled, 10_000) as i64)
    }

    /// Calculates tax added on top of this amount (exclusive tax).
    ///
    /// ## User Workflow
    /// ```text
    /// Subtotal after item discounts: 180,000
    ///      │
    ///      ▼
    /// calculate_tax(11%) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Tax: 19,800
    /// ```
    #[inline]
    pub fn calculate_tax(&self, rate: Rate) -> Money {
        self.percentage_of(rate)
    }

    /// Extracts the tax already contained in this amount (inclusive tax).
    ///
    /// `tax = amount × rate / (1 + rate)`
    ///
    /// ## Example
    /// ```rust
    /// use kasir_core::money::Money;
    /// use kasir_core::types::Rate;
    ///
    /// let gross = Money::from_minor(111_000);
    /// assert_eq!(gross.extract_tax(Rate::from_percent(11)).minor(), 11_000);
    /// ```
    pub fn extract_tax(&self, rate: Rate) -> Money {
        if rate.is_zero() {
            return Money::zero();
        }
        let scaled = self.0 as i128 * rate.bps() as i128;
        let divisor = 10_000 + rate.bps() as i128;
        Money::from_minor(div_round_half_away(scaled, divisor) as i64)
    }

    /// Returns the smaller of two amounts.
    #[inline]
    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    /// Returns the larger of two amounts.
    #[inline]
    pub fn max(self, other: Money) -> Money {
        Money(self.0.max(other.0))
    }
}

/// Integer division rounding half away from zero.
fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        -((-numerator + half) / denominator)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount with thousands separators: `199,800`.
///
/// ## Note
/// Currency symbol and locale grouping belong to the frontend; this is for
/// logs and error messages.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        if self.0 < 0 {
            write!(f, "-{}", grouped)
        } else {
            write!(f, "{}", grouped)
        }
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
