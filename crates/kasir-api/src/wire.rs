//! # Wire Format
//!
//! JSON shapes exchanged with the Laravel backend, and their conversion to
//! and from `kasir-core` types.
//!
//! ## Leniency
//! Laravel serializes ids as numbers or strings depending on the model, and
//! `decimal` columns as strings (`"199800.00"`). Every id and amount field
//! here accepts both. Timestamps may be RFC 3339 or `Y-m-d H:i:s` (UTC).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Backend JSON                    DTO              Core type            │
//! │   ────────────                    ───              ─────────            │
//! │   {"id": 7, "price": "15000.00"}  ProductDto  ───► Product              │
//! │   {"id": "c-1", "name": ...}      CustomerDto ───► Customer             │
//! │   {"status": "open", ...}         ShiftDto    ───► Shift                │
//! │   {"invoice_number": ...}         SaleDto     ───► Sale                 │
//! │                                                                         │
//! │   FinalizedSale ──► CreateSaleBody ──► POST /sales                      │
//! │   StartShift    ──► StartShiftBody ──► POST /shifts                     │
//! │   EndShift      ──► EndShiftBody   ──► POST /shifts/{id}/end            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use kasir_core::{
    Customer, DiscountKind, FinalizedLine, FinalizedSale, MethodTotals, Money, PaymentMethod,
    PaymentStatus, Product, Sale, SaleStatus, Shift, ShiftStatus,
};
use kasir_session::{CreatedSale, EndShift, StartShift};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

// =============================================================================
// Lenient Field Parsers
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Int(i64),
    Float(f64),
    Text(String),
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match RawScalar::deserialize(deserializer)? {
        RawScalar::Int(n) => Ok(n.to_string()),
        RawScalar::Text(s) if !s.trim().is_empty() => Ok(s),
        RawScalar::Text(_) => Err(de::Error::custom("empty id")),
        RawScalar::Float(f) => Err(de::Error::custom(format!("non-integer id {}", f))),
    }
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<RawScalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawScalar::Int(n)) => Ok(Some(n.to_string())),
        Some(RawScalar::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawScalar::Text(s)) => Ok(Some(s)),
        Some(RawScalar::Float(f)) => Err(de::Error::custom(format!("non-integer id {}", f))),
    }
}

/// Parses a decimal string into whole minor units, rounding half away from
/// zero at the first fractional digit.
pub(crate) fn parse_decimal(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    if fraction.chars().next().is_some_and(|c| c >= '5') {
        value = value.checked_add(1)?;
    }
    Some(if negative { -value } else { value })
}

fn money_from_raw<E: de::Error>(raw: RawScalar) -> Result<Money, E> {
    match raw {
        RawScalar::Int(n) => Ok(Money::from_minor(n)),
        RawScalar::Float(f) if f.is_finite() => Ok(Money::from_minor(f.round() as i64)),
        RawScalar::Float(f) => Err(E::custom(format!("invalid amount {}", f))),
        RawScalar::Text(s) => parse_decimal(&s)
            .map(Money::from_minor)
            .ok_or_else(|| E::custom(format!("invalid amount {:?}", s))),
    }
}

fn de_money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
    money_from_raw(RawScalar::deserialize(deserializer)?)
}

fn de_opt_money<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Money>, D::Error> {
    Option::<RawScalar>::deserialize(deserializer)?
        .map(money_from_raw)
        .transpose()
}

fn de_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match RawScalar::deserialize(deserializer)? {
        RawScalar::Int(n) => Ok(n),
        RawScalar::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
        RawScalar::Text(s) => parse_decimal(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid quantity {:?}", s))),
        RawScalar::Float(f) => Err(de::Error::custom(format!("invalid quantity {}", f))),
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp {:?}", raw)))
}

fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp {:?}", raw))),
    }
}

// =============================================================================
// Catalog and Customers
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDto {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(alias = "selling_price", deserialize_with = "de_money")]
    pub price: Money,
    #[serde(
        default,
        alias = "cost_price",
        alias = "purchase_price",
        deserialize_with = "de_opt_money"
    )]
    pub cost: Option<Money>,
    #[serde(default, alias = "stock", deserialize_with = "de_quantity_or_zero")]
    pub quantity: i64,
}

fn de_quantity_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    struct Wrap(#[serde(deserialize_with = "de_quantity")] i64);
    Ok(Option::<Wrap>::deserialize(deserializer)?.map_or(0, |w| w.0))
}

impl From<ProductDto> for Product {
    fn from(dto: ProductDto) -> Self {
        Product {
            id: dto.id,
            name: dto.name,
            sku: dto.sku.filter(|s| !s.trim().is_empty()),
            price: dto.price,
            cost: dto.cost.unwrap_or_default(),
            quantity: dto.quantity,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDto {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl From<CustomerDto> for Customer {
    fn from(dto: CustomerDto) -> Self {
        Customer {
            id: dto.id,
            name: dto.name,
            phone: dto.phone,
            address: dto.address,
        }
    }
}

// =============================================================================
// Shifts
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ShiftDto {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub user_id: String,
    #[serde(deserialize_with = "de_id")]
    pub branch_id: String,
    #[serde(alias = "initial_cash", alias = "opening_balance", deserialize_with = "de_money")]
    pub starting_balance: Money,
    pub status: String,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub cash_total: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub card_total: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub transfer_total: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub qris_total: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub credit_total: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub ending_balance: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub actual_balance: Option<Money>,
    #[serde(default, deserialize_with = "de_opt_money")]
    pub cash_difference: Option<Money>,
    #[serde(alias = "started_at", alias = "created_at", deserialize_with = "de_timestamp")]
    pub opened_at: DateTime<Utc>,
    #[serde(default, alias = "ended_at", deserialize_with = "de_opt_timestamp")]
    pub closed_at: Option<DateTime<Utc>>,
}

fn parse_shift_status(raw: &str) -> ShiftStatus {
    match raw.trim().to_lowercase().as_str() {
        "open" | "active" | "opened" => ShiftStatus::Open,
        _ => ShiftStatus::Closed,
    }
}

impl From<ShiftDto> for Shift {
    fn from(dto: ShiftDto) -> Self {
        Shift {
            id: dto.id,
            user_id: dto.user_id,
            branch_id: dto.branch_id,
            starting_balance: dto.starting_balance,
            status: parse_shift_status(&dto.status),
            totals: MethodTotals {
                cash: dto.cash_total.unwrap_or_default(),
                card: dto.card_total.unwrap_or_default(),
                transfer: dto.transfer_total.unwrap_or_default(),
                qris: dto.qris_total.unwrap_or_default(),
                credit: dto.credit_total.unwrap_or_default(),
            },
            ending_balance: dto.ending_balance,
            actual_balance: dto.actual_balance,
            cash_difference: dto.cash_difference,
            opened_at: dto.opened_at,
            closed_at: dto.closed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartShiftBody<'a> {
    pub branch_id: &'a str,
    pub user_id: &'a str,
    pub starting_balance: Money,
}

impl<'a> From<&'a StartShift> for StartShiftBody<'a> {
    fn from(request: &'a StartShift) -> Self {
        StartShiftBody {
            branch_id: &request.branch_id,
            user_id: &request.user_id,
            starting_balance: request.starting_balance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndShiftBody {
    pub ending_balance: Money,
    pub actual_balance: Money,
    pub cash_difference: Money,
    pub cash_total: Money,
    pub card_total: Money,
    pub transfer_total: Money,
    pub qris_total: Money,
    pub credit_total: Money,
    pub other_total: Money,
}

impl From<&EndShift> for EndShiftBody {
    fn from(request: &EndShift) -> Self {
        EndShiftBody {
            ending_balance: request.ending_balance,
            actual_balance: request.actual_balance,
            cash_difference: request.cash_difference,
            cash_total: request.totals.cash,
            card_total: request.totals.card,
            transfer_total: request.totals.transfer,
            qris_total: request.totals.qris,
            credit_total: request.totals.credit,
            other_total: request.other_total,
        }
    }
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SaleDto {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(deserialize_with = "de_id")]
    pub branch_id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub shift_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub customer_id: Option<String>,
    /// Absent or null when the backend omits it; read as
    /// [`SaleStatus::Other`] so the sale is not counted as completed.
    #[serde(default)]
    pub status: Option<SaleStatus>,
    pub payment_method: PaymentMethod,
    #[serde(alias = "total", alias = "grand_total", deserialize_with = "de_money")]
    pub total_amount: Money,
    #[serde(default, alias = "paid_amount", deserialize_with = "de_opt_money")]
    pub amount_paid: Option<Money>,
    #[serde(default, alias = "change_amount", deserialize_with = "de_opt_money")]
    pub change: Option<Money>,
    #[serde(deserialize_with = "de_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl From<SaleDto> for Sale {
    fn from(dto: SaleDto) -> Self {
        Sale {
            id: dto.id,
            invoice_number: dto.invoice_number,
            branch_id: dto.branch_id,
            shift_id: dto.shift_id,
            customer_id: dto.customer_id,
            status: dto.status.unwrap_or(SaleStatus::Other),
            payment_method: dto.payment_method,
            total_amount: dto.total_amount,
            amount_paid: dto.amount_paid.unwrap_or_default(),
            change: dto.change.unwrap_or_default(),
            created_at: dto.created_at,
        }
    }
}

/// Response to `POST /sales`; only the identifiers are needed.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSaleDto {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub invoice_number: Option<String>,
}

impl From<CreatedSaleDto> for CreatedSale {
    fn from(dto: CreatedSaleDto) -> Self {
        CreatedSale {
            id: dto.id,
            invoice_number: dto.invoice_number,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleItemBody<'a> {
    pub product_id: &'a str,
    pub quantity: i64,
    pub original_price: Money,
    pub price: Money,
    pub discount_type: DiscountKind,
    pub discount_amount: Money,
    pub cost_price: Money,
    pub subtotal: Money,
}

impl<'a> From<&'a FinalizedLine> for SaleItemBody<'a> {
    fn from(line: &'a FinalizedLine) -> Self {
        SaleItemBody {
            product_id: &line.product_id,
            quantity: line.quantity,
            original_price: line.original_price,
            price: line.unit_price,
            discount_type: line.discount.kind(),
            discount_amount: line.discount_amount,
            cost_price: line.cost_price,
            subtotal: line.subtotal,
        }
    }
}

/// Body of `POST /sales`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSaleBody<'a> {
    pub branch_id: &'a str,
    pub shift_id: &'a str,
    pub user_id: &'a str,
    pub customer_id: Option<&'a str>,
    pub customer_name: Option<&'a str>,
    pub items: Vec<SaleItemBody<'a>>,
    pub subtotal: Money,
    pub discount: Money,
    pub voucher_discount: Money,
    pub tax: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
    pub total_cost: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub amount_paid: Money,
    pub change: Money,
    pub outstanding: Money,
    pub bank_account_id: Option<&'a str>,
    pub reference_number: Option<&'a str>,
    pub due_date: Option<NaiveDate>,
    pub idempotency_key: &'a str,
}

impl<'a> From<&'a FinalizedSale> for CreateSaleBody<'a> {
    fn from(sale: &'a FinalizedSale) -> Self {
        let payment = &sale.payment;
        CreateSaleBody {
            branch_id: &sale.branch_id,
            shift_id: &sale.shift_id,
            user_id: &sale.user_id,
            customer_id: sale.customer_id.as_deref(),
            customer_name: payment.walk_in_name.as_deref(),
            items: sale.items.iter().map(SaleItemBody::from).collect(),
            subtotal: sale.totals.subtotal,
            discount: sale.totals.total_item_discount,
            voucher_discount: sale.totals.voucher_discount,
            tax: sale.totals.tax,
            shipping_cost: sale.totals.shipping,
            total_amount: sale.totals.grand_total,
            total_cost: sale.totals.total_cost,
            payment_method: payment.method,
            payment_status: payment.status,
            amount_paid: payment.amount_paid,
            change: payment.change,
            outstanding: payment.outstanding,
            bank_account_id: payment.bank_account_id.as_deref(),
            reference_number: payment.reference.as_deref(),
            due_date: payment.due_date,
            idempotency_key: &sale.idempotency_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("199800.00"), Some(199_800));
        assert_eq!(parse_decimal("15000"), Some(15_000));
        assert_eq!(parse_decimal("2499.50"), Some(2_500));
        assert_eq!(parse_decimal("2499.49"), Some(2_499));
        assert_eq!(parse_decimal("-10000.5"), Some(-10_001));
        assert_eq!(parse_decimal(".7"), Some(1));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("12a"), None);
        assert_eq!(parse_decimal("1.2.3"), None);
    }

    #[test]
    fn test_product_from_laravel_shape() {
        let dto: ProductDto = serde_json::from_value(json!({
            "id": 42,
            "name": "Minyak Goreng 2L",
            "sku": "",
            "selling_price": "34500.00",
            "purchase_price": 29000,
            "stock": "12"
        }))
        .unwrap();
        let product = Product::from(dto);

        assert_eq!(product.id, "42");
        assert_eq!(product.sku, None);
        assert_eq!(product.price, Money::from_minor(34_500));
        assert_eq!(product.cost, Money::from_minor(29_000));
        assert_eq!(product.quantity, 12);
    }

    #[test]
    fn test_product_without_cost_or_stock() {
        let dto: ProductDto = serde_json::from_value(json!({
            "id": "p-1",
            "name": "Gula",
            "price": 16000,
            "stock": null
        }))
        .unwrap();
        let product = Product::from(dto);

        assert_eq!(product.cost, Money::zero());
        assert_eq!(product.quantity, 0);
        assert!(!product.in_stock());
    }

    #[test]
    fn test_shift_status_and_timestamps() {
        let dto: ShiftDto = serde_json::from_value(json!({
            "id": 3,
            "user_id": 9,
            "branch_id": "1",
            "initial_cash": "100000.00",
            "status": "active",
            "cash_total": "120000.00",
            "card_total": null,
            "created_at": "2026-10-19 08:00:00",
            "closed_at": null
        }))
        .unwrap();
        let shift = Shift::from(dto);

        assert!(shift.is_open());
        assert_eq!(shift.id, "3");
        assert_eq!(shift.starting_balance, Money::from_minor(100_000));
        assert_eq!(shift.totals.cash, Money::from_minor(120_000));
        assert_eq!(shift.totals.card, Money::zero());
        assert_eq!(shift.opened_at.to_rfc3339(), "2026-10-19T08:00:00+00:00");
        assert_eq!(shift.closed_at, None);
    }

    #[test]
    fn test_sale_with_unknown_method() {
        let dto: SaleDto = serde_json::from_value(json!({
            "id": 101,
            "invoice_number": "INV-00101",
            "branch_id": 1,
            "shift_id": 3,
            "customer_id": null,
            "status": "completed",
            "payment_method": "voucher_only",
            "total_amount": "50000.00",
            "paid_amount": "50000.00",
            "created_at": "2026-10-19T09:15:00.000000Z"
        }))
        .unwrap();
        let sale = Sale::from(dto);

        assert_eq!(sale.payment_method, PaymentMethod::Other);
        assert_eq!(sale.shift_id.as_deref(), Some("3"));
        assert_eq!(sale.change, Money::zero());
        assert_eq!(sale.status, SaleStatus::Completed);
    }

    #[test]
    fn test_sale_without_status_is_not_completed() {
        let base = json!({
            "id": 102,
            "branch_id": 1,
            "shift_id": 3,
            "payment_method": "cash",
            "total_amount": 75000,
            "created_at": "2026-10-19T09:20:00Z"
        });
        let missing: SaleDto = serde_json::from_value(base.clone()).unwrap();
        assert_eq!(Sale::from(missing).status, SaleStatus::Other);

        let mut with_null = base;
        with_null["status"] = json!(null);
        let null: SaleDto = serde_json::from_value(with_null).unwrap();
        assert_eq!(Sale::from(null).status, SaleStatus::Other);
    }

    #[test]
    fn test_rejects_bad_amount() {
        let result: Result<ProductDto, _> = serde_json::from_value(json!({
            "id": 1,
            "name": "X",
            "price": "abc"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_end_shift_body_flattens_totals() {
        let request = EndShift {
            shift_id: "s-1".to_string(),
            ending_balance: Money::from_minor(225_000),
            actual_balance: Money::from_minor(220_000),
            cash_difference: Money::from_minor(-5_000),
            totals: MethodTotals {
                cash: Money::from_minor(125_000),
                ..MethodTotals::default()
            },
            other_total: Money::zero(),
        };
        let body = serde_json::to_value(EndShiftBody::from(&request)).unwrap();

        assert_eq!(body["cash_total"], json!(125_000));
        assert_eq!(body["cash_difference"], json!(-5_000));
        assert!(body.get("shift_id").is_none());
    }
}
