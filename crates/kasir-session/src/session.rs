//! # Sale Session
//!
//! The cashier's working state between sales: the open shift, the cart,
//! the selected customer and the sale-level adjustments. Every operation
//! either succeeds completely or leaves the session exactly as it was.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Session Lifecycle                                 │
//! │                                                                         │
//! │   resume() ──► active shift? ──yes──┐                                   │
//! │                    │ no             │                                   │
//! │                    ▼                ▼                                   │
//! │   ┌────────┐ start_shift  ┌───────────────────────────────────┐         │
//! │   │ CLOSED │─────────────►│ OPEN                              │         │
//! │   │        │              │  add_product / set_quantity / ... │         │
//! │   │        │              │  finalize ──► Receipt, cart reset │         │
//! │   │        │              │  prepare_end_shift ──► breakdown  │         │
//! │   │        │◄─────────────│  end_shift(actual)                │         │
//! │   └────────┘  end_shift   └───────────────────────────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Finalize Retries
//! Each finalize attempt gets an idempotency key. A provider failure keeps
//! the key, the cart and the inputs, so retrying sends the same key and the
//! backend de-duplicates a sale whose response was lost. Any change to the
//! cart or totals drops the key.

use kasir_core::validation::{validate_amount, validate_page, validate_search_query};
use kasir_core::{
    resolve_payment, Cart, CoreError, Customer, FinalizedSale, LineDiscount, Money,
    PaymentContext, PaymentMethod, PaymentRequest, ProductPage, Product, QuantityChange,
    Receipt, Reconciliation, Sale, SaleAdjustments, SaleContext, SaleTotals, Shift,
    ShiftBreakdown,
};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::provider::{EndShift, Providers, SaleQuery, StartShift};

/// Result of closing a shift.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShiftClosure {
    /// The closed shift as recorded by the Shift Provider.
    pub shift: Shift,
    pub reconciliation: Reconciliation,
    /// Cart lines dropped because the shift closed with items still in it.
    pub discarded_lines: usize,
}

/// The cashier's in-memory sale session.
#[derive(Debug)]
pub struct SaleSession {
    config: SessionConfig,
    providers: Providers,
    shift: Option<Shift>,
    cart: Cart,
    customer: Option<Customer>,
    payment_method: PaymentMethod,
    shipping: Money,
    voucher: Money,
    breakdown: Option<ShiftBreakdown>,
    last_transaction_id: Option<String>,
    pending: Option<PendingAttempt>,
}

/// A finalize attempt that has not succeeded yet. The key is reused only for
/// a retry of the same payment request.
#[derive(Debug, Clone)]
struct PendingAttempt {
    key: Uuid,
    request: PaymentRequest,
}

impl SaleSession {
    /// Creates a closed session. Call [`SaleSession::resume`] to pick up a
    /// shift that is already open on the backend.
    pub fn new(config: SessionConfig, providers: Providers) -> SessionResult<Self> {
        config.validate()?;

        Ok(SaleSession {
            config,
            providers,
            shift: None,
            cart: Cart::new(),
            customer: None,
            payment_method: PaymentMethod::Cash,
            shipping: Money::zero(),
            voucher: Money::zero(),
            breakdown: None,
            last_transaction_id: None,
            pending: None,
        })
    }

    // =========================================================================
    // Read Access
    // =========================================================================

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    pub fn shift(&self) -> Option<&Shift> {
        self.shift.as_ref()
    }

    pub fn is_shift_open(&self) -> bool {
        self.shift.is_some()
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// Selected customer; `None` is a walk-in sale.
    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn shipping(&self) -> Money {
        self.shipping
    }

    pub fn voucher(&self) -> Money {
        self.voucher
    }

    /// Set by `prepare_end_shift`; cleared by `end_shift` or by a new sale.
    pub fn breakdown(&self) -> Option<&ShiftBreakdown> {
        self.breakdown.as_ref()
    }

    pub fn last_transaction_id(&self) -> Option<&str> {
        self.last_transaction_id.as_deref()
    }

    /// Idempotency key of a finalize attempt that has not succeeded yet.
    pub fn pending_idempotency_key(&self) -> Option<Uuid> {
        self.pending.as_ref().map(|attempt| attempt.key)
    }

    pub fn adjustments(&self) -> SaleAdjustments {
        SaleAdjustments {
            shipping: self.shipping,
            voucher: self.voucher,
            ..self.config.base_adjustments()
        }
    }

    /// Totals for the current cart, recomputed on every call.
    pub fn totals(&self) -> SaleTotals {
        SaleTotals::compute(&self.cart, &self.adjustments())
    }

    // =========================================================================
    // Shift Lifecycle
    // =========================================================================

    /// Reflects the backend's active shift, if any.
    ///
    /// Called when the cashier screen loads so a reload never opens a second
    /// shift.
    pub async fn resume(&mut self) -> SessionResult<Option<&Shift>> {
        debug!(branch_id = %self.config.branch_id, "Resuming session");

        let active = self.providers.shifts.get_active().await.map_err(|e| {
            error!(error = %e, "Failed to query active shift");
            e
        })?;

        match active.filter(Shift::is_open) {
            Some(shift) => {
                info!(
                    shift_id = %shift.id,
                    starting_balance = %shift.starting_balance,
                    "Resumed open shift"
                );
                if self.shift.as_ref().map(|s| &s.id) != Some(&shift.id) {
                    self.reset_sale_inputs();
                    self.breakdown = None;
                }
                self.shift = Some(shift);
            }
            None => {
                if let Some(stale) = self.shift.take() {
                    warn!(shift_id = %stale.id, "Local shift is no longer open on the backend");
                    self.reset_sale_inputs();
                    self.breakdown = None;
                }
            }
        }

        Ok(self.shift.as_ref())
    }

    /// Opens a shift with `initial_cash` in the drawer.
    ///
    /// ## Errors
    /// - `ShiftAlreadyOpen` when a shift is open
    /// - `InvalidAmount` for a negative amount
    /// - `Provider` when the Shift Provider refuses; the session stays closed
    pub async fn start_shift(&mut self, initial_cash: Money) -> SessionResult<&Shift> {
        debug!(initial_cash = %initial_cash, "Starting shift");

        if let Some(shift) = &self.shift {
            return Err(CoreError::ShiftAlreadyOpen {
                shift_id: shift.id.clone(),
            }
            .into());
        }
        validate_amount("initial cash", initial_cash)?;

        let request = StartShift {
            branch_id: self.config.branch_id.clone(),
            user_id: self.config.user_id.clone(),
            starting_balance: initial_cash,
        };
        let shift = self.providers.shifts.start(&request).await.map_err(|e| {
            error!(error = %e, "Failed to start shift");
            e
        })?;

        info!(
            shift_id = %shift.id,
            branch_id = %shift.branch_id,
            starting_balance = %shift.starting_balance,
            "Shift started"
        );
        self.reset_sale_inputs();
        self.breakdown = None;
        Ok(&*self.shift.insert(shift))
    }

    /// Summarizes the shift's completed sales and the expected drawer cash.
    ///
    /// Does not change the shift; the breakdown is kept until `end_shift`.
    pub async fn prepare_end_shift(&mut self) -> SessionResult<&ShiftBreakdown> {
        let shift = self.shift.as_ref().ok_or(CoreError::ShiftNotActive)?;
        debug!(shift_id = %shift.id, "Preparing shift breakdown");

        let query = SaleQuery {
            branch_id: self.config.branch_id.clone(),
            shift_id: shift.id.clone(),
        };
        let sales = self.providers.sales.list(&query).await.map_err(|e| {
            error!(error = %e, shift_id = %query.shift_id, "Failed to list shift sales");
            e
        })?;

        let breakdown = ShiftBreakdown::summarize(shift, &sales);
        info!(
            shift_id = %breakdown.shift_id,
            sales = breakdown.sale_count,
            cash = %breakdown.totals.cash,
            expected_cash = %breakdown.expected_cash,
            "Shift breakdown prepared"
        );
        Ok(&*self.breakdown.insert(breakdown))
    }

    /// Closes the shift with the cash counted in the drawer.
    ///
    /// ## Errors
    /// - `ShiftNotActive` / `BreakdownRequired` when called out of order
    /// - `InvalidAmount` for a negative count
    /// - `Provider` when the Shift Provider refuses; the shift stays open
    ///   with its breakdown
    pub async fn end_shift(&mut self, actual_cash: Money) -> SessionResult<ShiftClosure> {
        let shift = self.shift.as_ref().ok_or(CoreError::ShiftNotActive)?;
        debug!(shift_id = %shift.id, actual_cash = %actual_cash, "Ending shift");

        let breakdown = self
            .breakdown
            .as_ref()
            .filter(|b| b.shift_id == shift.id)
            .ok_or(CoreError::BreakdownRequired)?;
        let reconciliation = breakdown.reconcile(actual_cash)?;

        let request = EndShift {
            shift_id: shift.id.clone(),
            ending_balance: reconciliation.expected,
            actual_balance: reconciliation.actual,
            cash_difference: reconciliation.difference,
            totals: breakdown.totals,
            other_total: breakdown.other,
        };
        let closed = self.providers.shifts.end(&request).await.map_err(|e| {
            error!(error = %e, shift_id = %request.shift_id, "Failed to end shift");
            e
        })?;

        let discarded_lines = self.cart.item_count();
        if discarded_lines > 0 {
            warn!(
                shift_id = %closed.id,
                lines = discarded_lines,
                "Shift closed with items in the cart, discarding them"
            );
        }
        info!(
            shift_id = %closed.id,
            expected = %reconciliation.expected,
            actual = %reconciliation.actual,
            difference = %reconciliation.difference,
            "Shift ended"
        );

        self.shift = None;
        self.breakdown = None;
        self.reset_sale_inputs();

        Ok(ShiftClosure {
            shift: closed,
            reconciliation,
            discarded_lines,
        })
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Adds one unit of `product`. Returns the line's new quantity.
    pub fn add_product(&mut self, product: &Product) -> SessionResult<i64> {
        self.require_shift()?;
        let quantity = self.cart.add_product(product)?;
        self.invalidate_attempt();
        Ok(quantity)
    }

    /// Sets a line's quantity; zero or less removes it.
    ///
    /// A quantity above the last known stock is clamped and reported as
    /// [`QuantityChange::Clamped`].
    pub fn set_quantity(&mut self, product_id: &str, quantity: i64) -> SessionResult<QuantityChange> {
        self.require_shift()?;
        let change = self.cart.set_quantity(product_id, quantity)?;
        if let QuantityChange::Clamped { requested, available } = change {
            warn!(product_id, requested, available, "Quantity clamped to available stock");
        }
        self.invalidate_attempt();
        Ok(change)
    }

    /// Removes a line. Returns `false` when it was not in the cart.
    pub fn remove_line(&mut self, product_id: &str) -> SessionResult<bool> {
        self.require_shift()?;
        let removed = self.cart.remove_line(product_id);
        if removed {
            self.invalidate_attempt();
        }
        Ok(removed)
    }

    pub fn apply_line_discount(&mut self, product_id: &str, discount: LineDiscount) -> SessionResult<()> {
        self.require_shift()?;
        self.cart.apply_line_discount(product_id, discount)?;
        self.invalidate_attempt();
        Ok(())
    }

    pub fn clear_line_discount(&mut self, product_id: &str) -> SessionResult<()> {
        self.require_shift()?;
        self.cart.clear_line_discount(product_id)?;
        self.invalidate_attempt();
        Ok(())
    }

    /// Empties the cart and resets the sale inputs.
    pub fn clear_cart(&mut self) {
        debug!(lines = self.cart.item_count(), "Clearing cart");
        self.reset_sale_inputs();
    }

    // =========================================================================
    // Sale Inputs
    // =========================================================================

    pub fn set_shipping(&mut self, amount: Money) -> SessionResult<()> {
        validate_amount("shipping", amount)?;
        if amount != self.shipping {
            self.shipping = amount;
            self.invalidate_attempt();
        }
        Ok(())
    }

    pub fn set_voucher(&mut self, amount: Money) -> SessionResult<()> {
        validate_amount("voucher", amount)?;
        if amount != self.voucher {
            self.voucher = amount;
            self.invalidate_attempt();
        }
        Ok(())
    }

    pub fn select_payment_method(&mut self, method: PaymentMethod) {
        debug!(method = %method, "Payment method selected");
        self.payment_method = method;
    }

    /// Fetches and selects a registered customer.
    pub async fn select_customer(&mut self, customer_id: &str) -> SessionResult<&Customer> {
        debug!(customer_id, "Selecting customer");
        let customer = self.providers.customers.get(customer_id).await.map_err(|e| {
            error!(error = %e, customer_id, "Failed to fetch customer");
            e
        })?;
        Ok(self.set_customer(customer))
    }

    /// Selects an already fetched customer.
    pub fn set_customer(&mut self, customer: Customer) -> &Customer {
        if self.customer.as_ref().map(|c| &c.id) != Some(&customer.id) {
            self.invalidate_attempt();
        }
        self.customer.insert(customer)
    }

    /// Back to a walk-in sale.
    pub fn clear_customer(&mut self) {
        if self.customer.take().is_some() {
            self.invalidate_attempt();
        }
    }

    // =========================================================================
    // Browsing
    // =========================================================================

    pub async fn search_products(&self, query: &str, page: u32) -> SessionResult<ProductPage> {
        search_products(&self.providers, &self.config, query, page).await
    }

    pub async fn search_customers(&self, query: &str) -> SessionResult<Vec<Customer>> {
        search_customers(&self.providers, &self.config, query).await
    }

    /// The sale recorded by the last successful finalize.
    pub async fn last_transaction(&self) -> SessionResult<Option<Sale>> {
        match &self.last_transaction_id {
            Some(id) => self.fetch_sale(id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn fetch_sale(&self, sale_id: &str) -> SessionResult<Sale> {
        debug!(sale_id, "Fetching sale");
        self.providers.sales.get(sale_id).await.map_err(|e| {
            error!(error = %e, sale_id, "Failed to fetch sale");
            e.into()
        })
    }

    // =========================================================================
    // Finalize
    // =========================================================================

    /// Settles the cart with `request` and records the sale.
    ///
    /// ## Flow
    /// ```text
    /// open shift? ─► cart non-empty? ─► resolve payment ─► SalesProvider::create
    ///                                                          │
    ///                           ok ◄───────────────────────────┤
    ///                           │                              └─► error: cart,
    ///                           ▼                                  inputs and key
    ///                Receipt, session reset                        kept for retry
    /// ```
    pub async fn finalize(&mut self, request: PaymentRequest) -> SessionResult<Receipt> {
        let shift_id = self
            .shift
            .as_ref()
            .ok_or(CoreError::ShiftNotActive)?
            .id
            .clone();
        if self.cart.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let totals = self.totals();
        let ctx = PaymentContext {
            customer_id: self.customer.as_ref().map(|c| c.id.as_str()),
            credit_requires_due_date: self.config.credit_requires_due_date,
            bank_accounts: &self.config.bank_accounts,
            selected_method: Some(self.payment_method),
        };
        let payment = resolve_payment(&request, totals.grand_total, &ctx)?;

        let key = self.attempt_key(&request);
        debug!(
            shift_id = %shift_id,
            method = %payment.method,
            grand_total = %totals.grand_total,
            idempotency_key = %key,
            "Finalizing sale"
        );

        let sale = FinalizedSale::build(
            &self.cart,
            &totals,
            payment,
            SaleContext {
                branch_id: self.config.branch_id.clone(),
                shift_id,
                user_id: self.config.user_id.clone(),
                customer_id: self.customer.as_ref().map(|c| c.id.clone()),
                idempotency_key: key.to_string(),
            },
        )?;

        let created = self.providers.sales.create(&sale).await.map_err(|e| {
            error!(
                error = %e,
                idempotency_key = %key,
                "Failed to record sale, cart kept for retry"
            );
            e
        })?;

        let receipt = Receipt::from_finalized(
            &sale,
            created.id.clone(),
            created.invoice_number.clone(),
            self.config.store_name.clone(),
            self.customer.as_ref().map(|c| c.name.as_str()),
        );

        if let Some(shift) = self.shift.as_mut() {
            if !shift.totals.add(sale.payment.method, sale.grand_total()) {
                warn!(sale_id = %created.id, "Sale method has no shift bucket");
            }
        }

        info!(
            sale_id = %created.id,
            method = %sale.payment.method,
            grand_total = %sale.grand_total(),
            change = %sale.payment.change,
            "Sale recorded"
        );

        self.last_transaction_id = Some(created.id);
        self.reset_sale_inputs();
        Ok(receipt)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_shift(&self) -> SessionResult<&Shift> {
        self.shift
            .as_ref()
            .ok_or_else(|| CoreError::ShiftNotActive.into())
    }

    /// Cart or totals changed, so a retry would be a different sale.
    fn invalidate_attempt(&mut self) {
        if let Some(attempt) = self.pending.take() {
            debug!(idempotency_key = %attempt.key, "Sale changed, dropping pending idempotency key");
        }
    }

    /// Key for submitting `request`: the pending key when this is a retry of
    /// the same payment, otherwise a fresh one.
    fn attempt_key(&mut self, request: &PaymentRequest) -> Uuid {
        match &self.pending {
            Some(attempt) if attempt.request == *request => return attempt.key,
            Some(attempt) => warn!(
                idempotency_key = %attempt.key,
                "Payment changed since the failed attempt, using a new idempotency key"
            ),
            None => {}
        }

        let key = Uuid::new_v4();
        self.pending = Some(PendingAttempt {
            key,
            request: request.clone(),
        });
        key
    }

    fn reset_sale_inputs(&mut self) {
        self.cart.clear();
        self.customer = None;
        self.payment_method = PaymentMethod::Cash;
        self.shipping = Money::zero();
        self.voucher = Money::zero();
        self.breakdown = None;
        self.pending = None;
    }
}

// =============================================================================
// Lock-free Browsing
// =============================================================================

/// Catalog search shared by the session and the handle.
pub(crate) async fn search_products(
    providers: &Providers,
    config: &SessionConfig,
    query: &str,
    page: u32,
) -> SessionResult<ProductPage> {
    let query = validate_search_query(query)?;
    validate_page(page)?;
    debug!(query = %query, page, "Searching products");

    providers
        .catalog
        .search(&config.branch_id, &query, page, config.page_size)
        .await
        .map_err(|e| {
            error!(error = %e, query = %query, "Product search failed");
            SessionError::from(e)
        })
}

/// Customer search shared by the session and the handle.
pub(crate) async fn search_customers(
    providers: &Providers,
    config: &SessionConfig,
    query: &str,
) -> SessionResult<Vec<Customer>> {
    let query = validate_search_query(query)?;
    debug!(query = %query, "Searching customers");

    providers
        .customers
        .search(&config.branch_id, &query)
        .await
        .map_err(|e| {
            error!(error = %e, query = %query, "Customer search failed");
            SessionError::from(e)
        })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use kasir_core::{
        BankAccount, PaymentStatus, Rate, SaleStatus, ShiftStatus, TaxMode,
    };

    use super::*;
    use crate::error::{ErrorCode, ProviderError, ProviderErrorKind};
    use crate::memory::{InMemoryBackend, Operation};

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn product(id: &str, price: i64, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            sku: None,
            price: Money::from_minor(price),
            cost: Money::from_minor(price * 7 / 10),
            quantity: stock,
        }
    }

    fn customer(id: &str, name: &str) -> Customer {
        Customer {
            id: id.to_string(),
            name: name.to_string(),
            phone: Some("08123456789".to_string()),
            address: None,
        }
    }

    fn setup() -> (SaleSession, Arc<InMemoryBackend>) {
        init_tracing();
        let backend = Arc::new(
            InMemoryBackend::new()
                .with_products(vec![product("1", 100_000, 10), product("2", 25_000, 3)])
                .with_customers(vec![customer("c-1", "Ibu Rina")]),
        );
        let config = SessionConfig::new("b-1", "u-1")
            .with_tax_rate(Rate::from_percent(11))
            .with_store_name("Toko Maju");
        let session = SaleSession::new(config, Providers::from_backend(backend.clone())).unwrap();
        (session, backend)
    }

    async fn open_session() -> (SaleSession, Arc<InMemoryBackend>) {
        let (mut session, backend) = setup();
        session.start_shift(Money::from_minor(100_000)).await.unwrap();
        (session, backend)
    }

    /// Two units at 100,000 with a 10% line discount: grand total 199,800.
    async fn discounted_session() -> (SaleSession, Arc<InMemoryBackend>) {
        let (mut session, backend) = open_session().await;
        let item = product("1", 100_000, 10);
        session.add_product(&item).unwrap();
        session.add_product(&item).unwrap();
        session
            .apply_line_discount("1", LineDiscount::percentage(Rate::from_percent(10)))
            .unwrap();
        (session, backend)
    }

    fn core_err(err: SessionError) -> CoreError {
        match err {
            SessionError::Core(err) => err,
            other => panic!("expected core error, got {:?}", other),
        }
    }

    // -------------------------------------------------------------------------
    // Shift lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cart_requires_open_shift() {
        let (mut session, _) = setup();

        let err = session.add_product(&product("1", 100_000, 10)).unwrap_err();
        assert_eq!(core_err(err), CoreError::ShiftNotActive);
        assert!(session.cart().is_empty());
    }

    #[tokio::test]
    async fn test_second_start_shift_rejected() {
        let (mut session, backend) = setup();

        let shift = session.start_shift(Money::from_minor(100_000)).await.unwrap();
        assert_eq!(shift.starting_balance, Money::from_minor(100_000));
        assert_eq!(shift.status, ShiftStatus::Open);

        let err = session.start_shift(Money::from_minor(50_000)).await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::ShiftAlreadyOpen { .. }));
        assert_eq!(backend.calls(Operation::StartShift), 1);
        assert_eq!(
            session.shift().unwrap().starting_balance,
            Money::from_minor(100_000)
        );
    }

    #[tokio::test]
    async fn test_start_shift_validates_and_survives_provider_failure() {
        let (mut session, backend) = setup();

        let err = session.start_shift(Money::from_minor(-1)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
        assert_eq!(backend.calls(Operation::StartShift), 0);

        backend.fail_next(Operation::StartShift, ProviderError::unavailable("timeout"));
        let err = session.start_shift(Money::zero()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderUnavailable);
        assert!(!session.is_shift_open());

        session.start_shift(Money::zero()).await.unwrap();
        assert!(session.is_shift_open());
    }

    #[tokio::test]
    async fn test_resume_picks_up_open_shift() {
        let (mut first, backend) = open_session().await;
        let shift_id = first.shift().unwrap().id.clone();

        let mut reloaded =
            SaleSession::new(first.config().clone(), Providers::from_backend(backend.clone()))
                .unwrap();
        let resumed = reloaded.resume().await.unwrap().cloned();
        assert_eq!(resumed.map(|s| s.id), Some(shift_id));

        let err = reloaded.start_shift(Money::zero()).await.unwrap_err();
        assert!(matches!(core_err(err), CoreError::ShiftAlreadyOpen { .. }));

        first.prepare_end_shift().await.unwrap();
        first.end_shift(Money::from_minor(100_000)).await.unwrap();
        assert!(reloaded.resume().await.unwrap().is_none());
        assert_eq!(backend.shifts().len(), 1);
    }

    #[tokio::test]
    async fn test_end_shift_requires_breakdown() {
        let (mut session, backend) = open_session().await;

        let err = session.end_shift(Money::from_minor(100_000)).await.unwrap_err();
        assert_eq!(core_err(err), CoreError::BreakdownRequired);
        assert_eq!(backend.calls(Operation::EndShift), 0);
        assert!(session.is_shift_open());
    }

    #[tokio::test]
    async fn test_end_shift_requires_open_shift() {
        let (mut session, _) = setup();

        let err = session.prepare_end_shift().await.unwrap_err();
        assert_eq!(core_err(err), CoreError::ShiftNotActive);
        let err = session.end_shift(Money::zero()).await.unwrap_err();
        assert_eq!(core_err(err), CoreError::ShiftNotActive);
    }

    #[tokio::test]
    async fn test_shift_breakdown_expected_cash() {
        let (mut session, backend) = open_session().await;
        let shift_id = session.shift().unwrap().id.clone();

        for (id, method, status, amount) in [
            ("s-a", PaymentMethod::Cash, SaleStatus::Completed, 50_000),
            ("s-b", PaymentMethod::Cash, SaleStatus::Completed, 75_000),
            ("s-c", PaymentMethod::Cash, SaleStatus::Cancelled, 30_000),
            ("s-d", PaymentMethod::Qris, SaleStatus::Completed, 20_000),
        ] {
            backend.insert_sale(Sale {
                id: id.to_string(),
                invoice_number: None,
                branch_id: "b-1".to_string(),
                shift_id: Some(shift_id.clone()),
                customer_id: None,
                status,
                payment_method: method,
                total_amount: Money::from_minor(amount),
                amount_paid: Money::from_minor(amount),
                change: Money::zero(),
                created_at: chrono::Utc::now(),
            });
        }

        let breakdown = session.prepare_end_shift().await.unwrap().clone();
        assert_eq!(breakdown.totals.cash, Money::from_minor(125_000));
        assert_eq!(breakdown.totals.qris, Money::from_minor(20_000));
        assert_eq!(breakdown.expected_cash, Money::from_minor(225_000));
        assert!(session.is_shift_open());

        let closure = session.end_shift(Money::from_minor(220_000)).await.unwrap();
        assert_eq!(closure.reconciliation.difference, Money::from_minor(-5_000));
        assert_eq!(closure.shift.status, ShiftStatus::Closed);
        assert_eq!(closure.shift.ending_balance, Some(Money::from_minor(225_000)));
        assert_eq!(closure.shift.actual_balance, Some(Money::from_minor(220_000)));
        assert!(!session.is_shift_open());
        assert!(session.breakdown().is_none());
    }

    #[tokio::test]
    async fn test_end_shift_discards_cart() {
        let (mut session, _) = open_session().await;
        session.add_product(&product("2", 25_000, 3)).unwrap();

        session.prepare_end_shift().await.unwrap();
        let closure = session.end_shift(Money::from_minor(100_000)).await.unwrap();

        assert_eq!(closure.discarded_lines, 1);
        assert!(session.cart().is_empty());
        assert!(!session.is_shift_open());
    }

    #[tokio::test]
    async fn test_end_shift_failure_keeps_shift_open() {
        let (mut session, backend) = open_session().await;
        session.prepare_end_shift().await.unwrap();

        backend.fail_next(Operation::EndShift, ProviderError::rejected("closed elsewhere"));
        let err = session.end_shift(Money::from_minor(100_000)).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::ProviderRejected);
        assert!(session.is_shift_open());
        assert!(session.breakdown().is_some());

        let err = session.end_shift(Money::from_minor(-5)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
        assert_eq!(backend.calls(Operation::EndShift), 1);
    }

    // -------------------------------------------------------------------------
    // Cart and totals
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_totals_scenarios() {
        let (mut session, _) = open_session().await;
        let item = product("1", 100_000, 10);
        session.add_product(&item).unwrap();
        session.add_product(&item).unwrap();

        let totals = session.totals();
        assert_eq!(totals.subtotal, Money::from_minor(200_000));
        assert_eq!(totals.tax, Money::from_minor(22_000));
        assert_eq!(totals.grand_total, Money::from_minor(222_000));

        session
            .apply_line_discount("1", LineDiscount::percentage(Rate::from_percent(10)))
            .unwrap();
        let totals = session.totals();
        assert_eq!(session.cart().line("1").unwrap().current_price(), Money::from_minor(90_000));
        assert_eq!(totals.subtotal, Money::from_minor(180_000));
        assert_eq!(totals.tax, Money::from_minor(19_800));
        assert_eq!(totals.grand_total, Money::from_minor(199_800));
    }

    #[tokio::test]
    async fn test_add_beyond_stock_leaves_cart_unchanged() {
        let (mut session, _) = open_session().await;
        let scarce = product("2", 25_000, 1);
        session.add_product(&scarce).unwrap();

        let err = session.add_product(&scarce).unwrap_err();
        assert!(matches!(core_err(err), CoreError::InsufficientStock { .. }));
        assert_eq!(session.cart().line("2").unwrap().quantity(), 1);
    }

    #[tokio::test]
    async fn test_set_quantity_clamps_to_stock() {
        let (mut session, _) = open_session().await;
        session.add_product(&product("2", 25_000, 3)).unwrap();

        let change = session.set_quantity("2", 5).unwrap();
        assert_eq!(change, QuantityChange::Clamped { requested: 5, available: 3 });
        assert_eq!(session.cart().line("2").unwrap().quantity(), 3);

        assert_eq!(session.set_quantity("2", 0).unwrap(), QuantityChange::Removed);
        assert!(session.cart().is_empty());
    }

    #[tokio::test]
    async fn test_shipping_and_voucher_inputs() {
        let (mut session, _) = open_session().await;
        session.add_product(&product("1", 100_000, 10)).unwrap();

        assert_eq!(
            session.set_voucher(Money::from_minor(-1)).unwrap_err().code(),
            ErrorCode::InvalidAmount
        );
        session.set_shipping(Money::from_minor(15_000)).unwrap();
        session.set_voucher(Money::from_minor(10_000)).unwrap();

        let totals = session.totals();
        assert_eq!(
            totals.grand_total,
            totals.subtotal + totals.tax - totals.voucher_discount + totals.shipping
        );
    }

    #[tokio::test]
    async fn test_inclusive_tax_mode() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = SessionConfig::new("b-1", "u-1")
            .with_tax_rate(Rate::from_percent(11))
            .with_tax_mode(TaxMode::Inclusive);
        let mut session = SaleSession::new(config, Providers::from_backend(backend)).unwrap();
        session.start_shift(Money::zero()).await.unwrap();
        session.add_product(&product("9", 111_000, 1)).unwrap();

        let totals = session.totals();
        assert_eq!(totals.tax, Money::from_minor(11_000));
        assert_eq!(totals.grand_total, Money::from_minor(111_000));
    }

    // -------------------------------------------------------------------------
    // Finalize
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cash_insufficient_never_calls_provider() {
        let (mut session, backend) = discounted_session().await;

        let err = session
            .finalize(PaymentRequest::cash(Money::from_minor(150_000)))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InsufficientPayment);
        assert_eq!(backend.calls(Operation::CreateSale), 0);
        assert_eq!(session.cart().line("1").unwrap().quantity(), 2);
    }

    #[tokio::test]
    async fn test_cash_finalize_with_change() {
        let (mut session, backend) = discounted_session().await;

        let receipt = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap();

        assert_eq!(receipt.change, Money::from_minor(200));
        assert_eq!(receipt.totals.grand_total, Money::from_minor(199_800));
        assert_eq!(receipt.store_name, "Toko Maju");
        assert_eq!(receipt.customer, Receipt::WALK_IN);
        assert_eq!(session.last_transaction_id(), Some(receipt.sale_id.as_str()));
        assert!(session.cart().is_empty());
        assert!(session.pending_idempotency_key().is_none());
        assert_eq!(session.shift().unwrap().totals.cash, Money::from_minor(199_800));

        let created = backend.created_sales();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].items[0].unit_price, Money::from_minor(90_000));

        let sale = session.last_transaction().await.unwrap().unwrap();
        assert_eq!(sale.total_amount, Money::from_minor(199_800));
        assert_eq!(sale.change, Money::from_minor(200));
    }

    #[tokio::test]
    async fn test_finalize_empty_cart() {
        let (mut session, backend) = open_session().await;

        let err = session.finalize(PaymentRequest::cash(Money::zero())).await.unwrap_err();
        assert_eq!(core_err(err), CoreError::EmptyCart);
        assert_eq!(backend.calls(Operation::CreateSale), 0);
    }

    #[tokio::test]
    async fn test_finalize_negative_total_refused() {
        let (mut session, backend) = discounted_session().await;
        session.set_voucher(Money::from_minor(500_000)).unwrap();

        let err = session
            .finalize(PaymentRequest::cash(Money::from_minor(500_000)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NegativeTotal);
        assert_eq!(backend.calls(Operation::CreateSale), 0);
    }

    #[tokio::test]
    async fn test_credit_requires_customer() {
        let (mut session, backend) = discounted_session().await;
        let due = NaiveDate::from_ymd_opt(2026, 11, 30);
        session.select_payment_method(PaymentMethod::Credit);

        let err = session.finalize(PaymentRequest::credit(due)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IncompleteCreditDetails);
        assert_eq!(backend.calls(Operation::CreateSale), 0);

        session.select_customer("c-1").await.unwrap();
        let receipt = session.finalize(PaymentRequest::credit(due)).await.unwrap();

        assert_eq!(receipt.customer, "Ibu Rina");
        assert_eq!(receipt.status, PaymentStatus::Unpaid);
        assert!(receipt.amount_paid.is_zero());
        assert_eq!(receipt.outstanding, Money::from_minor(199_800));
        assert!(session.customer().is_none());
        assert_eq!(backend.created_sales()[0].customer_id.as_deref(), Some("c-1"));
    }

    #[tokio::test]
    async fn test_transfer_requires_known_account() {
        let backend = Arc::new(InMemoryBackend::new());
        let config = SessionConfig::new("b-1", "u-1").with_bank_accounts(vec![BankAccount {
            id: "bca-1".to_string(),
            bank_name: "BCA".to_string(),
            account_number: "1234567890".to_string(),
            account_holder: "Toko Maju".to_string(),
        }]);
        let mut session =
            SaleSession::new(config, Providers::from_backend(backend.clone())).unwrap();
        session.start_shift(Money::zero()).await.unwrap();
        session.add_product(&product("1", 100_000, 10)).unwrap();
        session.select_payment_method(PaymentMethod::Transfer);

        let err = session
            .finalize(PaymentRequest::transfer("bri-2", "TRX-1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::IncompleteBankDetails);

        let receipt = session
            .finalize(PaymentRequest::transfer("bca-1", "TRX-1"))
            .await
            .unwrap();
        assert_eq!(receipt.method, PaymentMethod::Transfer);
        assert_eq!(receipt.amount_paid, Money::from_minor(100_000));
        assert!(receipt.change.is_zero());
        assert_eq!(session.payment_method(), PaymentMethod::Cash);
    }

    #[tokio::test]
    async fn test_request_must_match_selected_method() {
        let (mut session, backend) = discounted_session().await;
        session.select_payment_method(PaymentMethod::Qris);

        let err = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentMethodMismatch);
        assert_eq!(backend.calls(Operation::CreateSale), 0);
        assert!(session.pending_idempotency_key().is_none());

        let receipt = session
            .finalize(PaymentRequest::Qris { reference: Some("QR-9".to_string()) })
            .await
            .unwrap();
        assert_eq!(receipt.method, PaymentMethod::Qris);
        assert_eq!(session.shift().unwrap().totals.qris, Money::from_minor(199_800));
    }

    #[tokio::test]
    async fn test_provider_failure_preserves_cart_and_key() {
        let (mut session, backend) = discounted_session().await;
        backend.fail_next(Operation::CreateSale, ProviderError::unavailable("502 Bad Gateway"));

        let err = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(session.cart().line("1").unwrap().quantity(), 2);
        let key = session.pending_idempotency_key().unwrap();

        session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap();
        assert_eq!(backend.created_sales()[0].idempotency_key, key.to_string());
    }

    #[tokio::test]
    async fn test_lost_response_retry_is_deduplicated() {
        let (mut session, backend) = discounted_session().await;
        backend.drop_next_response(Operation::CreateSale);

        let err = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderUnavailable);

        let receipt = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap();

        assert_eq!(backend.calls(Operation::CreateSale), 2);
        assert_eq!(backend.created_sales().len(), 1);
        assert_eq!(receipt.sale_id, "sale-2");
    }

    #[tokio::test]
    async fn test_cart_change_drops_pending_key() {
        let (mut session, backend) = discounted_session().await;
        backend.fail_next(Operation::CreateSale, ProviderError::unavailable("timeout"));
        let _ = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await;
        assert!(session.pending_idempotency_key().is_some());

        session.add_product(&product("2", 25_000, 3)).unwrap();
        assert!(session.pending_idempotency_key().is_none());
    }

    #[tokio::test]
    async fn test_payment_change_after_lost_response_uses_new_key() {
        let (mut session, backend) = discounted_session().await;
        backend.drop_next_response(Operation::CreateSale);

        let err = session
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        let cash_key = session.pending_idempotency_key().unwrap();

        session.select_payment_method(PaymentMethod::Card);
        let receipt = session
            .finalize(PaymentRequest::Card { reference: Some("EDC-77".to_string()) })
            .await
            .unwrap();

        let created = backend.created_sales();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].idempotency_key, cash_key.to_string());
        assert_ne!(created[1].idempotency_key, cash_key.to_string());
        assert_eq!(created[1].payment.method, PaymentMethod::Card);
        assert_eq!(receipt.method, PaymentMethod::Card);

        let totals = session.shift().unwrap().totals;
        assert_eq!(totals.card, Money::from_minor(199_800));
        assert!(totals.cash.is_zero());
    }

    #[tokio::test]
    async fn test_sale_clears_prepared_breakdown() {
        let (mut session, _) = open_session().await;
        let breakdown = session.prepare_end_shift().await.unwrap();
        assert_eq!(breakdown.expected_cash, Money::from_minor(100_000));

        session.add_product(&product("2", 25_000, 3)).unwrap();
        session.add_product(&product("2", 25_000, 3)).unwrap();
        session
            .finalize(PaymentRequest::cash(Money::from_minor(55_500)))
            .await
            .unwrap();
        assert!(session.breakdown().is_none());

        let err = session.end_shift(Money::from_minor(155_500)).await.unwrap_err();
        assert_eq!(core_err(err), CoreError::BreakdownRequired);

        let breakdown = session.prepare_end_shift().await.unwrap();
        assert_eq!(breakdown.totals.cash, Money::from_minor(55_500));
        assert_eq!(breakdown.expected_cash, Money::from_minor(155_500));
    }

    // -------------------------------------------------------------------------
    // Browsing
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_search_products_validates_query() {
        let (session, backend) = setup();

        let page = session.search_products("  product ", 1).await.unwrap();
        assert_eq!(page.total, 2);

        assert_eq!(
            session.search_products(&"x".repeat(101), 1).await.unwrap_err().code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            session.search_products("", 0).await.unwrap_err().code(),
            ErrorCode::ValidationError
        );
        assert_eq!(backend.calls(Operation::SearchProducts), 1);
    }

    #[tokio::test]
    async fn test_select_unknown_customer() {
        let (mut session, _) = setup();

        let err = session.select_customer("c-404").await.unwrap_err();
        match err {
            SessionError::Provider(e) => assert_eq!(e.kind, ProviderErrorKind::NotFound),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(session.customer().is_none());

        let found = session.search_customers("rina").await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
