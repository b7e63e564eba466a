//! # Session Handle
//!
//! Shares one [`SaleSession`] between the tasks serving the cashier screen.
//!
//! ## Thread Safety
//! The session sits behind `Arc<tokio::sync::Mutex<_>>` so only one
//! mutation runs at a time. Start shift, end shift and finalize also take a
//! processing flag: a second such request while one is in flight is refused
//! with `AlreadyProcessing` instead of queueing behind the first.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SessionHandle Operations                           │
//! │                                                                         │
//! │  Frontend Action          Handle Method            Lock / Flag          │
//! │  ───────────────          ─────────────            ───────────          │
//! │                                                                         │
//! │  Type in search ────────► search_products() ─────► none (providers)     │
//! │                                                                         │
//! │  Click product ─────────► add_product() ─────────► mutex                │
//! │                                                                         │
//! │  Pay ───────────────────► finalize() ────────────► flag + mutex         │
//! │                                                                         │
//! │  Double-click Pay ──────► finalize() ────────────► AlreadyProcessing    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kasir_core::validation::parse_amount;
use kasir_core::{
    Customer, LineDiscount, Money, PaymentMethod, PaymentRequest, Product, ProductPage,
    QuantityChange, Receipt, Sale, SaleTotals, Shift, ShiftBreakdown,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::provider::Providers;
use crate::session::{self, SaleSession, ShiftClosure};

/// Clears the processing flag when the guarded request finishes, including
/// when its future is dropped.
struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl ProcessingGuard {
    fn acquire(flag: &Arc<AtomicBool>, operation: &'static str) -> SessionResult<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(operation, "Request refused, another one is in flight");
            return Err(SessionError::AlreadyProcessing);
        }
        Ok(ProcessingGuard { flag: flag.clone() })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Cloneable handle to a shared session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<SaleSession>>,
    processing: Arc<AtomicBool>,
    providers: Providers,
    config: Arc<SessionConfig>,
}

impl SessionHandle {
    pub fn new(session: SaleSession) -> Self {
        let providers = session.providers().clone();
        let config = Arc::new(session.config().clone());
        SessionHandle {
            session: Arc::new(Mutex::new(session)),
            processing: Arc::new(AtomicBool::new(false)),
            providers,
            config,
        }
    }

    /// Builds the session and resumes any open shift.
    pub async fn open(config: SessionConfig, providers: Providers) -> SessionResult<Self> {
        let mut session = SaleSession::new(config, providers)?;
        session.resume().await?;
        Ok(Self::new(session))
    }

    /// Whether a start/end/finalize request is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Runs `f` with exclusive access to the session.
    pub async fn with_session<R>(&self, f: impl FnOnce(&mut SaleSession) -> R) -> R {
        let mut session = self.session.lock().await;
        f(&mut *session)
    }

    // =========================================================================
    // Guarded Requests
    // =========================================================================

    pub async fn resume(&self) -> SessionResult<Option<Shift>> {
        let _guard = ProcessingGuard::acquire(&self.processing, "resume")?;
        let mut session = self.session.lock().await;
        Ok(session.resume().await?.cloned())
    }

    pub async fn start_shift(&self, initial_cash: Money) -> SessionResult<Shift> {
        let _guard = ProcessingGuard::acquire(&self.processing, "start_shift")?;
        let mut session = self.session.lock().await;
        session.start_shift(initial_cash).await.cloned()
    }

    pub async fn prepare_end_shift(&self) -> SessionResult<ShiftBreakdown> {
        let _guard = ProcessingGuard::acquire(&self.processing, "prepare_end_shift")?;
        let mut session = self.session.lock().await;
        session.prepare_end_shift().await.cloned()
    }

    pub async fn end_shift(&self, actual_cash: Money) -> SessionResult<ShiftClosure> {
        let _guard = ProcessingGuard::acquire(&self.processing, "end_shift")?;
        let mut session = self.session.lock().await;
        session.end_shift(actual_cash).await
    }

    /// [`SessionHandle::start_shift`] with the amount as typed in the cash
    /// field, e.g. `"100.000"`.
    pub async fn start_shift_from_input(&self, initial_cash: &str) -> SessionResult<Shift> {
        let amount = parse_amount("initial cash", initial_cash)?;
        self.start_shift(amount).await
    }

    /// [`SessionHandle::end_shift`] with the counted cash as typed.
    pub async fn end_shift_from_input(&self, actual_cash: &str) -> SessionResult<ShiftClosure> {
        let amount = parse_amount("actual cash", actual_cash)?;
        self.end_shift(amount).await
    }

    pub async fn finalize(&self, request: PaymentRequest) -> SessionResult<Receipt> {
        let _guard = ProcessingGuard::acquire(&self.processing, "finalize")?;
        let mut session = self.session.lock().await;
        session.finalize(request).await
    }

    // =========================================================================
    // Cart and Inputs
    // =========================================================================

    pub async fn add_product(&self, product: &Product) -> SessionResult<i64> {
        self.session.lock().await.add_product(product)
    }

    pub async fn set_quantity(&self, product_id: &str, quantity: i64) -> SessionResult<QuantityChange> {
        self.session.lock().await.set_quantity(product_id, quantity)
    }

    pub async fn remove_line(&self, product_id: &str) -> SessionResult<bool> {
        self.session.lock().await.remove_line(product_id)
    }

    pub async fn apply_line_discount(&self, product_id: &str, discount: LineDiscount) -> SessionResult<()> {
        self.session.lock().await.apply_line_discount(product_id, discount)
    }

    pub async fn clear_line_discount(&self, product_id: &str) -> SessionResult<()> {
        self.session.lock().await.clear_line_discount(product_id)
    }

    pub async fn set_shipping(&self, amount: Money) -> SessionResult<()> {
        self.session.lock().await.set_shipping(amount)
    }

    pub async fn set_voucher(&self, amount: Money) -> SessionResult<()> {
        self.session.lock().await.set_voucher(amount)
    }

    pub async fn select_payment_method(&self, method: PaymentMethod) {
        self.session.lock().await.select_payment_method(method)
    }

    pub async fn totals(&self) -> SaleTotals {
        self.session.lock().await.totals()
    }

    /// Fetches the customer without holding the lock, then selects it.
    pub async fn select_customer(&self, customer_id: &str) -> SessionResult<Customer> {
        let customer = self.providers.customers.get(customer_id).await?;
        let mut session = self.session.lock().await;
        Ok(session.set_customer(customer).clone())
    }

    pub async fn clear_customer(&self) {
        self.session.lock().await.clear_customer()
    }

    // =========================================================================
    // Browsing (no lock)
    // =========================================================================

    pub async fn search_products(&self, query: &str, page: u32) -> SessionResult<ProductPage> {
        session::search_products(&self.providers, &self.config, query, page).await
    }

    pub async fn search_customers(&self, query: &str) -> SessionResult<Vec<Customer>> {
        session::search_customers(&self.providers, &self.config, query).await
    }

    pub async fn fetch_sale(&self, sale_id: &str) -> SessionResult<Sale> {
        Ok(self.providers.sales.get(sale_id).await?)
    }

    pub async fn last_transaction(&self) -> SessionResult<Option<Sale>> {
        let id = self
            .with_session(|s| s.last_transaction_id().map(str::to_string))
            .await;
        match id {
            Some(id) => self.fetch_sale(&id).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ProviderError};
    use crate::memory::{InMemoryBackend, Operation};

    fn product() -> Product {
        Product {
            id: "1".to_string(),
            name: "Beras 5kg".to_string(),
            sku: Some("BRS-5".to_string()),
            price: Money::from_minor(75_000),
            cost: Money::from_minor(60_000),
            quantity: 10,
        }
    }

    async fn handle() -> (SessionHandle, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new().with_products(vec![product()]));
        let handle = SessionHandle::open(
            SessionConfig::new("b-1", "u-1"),
            Providers::from_backend(backend.clone()),
        )
        .await
        .unwrap();
        (handle, backend)
    }

    #[tokio::test]
    async fn test_guard_refuses_concurrent_request() {
        let (handle, backend) = handle().await;
        handle.start_shift(Money::zero()).await.unwrap();
        handle.add_product(&product()).await.unwrap();

        let _held = ProcessingGuard::acquire(&handle.processing, "test").unwrap();
        let err = handle
            .finalize(PaymentRequest::cash(Money::from_minor(75_000)))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::AlreadyProcessing);
        assert_eq!(backend.calls(Operation::CreateSale), 0);
    }

    #[tokio::test]
    async fn test_guard_released_after_failure() {
        let (handle, backend) = handle().await;
        backend.fail_next(Operation::StartShift, ProviderError::unavailable("down"));

        assert!(handle.start_shift(Money::zero()).await.is_err());
        assert!(!handle.is_processing());

        let shift = handle.start_shift(Money::from_minor(50_000)).await.unwrap();
        assert_eq!(shift.starting_balance, Money::from_minor(50_000));
    }

    #[tokio::test]
    async fn test_browsing_does_not_wait_for_session_lock() {
        let (handle, _) = handle().await;

        let locked = handle.session.lock().await;
        let page = handle.search_products("beras", 1).await.unwrap();
        drop(locked);

        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_full_sale_through_handle() {
        let (handle, _) = handle().await;
        handle.start_shift(Money::from_minor(100_000)).await.unwrap();
        handle.add_product(&product()).await.unwrap();
        handle.set_quantity("1", 2).await.unwrap();

        let receipt = handle
            .finalize(PaymentRequest::cash(Money::from_minor(200_000)))
            .await
            .unwrap();
        assert_eq!(receipt.change, Money::from_minor(50_000));

        let sale = handle.last_transaction().await.unwrap().unwrap();
        assert_eq!(sale.id, receipt.sale_id);

        let breakdown = handle.prepare_end_shift().await.unwrap();
        assert_eq!(breakdown.expected_cash, Money::from_minor(250_000));

        let closure = handle.end_shift(Money::from_minor(250_000)).await.unwrap();
        assert!(closure.reconciliation.is_balanced());
    }

    #[tokio::test]
    async fn test_shift_amounts_from_typed_input() {
        let (handle, backend) = handle().await;

        let err = handle.start_shift_from_input("seratus ribu").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
        assert_eq!(backend.calls(Operation::StartShift), 0);
        assert!(!handle.is_processing());

        let shift = handle.start_shift_from_input(" 100.000 ").await.unwrap();
        assert_eq!(shift.starting_balance, Money::from_minor(100_000));

        handle.prepare_end_shift().await.unwrap();
        let err = handle.end_shift_from_input("-5.000").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);

        let closure = handle.end_shift_from_input("95,000").await.unwrap();
        assert_eq!(closure.reconciliation.difference, Money::from_minor(-5_000));
    }
}
