//! # In-Memory Backend
//!
//! Implements all four providers against plain vectors. Used by the session
//! tests and for running the cashier screen without a backend.
//!
//! ## Failure Injection
//! ```text
//! fail_next(Operation::CreateSale, err)     call fails, nothing recorded
//! drop_next_response(Operation::CreateSale) call is recorded, caller sees
//!                                           Unavailable (lost response)
//! calls(Operation::CreateSale)              how many times it was invoked
//! ```
//!
//! Sale creation honours idempotency keys the way the real backend does:
//! a repeated key returns the original sale.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use kasir_core::{
    Customer, FinalizedSale, MethodTotals, Product, ProductPage, Sale, SaleStatus, Shift,
    ShiftStatus,
};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    CatalogProvider, CreatedSale, CustomerProvider, EndShift, SaleQuery, SalesProvider,
    ShiftProvider, StartShift,
};

/// A provider call, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SearchProducts,
    SearchCustomers,
    GetCustomer,
    ActiveShift,
    StartShift,
    EndShift,
    CreateSale,
    ListSales,
    GetSale,
}

#[derive(Debug, Default)]
struct BackendState {
    products: Vec<Product>,
    customers: Vec<Customer>,
    shifts: Vec<Shift>,
    sales: Vec<Sale>,
    created: Vec<FinalizedSale>,
    by_idempotency_key: HashMap<String, CreatedSale>,
    fail_next: HashMap<Operation, ProviderError>,
    drop_response: HashMap<Operation, ProviderError>,
    calls: HashMap<Operation, usize>,
    next_id: u64,
}

impl BackendState {
    /// Counts the call and returns the injected failure, if any.
    fn enter(&mut self, op: Operation) -> ProviderResult<()> {
        *self.calls.entry(op).or_default() += 1;
        match self.fail_next.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns the injected lost-response failure, if any.
    fn leave<T>(&mut self, op: Operation, value: T) -> ProviderResult<T> {
        match self.drop_response.remove(&op) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// All four providers backed by memory.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        self.lock().products = products;
        self
    }

    pub fn with_customers(self, customers: Vec<Customer>) -> Self {
        self.lock().customers = customers;
        self
    }

    /// Seeds a sale as if it had been recorded earlier.
    pub fn insert_sale(&self, sale: Sale) {
        self.lock().sales.push(sale);
    }

    /// Seeds an open shift as if it had been started on another device.
    pub fn insert_shift(&self, shift: Shift) {
        self.lock().shifts.push(shift);
    }

    /// Makes the next call to `op` fail with `err` before doing anything.
    pub fn fail_next(&self, op: Operation, err: ProviderError) {
        self.lock().fail_next.insert(op, err);
    }

    /// Makes the next call to `op` take effect but report a lost response.
    pub fn drop_next_response(&self, op: Operation) {
        self.lock()
            .drop_response
            .insert(op, ProviderError::unavailable("connection reset"));
    }

    /// Number of times `op` was called.
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Every sale request accepted so far.
    pub fn created_sales(&self) -> Vec<FinalizedSale> {
        self.lock().created.clone()
    }

    /// Every shift ever started, in order.
    pub fn shifts(&self) -> Vec<Shift> {
        self.lock().shifts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl CatalogProvider for InMemoryBackend {
    async fn search(
        &self,
        _branch_id: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> ProviderResult<ProductPage> {
        let mut state = self.lock();
        state.enter(Operation::SearchProducts)?;

        let matches: Vec<&Product> = state
            .products
            .iter()
            .filter(|p| {
                query.is_empty()
                    || contains_ignore_case(&p.name, query)
                    || p.sku.as_deref().is_some_and(|sku| contains_ignore_case(sku, query))
            })
            .collect();

        let skip = page.saturating_sub(1) as usize * page_size as usize;
        let page = ProductPage {
            total: matches.len() as u64,
            items: matches
                .into_iter()
                .skip(skip)
                .take(page_size as usize)
                .cloned()
                .collect(),
        };
        state.leave(Operation::SearchProducts, page)
    }
}

#[async_trait]
impl CustomerProvider for InMemoryBackend {
    async fn search(&self, _branch_id: &str, query: &str) -> ProviderResult<Vec<Customer>> {
        let mut state = self.lock();
        state.enter(Operation::SearchCustomers)?;

        let found = state
            .customers
            .iter()
            .filter(|c| {
                query.is_empty()
                    || contains_ignore_case(&c.name, query)
                    || c.phone.as_deref().is_some_and(|phone| phone.contains(query))
            })
            .cloned()
            .collect();
        state.leave(Operation::SearchCustomers, found)
    }

    async fn get(&self, customer_id: &str) -> ProviderResult<Customer> {
        let mut state = self.lock();
        state.enter(Operation::GetCustomer)?;

        let customer = state
            .customers
            .iter()
            .find(|c| c.id == customer_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found("Customer", customer_id))?;
        state.leave(Operation::GetCustomer, customer)
    }
}

#[async_trait]
impl ShiftProvider for InMemoryBackend {
    async fn get_active(&self) -> ProviderResult<Option<Shift>> {
        let mut state = self.lock();
        state.enter(Operation::ActiveShift)?;

        let active = state.shifts.iter().find(|s| s.is_open()).cloned();
        state.leave(Operation::ActiveShift, active)
    }

    async fn start(&self, request: &StartShift) -> ProviderResult<Shift> {
        let mut state = self.lock();
        state.enter(Operation::StartShift)?;

        if let Some(open) = state
            .shifts
            .iter()
            .find(|s| s.is_open() && s.user_id == request.user_id && s.branch_id == request.branch_id)
        {
            return Err(ProviderError::rejected(format!(
                "Cashier already has an active shift ({})",
                open.id
            )));
        }

        let id = state.next_id();
        let shift = Shift {
            id: format!("shift-{}", id),
            user_id: request.user_id.clone(),
            branch_id: request.branch_id.clone(),
            starting_balance: request.starting_balance,
            status: ShiftStatus::Open,
            totals: MethodTotals::default(),
            ending_balance: None,
            actual_balance: None,
            cash_difference: None,
            opened_at: Utc::now(),
            closed_at: None,
        };
        debug!(shift_id = %shift.id, "In-memory shift started");
        state.shifts.push(shift.clone());
        state.leave(Operation::StartShift, shift)
    }

    async fn end(&self, request: &EndShift) -> ProviderResult<Shift> {
        let mut state = self.lock();
        state.enter(Operation::EndShift)?;

        let shift = state
            .shifts
            .iter_mut()
            .find(|s| s.id == request.shift_id)
            .ok_or_else(|| ProviderError::not_found("Shift", &request.shift_id))?;

        if !shift.is_open() {
            return Err(ProviderError::rejected(format!(
                "Shift {} is already closed",
                shift.id
            )));
        }

        shift.status = ShiftStatus::Closed;
        shift.totals = request.totals;
        shift.ending_balance = Some(request.ending_balance);
        shift.actual_balance = Some(request.actual_balance);
        shift.cash_difference = Some(request.cash_difference);
        shift.closed_at = Some(Utc::now());

        let closed = shift.clone();
        state.leave(Operation::EndShift, closed)
    }
}

#[async_trait]
impl SalesProvider for InMemoryBackend {
    async fn create(&self, sale: &FinalizedSale) -> ProviderResult<CreatedSale> {
        let mut state = self.lock();
        state.enter(Operation::CreateSale)?;

        if let Some(existing) = state.by_idempotency_key.get(&sale.idempotency_key) {
            debug!(key = %sale.idempotency_key, "Replayed sale request");
            let existing = existing.clone();
            return state.leave(Operation::CreateSale, existing);
        }

        let id = state.next_id();
        let created = CreatedSale {
            id: format!("sale-{}", id),
            invoice_number: Some(format!("INV-{:05}", id)),
        };

        state.sales.push(Sale {
            id: created.id.clone(),
            invoice_number: created.invoice_number.clone(),
            branch_id: sale.branch_id.clone(),
            shift_id: Some(sale.shift_id.clone()),
            customer_id: sale.customer_id.clone(),
            status: SaleStatus::Completed,
            payment_method: sale.payment.method,
            total_amount: sale.totals.grand_total,
            amount_paid: sale.payment.amount_paid,
            change: sale.payment.change,
            created_at: sale.created_at,
        });
        state.created.push(sale.clone());
        state
            .by_idempotency_key
            .insert(sale.idempotency_key.clone(), created.clone());

        state.leave(Operation::CreateSale, created)
    }

    async fn list(&self, query: &SaleQuery) -> ProviderResult<Vec<Sale>> {
        let mut state = self.lock();
        state.enter(Operation::ListSales)?;

        let sales = state
            .sales
            .iter()
            .filter(|s| {
                s.branch_id == query.branch_id && s.shift_id.as_deref() == Some(query.shift_id.as_str())
            })
            .cloned()
            .collect();
        state.leave(Operation::ListSales, sales)
    }

    async fn get(&self, sale_id: &str) -> ProviderResult<Sale> {
        let mut state = self.lock();
        state.enter(Operation::GetSale)?;

        let sale = state
            .sales
            .iter()
            .find(|s| s.id == sale_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found("Sale", sale_id))?;
        state.leave(Operation::GetSale, sale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasir_core::Money;

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            sku: Some(format!("SKU-{}", id)),
            price: Money::from_minor(10_000),
            cost: Money::from_minor(7_000),
            quantity: 5,
        }
    }

    #[tokio::test]
    async fn test_catalog_search_paginates() {
        let backend = InMemoryBackend::new().with_products(vec![
            product("1", "Susu UHT"),
            product("2", "Susu Kental"),
            product("3", "Kopi Bubuk"),
        ]);

        let page = CatalogProvider::search(&backend, "b-1", "susu", 2, 1).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "2");

        let by_sku = CatalogProvider::search(&backend, "b-1", "sku-3", 1, 10).await.unwrap();
        assert_eq!(by_sku.items[0].name, "Kopi Bubuk");
        assert_eq!(backend.calls(Operation::SearchProducts), 2);
    }

    #[tokio::test]
    async fn test_start_rejects_second_open_shift() {
        let backend = InMemoryBackend::new();
        let request = StartShift {
            branch_id: "b-1".to_string(),
            user_id: "u-1".to_string(),
            starting_balance: Money::from_minor(100_000),
        };

        backend.start(&request).await.unwrap();
        let err = backend.start(&request).await.unwrap_err();
        assert_eq!(err.kind, crate::ProviderErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed() {
        let backend = InMemoryBackend::new();
        backend.fail_next(Operation::ActiveShift, ProviderError::unavailable("down"));

        assert!(backend.get_active().await.is_err());
        assert_eq!(backend.get_active().await.unwrap(), None);
        assert_eq!(backend.calls(Operation::ActiveShift), 2);
    }
}
