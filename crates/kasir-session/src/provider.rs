//! # Provider Seams
//!
//! The four external collaborators the session talks to. `kasir-api`
//! implements them over HTTP; [`InMemoryBackend`](crate::InMemoryBackend)
//! implements them for tests and offline demos.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Provider Seams                                  │
//! │                                                                         │
//! │                          SaleSession                                    │
//! │        ┌──────────────┬──────┴───────┬───────────────┐                  │
//! │        ▼              ▼              ▼               ▼                  │
//! │  CatalogProvider CustomerProvider ShiftProvider  SalesProvider          │
//! │  search          search, get      get_active     create, list, get      │
//! │                                   start, end                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use kasir_core::{Customer, FinalizedSale, MethodTotals, Money, ProductPage, Sale, Shift};
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

// =============================================================================
// Requests
// =============================================================================

/// Body of a start-shift call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartShift {
    pub branch_id: String,
    pub user_id: String,
    pub starting_balance: Money,
}

/// Body of an end-shift call: the reconciliation snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndShift {
    pub shift_id: String,
    /// Expected cash in the drawer.
    pub ending_balance: Money,
    /// Cash counted by the cashier.
    pub actual_balance: Money,
    pub cash_difference: Money,
    pub totals: MethodTotals,
    /// Completed sales with an unrecognised payment method.
    pub other_total: Money,
}

/// Filter for listing sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleQuery {
    pub branch_id: String,
    pub shift_id: String,
}

/// What the Sales Provider returns for an accepted sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSale {
    pub id: String,
    pub invoice_number: Option<String>,
}

// =============================================================================
// Traits
// =============================================================================

/// Product catalog for the current branch.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Searches products by name/sku. `page` is 1-based.
    async fn search(
        &self,
        branch_id: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> ProviderResult<ProductPage>;
}

/// Registered customers.
#[async_trait]
pub trait CustomerProvider: Send + Sync {
    async fn search(&self, branch_id: &str, query: &str) -> ProviderResult<Vec<Customer>>;

    async fn get(&self, customer_id: &str) -> ProviderResult<Customer>;
}

/// Source of truth for shifts.
#[async_trait]
pub trait ShiftProvider: Send + Sync {
    /// The authenticated cashier's open shift, if any.
    async fn get_active(&self) -> ProviderResult<Option<Shift>>;

    async fn start(&self, request: &StartShift) -> ProviderResult<Shift>;

    async fn end(&self, request: &EndShift) -> ProviderResult<Shift>;
}

/// Persists and reads sales.
#[async_trait]
pub trait SalesProvider: Send + Sync {
    /// Records a sale. Calls with an idempotency key already seen must
    /// return the original sale instead of creating another.
    async fn create(&self, sale: &FinalizedSale) -> ProviderResult<CreatedSale>;

    async fn list(&self, query: &SaleQuery) -> ProviderResult<Vec<Sale>>;

    async fn get(&self, sale_id: &str) -> ProviderResult<Sale>;
}

/// The four providers a session is wired to.
#[derive(Clone)]
pub struct Providers {
    pub catalog: Arc<dyn CatalogProvider>,
    pub customers: Arc<dyn CustomerProvider>,
    pub shifts: Arc<dyn ShiftProvider>,
    pub sales: Arc<dyn SalesProvider>,
}

impl Providers {
    /// Uses one backend for all four providers.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CatalogProvider + CustomerProvider + ShiftProvider + SalesProvider + 'static,
    {
        Providers {
            catalog: backend.clone(),
            customers: backend.clone(),
            shifts: backend.clone(),
            sales: backend,
        }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}
