//! # HTTP Backend
//!
//! Implements every kasir-session provider trait against the REST API.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Provider call             Request                                      │
//! │  ─────────────             ───────                                      │
//! │  catalog.search      ────► GET  /products?branch_id&search&page&per_page│
//! │  customers.search    ────► GET  /customers?branch_id&search             │
//! │  customers.get       ────► GET  /customers/{id}                         │
//! │  shifts.get_active   ────► GET  /shifts/active   (404 / null = none)    │
//! │  shifts.start        ────► POST /shifts                                 │
//! │  shifts.end          ────► POST /shifts/{id}/end                        │
//! │  sales.create        ────► POST /sales           + Idempotency-Key      │
//! │  sales.list          ────► GET  /sales?branch_id&shift_id (all pages)   │
//! │  sales.get           ────► GET  /sales/{id}                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use kasir_core::{Customer, FinalizedSale, Product, ProductPage, Sale, Shift};
use kasir_session::{
    CatalogProvider, CreatedSale, CustomerProvider, EndShift, ProviderResult, Providers,
    SaleQuery, SalesProvider, ShiftProvider, StartShift,
};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ApiSettings;
use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, Page};
use crate::wire::{
    CreateSaleBody, CreatedSaleDto, CustomerDto, EndShiftBody, ProductDto, SaleDto, ShiftDto,
    StartShiftBody,
};

/// Upper bound on pages walked by one listing call.
const MAX_LIST_PAGES: u32 = 50;

/// Collects the pages of one listing.
///
/// Stops on an empty page or once `total` items are in. Reaching the page
/// cap with items still missing is an error: a partial sales list would
/// understate the shift's expected cash.
#[derive(Debug)]
struct PageWalk<T> {
    items: Vec<T>,
    next: u32,
    max_pages: u32,
    done: bool,
}

impl<T> PageWalk<T> {
    fn new(max_pages: u32) -> Self {
        PageWalk {
            items: Vec::new(),
            next: 1,
            max_pages,
            done: false,
        }
    }

    /// Next page number to request, or `None` once the listing is complete.
    fn next_page(&self) -> Option<u32> {
        (!self.done).then_some(self.next)
    }

    fn push(&mut self, page: Page<T>) -> ClientResult<()> {
        let Page { items: batch, total } = page;
        let fetched = batch.len();
        self.items.extend(batch);

        if fetched == 0 || self.items.len() as u64 >= total {
            self.done = true;
            return Ok(());
        }

        if self.next >= self.max_pages {
            return Err(ClientError::InvalidResponse(format!(
                "Listing incomplete after {} pages: {} of {} items",
                self.max_pages,
                self.items.len(),
                total
            )));
        }

        self.next += 1;
        Ok(())
    }

    fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// The four providers over one [`ApiClient`].
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: ApiClient,
    list_page_size: u32,
}

impl HttpBackend {
    pub fn new(settings: &ApiSettings) -> ClientResult<Self> {
        Ok(Self::with_client(ApiClient::new(settings)?, settings.list_page_size))
    }

    pub fn with_client(client: ApiClient, list_page_size: u32) -> Self {
        HttpBackend {
            client,
            list_page_size: list_page_size.max(1),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Wraps this backend as the session's provider set.
    pub fn into_providers(self) -> Providers {
        Providers::from_backend(Arc::new(self))
    }

    /// Walks a paginated listing until `total` items are collected or a page
    /// comes back empty.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(&str, String)],
    ) -> ClientResult<Vec<T>> {
        let mut walk = PageWalk::new(MAX_LIST_PAGES);

        while let Some(page) = walk.next_page() {
            let mut params = query.to_vec();
            params.push(("page", page.to_string()));
            params.push(("per_page", self.list_page_size.to_string()));

            walk.push(self.client.get_page::<T>(path, &params).await?)?;
        }

        Ok(walk.into_items())
    }
}

#[async_trait]
impl CatalogProvider for HttpBackend {
    async fn search(
        &self,
        branch_id: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> ProviderResult<ProductPage> {
        let params = [
            ("branch_id", branch_id.to_string()),
            ("search", query.to_string()),
            ("page", page.to_string()),
            ("per_page", page_size.to_string()),
        ];
        let page = self.client.get_page::<ProductDto>(&["products"], &params).await?;

        debug!(branch_id, query, count = page.items.len(), total = page.total, "Catalog page");
        Ok(ProductPage {
            items: page.items.into_iter().map(Product::from).collect(),
            total: page.total,
        })
    }
}

#[async_trait]
impl CustomerProvider for HttpBackend {
    async fn search(&self, branch_id: &str, query: &str) -> ProviderResult<Vec<Customer>> {
        let params = [
            ("branch_id", branch_id.to_string()),
            ("search", query.to_string()),
        ];
        let page = self.client.get_page::<CustomerDto>(&["customers"], &params).await?;
        Ok(page.items.into_iter().map(Customer::from).collect())
    }

    async fn get(&self, customer_id: &str) -> ProviderResult<Customer> {
        let dto: CustomerDto = self.client.get(&["customers", customer_id], &[]).await?;
        Ok(dto.into())
    }
}

#[async_trait]
impl ShiftProvider for HttpBackend {
    async fn get_active(&self) -> ProviderResult<Option<Shift>> {
        let dto: Option<ShiftDto> = self.client.get_optional(&["shifts", "active"]).await?;
        Ok(dto.map(Shift::from))
    }

    async fn start(&self, request: &StartShift) -> ProviderResult<Shift> {
        let dto: ShiftDto = self
            .client
            .post(&["shifts"], &StartShiftBody::from(request), None)
            .await?;
        info!(shift_id = %dto.id, "Shift opened on backend");
        Ok(dto.into())
    }

    async fn end(&self, request: &EndShift) -> ProviderResult<Shift> {
        let dto: ShiftDto = self
            .client
            .post(
                &["shifts", request.shift_id.as_str(), "end"],
                &EndShiftBody::from(request),
                None,
            )
            .await?;
        info!(shift_id = %dto.id, "Shift closed on backend");
        Ok(dto.into())
    }
}

#[async_trait]
impl SalesProvider for HttpBackend {
    async fn create(&self, sale: &FinalizedSale) -> ProviderResult<CreatedSale> {
        let dto: CreatedSaleDto = self
            .client
            .post(
                &["sales"],
                &CreateSaleBody::from(sale),
                Some(&sale.idempotency_key),
            )
            .await?;
        Ok(dto.into())
    }

    async fn list(&self, query: &SaleQuery) -> ProviderResult<Vec<Sale>> {
        let params = [
            ("branch_id", query.branch_id.clone()),
            ("shift_id", query.shift_id.clone()),
        ];
        let dtos: Vec<SaleDto> = self.list_all(&["sales"], &params).await?;
        Ok(dtos.into_iter().map(Sale::from).collect())
    }

    async fn get(&self, sale_id: &str) -> ProviderResult<Sale> {
        let dto: SaleDto = self.client.get(&["sales", sale_id], &[]).await?;
        Ok(dto.into())
    }
}
