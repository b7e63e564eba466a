//! # kasir-session: The Cashier's Sale Session
//!
//! Wraps the pure math of `kasir-core` in a stateful session that talks to
//! the catalog, customer, shift and sales providers.
//!
//! ## Modules
//!
//! - [`session`] - `SaleSession`: cart, shift lifecycle, finalize
//! - [`handle`] - `SessionHandle`: shared access with an in-flight guard
//! - [`provider`] - The four provider traits and their request types
//! - [`memory`] - In-memory implementation of every provider
//! - [`config`] - `SessionConfig`, the injected branch environment
//! - [`error`] - `SessionError`, `ProviderError`, frontend error codes
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use kasir_core::{Money, PaymentRequest, Product, Rate};
//! use kasir_session::{InMemoryBackend, Providers, SaleSession, SessionConfig};
//!
//! # tokio_test_block(async {
//! let backend = Arc::new(InMemoryBackend::new());
//! let config = SessionConfig::new("branch-1", "cashier-1").with_tax_rate(Rate::from_percent(11));
//! let mut session = SaleSession::new(config, Providers::from_backend(backend)).unwrap();
//!
//! session.start_shift(Money::from_minor(100_000)).await.unwrap();
//! session.add_product(&Product {
//!     id: "1".into(),
//!     name: "Kopi".into(),
//!     sku: None,
//!     price: Money::from_minor(100_000),
//!     cost: Money::from_minor(70_000),
//!     quantity: 5,
//! }).unwrap();
//!
//! let receipt = session.finalize(PaymentRequest::cash(Money::from_minor(120_000))).await.unwrap();
//! assert_eq!(receipt.change.minor(), 9_000);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod memory;
pub mod provider;
pub mod session;

pub use config::SessionConfig;
pub use error::{
    ErrorCode, ErrorResponse, ProviderError, ProviderErrorKind, ProviderResult, SessionError,
    SessionResult,
};
pub use handle::SessionHandle;
pub use memory::{InMemoryBackend, Operation};
pub use provider::{
    CatalogProvider, CreatedSale, CustomerProvider, EndShift, Providers, SaleQuery,
    SalesProvider, ShiftProvider, StartShift,
};
pub use session::{SaleSession, ShiftClosure};
