//! # kasir-api: Backend Providers over HTTP
//!
//! Connects a [`kasir_session::SaleSession`] to the Laravel REST API.
//!
//! ## Modules
//!
//! - [`config`] - `ApiConfig`: TOML file plus `KASIR_*` environment overrides
//! - [`http`] - `ApiClient`: bearer auth, envelopes, status mapping
//! - [`backend`] - `HttpBackend`: the four provider traits
//! - [`wire`] - Request/response DTOs with lenient id and decimal parsing
//! - [`error`] - `ClientError`, `ConfigError`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kasir_api::{connect, ApiConfig};
//! use kasir_session::SessionHandle;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::load(None)?;
//! let providers = connect(&config)?;
//! let _handle = SessionHandle::open(config.session, providers).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod wire;

pub use backend::HttpBackend;
pub use config::{ApiConfig, ApiSettings};
pub use error::{ClientError, ClientResult, ConfigError, ConfigResult};
pub use http::{ApiClient, Page};

use kasir_session::Providers;

/// Builds the HTTP provider set for `config`.
pub fn connect(config: &ApiConfig) -> ClientResult<Providers> {
    Ok(HttpBackend::new(&config.api)?.into_providers())
}
