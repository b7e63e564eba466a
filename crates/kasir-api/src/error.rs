//! # API Client Errors
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    HTTP Error Mapping                                   │
//! │                                                                         │
//! │  Transport / status             ClientError          ProviderErrorKind  │
//! │  ──────────────────             ───────────          ─────────────────  │
//! │  connect, timeout               Http                 Unavailable        │
//! │  401 / 403                      Unauthorized/Forbid. Rejected           │
//! │  404                            NotFound             NotFound           │
//! │  409 / 422 {message, errors}    Validation           Rejected           │
//! │  other 4xx                      Api                  Rejected           │
//! │  5xx                            Server               Unavailable        │
//! │  unparseable body               InvalidResponse      InvalidResponse    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use kasir_session::ProviderError;
use thiserror::Error;

/// Result type for HTTP calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure talking to the backend.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, TLS, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Laravel validation failure with per-field messages.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },

    /// Any other client error status.
    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },

    /// The backend failed (5xx).
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// First field error, for a one-line message.
    fn first_field_error(errors: &BTreeMap<String, Vec<String>>) -> Option<&str> {
        errors.values().flat_map(|v| v.iter()).next().map(String::as_str)
    }
}

impl From<ClientError> for ProviderError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) if e.is_decode() => ProviderError::invalid_response(e.to_string()),
            ClientError::Http(e) => ProviderError::unavailable(e.to_string()),
            ClientError::InvalidUrl(e) => ProviderError::rejected(format!("Invalid URL: {}", e)),
            ClientError::Unauthorized => ProviderError::rejected("Authentication required"),
            ClientError::Forbidden(message) => ProviderError::rejected(message),
            ClientError::NotFound(message) => {
                ProviderError::new(kasir_session::ProviderErrorKind::NotFound, message)
            }
            ClientError::Validation { message, errors } => {
                match ClientError::first_field_error(&errors) {
                    Some(detail) if detail != message => {
                        ProviderError::rejected(format!("{} ({})", message, detail))
                    }
                    _ => ProviderError::rejected(message),
                }
            }
            ClientError::Api { message, .. } => ProviderError::rejected(message),
            ClientError::Server { status, message } => {
                ProviderError::unavailable(format!("{} ({})", message, status))
            }
            ClientError::InvalidResponse(message) => ProviderError::invalid_response(message),
            ClientError::Serialization(e) => ProviderError::invalid_response(e.to_string()),
        }
    }
}

/// Failure loading or validating [`ApiConfig`](crate::ApiConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Write(#[from] toml::ser::Error),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasir_session::ProviderErrorKind;

    #[test]
    fn test_validation_maps_to_rejected_with_detail() {
        let mut errors = BTreeMap::new();
        errors.insert(
            "amount_paid".to_string(),
            vec!["The amount paid must be at least 199800.".to_string()],
        );
        let err = ProviderError::from(ClientError::Validation {
            message: "The given data was invalid.".to_string(),
            errors,
        });

        assert_eq!(err.kind, ProviderErrorKind::Rejected);
        assert_eq!(
            err.message,
            "The given data was invalid. (The amount paid must be at least 199800.)"
        );
    }

    #[test]
    fn test_status_mapping() {
        let err = ProviderError::from(ClientError::Server {
            status: 503,
            message: "Service Unavailable".to_string(),
        });
        assert!(err.is_retryable());

        let err = ProviderError::from(ClientError::NotFound("Sale not found".to_string()));
        assert_eq!(err.kind, ProviderErrorKind::NotFound);

        let err = ProviderError::from(ClientError::Unauthorized);
        assert_eq!(err.kind, ProviderErrorKind::Rejected);

        let err = ProviderError::from(ClientError::InvalidResponse("missing id".to_string()));
        assert_eq!(err.kind, ProviderErrorKind::InvalidResponse);
    }
}
