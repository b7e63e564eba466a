//! # Client Configuration
//!
//! Where the backend lives and which branch this terminal sells for.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     KASIR_API_URL=https://pos.example.com/api                           │
//! │     KASIR_BRANCH_ID=1                                                   │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/kasir-pos/kasir.toml (Linux)                              │
//! │     ~/Library/Application Support/id.kasir.pos/kasir.toml (macOS)       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     http://localhost:8000/api, 30s timeout, no tax                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # kasir.toml
//! [api]
//! base_url = "https://pos.example.com/api"
//! token = "1|abcdef"
//! timeout_secs = 30
//!
//! [session]
//! branch_id = "1"
//! user_id = "7"
//! store_name = "Toko Sumber Rejeki"
//! tax_rate = 1100      # basis points (11%)
//! tax_mode = "exclusive"
//! ```

use std::path::{Path, PathBuf};

use kasir_core::{Rate, TaxMode};
use kasir_session::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// API Settings
// =============================================================================

/// How to reach the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the API; endpoint paths are joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token (Laravel Sanctum personal access token).
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Page size used when walking paginated listings.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_list_page_size() -> u32 {
    100
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl ApiSettings {
    /// Parses `base_url`, requiring http or https.
    pub fn parsed_url(&self) -> ConfigResult<Url> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidUrl(format!(
                "API URL must use http or https, got: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Full Configuration
// =============================================================================

/// Everything a terminal needs to open a session against the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub session: SessionConfig,
}

impl ApiConfig {
    /// Loads configuration: defaults, then the TOML file, then `KASIR_*`
    /// environment variables. The result is validated.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading kasir config from file");
                config = Self::read_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Like [`ApiConfig::load`], falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load kasir config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Kasir config saved");
        Ok(())
    }

    fn read_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Checks the URL, timeout and session settings.
    pub fn validate(&self) -> ConfigResult<()> {
        self.api.parsed_url()?;

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }

        if self.api.list_page_size == 0 {
            return Err(ConfigError::Invalid("list_page_size must be at least 1".into()));
        }

        self.session
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Applies `KASIR_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("KASIR_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(token) = lookup("KASIR_API_TOKEN") {
            self.api.token = Some(token).filter(|t| !t.trim().is_empty());
        }

        if let Some(raw) = lookup("KASIR_API_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.api.timeout_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid KASIR_API_TIMEOUT_SECS"),
            }
        }

        if let Some(id) = lookup("KASIR_BRANCH_ID") {
            debug!(branch_id = %id, "Overriding branch from environment");
            self.session.branch_id = id;
        }

        if let Some(id) = lookup("KASIR_USER_ID") {
            self.session.user_id = id;
        }

        if let Some(name) = lookup("KASIR_STORE_NAME") {
            self.session.store_name = name;
        }

        if let Some(raw) = lookup("KASIR_TAX_RATE") {
            match parse_percent(&raw) {
                Some(rate) => self.session.tax_rate = rate,
                None => warn!(value = %raw, "Ignoring invalid KASIR_TAX_RATE"),
            }
        }

        if let Some(raw) = lookup("KASIR_TAX_MODE") {
            match raw.trim().to_lowercase().as_str() {
                "exclusive" => self.session.tax_mode = TaxMode::Exclusive,
                "inclusive" => self.session.tax_mode = TaxMode::Inclusive,
                _ => warn!(value = %raw, "Unknown tax mode in environment"),
            }
        }

        if let Some(raw) = lookup("KASIR_PAGE_SIZE") {
            match raw.trim().parse() {
                Ok(size) => self.session.page_size = size,
                Err(_) => warn!(value = %raw, "Ignoring invalid KASIR_PAGE_SIZE"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("id", "kasir", "pos")
            .map(|dirs| dirs.config_dir().join("kasir.toml"))
    }
}

/// Parses a percentage such as `11` or `12.5` into a rate.
fn parse_percent(raw: &str) -> Option<Rate> {
    let pct: f64 = raw.trim().trim_end_matches('%').parse().ok()?;
    if !(0.0..=100.0).contains(&pct) {
        return None;
    }
    Some(Rate::from_bps((pct * 100.0).round() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn configured() -> ApiConfig {
        let mut config = ApiConfig::default();
        config.session = SessionConfig::new("1", "7");
        config
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.api.token.is_none());
        assert!(config.api.parsed_url().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ApiConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://pos.example.com/api"

            [session]
            branch_id = "3"
            user_id = "12"
            tax_rate = 1100
            tax_mode = "inclusive"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.session.branch_id, "3");
        assert_eq!(config.session.tax_rate, Rate::from_percent(11));
        assert_eq!(config.session.tax_mode, TaxMode::Inclusive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = configured();
        config.apply_overrides(lookup(&[
            ("KASIR_API_URL", "https://kasir.test/api"),
            ("KASIR_API_TOKEN", "2|secret"),
            ("KASIR_BRANCH_ID", "9"),
            ("KASIR_TAX_RATE", "12.5"),
            ("KASIR_TAX_MODE", "Inclusive"),
            ("KASIR_API_TIMEOUT_SECS", "not-a-number"),
        ]));

        assert_eq!(config.api.base_url, "https://kasir.test/api");
        assert_eq!(config.api.token.as_deref(), Some("2|secret"));
        assert_eq!(config.session.branch_id, "9");
        assert_eq!(config.session.tax_rate, Rate::from_bps(1250));
        assert_eq!(config.session.tax_mode, TaxMode::Inclusive);
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(parse_percent("11"), Some(Rate::from_percent(11)));
        assert_eq!(parse_percent("11%"), Some(Rate::from_percent(11)));
        assert_eq!(parse_percent("101"), None);
        assert_eq!(parse_percent("-1"), None);
        assert_eq!(parse_percent("abc"), None);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = configured();
        config.api.base_url = "ftp://pos.example.com".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));

        config.api.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_validate_requires_branch() {
        let config = ApiConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("kasir-config-{}", uuid::Uuid::new_v4()))
            .join("kasir.toml");

        let mut config = configured();
        config.api.token = Some("3|token".to_string());
        config.session.store_name = "Toko Makmur".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = ApiConfig::read_file(&path).unwrap();
        assert_eq!(loaded.api, config.api);
        assert_eq!(loaded.session.store_name, "Toko Makmur");

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
