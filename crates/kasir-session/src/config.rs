//! # Session Configuration
//!
//! The environment a session runs in: who is selling, where, and the branch
//! settings that feed the totals. Injected at construction; the session never
//! reads globals.
//!
//! ```toml
//! branch_id = "3"
//! user_id = "12"
//! store_name = "Toko Maju Cabang Depok"
//! tax_rate = 1100          # basis points, 11%
//! tax_mode = "exclusive"   # exclusive | inclusive
//! page_size = 20
//! credit_requires_due_date = true
//!
//! [[bank_accounts]]
//! id = "1"
//! bank_name = "BCA"
//! account_number = "1234567890"
//! account_holder = "Toko Maju"
//! ```

use kasir_core::validation::validate_tax_rate;
use kasir_core::{BankAccount, Rate, SaleAdjustments, TaxMode, ValidationError};
use serde::{Deserialize, Serialize};

/// Largest catalog page the session will request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Settings for one cashier at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub branch_id: String,
    pub user_id: String,
    /// Printed at the top of the receipt.
    pub store_name: String,
    /// Branch tax rate; zero when the branch has none.
    pub tax_rate: Rate,
    pub tax_mode: TaxMode,
    /// Catalog results per page.
    pub page_size: u32,
    pub credit_requires_due_date: bool,
    /// Accounts transfers may be paid into. Empty accepts any account id.
    pub bank_accounts: Vec<BankAccount>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            branch_id: String::new(),
            user_id: String::new(),
            store_name: "Kasir POS".to_string(),
            tax_rate: Rate::zero(),
            tax_mode: TaxMode::Exclusive,
            page_size: 20,
            credit_requires_due_date: true,
            bank_accounts: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn new(branch_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        SessionConfig {
            branch_id: branch_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    pub fn with_tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn with_tax_mode(mut self, mode: TaxMode) -> Self {
        self.tax_mode = mode;
        self
    }

    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.store_name = name.into();
        self
    }

    pub fn with_bank_accounts(mut self, accounts: Vec<BankAccount>) -> Self {
        self.bank_accounts = accounts;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.branch_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "branch_id".to_string(),
            });
        }

        if self.user_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "user_id".to_string(),
            });
        }

        validate_tax_rate(self.tax_rate)?;

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ValidationError::OutOfRange {
                field: "page_size".to_string(),
                min: 1,
                max: MAX_PAGE_SIZE as i64,
            });
        }

        Ok(())
    }

    /// Tax settings with no shipping or voucher.
    pub fn base_adjustments(&self) -> SaleAdjustments {
        SaleAdjustments {
            tax_rate: self.tax_rate,
            tax_mode: self.tax_mode,
            ..Default::default()
        }
    }
}
