//! Posting configuration

use serde::{Deserialize, Serialize};

use crate::types::{LedgerError, LedgerResult};

/// Decimal places used for money when no configuration says otherwise
pub const DEFAULT_MINOR_UNIT_SCALE: i64 = 2;

/// Account codes and precision used when a purchase document is posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    /// Credit side of every purchase posting (counterparty payable)
    pub payable_account_code: String,
    /// Debit target for lines that reference a stock item
    pub inventory_account_code: String,
    /// Debit target for non-stock lines without an explicit account
    pub expense_account_code: String,
    /// Decimal places line amounts are rounded to (2 = cents)
    pub minor_unit_scale: i64,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            payable_account_code: "2100".to_string(),
            inventory_account_code: "1300".to_string(),
            expense_account_code: "5100".to_string(),
            minor_unit_scale: DEFAULT_MINOR_UNIT_SCALE,
        }
    }
}

impl PostingConfig {
    /// Parse a configuration from JSON; absent fields take their defaults
    pub fn from_json_str(json: &str) -> LedgerResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LedgerError::validation(format!("invalid posting config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        for (field, code) in [
            ("payable_account_code", &self.payable_account_code),
            ("inventory_account_code", &self.inventory_account_code),
            ("expense_account_code", &self.expense_account_code),
        ] {
            if code.trim().is_empty() {
                return Err(LedgerError::validation(format!("{field} cannot be empty")));
            }
        }

        if self.minor_unit_scale < 0 {
            return Err(LedgerError::validation(
                "minor_unit_scale cannot be negative",
            ));
        }

        Ok(())
    }
}
