use serde::{Deserialize, Serialize};

use crate::domain::{AccountType, Cents};

/// Conversion rate applied by the by-type report unless configured otherwise
/// (1 USD = 0.74 GBP).
pub const DEFAULT_CONVERSION_RATE: f64 = 0.74;

/// Balance totals per account type, with the totals also expressed in a
/// second currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceByTypeReport {
    pub min_balance: Cents,
    pub rate: f64,
    pub groups: Vec<TypeBalance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeBalance {
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub accounts: i64,
    pub total_balance: Cents,
    pub total_converted: Cents,
}

impl BalanceByTypeReport {
    pub fn total_balance(&self) -> Cents {
        self.groups.iter().map(|g| g.total_balance).sum()
    }

    pub fn group(&self, account_type: AccountType) -> Option<&TypeBalance> {
        self.groups.iter().find(|g| g.account_type == account_type)
    }
}
