use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Cents;

/// Accounts are keyed by an externally assigned identifier such as "UUS3434ODPS".
pub type AccountId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountType {
    Private,
    Business,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Private => "Private",
            AccountType::Business => "Business",
        }
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(AccountType::Private),
            "business" => Ok(AccountType::Business),
            other => Err(format!(
                "unknown account type '{}' (expected Private or Business)",
                other
            )),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank account document. Balances only ever change through increments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub holder: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// Signed; overdrafts are a caller-level policy.
    pub balance: Cents,
}

impl Account {
    pub fn new(
        id: impl Into<AccountId>,
        holder: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            id: id.into(),
            holder: holder.into(),
            account_type,
            balance: 0,
        }
    }

    pub fn with_balance(mut self, balance: Cents) -> Self {
        self.balance = balance;
        self
    }
}

/// Sort direction for account listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceOrder {
    #[default]
    Ascending,
    Descending,
}

impl BalanceOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            BalanceOrder::Ascending => "ASC",
            BalanceOrder::Descending => "DESC",
        }
    }
}
