use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AccountId, Cents};

pub type TransactionId = Uuid;

/// An audit entry for one balance change. Records are append-only and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    /// Signed delta that was applied to the account balance
    pub amount: Cents,
    /// Account the delta was applied to (informational, not a foreign key)
    pub account_id: AccountId,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(account_id: impl Into<AccountId>, amount: Cents) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            account_id: account_id.into(),
            recorded_at: Utc::now(),
        }
    }
}
