//! The storage contract consumed by the ledger.
//!
//! A [`Storage`] hands out [`Session`]s. A session scopes a find-and-update and
//! an insert into one atomic unit that is either committed or aborted. Dropping
//! a session that was neither committed nor aborted must roll it back, so a
//! cancelled call never leaves a transaction open.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::domain::{Account, AccountId, Cents, TransactionId, TransactionRecord};

/// SQLite primary result codes for lock contention.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Another session holds the write lock, or the write lost a conflict.
    #[error("write conflict: {0}")]
    Conflict(#[source] sqlx::Error),

    #[error("storage failure: {0}")]
    Database(#[source] sqlx::Error),

    #[error("session is already closed")]
    SessionClosed,

    #[error("session timed out after {0:?}")]
    TimedOut(Duration),

    /// The increment would take a balance outside the `Cents` range.
    #[error("balance increment would overflow")]
    BalanceOverflow,
}

impl StorageError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }

    /// Classify the failure of a guarded balance increment: the guard turns
    /// an overflowing result into NULL, so a NOT NULL violation is overflow.
    pub(crate) fn from_increment(err: sqlx::Error) -> Self {
        let overflow = matches!(
            &err,
            sqlx::Error::Database(db) if db.kind() == ErrorKind::NotNullViolation
        );
        if overflow {
            StorageError::BalanceOverflow
        } else {
            err.into()
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let contended = match &err {
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                // extended codes carry the primary code in the low byte
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false),
            sqlx::Error::PoolTimedOut => true,
            _ => false,
        };

        if contended {
            StorageError::Conflict(err)
        } else {
            StorageError::Database(err)
        }
    }
}

/// Selects the single account a find-and-update applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    Id(AccountId),
    /// First account of this holder, by id.
    Holder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUpdate {
    IncrementBalance(Cents),
}

#[async_trait]
pub trait Storage: Send + Sync {
    type Session: Session;

    async fn start_session(&self) -> Result<Self::Session, StorageError>;
}

#[async_trait]
pub trait Session: Send {
    /// Apply `update` to the account matched by `filter` and return it as it is
    /// after the update, or `None` when nothing matched.
    async fn find_and_update(
        &mut self,
        filter: &AccountFilter,
        update: &AccountUpdate,
    ) -> Result<Option<Account>, StorageError>;

    async fn insert_one(
        &mut self,
        record: &TransactionRecord,
    ) -> Result<TransactionId, StorageError>;

    /// Make every write of this session durable. The session is closed
    /// afterwards whether or not the commit succeeded.
    async fn commit(&mut self) -> Result<(), StorageError>;

    /// Discard every write of this session. No-op on a closed session.
    async fn abort(&mut self) -> Result<(), StorageError>;
}
