use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::domain::{Account, TransactionId, TransactionRecord, increment_bounds};

use super::rows::{ACCOUNT_COLUMNS, GUARDED_INCREMENT, row_to_account};
use super::{AccountFilter, AccountUpdate, Session, Storage, StorageError};

/// [`Storage`] backed by a SQLite connection pool.
///
/// Each session is one SQLite transaction on a pooled connection. The write
/// lock is taken by the first statement (the balance update), so concurrent
/// sessions queue on it for up to the pool's busy timeout and then fail with
/// [`StorageError::Conflict`].
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    type Session = SqliteSession;

    async fn start_session(&self) -> Result<SqliteSession, StorageError> {
        let tx = self.pool.begin().await?;
        debug!("session started");
        Ok(SqliteSession { tx: Some(tx) })
    }
}

/// An open SQLite transaction. Dropping it unfinished rolls it back.
pub struct SqliteSession {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteSession {
    fn active(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StorageError> {
        self.tx.as_mut().ok_or(StorageError::SessionClosed)
    }

    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }
}

#[async_trait]
impl Session for SqliteSession {
    async fn find_and_update(
        &mut self,
        filter: &AccountFilter,
        update: &AccountUpdate,
    ) -> Result<Option<Account>, StorageError> {
        let tx = self.active()?;
        let AccountUpdate::IncrementBalance(delta) = *update;
        let (low, high) = increment_bounds(delta);

        let row = match filter {
            AccountFilter::Id(id) => {
                let sql = format!(
                    "UPDATE accounts SET {} WHERE id = ? RETURNING {}",
                    GUARDED_INCREMENT, ACCOUNT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(low)
                    .bind(high)
                    .bind(delta)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(StorageError::from_increment)?
            }
            AccountFilter::Holder(holder) => {
                let sql = format!(
                    r#"
                    UPDATE accounts SET {}
                    WHERE id = (SELECT id FROM accounts WHERE holder = ? ORDER BY id LIMIT 1)
                    RETURNING {}
                    "#,
                    GUARDED_INCREMENT, ACCOUNT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(low)
                    .bind(high)
                    .bind(delta)
                    .bind(holder)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(StorageError::from_increment)?
            }
        };

        Ok(row.as_ref().map(row_to_account).transpose()?)
    }

    async fn insert_one(
        &mut self,
        record: &TransactionRecord,
    ) -> Result<TransactionId, StorageError> {
        let tx = self.active()?;

        sqlx::query(
            r#"
            INSERT INTO transactions (id, account_id, amount, recorded_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.account_id)
        .bind(record.amount)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(record.id)
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        let tx = self.tx.take().ok_or(StorageError::SessionClosed)?;
        tx.commit().await?;
        debug!("session committed");
        Ok(())
    }

    async fn abort(&mut self) -> Result<(), StorageError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!("session aborted");
        }
        Ok(())
    }
}
