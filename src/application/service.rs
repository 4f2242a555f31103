use std::fmt;
use std::time::Duration;

use crate::domain::{Cents, TransactionRecord};
use crate::storage::{AccountFilter, AccountUpdate, Session, Storage, StorageError};

use super::AppError;

/// Progress of a single `transfer_and_record` call.
///
/// `Idle -> SessionStarted -> Mutated -> Recorded -> Committed`, with `Aborted`
/// reachable from every non-terminal state. Each call walks a fresh instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    SessionStarted,
    Mutated,
    Recorded,
    Committed,
    Aborted,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::Aborted)
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Idle => "idle",
            TransferState::SessionStarted => "session-started",
            TransferState::Mutated => "mutated",
            TransferState::Recorded => "recorded",
            TransferState::Committed => "committed",
            TransferState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

fn failed_in(stage: TransferState) -> impl FnOnce(StorageError) -> AppError {
    move |source| AppError::TransactionFailed { stage, source }
}

/// Performs balance mutations paired with their audit record, atomically.
///
/// The storage handle is injected; the service holds no other state and
/// takes no locks. Isolation between concurrent calls is the storage's job.
pub struct LedgerService<S: Storage> {
    storage: S,
}

impl<S: Storage> LedgerService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Add `amount` to the balance of `account_id` and append a
    /// [`TransactionRecord`] for it, as one transaction.
    ///
    /// The record is returned only once the commit has succeeded. On any
    /// error the session is aborted before the error is returned:
    ///
    /// - [`AppError::Session`]: no session could be started.
    /// - [`AppError::AccountNotFound`]: no account has that id.
    /// - [`AppError::BalanceOverflow`]: the new balance would not fit.
    /// - [`AppError::TransactionFailed`]: a write or the commit failed.
    pub async fn transfer_and_record(
        &self,
        account_id: &str,
        amount: Cents,
    ) -> Result<TransactionRecord, AppError> {
        let mut session = self
            .storage
            .start_session()
            .await
            .map_err(AppError::Session)?;

        match Self::apply(&mut session, account_id, amount).await {
            Ok(record) => Ok(record),
            Err(err) => {
                // abort errors are secondary
                let _ = session.abort().await;
                Err(err)
            }
        }
    }

    /// Same as [`transfer_and_record`](Self::transfer_and_record), bounded by
    /// `timeout`. On expiry the in-flight session is dropped, which rolls it
    /// back, and the call fails with [`StorageError::TimedOut`].
    ///
    /// If the deadline hits while the commit is in flight the outcome is
    /// unknown.
    pub async fn transfer_and_record_within(
        &self,
        account_id: &str,
        amount: Cents,
        timeout: Duration,
    ) -> Result<TransactionRecord, AppError> {
        match tokio::time::timeout(timeout, self.transfer_and_record(account_id, amount)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::TransactionFailed {
                stage: TransferState::Aborted,
                source: StorageError::TimedOut(timeout),
            }),
        }
    }

    async fn apply(
        session: &mut S::Session,
        account_id: &str,
        amount: Cents,
    ) -> Result<TransactionRecord, AppError> {
        let filter = AccountFilter::Id(account_id.to_string());
        let updated = session
            .find_and_update(&filter, &AccountUpdate::IncrementBalance(amount))
            .await
            .map_err(|err| match err {
                StorageError::BalanceOverflow => AppError::BalanceOverflow(account_id.to_string()),
                err => failed_in(TransferState::SessionStarted)(err),
            })?;
        if updated.is_none() {
            return Err(AppError::AccountNotFound(account_id.to_string()));
        }

        let record = TransactionRecord::new(account_id, amount);
        session
            .insert_one(&record)
            .await
            .map_err(failed_in(TransferState::Mutated))?;

        session
            .commit()
            .await
            .map_err(failed_in(TransferState::Recorded))?;

        Ok(record)
    }
}
