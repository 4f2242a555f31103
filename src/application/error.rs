use thiserror::Error;

use crate::storage::StorageError;

use super::TransferState;

#[derive(Error, Debug)]
pub enum AppError {
    /// The referenced account does not exist. Nothing was written.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    /// The increment would overflow a balance of the named account or holder.
    /// The session was aborted, and retrying fails the same way.
    #[error("Balance overflow: {0} cannot take that amount")]
    BalanceOverflow(String),

    /// No session could be acquired. Nothing was written.
    #[error("Failed to start a storage session: {0}")]
    Session(#[source] StorageError),

    /// The transaction was aborted, or its commit outcome is unknown.
    /// `stage` is the state the call was in when it failed; a timeout reports
    /// `Aborted`. Re-running the whole operation is safe.
    #[error("Transaction failed in state {stage}: {source}")]
    TransactionFailed {
        stage: TransferState,
        #[source]
        source: StorageError,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True when the caller may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::TransactionFailed { .. })
    }

    /// True when the failure guarantees no write reached storage.
    pub fn nothing_happened(&self) -> bool {
        matches!(
            self,
            AppError::AccountNotFound(_) | AppError::BalanceOverflow(_) | AppError::Session(_)
        )
    }

    /// Lift a repository error, surfacing overflow as [`AppError::BalanceOverflow`].
    pub(crate) fn from_update(target: &str, err: anyhow::Error) -> Self {
        if let Some(StorageError::BalanceOverflow) = err.downcast_ref::<StorageError>() {
            return AppError::BalanceOverflow(target.to_string());
        }
        AppError::Database(err)
    }
}
