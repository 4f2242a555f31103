use std::collections::HashSet;

use crate::domain::{Account, BalanceOrder, Cents, TransactionRecord, convert_cents};
use crate::storage::{Repository, UpdateOutcome};

use super::{AppError, BalanceByTypeReport, TypeBalance};

/// Filter for listing accounts
#[derive(Debug, Clone, Default)]
pub struct AccountQuery {
    /// Only accounts whose balance is strictly greater than this
    pub min_balance: Option<Cents>,
    pub order: BalanceOrder,
}

/// Account management and read-only reporting.
pub struct AccountService {
    repo: Repository,
}

impl AccountService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    // ========================
    // Account operations
    // ========================

    /// Create a new account.
    pub async fn create_account(&self, account: Account) -> Result<Account, AppError> {
        if self.repo.get_account(&account.id).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(account.id));
        }
        self.repo.insert_account(&account).await?;
        Ok(account)
    }

    /// Create several accounts in order. Either all are created or none.
    pub async fn create_accounts(&self, accounts: Vec<Account>) -> Result<u64, AppError> {
        let mut seen = HashSet::new();
        for account in &accounts {
            if !seen.insert(account.id.as_str())
                || self.repo.get_account(&account.id).await?.is_some()
            {
                return Err(AppError::AccountAlreadyExists(account.id.clone()));
            }
        }
        Ok(self.repo.insert_accounts(&accounts).await?)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: &str) -> Result<Account, AppError> {
        self.repo
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    pub async fn list_accounts(&self, query: AccountQuery) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.list_accounts(query.min_balance, query.order).await?)
    }

    /// Add `amount` to every account held by `holder`. When the holder has no
    /// account and `upsert` is given, it is created (owned by `holder`) with
    /// `amount` added to its starting balance.
    pub async fn increment_by_holder(
        &self,
        holder: &str,
        amount: Cents,
        upsert: Option<Account>,
    ) -> Result<UpdateOutcome, AppError> {
        self.repo
            .increment_by_holder(holder, amount, upsert.as_ref())
            .await
            .map_err(|err| AppError::from_update(holder, err))
    }

    /// Add `amount` to the first account of `holder` (by id), with the same
    /// upsert rule as [`increment_by_holder`](Self::increment_by_holder).
    pub async fn increment_one_by_holder(
        &self,
        holder: &str,
        amount: Cents,
        upsert: Option<Account>,
    ) -> Result<UpdateOutcome, AppError> {
        self.repo
            .increment_one_by_holder(holder, amount, upsert.as_ref())
            .await
            .map_err(|err| AppError::from_update(holder, err))
    }

    /// Delete the first account of `holder`. Returns whether one was deleted.
    pub async fn delete_one_by_holder(&self, holder: &str) -> Result<bool, AppError> {
        Ok(self.repo.delete_one_by_holder(holder).await?)
    }

    /// Delete all accounts of `holder`. Returns how many were deleted.
    pub async fn delete_many_by_holder(&self, holder: &str) -> Result<u64, AppError> {
        Ok(self.repo.delete_many_by_holder(holder).await?)
    }

    /// Accounts whose id, holder or type contains `term`, ignoring case.
    pub async fn search(&self, term: &str) -> Result<Vec<Account>, AppError> {
        Ok(self.repo.search_accounts(term).await?)
    }

    // ========================
    // Reports
    // ========================

    /// Totals per account type over accounts with at least `min_balance`,
    /// converted with `rate`.
    pub async fn balance_by_type(
        &self,
        min_balance: Cents,
        rate: f64,
    ) -> Result<BalanceByTypeReport, AppError> {
        let totals = self.repo.balance_totals_by_type(min_balance).await?;

        let groups = totals
            .into_iter()
            .map(|t| TypeBalance {
                account_type: t.account_type,
                accounts: t.accounts,
                total_balance: t.total_balance,
                total_converted: convert_cents(t.total_balance, rate),
            })
            .collect();

        Ok(BalanceByTypeReport {
            min_balance,
            rate,
            groups,
        })
    }

    // ========================
    // Transaction records
    // ========================

    /// Transaction records, oldest first, optionally for one account only.
    pub async fn list_transactions(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        Ok(self.repo.list_transactions(account_id).await?)
    }

    pub async fn count_transactions(&self) -> Result<i64, AppError> {
        Ok(self.repo.count_transactions().await?)
    }
}
