use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Account, AccountType, BalanceOrder, Cents, TransactionRecord, increment_bounds,
};

use super::StorageError;
use super::rows::{
    ACCOUNT_COLUMNS, GUARDED_INCREMENT, RECORD_COLUMNS, row_to_account, row_to_record,
};

/// Outcome of an update-by-holder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// Id of the account inserted because nothing matched, if any
    pub upserted_id: Option<String>,
}

/// Per-type aggregate over accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTotal {
    pub account_type: AccountType,
    pub accounts: i64,
    pub total_balance: Cents,
}

/// Repository for account documents and transaction records outside of
/// ledger sessions: seeding, listing, maintenance and reports.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a single account.
    pub async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query("INSERT INTO accounts (id, holder, account_type, balance) VALUES (?, ?, ?, ?)")
            .bind(&account.id)
            .bind(&account.holder)
            .bind(account.account_type.as_str())
            .bind(account.balance)
            .execute(&self.pool)
            .await
            .context("Failed to insert account")?;
        Ok(())
    }

    /// Insert accounts in order, in one transaction. If any insert fails,
    /// none of them are kept.
    pub async fn insert_accounts(&self, accounts: &[Account]) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("Failed to begin batch insert")?;

        for account in accounts {
            sqlx::query(
                "INSERT INTO accounts (id, holder, account_type, balance) VALUES (?, ?, ?, ?)",
            )
            .bind(&account.id)
            .bind(&account.holder)
            .bind(account.account_type.as_str())
            .bind(account.balance)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert account {}", account.id))?;
        }

        tx.commit().await.context("Failed to commit batch insert")?;
        Ok(accounts.len() as u64)
    }

    /// Get an account by ID.
    pub async fn get_account(&self, id: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {} FROM accounts WHERE id = ?", ACCOUNT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch account")?;

        match row {
            Some(row) => Ok(Some(row_to_account(&row)?)),
            None => Ok(None),
        }
    }

    /// List accounts, optionally only those with a balance strictly above
    /// `min_balance`, sorted by balance.
    pub async fn list_accounts(
        &self,
        min_balance: Option<Cents>,
        order: BalanceOrder,
    ) -> Result<Vec<Account>> {
        let mut sql = format!("SELECT {} FROM accounts", ACCOUNT_COLUMNS);
        if min_balance.is_some() {
            sql.push_str(" WHERE balance > ?");
        }
        sql.push_str(&format!(" ORDER BY balance {}, id", order.as_sql()));

        let mut query = sqlx::query(&sql);
        if let Some(min) = min_balance {
            query = query.bind(min);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter()
            .map(|row| row_to_account(row).map_err(anyhow::Error::from))
            .collect()
    }

    /// Increment the balance of every account of `holder`. When nothing
    /// matches and `upsert` is given, that account is inserted instead with
    /// `amount` added to its balance.
    pub async fn increment_by_holder(
        &self,
        holder: &str,
        amount: Cents,
        upsert: Option<&Account>,
    ) -> Result<UpdateOutcome> {
        let sql = format!("UPDATE accounts SET {} WHERE holder = ?", GUARDED_INCREMENT);
        self.increment_matching(&sql, holder, amount, upsert).await
    }

    /// Like [`increment_by_holder`](Self::increment_by_holder), but only the
    /// first account of `holder` (by id) is incremented.
    pub async fn increment_one_by_holder(
        &self,
        holder: &str,
        amount: Cents,
        upsert: Option<&Account>,
    ) -> Result<UpdateOutcome> {
        let sql = format!(
            r#"
            UPDATE accounts SET {}
            WHERE id = (SELECT id FROM accounts WHERE holder = ? ORDER BY id LIMIT 1)
            "#,
            GUARDED_INCREMENT
        );
        self.increment_matching(&sql, holder, amount, upsert).await
    }

    /// Run a guarded increment `sql` (binds: bounds, delta, holder) and the
    /// optional upsert in one transaction. Overflow fails the whole update
    /// with [`StorageError::BalanceOverflow`].
    async fn increment_matching(
        &self,
        sql: &str,
        holder: &str,
        amount: Cents,
        upsert: Option<&Account>,
    ) -> Result<UpdateOutcome> {
        let (low, high) = increment_bounds(amount);
        let mut tx = self.pool.begin().await.context("Failed to begin update")?;

        let matched = sqlx::query(sql)
            .bind(low)
            .bind(high)
            .bind(amount)
            .bind(holder)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from_increment)
            .context("Failed to update accounts")?
            .rows_affected();

        let mut outcome = UpdateOutcome {
            matched,
            modified: if amount == 0 { 0 } else { matched },
            upserted_id: None,
        };

        if matched == 0 {
            if let Some(account) = upsert {
                let balance = account
                    .balance
                    .checked_add(amount)
                    .ok_or(StorageError::BalanceOverflow)
                    .with_context(|| format!("Failed to upsert account {}", account.id))?;
                sqlx::query(
                    "INSERT INTO accounts (id, holder, account_type, balance) VALUES (?, ?, ?, ?)",
                )
                .bind(&account.id)
                .bind(holder)
                .bind(account.account_type.as_str())
                .bind(balance)
                .execute(&mut *tx)
                .await
                .context("Failed to upsert account")?;
                outcome.upserted_id = Some(account.id.clone());
            }
        }

        tx.commit().await.context("Failed to commit update")?;
        Ok(outcome)
    }

    /// Delete the first account (by id) of a holder.
    pub async fn delete_one_by_holder(&self, holder: &str) -> Result<bool> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM accounts
            WHERE id = (SELECT id FROM accounts WHERE holder = ? ORDER BY id LIMIT 1)
            "#,
        )
        .bind(holder)
        .execute(&self.pool)
        .await
        .context("Failed to delete account")?
        .rows_affected();

        Ok(deleted == 1)
    }

    /// Delete every account of a holder.
    pub async fn delete_many_by_holder(&self, holder: &str) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM accounts WHERE holder = ?")
            .bind(holder)
            .execute(&self.pool)
            .await
            .context("Failed to delete accounts")?
            .rows_affected();

        Ok(deleted)
    }

    /// Case-insensitive substring search over id, holder and type.
    pub async fn search_accounts(&self, term: &str) -> Result<Vec<Account>> {
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        let sql = format!(
            r#"
            SELECT {} FROM accounts
            WHERE id LIKE ? ESCAPE '\'
               OR holder LIKE ? ESCAPE '\'
               OR account_type LIKE ? ESCAPE '\'
            ORDER BY id
            "#,
            ACCOUNT_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(&self.pool)
            .await
            .context("Failed to search accounts")?;

        rows.iter()
            .map(|row| row_to_account(row).map_err(anyhow::Error::from))
            .collect()
    }

    /// Sum balances per account type over accounts with `balance >= min_balance`,
    /// largest total first.
    pub async fn balance_totals_by_type(&self, min_balance: Cents) -> Result<Vec<TypeTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT account_type, COUNT(*) as accounts, SUM(balance) as total_balance
            FROM accounts
            WHERE balance >= ?
            GROUP BY account_type
            ORDER BY total_balance DESC, account_type
            "#,
        )
        .bind(min_balance)
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute balance totals")?;

        rows.iter()
            .map(|row| -> Result<TypeTotal> {
                let account_type_str: String = row.get("account_type");
                Ok(TypeTotal {
                    account_type: account_type_str
                        .parse()
                        .map_err(|e: String| anyhow::anyhow!(e))?,
                    accounts: row.get("accounts"),
                    total_balance: row.get("total_balance"),
                })
            })
            .collect()
    }

    // ========================
    // Transaction record operations
    // ========================

    /// List transaction records in the order they were recorded.
    pub async fn list_transactions(
        &self,
        account_id: Option<&str>,
    ) -> Result<Vec<TransactionRecord>> {
        let mut sql = format!("SELECT {} FROM transactions", RECORD_COLUMNS);
        if account_id.is_some() {
            sql.push_str(" WHERE account_id = ?");
        }
        sql.push_str(" ORDER BY sequence");

        let mut query = sqlx::query(&sql);
        if let Some(id) = account_id {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transactions")?;

        rows.iter()
            .map(|row| row_to_record(row).map_err(anyhow::Error::from))
            .collect()
    }

    /// Count all transaction records.
    pub async fn count_transactions(&self) -> Result<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) as count FROM transactions")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count transactions")?
            .get("count");
        Ok(count)
    }
}
