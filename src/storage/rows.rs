use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::domain::{Account, AccountType, TransactionRecord};

pub(crate) const ACCOUNT_COLUMNS: &str = "id, holder, account_type, balance";
pub(crate) const RECORD_COLUMNS: &str = "id, account_id, amount, recorded_at";

/// `SET` clause adding a delta to `balance`. Binds: low, high (from
/// [`increment_bounds`](crate::domain::increment_bounds)), then the delta.
/// Outside the bounds it yields NULL, which `balance NOT NULL` rejects.
pub(crate) const GUARDED_INCREMENT: &str =
    "balance = CASE WHEN balance BETWEEN ? AND ? THEN balance + ? END";

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

pub(crate) fn row_to_account(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    let account_type_str: String = row.try_get("account_type")?;

    Ok(Account {
        id: row.try_get("id")?,
        holder: row.try_get("holder")?,
        account_type: account_type_str.parse::<AccountType>().map_err(decode_error)?,
        balance: row.try_get("balance")?,
    })
}

pub(crate) fn row_to_record(row: &SqliteRow) -> Result<TransactionRecord, sqlx::Error> {
    let id_str: String = row.try_get("id")?;
    let recorded_at_str: String = row.try_get("recorded_at")?;

    Ok(TransactionRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| decode_error(format!("invalid transaction id {}: {}", id_str, e)))?,
        amount: row.try_get("amount")?,
        account_id: row.try_get("account_id")?,
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
            .map_err(|e| decode_error(format!("invalid recorded_at {}: {}", recorded_at_str, e)))?
            .with_timezone(&Utc),
    })
}
