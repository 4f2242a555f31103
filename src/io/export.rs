use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{AccountQuery, AccountService};
use crate::domain::{Account, TransactionRecord, format_cents};

/// Full dump of accounts and transaction records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub transactions: Vec<TransactionRecord>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a AccountService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a AccountService) -> Self {
        Self { service }
    }

    /// Export accounts to CSV, balances as decimal strings.
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts(AccountQuery::default()).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "holder", "type", "balance"])?;

        for account in &accounts {
            csv_writer.write_record([
                account.id.as_str(),
                account.holder.as_str(),
                account.account_type.as_str(),
                format_cents(account.balance).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export transaction records to CSV, oldest first.
    pub async fn export_transactions_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.service.list_transactions(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "account_id", "amount", "recorded_at"])?;

        for record in &records {
            csv_writer.write_record(&[
                record.id.to_string(),
                record.account_id.clone(),
                format_cents(record.amount),
                record.recorded_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(records.len())
    }

    /// Export accounts as a JSON array (balances in cents).
    pub async fn export_accounts_json<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts(AccountQuery::default()).await?;
        serde_json::to_writer_pretty(writer, &accounts)?;
        Ok(accounts.len())
    }

    /// Export transaction records as a JSON array.
    pub async fn export_transactions_json<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.service.list_transactions(None).await?;
        serde_json::to_writer_pretty(writer, &records)?;
        Ok(records.len())
    }

    /// Export everything as one JSON document.
    pub async fn export_snapshot<W: Write>(&self, writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: self.service.list_accounts(AccountQuery::default()).await?,
            transactions: self.service.list_transactions(None).await?,
        };
        serde_json::to_writer_pretty(writer, &snapshot)?;
        Ok(snapshot)
    }
}
