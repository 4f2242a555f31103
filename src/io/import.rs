use anyhow::Result;
use serde::Deserialize;
use std::io::Read;

use crate::application::AccountService;
use crate::domain::{Account, AccountType, parse_cents};

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: u64,
    pub errors: Vec<ImportError>,
}

/// A row that could not be read
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub error: String,
}

#[derive(Debug, Deserialize)]
struct AccountRow {
    id: String,
    holder: String,
    #[serde(rename = "type")]
    account_type: String,
    balance: String,
}

impl AccountRow {
    fn into_account(self) -> std::result::Result<Account, String> {
        let account_type: AccountType = self.account_type.parse()?;
        let balance = parse_cents(&self.balance).map_err(|e| e.to_string())?;
        Ok(Account::new(self.id, self.holder, account_type).with_balance(balance))
    }
}

/// Importer for seeding accounts. Imports are ordered and all-or-nothing:
/// a file with any bad row imports nothing.
pub struct Importer<'a> {
    service: &'a AccountService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a AccountService) -> Self {
        Self { service }
    }

    /// Import accounts from CSV with header `id,holder,type,balance`,
    /// balances as decimal strings.
    pub async fn import_accounts_csv<R: Read>(
        &self,
        reader: R,
        dry_run: bool,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut accounts = Vec::new();
        let mut errors = Vec::new();

        for (index, row) in csv_reader.deserialize::<AccountRow>().enumerate() {
            let line = index + 2; // header is line 1
            match row.map_err(|e| e.to_string()).and_then(AccountRow::into_account) {
                Ok(account) => accounts.push(account),
                Err(error) => errors.push(ImportError { line, error }),
            }
        }

        self.finish(accounts, errors, dry_run).await
    }

    /// Import accounts from a JSON array as written by the exporter
    /// (balances in cents).
    pub async fn import_accounts_json<R: Read>(
        &self,
        reader: R,
        dry_run: bool,
    ) -> Result<ImportResult> {
        let accounts: Vec<Account> = serde_json::from_reader(reader)?;
        self.finish(accounts, Vec::new(), dry_run).await
    }

    async fn finish(
        &self,
        accounts: Vec<Account>,
        errors: Vec<ImportError>,
        dry_run: bool,
    ) -> Result<ImportResult> {
        if !errors.is_empty() || dry_run {
            return Ok(ImportResult { imported: 0, errors });
        }

        let imported = self.service.create_accounts(accounts).await?;
        Ok(ImportResult { imported, errors })
    }
}
