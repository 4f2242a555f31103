// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bankroll::application::{AccountService, LedgerService};
use bankroll::domain::{Account, AccountType, Cents, TransactionId, TransactionRecord};
use bankroll::storage::{
    AccountFilter, AccountUpdate, Database, Session, SqliteSession, SqliteStorage, Storage,
    StorageError,
};
use tempfile::TempDir;

/// A migrated database in a temporary directory plus the services over it
pub struct TestLedger {
    pub db: Database,
    pub ledger: LedgerService<SqliteStorage>,
    pub accounts: AccountService,
}

/// Helper to create services over a temporary database
pub async fn test_ledger() -> Result<(TestLedger, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db = Database::init(&db_path, Duration::from_secs(5)).await?;

    let ledger = LedgerService::new(db.storage());
    let accounts = AccountService::new(db.repository());
    Ok((
        TestLedger {
            db,
            ledger,
            accounts,
        },
        temp_dir,
    ))
}

/// Test fixture: the accounts from the seeding script plus a business account
pub struct StandardAccounts;

impl StandardAccounts {
    pub const JOHN: &'static str = "UUS3434ODPS";
    pub const MICHAEL: &'static str = "UGGF3423ODPS";
    pub const MICK: &'static str = "UGGF3423OGGDS";
    pub const ACME: &'static str = "BIZ0001ACME";

    pub fn all() -> Vec<Account> {
        vec![
            Account::new(Self::JOHN, "John Random", AccountType::Private).with_balance(132323),
            Account::new(Self::MICHAEL, "Michael Random", AccountType::Private)
                .with_balance(12323),
            Account::new(Self::MICK, "Mick Happy", AccountType::Private).with_balance(100000),
            Account::new(Self::ACME, "Acme Ltd", AccountType::Business).with_balance(500000),
        ]
    }

    pub async fn create(service: &AccountService) -> Result<()> {
        service.create_accounts(Self::all()).await?;
        Ok(())
    }
}

/// Create a single account with a balance
pub async fn create_account(service: &AccountService, id: &str, balance: Cents) -> Result<()> {
    service
        .create_account(Account::new(id, "Test Holder", AccountType::Private).with_balance(balance))
        .await?;
    Ok(())
}

pub async fn balance_of(service: &AccountService, id: &str) -> Result<Cents> {
    Ok(service.get_account(id).await?.balance)
}

/// Switches for the faults a [`FlakyStorage`] injects. The `fail_*` flags
/// fire once and reset themselves.
#[derive(Default)]
pub struct Faults {
    pub fail_start: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_commit: AtomicBool,
    pub commit_delay_ms: AtomicU64,
    pub aborts: AtomicU64,
}

impl Faults {
    pub fn arm(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn fire(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    pub fn abort_count(&self) -> u64 {
        self.aborts.load(Ordering::SeqCst)
    }
}

fn injected(what: &str) -> StorageError {
    StorageError::Database(sqlx::Error::Protocol(format!("injected {} failure", what)))
}

/// SQLite storage wrapper that fails on demand
#[derive(Clone)]
pub struct FlakyStorage {
    inner: SqliteStorage,
    pub faults: Arc<Faults>,
}

impl FlakyStorage {
    pub fn new(inner: SqliteStorage) -> Self {
        Self {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }
}

pub struct FlakySession {
    inner: SqliteSession,
    faults: Arc<Faults>,
}

#[async_trait]
impl Storage for FlakyStorage {
    type Session = FlakySession;

    async fn start_session(&self) -> Result<FlakySession, StorageError> {
        if Faults::fire(&self.faults.fail_start) {
            return Err(injected("session"));
        }
        Ok(FlakySession {
            inner: self.inner.start_session().await?,
            faults: Arc::clone(&self.faults),
        })
    }
}

#[async_trait]
impl Session for FlakySession {
    async fn find_and_update(
        &mut self,
        filter: &AccountFilter,
        update: &AccountUpdate,
    ) -> Result<Option<Account>, StorageError> {
        if Faults::fire(&self.faults.fail_update) {
            return Err(injected("update"));
        }
        self.inner.find_and_update(filter, update).await
    }

    async fn insert_one(
        &mut self,
        record: &TransactionRecord,
    ) -> Result<TransactionId, StorageError> {
        if Faults::fire(&self.faults.fail_insert) {
            return Err(injected("insert"));
        }
        self.inner.insert_one(record).await
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        let delay = self.faults.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if Faults::fire(&self.faults.fail_commit) {
            return Err(injected("commit"));
        }
        self.inner.commit().await
    }

    async fn abort(&mut self) -> Result<(), StorageError> {
        self.faults.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort().await
    }
}

/// Ledger over a [`FlakyStorage`] sharing the test database
pub fn flaky_ledger(env: &TestLedger) -> (LedgerService<FlakyStorage>, Arc<Faults>) {
    let storage = FlakyStorage::new(env.db.storage());
    let faults = Arc::clone(&storage.faults);
    (LedgerService::new(storage), faults)
}
