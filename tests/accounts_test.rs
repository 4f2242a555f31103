mod common;

use anyhow::Result;
use bankroll::application::{AccountQuery, AppError};
use bankroll::domain::{Account, AccountType, BalanceOrder};
use common::{StandardAccounts, balance_of, test_ledger};

#[tokio::test]
async fn test_create_and_get_account() -> Result<()> {
    let (env, _temp) = test_ledger().await?;

    let account = Account::new("UUS3434ODPS", "John Random", AccountType::Private)
        .with_balance(132323);
    env.accounts.create_account(account.clone()).await?;

    let fetched = env.accounts.get_account("UUS3434ODPS").await?;
    assert_eq!(fetched, account);

    Ok(())
}

#[tokio::test]
async fn test_duplicate_account_is_rejected() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    StandardAccounts::create(&env.accounts).await?;

    let err = env
        .accounts
        .create_account(Account::new(
            StandardAccounts::JOHN,
            "Someone Else",
            AccountType::Business,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AccountAlreadyExists(_)));
    let john = env.accounts.get_account(StandardAccounts::JOHN).await?;
    assert_eq!(john.holder, "John Random");

    Ok(())
}

#[tokio::test]
async fn test_get_missing_account() -> Result<()> {
    let (env, _temp) = test_ledger().await?;

    let err = env.accounts.get_account("missing").await.unwrap_err();
    assert!(matches!(err, AppError::AccountNotFound(_)));

    Ok(())
}

#[tokio::test]
async fn test_batch_insert_is_all_or_nothing() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    StandardAccounts::create(&env.accounts).await?;

    // clashes with an existing account
    let err = env
        .accounts
        .create_accounts(vec![
            Account::new("NEW1", "New One", AccountType::Private),
            Account::new(StandardAccounts::MICK, "Mick Again", AccountType::Private),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountAlreadyExists(ref id) if id == StandardAccounts::MICK));
    assert!(env.accounts.get_account("NEW1").await.is_err());

    // clashes within the batch itself
    let err = env
        .accounts
        .create_accounts(vec![
            Account::new("NEW2", "New Two", AccountType::Private),
            Account::new("NEW2", "New Two Again", AccountType::Private),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AccountAlreadyExists(ref id) if id == "NEW2"));
    assert!(env.accounts.get_account("NEW2").await.is_err());

    let inserted = env
        .accounts
        .create_accounts(vec![
            Account::new("NEW3", "New Three", AccountType::Private),
            Account::new("NEW4", "New Four", AccountType::Business),
        ])
        .await?;
    assert_eq!(inserted, 2);

    Ok(())
}

#[tokio::test]
async fn test_list_accounts_filters_and_sorts() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    StandardAccounts::create(&env.accounts).await?;

    let ascending = env
        .accounts
        .list_accounts(AccountQuery {
            min_balance: Some(100000),
            order: BalanceOrder::Ascending,
        })
        .await?;
    let ids: Vec<_> = ascending.iter().map(|a| a.id.as_str()).collect();
    // strictly greater: Mick's 1000.00 is excluded
    assert_eq!(ids, vec![StandardAccounts::JOHN, StandardAccounts::ACME]);

    let descending = env
        .accounts
        .list_accounts(AccountQuery {
            min_balance: None,
            order: BalanceOrder::Descending,
        })
        .await?;
    let balances: Vec<_> = descending.iter().map(|a| a.balance).collect();
    assert_eq!(balances, vec![500000, 132323, 100000, 12323]);

    Ok(())
}

#[tokio::test]
async fn test_increment_by_holder() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    StandardAccounts::create(&env.accounts).await?;
    env.accounts
        .create_account(
            Account::new("UUS9999ODPS", "John Random", AccountType::Business).with_balance(100),
        )
        .await?;

    let outcome = env
        .accounts
        .increment_by_holder("John Random", 10000, None)
        .await?;

    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.modified, 2);
    assert_eq!(outcome.upserted_id, None);
    assert_eq!(balance_of(&env.accounts, StandardAccounts::JOHN).await?, 142323);
    assert_eq!(balance_of(&env.accounts, "UUS9999ODPS").await?, 10100);

    // a zero increment matches but modifies nothing
    let outcome = env
        .accounts
        .increment_by_holder("John Random", 0, None)
        .await?;
    assert_eq!(outcome.matched, 2);
    assert_eq!(outcome.modified, 0);

    // increments do not touch the transaction log
    assert_eq!(env.accounts.count_transactions().await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_increment_by_holder_upserts_only_when_nothing_matches() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    StandardAccounts::create(&env.accounts).await?;

    let outcome = env
        .accounts
        .increment_by_holder(
            "Jane Doe",
            10000,
            Some(Account::new("JANE0001", "ignored", AccountType::Private)),
        )
        .await?;
    assert_eq!(outcome.matched, 0);
    assert_eq!(outcome.upserted_id.as_deref(), Some("JANE0001"));

    let jane = env.accounts.get_account("JANE0001").await?;
    assert_eq!(jane.holder, "Jane Doe");
    assert_eq!(jane.balance, 10000);

    // second run matches the upserted account instead of inserting again
    let outcome = env
        .accounts
        .increment_by_holder(
            "Jane Doe",
            10000,
            Some(Account::new("JANE0002", "ignored", AccountType::Private)),
        )
        .await?;
    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.upserted_id, None);
    assert_eq!(balance_of(&env.accounts, "JANE0001").await?, 20000);
    assert!(env.accounts.get_account("JANE0002").await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_delete_by_holder() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    StandardAccounts::create(&env.accounts).await?;
    env.accounts
        .create_accounts(vec![
            Account::new("AAA1", "John Random", AccountType::Private),
            Account::new("ZZZ1", "John Random", AccountType::Private),
        ])
        .await?;

    // the first by id goes
    assert!(env.accounts.delete_one_by_holder("John Random").await?);
    assert!(env.accounts.get_account("AAA1").await.is_err());

    assert_eq!(env.accounts.delete_many_by_holder("John Random").await?, 2);
    assert!(env.accounts.get_account(StandardAccounts::JOHN).await.is_err());

    assert!(!env.accounts.delete_one_by_holder("John Random").await?);
    assert_eq!(env.accounts.delete_many_by_holder("John Random").await?, 0);

    let remaining = env.accounts.list_accounts(AccountQuery::default()).await?;
    assert_eq!(remaining.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_increment_one_by_holder_touches_first_account_only() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    env.accounts
        .create_accounts(vec![
            Account::new("ZZZ1", "Jane Doe", AccountType::Private).with_balance(100),
            Account::new("AAA1", "Jane Doe", AccountType::Business).with_balance(100),
        ])
        .await?;

    let outcome = env
        .accounts
        .increment_one_by_holder("Jane Doe", 500, None)
        .await?;
    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.modified, 1);
    assert_eq!(outcome.upserted_id, None);
    assert_eq!(balance_of(&env.accounts, "AAA1").await?, 600);
    assert_eq!(balance_of(&env.accounts, "ZZZ1").await?, 100);

    let outcome = env
        .accounts
        .increment_one_by_holder("Jane Doe", 0, None)
        .await?;
    assert_eq!(outcome.matched, 1);
    assert_eq!(outcome.modified, 0);

    let outcome = env
        .accounts
        .increment_one_by_holder(
            "John Doe",
            250,
            Some(Account::new("JOHN0001", "ignored", AccountType::Business)),
        )
        .await?;
    assert_eq!(outcome.matched, 0);
    assert_eq!(outcome.modified, 0);
    assert_eq!(outcome.upserted_id.as_deref(), Some("JOHN0001"));
    let john = env.accounts.get_account("JOHN0001").await?;
    assert_eq!(john.holder, "John Doe");
    assert_eq!(john.account_type, AccountType::Business);
    assert_eq!(john.balance, 250);

    Ok(())
}

#[tokio::test]
async fn test_increment_by_holder_rejects_overflow() -> Result<()> {
    let (env, _temp) = test_ledger().await?;
    env.accounts
        .create_accounts(vec![
            Account::new("A1", "Test Holder", AccountType::Private).with_balance(0),
            Account::new("A2", "Test Holder", AccountType::Private).with_balance(i64::MAX - 10),
        ])
        .await?;

    let err = env
        .accounts
        .increment_by_holder("Test Holder", 100, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BalanceOverflow(ref holder) if holder == "Test Holder"));
    assert!(!err.is_retryable());

    // the whole update is rolled back and every account still decodes
    assert_eq!(balance_of(&env.accounts, "A1").await?, 0);
    assert_eq!(balance_of(&env.accounts, "A2").await?, i64::MAX - 10);
    assert_eq!(env.accounts.list_accounts(AccountQuery::default()).await?.len(), 2);

    // first by id is A1 at 0, which can take it
    env.accounts
        .increment_one_by_holder("Test Holder", i64::MIN, None)
        .await?;
    assert_eq!(balance_of(&env.accounts, "A1").await?, i64::MIN);

    Ok(())
}

#[tokio::test]
async fn test_upsert_rejects_overflowing_balance() -> Result<()> {
    let (env, _temp) = test_ledger().await?;

    let err = env
        .accounts
        .increment_by_holder(
            "Nobody Yet",
            1,
            Some(Account::new("MAX1", "ignored", AccountType::Private).with_balance(i64::MAX)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BalanceOverflow(_)));
    assert!(env.accounts.get_account("MAX1").await.is_err());

    Ok(())
}
