use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::application::{AccountQuery, AccountService, LedgerService};
use crate::config::Config;
use crate::domain::{Account, AccountType, BalanceOrder, Cents, format_cents, parse_cents};
use crate::storage::{Database, SqliteStorage};

/// Bankroll - transactional account ledger
#[derive(Parser)]
#[command(name = "bankroll")]
#[command(about = "Account balances with an atomic balance-and-audit transaction")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the config file)
    #[arg(short, long)]
    pub database: Option<String>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Add an amount to an account balance and record it, atomically
    Transfer {
        /// Account ID
        account: String,

        /// Signed amount (e.g., "100", "-25.50")
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Abort if the transaction takes longer than this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// List recorded transactions
    Transactions {
        /// Only transactions for this account
        #[arg(long)]
        account: Option<String>,
    },

    /// Generate reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: accounts, transactions, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (default: csv; full is always json)
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a new account
    Create {
        /// Account ID (must be unique)
        id: String,

        /// Account holder name
        #[arg(long)]
        holder: String,

        /// Account type: private, business
        #[arg(short = 't', long = "type", default_value = "private")]
        account_type: String,

        /// Opening balance (e.g., "1323.23")
        #[arg(short, long, default_value = "0", allow_hyphen_values = true)]
        balance: String,
    },

    /// Import accounts from a CSV or JSON file (all or nothing)
    Import {
        /// Input file; format is picked from the extension (.json or .csv)
        input: PathBuf,

        /// Validate without importing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show an account
    Show {
        /// Account ID
        id: String,
    },

    /// List accounts sorted by balance
    List {
        /// Only accounts with a balance above this amount
        #[arg(long, allow_hyphen_values = true)]
        min_balance: Option<String>,

        /// Sort by balance, largest first
        #[arg(long)]
        desc: bool,
    },

    /// Add an amount to accounts of a holder
    Update {
        /// Holder name
        holder: String,

        /// Signed amount to add
        #[arg(allow_hyphen_values = true)]
        amount: String,

        /// Update every matching account instead of only the first
        #[arg(long)]
        all: bool,

        /// Create this account ID for the holder when none exists
        #[arg(long)]
        upsert_id: Option<String>,

        /// Type for the upserted account
        #[arg(long, default_value = "private")]
        upsert_type: String,
    },

    /// Delete accounts of a holder
    Delete {
        /// Holder name
        holder: String,

        /// Delete every matching account instead of only the first
        #[arg(long)]
        all: bool,
    },

    /// Search accounts by id, holder or type
    Search {
        /// Text to look for (case-insensitive)
        term: String,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Balance totals per account type
    ByType {
        /// Only accounts with at least this balance
        #[arg(long, default_value = "1000", allow_hyphen_values = true)]
        min_balance: String,

        /// Conversion rate for the second currency (defaults to the config value)
        #[arg(long)]
        rate: Option<f64>,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub async fn run(self) -> Result<()> {
        let config = self.load_config()?;

        let command = match self.command {
            Commands::Init => {
                let db = Database::init(&config.database, config.busy_timeout()).await?;
                db.close().await;
                println!("Database initialized: {}", config.database);
                return Ok(());
            }
            command => command,
        };

        let db = Database::connect(&config.database, config.busy_timeout())
            .await
            .with_context(|| {
                format!(
                    "Cannot open {}. Run `bankroll init` first",
                    config.database
                )
            })?;
        let accounts = AccountService::new(db.repository());

        let result = match command {
            Commands::Init => unreachable!("init returns before the database is opened"),

            Commands::Account(cmd) => run_account_command(&accounts, cmd).await,

            Commands::Transfer {
                account,
                amount,
                timeout,
            } => {
                let ledger = LedgerService::new(db.storage());
                let amount = parse_cents(&amount).context("Invalid amount format")?;
                let timeout = timeout
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| config.session_timeout());
                run_transfer_command(&ledger, &accounts, &account, amount, timeout).await
            }

            Commands::Transactions { account } => {
                run_transactions_command(&accounts, account.as_deref()).await
            }

            Commands::Report(cmd) => run_report_command(&accounts, &config, cmd).await,

            Commands::Export {
                export_type,
                output,
                format,
            } => run_export_command(&accounts, &export_type, output.as_deref(), &format).await,
        };

        db.close().await;
        result
    }
}

async fn run_transfer_command(
    ledger: &LedgerService<SqliteStorage>,
    accounts: &AccountService,
    account_id: &str,
    amount: Cents,
    timeout: std::time::Duration,
) -> Result<()> {
    match ledger
        .transfer_and_record_within(account_id, amount, timeout)
        .await
    {
        Ok(record) => {
            info!(account = account_id, amount, id = %record.id, "transaction committed");
            let account = accounts.get_account(account_id).await?;
            println!(
                "Transaction committed: {} {} ({})",
                format_cents(record.amount),
                account.id,
                record.id
            );
            println!("New balance: {}", format_cents(account.balance));
            Ok(())
        }
        Err(err) if err.is_retryable() => {
            Err(err).context("Transaction did not complete; it is safe to retry")
        }
        Err(err) => Err(err.into()),
    }
}

async fn run_account_command(service: &AccountService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Create {
            id,
            holder,
            account_type,
            balance,
        } => {
            let account_type = parse_account_type(&account_type)?;
            let balance = parse_cents(&balance).context("Invalid balance format")?;
            let account = service
                .create_account(Account::new(id, holder, account_type).with_balance(balance))
                .await?;
            println!(
                "Created account: {} ({}, {})",
                account.id, account.holder, account.account_type
            );
        }

        AccountCommands::Import { input, dry_run } => {
            use crate::io::Importer;

            let file = std::fs::File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let importer = Importer::new(service);
            let is_json = input
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

            let result = if is_json {
                importer.import_accounts_json(file, dry_run).await?
            } else {
                importer.import_accounts_csv(file, dry_run).await?
            };

            for error in &result.errors {
                eprintln!("  line {}: {}", error.line, error.error);
            }
            if !result.errors.is_empty() {
                bail!("{} invalid row(s); nothing imported", result.errors.len());
            }
            if dry_run {
                println!("Validation passed; nothing imported (dry run)");
            } else {
                println!("Imported {} account(s)", result.imported);
            }
        }

        AccountCommands::Show { id } => {
            let account = service.get_account(&id).await?;
            let records = service.list_transactions(Some(&id)).await?;

            println!("Account: {}", account.id);
            println!("  Holder:       {}", account.holder);
            println!("  Type:         {}", account.account_type);
            println!("  Balance:      {}", format_cents(account.balance));
            println!("  Transactions: {}", records.len());
            if let Some(last) = records.last() {
                println!(
                    "  Last:         {} on {}",
                    format_cents(last.amount),
                    last.recorded_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }

        AccountCommands::List { min_balance, desc } => {
            let min_balance = min_balance
                .map(|m| parse_cents(&m))
                .transpose()
                .context("Invalid minimum balance")?;
            let order = if desc {
                BalanceOrder::Descending
            } else {
                BalanceOrder::Ascending
            };

            let accounts = service
                .list_accounts(AccountQuery { min_balance, order })
                .await?;
            print_accounts(&accounts);
        }

        AccountCommands::Update {
            holder,
            amount,
            all,
            upsert_id,
            upsert_type,
        } => {
            let amount = parse_cents(&amount).context("Invalid amount format")?;
            let upsert = match upsert_id {
                Some(id) => Some(Account::new(
                    id,
                    holder.clone(),
                    parse_account_type(&upsert_type)?,
                )),
                None => None,
            };

            let outcome = if all {
                service.increment_by_holder(&holder, amount, upsert).await?
            } else {
                service.increment_one_by_holder(&holder, amount, upsert).await?
            };
            println!(
                "{} account(s) matched, {} updated",
                outcome.matched, outcome.modified
            );
            if let Some(id) = outcome.upserted_id {
                println!("Inserted account: {}", id);
            }
        }

        AccountCommands::Delete { holder, all } => {
            if all {
                let deleted = service.delete_many_by_holder(&holder).await?;
                println!("{} account(s) deleted", deleted);
            } else if service.delete_one_by_holder(&holder).await? {
                println!("Account deleted");
            } else {
                println!("No account deleted");
            }
        }

        AccountCommands::Search { term } => {
            let accounts = service.search(&term).await?;
            print_accounts(&accounts);
        }
    }
    Ok(())
}

async fn run_transactions_command(service: &AccountService, account: Option<&str>) -> Result<()> {
    if let Some(id) = account {
        // distinguish an unknown account from one without history
        service.get_account(id).await?;
    }

    let records = service.list_transactions(account).await?;
    if records.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:>12} ID",
        "RECORDED", "ACCOUNT", "AMOUNT"
    );
    println!("{}", "-".repeat(88));
    for record in &records {
        println!(
            "{:<20} {:<16} {:>12} {}",
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&record.account_id, 16),
            format_cents(record.amount),
            record.id
        );
    }
    Ok(())
}

async fn run_report_command(
    service: &AccountService,
    config: &Config,
    cmd: ReportCommands,
) -> Result<()> {
    match cmd {
        ReportCommands::ByType {
            min_balance,
            rate,
            format,
        } => {
            let min_balance = parse_cents(&min_balance).context("Invalid minimum balance")?;
            let rate = rate.unwrap_or(config.conversion_rate);
            let report = service.balance_by_type(min_balance, rate).await?;

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&report)?),
                "table" => {
                    println!(
                        "Accounts with balance >= {} (rate {})",
                        format_cents(report.min_balance),
                        report.rate
                    );
                    println!();
                    if report.groups.is_empty() {
                        println!("No accounts found.");
                    } else {
                        println!(
                            "{:<10} {:>8} {:>14} {:>14}",
                            "TYPE", "ACCOUNTS", "BALANCE", "CONVERTED"
                        );
                        println!("{}", "-".repeat(49));
                        for group in &report.groups {
                            println!(
                                "{:<10} {:>8} {:>14} {:>14}",
                                group.account_type,
                                group.accounts,
                                format_cents(group.total_balance),
                                format_cents(group.total_converted)
                            );
                        }
                    }
                }
                other => bail!("Unknown format '{}'. Use table or json", other),
            }
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &AccountService,
    export_type: &str,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    let count = match (export_type, format) {
        ("accounts", "csv") => exporter.export_accounts_csv(writer).await?,
        ("accounts", "json") => exporter.export_accounts_json(writer).await?,
        ("transactions", "csv") => exporter.export_transactions_csv(writer).await?,
        ("transactions", "json") => exporter.export_transactions_json(writer).await?,
        ("full", _) => {
            let snapshot = exporter.export_snapshot(writer).await?;
            snapshot.accounts.len() + snapshot.transactions.len()
        }
        (_, "csv" | "json") => bail!(
            "Unknown export type '{}'. Use accounts, transactions or full",
            export_type
        ),
        (_, other) => bail!("Unknown format '{}'. Use csv or json", other),
    };

    if output.is_some() {
        eprintln!("Exported {} {} row(s)", count, export_type);
    }
    Ok(())
}

fn parse_account_type(value: &str) -> Result<AccountType> {
    value
        .parse()
        .map_err(|e: String| anyhow::anyhow!("Invalid account type: {}", e))
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("No accounts found.");
        return;
    }

    println!(
        "{:<16} {:<24} {:<10} {:>12}",
        "ID", "HOLDER", "TYPE", "BALANCE"
    );
    println!("{}", "-".repeat(65));
    for account in accounts {
        println!(
            "{:<16} {:<24} {:<10} {:>12}",
            truncate(&account.id, 16),
            truncate(&account.holder, 24),
            account.account_type,
            format_cents(account.balance)
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
