use clap::Parser;
use miette::{IntoDiagnostic, Result};
use peerpay::application::engine::PaymentEngine;
use peerpay::config::EngineConfig;
use peerpay::domain::account::AccountId;
use peerpay::domain::ports::StoreHandle;
use peerpay::domain::transaction::RecordFilter;
use peerpay::infrastructure::directory::InMemoryDirectory;
use peerpay::infrastructure::in_memory::InMemoryStore;
use peerpay::infrastructure::notify::LogNotifier;
use peerpay::interfaces::commands::CommandRunner;
use peerpay::interfaces::csv::account_writer::AccountWriter;
use peerpay::interfaces::csv::command_reader::CommandReader;
use peerpay::interfaces::csv::record_writer::RecordWriter;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// How long an operation may wait for account locks
    #[arg(long, default_value_t = 250)]
    lock_timeout_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_filter: String,

    /// Print this account's transaction history instead of balances
    #[arg(long)]
    history: Option<String>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(cli: &Cli) -> Result<StoreHandle> {
    use peerpay::infrastructure::rocksdb::RocksDBStore;

    match &cli.db_path {
        Some(db_path) => {
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(cli: &Cli) -> Result<StoreHandle> {
    if cli.db_path.is_some() {
        warn!("built without the storage-rocksdb feature; --db-path ignored");
    }
    Ok(Arc::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_filter))
        .into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();

    let config = EngineConfig::default().with_lock_timeout(Duration::from_millis(cli.lock_timeout_ms));
    let store = open_store(&cli)?;
    let directory = InMemoryDirectory::new();
    let engine = PaymentEngine::new(
        store,
        Arc::new(directory.clone()),
        Arc::new(LogNotifier),
        config,
    );

    // Holders already present in a persistent ledger stay known.
    for account in engine.known_holders().await.into_diagnostic()? {
        directory.register(account).await;
    }

    let file = File::open(&cli.input).into_diagnostic()?;
    let runner = CommandRunner::new(&engine, &directory);
    let mut applied = 0usize;
    for (line, command) in CommandReader::new(file).commands().enumerate() {
        match command {
            Ok(command) => match runner.run(command).await {
                Ok(()) => applied += 1,
                Err(e) => warn!(line = line + 1, "Error processing command: {}", e),
            },
            Err(e) => warn!(line = line + 1, "Error reading command: {}", e),
        }
    }
    info!(applied, "input processed");

    let stdout = io::stdout();
    match cli.history {
        Some(account) => {
            let records = engine
                .history(&AccountId::from(account), RecordFilter::default())
                .collect_all()
                .await
                .into_diagnostic()?;
            RecordWriter::new(stdout.lock())
                .write_records(&records)
                .into_diagnostic()?;
        }
        None => {
            let accounts = engine.accounts().await.into_diagnostic()?;
            AccountWriter::new(stdout.lock())
                .write_accounts(accounts)
                .into_diagnostic()?;
        }
    }

    Ok(())
}
