#![allow(dead_code)]

use peerpay::application::engine::PaymentEngine;
use peerpay::config::EngineConfig;
use peerpay::domain::account::AccountId;
use peerpay::infrastructure::directory::InMemoryDirectory;
use peerpay::infrastructure::in_memory::InMemoryStore;
use peerpay::infrastructure::notify::{ChannelNotifier, Notification};
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const HEADER: [&str; 6] = ["type", "account", "counterparty", "amount", "request", "memo"];

/// Engine over a fresh in-memory store with `accounts` registered.
pub fn engine_with(accounts: &[&str]) -> (PaymentEngine, UnboundedReceiver<Notification>) {
    let directory = InMemoryDirectory::with_accounts(accounts.iter().copied());
    let (notifier, rx) = ChannelNotifier::new();
    let engine = PaymentEngine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(directory),
        Arc::new(notifier),
        EngineConfig::default().with_lock_timeout(Duration::from_secs(5)),
    );
    (engine, rx)
}

pub fn id(account: &str) -> AccountId {
    AccountId::from(account)
}

pub async fn total_balance(engine: &PaymentEngine) -> u64 {
    engine
        .accounts()
        .await
        .unwrap()
        .iter()
        .map(|a| a.balance.minor_units())
        .sum()
}

/// Opens `clients` accounts, funds each with 100.00 and then has them pass
/// 0.01 around in a ring, `rows` transfers in total.
pub fn generate_csv(path: &Path, clients: usize, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    for c in 0..clients {
        let account = format!("user{c}");
        wtr.write_record(["open", &account, "", "", "", ""])?;
        wtr.write_record(["deposit", &account, "", "100.00", "", ""])?;
    }
    for i in 0..rows {
        let from = format!("user{}", i % clients);
        let to = format!("user{}", (i + 1) % clients);
        wtr.write_record(["transfer", &from, &to, "0.01", "", ""])?;
    }

    wtr.flush()?;
    Ok(())
}
