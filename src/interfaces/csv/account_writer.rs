use crate::domain::account::Account;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow<'a> {
    account: &'a str,
    balance: Decimal,
}

/// Writes final balances as `account,balance` CSV in major units.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        for account in accounts {
            self.writer.serialize(BalanceRow {
                account: account.id.as_str(),
                balance: account.balance.to_major(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
