use crate::domain::account::{AccountId, minor_units_from_major};
use crate::domain::request::RequestId;
use crate::error::{LedgerError, Result};
use crate::interfaces::commands::Command;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Deposit,
    Transfer,
    Request,
    Approve,
    Deny,
    Split,
}

/// One raw CSV row: `type, account, counterparty, amount, request, memo`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRow {
    pub r#type: CommandType,
    pub account: Option<String>,
    pub counterparty: Option<String>,
    /// Kept as text so major units are parsed exactly, never through `f64`.
    pub amount: Option<String>,
    pub request: Option<u64>,
    pub memo: Option<String>,
}

fn required<T>(value: Option<T>, field: &str, kind: CommandType) -> Result<T> {
    value.ok_or_else(|| {
        LedgerError::InvalidRecord(format!("{kind:?} command is missing '{field}'"))
    })
}

fn parse_major(raw: &str) -> Result<i64> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| LedgerError::InvalidAmount(format!("'{raw}' is not a number")))?;
    minor_units_from_major(value)
}

/// Parses `bob:4.00;carol:6.00` into recipients with minor-unit shares.
fn parse_recipients(raw: &str) -> Result<Vec<(AccountId, i64)>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (account, share) = entry.split_once(':').ok_or_else(|| {
                LedgerError::InvalidRecord(format!("split recipient '{entry}' has no amount"))
            })?;
            Ok((AccountId::from(account.trim()), parse_major(share)?))
        })
        .collect()
}

impl TryFrom<CommandRow> for Command {
    type Error = LedgerError;

    fn try_from(row: CommandRow) -> Result<Self> {
        let kind = row.r#type;
        let memo = row.memo.filter(|m| !m.is_empty());
        let amount = || -> Result<i64> { parse_major(&required(row.amount.clone(), "amount", kind)?) };
        let account = || required(row.account.clone(), "account", kind).map(AccountId::from);
        let counterparty =
            || required(row.counterparty.clone(), "counterparty", kind).map(AccountId::from);
        let request = || required(row.request, "request", kind).map(RequestId);

        Ok(match kind {
            CommandType::Open => Command::Open { account: account()? },
            CommandType::Deposit => Command::Deposit {
                account: account()?,
                amount: amount()?,
            },
            CommandType::Transfer => Command::Transfer {
                from: account()?,
                to: counterparty()?,
                amount: amount()?,
                memo,
            },
            CommandType::Request => Command::Request {
                requester: account()?,
                payer: counterparty()?,
                amount: amount()?,
                memo,
            },
            CommandType::Approve => Command::Approve {
                request: request()?,
            },
            CommandType::Deny => Command::Deny {
                request: request()?,
            },
            CommandType::Split => Command::Split {
                payer: account()?,
                recipients: parse_recipients(&required(row.counterparty.clone(), "counterparty", kind)?)?,
                total: amount()?,
                memo,
            },
        })
    }
}

/// Reads ledger commands from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Command>`.
/// It handles whitespace trimming and flexible record lengths automatically.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and validates commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize::<CommandRow>().map(|result| {
            result
                .map_err(LedgerError::from)
                .and_then(Command::try_from)
        })
    }
}
