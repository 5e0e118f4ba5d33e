use super::account::{AccountId, Amount};
use super::request::RequestId;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Transfer,
    RequestSent,
    RequestReceived,
    RequestApproved,
    RequestDenied,
    SplitSent,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Transfer => "transfer",
            TransactionKind::RequestSent => "request_sent",
            TransactionKind::RequestReceived => "request_received",
            TransactionKind::RequestApproved => "request_approved",
            TransactionKind::RequestDenied => "request_denied",
            TransactionKind::SplitSent => "split_sent",
        }
    }

    fn is_request_event(&self) -> bool {
        matches!(
            self,
            TransactionKind::RequestSent
                | TransactionKind::RequestReceived
                | TransactionKind::RequestApproved
                | TransactionKind::RequestDenied
        )
    }

    fn has_target(&self) -> bool {
        !matches!(self, TransactionKind::Deposit | TransactionKind::SplitSent)
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "transfer" => Ok(TransactionKind::Transfer),
            "request_sent" => Ok(TransactionKind::RequestSent),
            "request_received" => Ok(TransactionKind::RequestReceived),
            "request_approved" => Ok(TransactionKind::RequestApproved),
            "request_denied" => Ok(TransactionKind::RequestDenied),
            "split_sent" => Ok(TransactionKind::SplitSent),
            other => Err(LedgerError::InvalidRecord(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "rejected" => Ok(TransactionStatus::Rejected),
            other => Err(LedgerError::InvalidRecord(format!(
                "unknown transaction status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Rejected => "rejected",
        })
    }
}

/// A record waiting to be appended to the transaction log.
///
/// The log assigns the id, and the timestamp when none is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: TransactionKind,
    pub initiator: AccountId,
    pub target: Option<AccountId>,
    /// Raw minor units; checked by [`NewRecord::validate`].
    pub amount: i64,
    pub status: TransactionStatus,
    pub memo: Option<String>,
    pub request: Option<RequestId>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewRecord {
    pub fn new(
        kind: TransactionKind,
        initiator: AccountId,
        target: Option<AccountId>,
        amount: Amount,
        status: TransactionStatus,
    ) -> Self {
        Self {
            kind,
            initiator,
            target,
            amount: amount.into(),
            status,
            memo: None,
            request: None,
            timestamp: None,
        }
    }

    pub fn with_memo(mut self, memo: Option<&str>) -> Self {
        self.memo = memo.map(str::to_owned);
        self
    }

    pub fn with_request(mut self, request: RequestId) -> Self {
        self.request = Some(request);
        self
    }

    /// Structural checks; a failure here means the caller has a bug.
    pub fn validate(&self) -> Result<Amount> {
        let amount = Amount::new(self.amount)
            .map_err(|_| LedgerError::InvalidRecord(format!("amount {} is not positive", self.amount)))?;
        if self.kind.has_target() != self.target.is_some() {
            return Err(LedgerError::InvalidRecord(format!(
                "{} record has unexpected target {:?}",
                self.kind, self.target
            )));
        }
        if self.kind.is_request_event() != self.request.is_some() {
            return Err(LedgerError::InvalidRecord(format!(
                "{} record has unexpected request reference {:?}",
                self.kind, self.request
            )));
        }
        Ok(amount)
    }

    pub fn into_record(self, id: TransactionId, now: DateTime<Utc>) -> Result<TransactionRecord> {
        let amount = self.validate()?;
        Ok(TransactionRecord {
            id,
            kind: self.kind,
            initiator: self.initiator,
            target: self.target,
            amount,
            status: self.status,
            timestamp: self.timestamp.unwrap_or(now),
            memo: self.memo,
            request: self.request,
        })
    }
}

/// One line of the append-only audit log, from one side's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub initiator: AccountId,
    pub target: Option<AccountId>,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub timestamp: DateTime<Utc>,
    pub memo: Option<String>,
    pub request: Option<RequestId>,
}

impl TransactionRecord {
    pub fn involves(&self, account: &AccountId) -> bool {
        self.initiator == *account || self.target.as_ref() == Some(account)
    }

    /// Position in the history order (newest first).
    pub fn cursor(&self) -> HistoryCursor {
        HistoryCursor {
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

/// Keyset position in an account's history; pages continue strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HistoryCursor {
    pub timestamp: DateTime<Utc>,
    pub id: TransactionId,
}

/// Narrows a history query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub kind: Option<TransactionKind>,
    pub status: Option<TransactionStatus>,
    /// Only rows the account initiated, i.e. its own side of each event.
    pub own_rows: bool,
}

impl RecordFilter {
    pub fn matches(&self, account: &AccountId, record: &TransactionRecord) -> bool {
        let side = if self.own_rows {
            record.initiator == *account
        } else {
            record.involves(account)
        };
        side && self.kind.is_none_or(|k| k == record.kind)
            && self.status.is_none_or(|s| s == record.status)
    }
}

/// Sorts newest first; ties on timestamp fall back to the id.
pub fn sort_newest_first(records: &mut [TransactionRecord]) {
    records.sort_by(|a, b| b.cursor().cmp(&a.cursor()));
}
