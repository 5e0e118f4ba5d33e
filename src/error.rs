use crate::domain::account::{AccountId, Amount, Balance};
use crate::domain::request::RequestId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("Insufficient funds in {account}: balance {balance}, needed {needed}")]
    InsufficientFunds {
        account: AccountId,
        balance: Balance,
        needed: Amount,
    },
    #[error("Account {0} cannot request funds from itself")]
    SelfRequest(AccountId),
    #[error("Account {0} cannot transfer funds to itself")]
    SelfTransfer(AccountId),
    #[error("Request {existing} for {amount} from {payer} to {requester} is already pending")]
    DuplicatePendingRequest {
        existing: RequestId,
        requester: AccountId,
        payer: AccountId,
        amount: Amount,
    },
    /// Unknown and already-resolved requests are reported the same way.
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),
    #[error("Invalid transaction record: {0}")]
    InvalidRecord(String),
    #[error("Balance overflow on account {0}")]
    BalanceOverflow(AccountId),
    #[error("Timed out waiting for {0}; retry the operation")]
    Busy(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Busy(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Storage(err.into_string())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
