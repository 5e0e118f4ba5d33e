use super::account::{Account, AccountId};
use super::request::{PendingRequest, RequestId};
use super::transaction::{NewRecord, TransactionStatus};

/// Flips every record referencing `request` from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFlip {
    pub request: RequestId,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

/// Everything one operation writes, committed by the store as a single unit.
///
/// Stores apply status flips before appending records, so records appended in
/// the same commit are never caught by a flip.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub accounts: Vec<Account>,
    pub requests: Vec<PendingRequest>,
    pub flips: Vec<StatusFlip>,
    pub records: Vec<NewRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an account row, replacing any earlier staged copy.
    pub fn put_account(&mut self, account: Account) {
        match self.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(staged) => *staged = account,
            None => self.accounts.push(account),
        }
    }

    pub fn staged_account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == *id)
    }

    pub fn put_request(&mut self, request: PendingRequest) {
        match self.requests.iter_mut().find(|r| r.id == request.id) {
            Some(staged) => *staged = request,
            None => self.requests.push(request),
        }
    }

    pub fn flip_status(&mut self, request: RequestId, from: TransactionStatus, to: TransactionStatus) {
        self.flips.push(StatusFlip { request, from, to });
    }

    pub fn append(&mut self, record: NewRecord) {
        self.records.push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.requests.is_empty()
            && self.flips.is_empty()
            && self.records.is_empty()
    }
}
