use super::account::{Account, AccountId, Amount};
use super::changes::ChangeSet;
use super::request::{PendingRequest, RequestId};
use super::transaction::{HistoryCursor, RecordFilter, TransactionId, TransactionRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get_request(&self, id: RequestId) -> Result<Option<PendingRequest>>;

    /// Every request in any status, in id order.
    async fn all_requests(&self) -> Result<Vec<PendingRequest>>;

    /// The pending request matching the exact triple, if any.
    async fn find_pending(
        &self,
        requester: &AccountId,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<Option<PendingRequest>>;

    /// Pending requests `payer` has to act on, newest first.
    async fn pending_for_payer(&self, payer: &AccountId) -> Result<Vec<PendingRequest>>;

    /// Hands out the next request id. Ids increase monotonically; an id
    /// whose commit fails is simply never used.
    async fn next_request_id(&self) -> Result<RequestId>;
}

#[async_trait]
pub trait TransactionLog: Send + Sync {
    async fn get_record(&self, id: TransactionId) -> Result<Option<TransactionRecord>>;

    /// Records `account` takes part in, newest first, starting strictly after
    /// `after` when given.
    async fn records_for(
        &self,
        account: &AccountId,
        filter: &RecordFilter,
        after: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>>;

    async fn records_by_request(&self, request: RequestId) -> Result<Vec<TransactionRecord>>;
}

/// Storage handle shared by every component.
#[async_trait]
pub trait LedgerStore: AccountStore + RequestStore + TransactionLog {
    /// Applies the whole change set or nothing, returning the ids assigned to
    /// the appended records in order.
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<TransactionId>>;
}

pub type StoreHandle = Arc<dyn LedgerStore>;

/// Identity lookup owned by the account system.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    async fn resolve_account(&self, id: &AccountId) -> Result<bool>;
}

pub type DirectoryHandle = Arc<dyn AccountDirectory>;

/// Best-effort delivery of alerts to account holders.
///
/// Implementations must return promptly and swallow their own failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, account: &AccountId, title: &str, body: &str);
}

pub type NotifierHandle = Arc<dyn Notifier>;
