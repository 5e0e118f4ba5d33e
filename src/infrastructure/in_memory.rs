use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::changes::ChangeSet;
use crate::domain::ports::{AccountStore, LedgerStore, RequestStore, TransactionLog};
use crate::domain::request::{PendingRequest, RequestId};
use crate::domain::transaction::{
    HistoryCursor, RecordFilter, TransactionId, TransactionRecord, sort_newest_first,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    requests: BTreeMap<RequestId, PendingRequest>,
    /// Append-only, in id order.
    records: Vec<TransactionRecord>,
}

/// A thread-safe in-memory ledger store.
///
/// All state sits behind one `Arc<RwLock<_>>`, so a commit is applied under a
/// single write guard and readers never see half of it. Ideal for testing or
/// deployments where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    next_request: Arc<AtomicU64>,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(id).cloned())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }
}

#[async_trait]
impl RequestStore for InMemoryStore {
    async fn get_request(&self, id: RequestId) -> Result<Option<PendingRequest>> {
        let state = self.state.read().await;
        Ok(state.requests.get(&id).cloned())
    }

    async fn all_requests(&self) -> Result<Vec<PendingRequest>> {
        let state = self.state.read().await;
        Ok(state.requests.values().cloned().collect())
    }

    async fn find_pending(
        &self,
        requester: &AccountId,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<Option<PendingRequest>> {
        let state = self.state.read().await;
        Ok(state
            .requests
            .values()
            .find(|r| r.duplicates(requester, payer, amount))
            .cloned())
    }

    async fn pending_for_payer(&self, payer: &AccountId) -> Result<Vec<PendingRequest>> {
        let state = self.state.read().await;
        let mut pending: Vec<_> = state
            .requests
            .values()
            .filter(|r| r.is_pending() && r.payer == *payer)
            .cloned()
            .collect();
        pending.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(pending)
    }

    async fn next_request_id(&self) -> Result<RequestId> {
        Ok(RequestId(self.next_request.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[async_trait]
impl TransactionLog for InMemoryStore {
    async fn get_record(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        let state = self.state.read().await;
        Ok(state.records.iter().find(|r| r.id == id).cloned())
    }

    async fn records_for(
        &self,
        account: &AccountId,
        filter: &RecordFilter,
        after: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let state = self.state.read().await;
        let mut matching: Vec<_> = state
            .records
            .iter()
            .filter(|r| filter.matches(account, r))
            .filter(|r| after.is_none_or(|cursor| r.cursor() < cursor))
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn records_by_request(&self, request: RequestId) -> Result<Vec<TransactionRecord>> {
        let state = self.state.read().await;
        Ok(state
            .records
            .iter()
            .filter(|r| r.request == Some(request))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<TransactionId>> {
        let mut state = self.state.write().await;

        // Build every record before touching state so a bad one aborts the lot.
        let now = Utc::now();
        let first_id = state.records.last().map_or(1, |r| r.id.0 + 1);
        let records = changes
            .records
            .into_iter()
            .zip(first_id..)
            .map(|(record, id)| record.into_record(TransactionId(id), now))
            .collect::<Result<Vec<_>>>()?;

        for flip in &changes.flips {
            state
                .records
                .iter_mut()
                .filter(|r| r.request == Some(flip.request) && r.status == flip.from)
                .for_each(|r| r.status = flip.to);
        }
        let ids = records.iter().map(|r| r.id).collect();
        state.records.extend(records);
        for account in changes.accounts {
            state.accounts.insert(account.id.clone(), account);
        }
        for request in changes.requests {
            state.requests.insert(request.id, request);
        }
        Ok(ids)
    }
}
