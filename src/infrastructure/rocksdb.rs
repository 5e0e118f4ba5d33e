use crate::domain::account::{Account, AccountId, Amount};
use crate::domain::changes::ChangeSet;
use crate::domain::ports::{AccountStore, LedgerStore, RequestStore, TransactionLog};
use crate::domain::request::{PendingRequest, RequestId};
use crate::domain::transaction::{HistoryCursor, RecordFilter, TransactionId, TransactionRecord};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for storing account balances.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing payment requests.
pub const CF_REQUESTS: &str = "requests";
/// Column Family for storing the transaction log.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Index: `payer, requester, amount` of each pending request to its id.
pub const CF_PENDING: &str = "pending_requests";
/// Index: `account, timestamp, record id` for every record an account takes part in.
pub const CF_HISTORY: &str = "account_history";
/// Index: `request id, record id` for every record referencing a request.
pub const CF_REQUEST_RECORDS: &str = "request_records";

const SEPARATOR: u8 = 0;

fn account_prefix(account: &AccountId) -> Vec<u8> {
    let mut key = account.as_str().as_bytes().to_vec();
    key.push(SEPARATOR);
    key
}

fn pending_key(payer: &AccountId, requester: &AccountId, amount: Amount) -> Vec<u8> {
    let mut key = account_prefix(payer);
    key.extend_from_slice(&account_prefix(requester));
    key.extend_from_slice(&amount.minor_units().to_be_bytes());
    key
}

/// Sorts like the cursor: byte order equals `(timestamp, id)` order.
fn history_key(account: &AccountId, cursor: HistoryCursor) -> Result<Vec<u8>> {
    let nanos = cursor.timestamp.timestamp_nanos_opt().ok_or_else(|| {
        LedgerError::Storage(format!("timestamp {} out of range", cursor.timestamp))
    })?;
    let mut key = account_prefix(account);
    key.extend_from_slice(&((nanos as u64) ^ (1 << 63)).to_be_bytes());
    key.extend_from_slice(&cursor.id.0.to_be_bytes());
    Ok(key)
}

fn request_record_key(request: RequestId, record: TransactionId) -> Vec<u8> {
    let mut key = request.0.to_be_bytes().to_vec();
    key.extend_from_slice(&record.0.to_be_bytes());
    key
}

/// The id stored in the last eight bytes of an index key.
fn id_suffix(key: &[u8]) -> Result<u64> {
    key.len()
        .checked_sub(8)
        .and_then(|start| key[start..].try_into().ok())
        .map(u64::from_be_bytes)
        .ok_or_else(|| LedgerError::Storage("malformed index key".to_string()))
}

/// A persistent store implementation using RocksDB.
///
/// Accounts, requests and log records live in separate Column Families with
/// JSON values. Numeric ids are stored as big-endian keys so iteration order
/// is id order. Lookups by payer, by account history and by request go
/// through index Column Families kept in the same `WriteBatch` as the rows
/// they point at.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
    next_record: Arc<AtomicU64>,
    next_request: Arc<AtomicU64>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist and resumes the id
    /// sequences after the highest stored keys.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = [
            CF_ACCOUNTS,
            CF_REQUESTS,
            CF_TRANSACTIONS,
            CF_PENDING,
            CF_HISTORY,
            CF_REQUEST_RECORDS,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, families)?;

        let store = Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
            next_record: Arc::new(AtomicU64::new(0)),
            next_request: Arc::new(AtomicU64::new(0)),
        };
        store
            .next_record
            .store(store.last_id(CF_TRANSACTIONS)?, Ordering::SeqCst);
        store
            .next_request
            .store(store.last_id(CF_REQUESTS)?, Ordering::SeqCst);
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("{name} column family not found")))
    }

    fn last_id(&self, name: &str) -> Result<u64> {
        let cf = self.cf(name)?;
        match self.db.iterator_cf(cf, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                id_suffix(&key)
            }
            None => Ok(0),
        }
    }

    fn get_json<T: DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let cf = self.cf(name)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| -> Result<T> {
                let (_key, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    /// Ids encoded at the end of every index key starting with `prefix`.
    fn indexed_ids(&self, name: &str, prefix: &[u8]) -> Result<Vec<u64>> {
        let cf = self.cf(name)?;
        let mut ids = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            // The pending index keeps the id in the value, the others in the key.
            let id = if value.is_empty() { id_suffix(&key)? } else { id_suffix(&value)? };
            ids.push(id);
        }
        Ok(ids)
    }

    fn request_records(&self, request: RequestId) -> Result<Vec<TransactionRecord>> {
        let mut records = Vec::new();
        for id in self.indexed_ids(CF_REQUEST_RECORDS, &request.0.to_be_bytes())? {
            if let Some(record) = self.get_json(CF_TRANSACTIONS, &id.to_be_bytes())? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AccountStore for RocksDBStore {
    async fn get_account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.get_json(CF_ACCOUNTS, id.as_str().as_bytes())
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }
}

#[async_trait]
impl RequestStore for RocksDBStore {
    async fn get_request(&self, id: RequestId) -> Result<Option<PendingRequest>> {
        self.get_json(CF_REQUESTS, &id.0.to_be_bytes())
    }

    async fn all_requests(&self) -> Result<Vec<PendingRequest>> {
        self.scan(CF_REQUESTS)
    }

    async fn find_pending(
        &self,
        requester: &AccountId,
        payer: &AccountId,
        amount: Amount,
    ) -> Result<Option<PendingRequest>> {
        let cf = self.cf(CF_PENDING)?;
        let Some(id) = self.db.get_pinned_cf(cf, pending_key(payer, requester, amount))? else {
            return Ok(None);
        };
        let request: Option<PendingRequest> =
            self.get_json(CF_REQUESTS, &id_suffix(&id)?.to_be_bytes())?;
        Ok(request.filter(|r| r.duplicates(requester, payer, amount)))
    }

    async fn pending_for_payer(&self, payer: &AccountId) -> Result<Vec<PendingRequest>> {
        let mut pending = Vec::new();
        for id in self.indexed_ids(CF_PENDING, &account_prefix(payer))? {
            let request: Option<PendingRequest> = self.get_json(CF_REQUESTS, &id.to_be_bytes())?;
            pending.extend(request.filter(|r| r.is_pending() && r.payer == *payer));
        }
        pending.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(pending)
    }

    async fn next_request_id(&self) -> Result<RequestId> {
        Ok(RequestId(self.next_request.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

#[async_trait]
impl TransactionLog for RocksDBStore {
    async fn get_record(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        self.get_json(CF_TRANSACTIONS, &id.0.to_be_bytes())
    }

    /// Walks the account's history index backwards from the cursor, so a
    /// page only reads the rows it returns plus those the filter rejects.
    async fn records_for(
        &self,
        account: &AccountId,
        filter: &RecordFilter,
        after: Option<HistoryCursor>,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let prefix = account_prefix(account);
        let start = match after {
            Some(cursor) => history_key(account, cursor)?,
            None => {
                let mut end = account.as_str().as_bytes().to_vec();
                end.push(SEPARATOR + 1);
                end
            }
        };

        let cf = self.cf(CF_HISTORY)?;
        let mut page = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(start.as_slice(), Direction::Reverse))
        {
            if page.len() >= limit {
                break;
            }
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            if &key[..] >= start.as_slice() {
                continue;
            }
            let id = id_suffix(&key)?;
            let record: Option<TransactionRecord> =
                self.get_json(CF_TRANSACTIONS, &id.to_be_bytes())?;
            page.extend(record.filter(|r| filter.matches(account, r)));
        }
        Ok(page)
    }

    async fn records_by_request(&self, request: RequestId) -> Result<Vec<TransactionRecord>> {
        self.request_records(request)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<TransactionId>> {
        // Serializes id assignment and the read side of status flips.
        let _guard = self.commit_lock.lock().await;

        let now = Utc::now();
        let first_id = self.next_record.load(Ordering::SeqCst) + 1;
        let records = changes
            .records
            .into_iter()
            .zip(first_id..)
            .map(|(record, id)| record.into_record(TransactionId(id), now))
            .collect::<Result<Vec<_>>>()?;

        let transactions = self.cf(CF_TRANSACTIONS)?;
        let history = self.cf(CF_HISTORY)?;
        let by_request = self.cf(CF_REQUEST_RECORDS)?;
        let mut batch = WriteBatch::default();

        let mut flipped: BTreeMap<TransactionId, TransactionRecord> = BTreeMap::new();
        for flip in &changes.flips {
            for stored in self.request_records(flip.request)? {
                let mut record = flipped.remove(&stored.id).unwrap_or(stored);
                if record.status == flip.from {
                    record.status = flip.to;
                }
                flipped.insert(record.id, record);
            }
        }
        for record in flipped.values() {
            batch.put_cf(transactions, record.id.0.to_be_bytes(), serde_json::to_vec(record)?);
        }

        for record in &records {
            batch.put_cf(transactions, record.id.0.to_be_bytes(), serde_json::to_vec(record)?);
            batch.put_cf(history, history_key(&record.initiator, record.cursor())?, b"");
            if let Some(target) = record.target.as_ref().filter(|t| **t != record.initiator) {
                batch.put_cf(history, history_key(target, record.cursor())?, b"");
            }
            if let Some(request) = record.request {
                batch.put_cf(by_request, request_record_key(request, record.id), b"");
            }
        }

        let accounts = self.cf(CF_ACCOUNTS)?;
        for account in &changes.accounts {
            batch.put_cf(accounts, account.id.as_str().as_bytes(), serde_json::to_vec(account)?);
        }
        let requests = self.cf(CF_REQUESTS)?;
        let pending = self.cf(CF_PENDING)?;
        for request in &changes.requests {
            let key = pending_key(&request.payer, &request.requester, request.amount);
            if request.is_pending() {
                batch.put_cf(pending, key, request.id.0.to_be_bytes());
            } else {
                batch.delete_cf(pending, key);
            }
            batch.put_cf(requests, request.id.0.to_be_bytes(), serde_json::to_vec(request)?);
        }

        self.db.write(batch)?;
        if let Some(last) = records.last() {
            self.next_record.store(last.id.0, Ordering::SeqCst);
        }
        Ok(records.iter().map(|r| r.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Balance;
    use crate::domain::request::RequestStatus;
    use crate::domain::transaction::{NewRecord, TransactionKind, TransactionStatus};
    use chrono::DateTime;
    use tempfile::tempdir;

    fn deposit(account: &str, minor: i64) -> NewRecord {
        NewRecord::new(
            TransactionKind::Deposit,
            account.into(),
            None,
            Amount::new(minor).unwrap(),
            TransactionStatus::Completed,
        )
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.db.cf_handle(CF_REQUESTS).is_some());
        assert!(store.db.cf_handle(CF_TRANSACTIONS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_account_store() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let mut account = Account::new("alice".into());
        account.balance = Balance::new(100);
        let mut changes = ChangeSet::new();
        changes.put_account(account.clone());
        store.commit(changes).await.unwrap();

        let retrieved = store.get_account(&"alice".into()).await.unwrap().unwrap();
        assert_eq!(retrieved, account);
        assert_eq!(store.all_accounts().await.unwrap(), vec![account]);
        assert!(store.get_account(&"bob".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_sequences_resume_after_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            let mut changes = ChangeSet::new();
            changes.append(deposit("alice", 1));
            changes.append(deposit("alice", 2));
            store.commit(changes).await.unwrap();
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        let mut changes = ChangeSet::new();
        changes.append(deposit("alice", 3));
        assert_eq!(store.commit(changes).await.unwrap(), vec![TransactionId(3)]);

        let record = store.get_record(TransactionId(2)).await.unwrap().unwrap();
        assert_eq!(record.amount, Amount::new(2).unwrap());
    }

    fn request(id: u64, requester: &str, payer: &str, minor: i64) -> PendingRequest {
        PendingRequest::new(
            RequestId(id),
            requester.into(),
            payer.into(),
            Amount::new(minor).unwrap(),
            None,
            Utc::now(),
        )
    }

    fn request_record(kind: TransactionKind, owner: &str, other: &str, id: u64) -> NewRecord {
        NewRecord::new(
            kind,
            owner.into(),
            Some(other.into()),
            Amount::new(500).unwrap(),
            TransactionStatus::Pending,
        )
        .with_request(RequestId(id))
    }

    #[tokio::test]
    async fn test_rocksdb_pending_index_follows_resolution() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let amount = Amount::new(500).unwrap();

        let open = request(1, "alice", "bob", 500);
        let mut changes = ChangeSet::new();
        changes.put_request(open.clone());
        changes.put_request(request(2, "carol", "bob", 700));
        changes.put_request(request(3, "bob", "alice", 500));
        store.commit(changes).await.unwrap();

        let found = store.find_pending(&"alice".into(), &"bob".into(), amount).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(RequestId(1)));
        assert!(store.find_pending(&"alice".into(), &"bob".into(), Amount::new(1).unwrap()).await.unwrap().is_none());
        assert_eq!(store.pending_for_payer(&"bob".into()).await.unwrap().len(), 2);

        let mut changes = ChangeSet::new();
        changes.put_request(open.resolve(RequestStatus::Denied, Utc::now()));
        store.commit(changes).await.unwrap();

        assert!(store.find_pending(&"alice".into(), &"bob".into(), amount).await.unwrap().is_none());
        let pending = store.pending_for_payer(&"bob".into()).await.unwrap();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![RequestId(2)]);
        assert_eq!(store.all_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rocksdb_flip_touches_only_the_request_records() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        let mut changes = ChangeSet::new();
        changes.append(request_record(TransactionKind::RequestSent, "alice", "bob", 1));
        changes.append(request_record(TransactionKind::RequestReceived, "bob", "alice", 1));
        changes.append(request_record(TransactionKind::RequestSent, "alice", "carol", 2));
        store.commit(changes).await.unwrap();

        let mut changes = ChangeSet::new();
        changes.flip_status(RequestId(1), TransactionStatus::Pending, TransactionStatus::Rejected);
        store.commit(changes).await.unwrap();

        let first = store.records_by_request(RequestId(1)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|r| r.status == TransactionStatus::Rejected));
        let second = store.records_by_request(RequestId(2)).await.unwrap();
        assert_eq!(second[0].status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_rocksdb_history_pages_newest_first() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();

        // Explicit timestamps out of id order; ties fall back to the id.
        let mut changes = ChangeSet::new();
        for (minor, secs) in [(1, 300), (2, 100), (3, 200), (4, 200)] {
            let mut record = deposit("alice", minor);
            record.timestamp = DateTime::from_timestamp(secs, 0);
            changes.append(record);
        }
        changes.append(deposit("bob", 9));
        let mut transfer = NewRecord::new(
            TransactionKind::Transfer,
            "bob".into(),
            Some("alice".into()),
            Amount::new(5).unwrap(),
            TransactionStatus::Completed,
        );
        transfer.timestamp = DateTime::from_timestamp(50, 0);
        changes.append(transfer);
        store.commit(changes).await.unwrap();

        let alice = AccountId::from("alice");
        let filter = RecordFilter::default();
        let first = store.records_for(&alice, &filter, None, 3).await.unwrap();
        let ids: Vec<u64> = first.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 4, 3]);

        let cursor = first.last().map(TransactionRecord::cursor);
        let rest = store.records_for(&alice, &filter, cursor, 3).await.unwrap();
        let ids: Vec<u64> = rest.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 6]);

        let own = RecordFilter {
            own_rows: true,
            ..Default::default()
        };
        assert_eq!(store.records_for(&"bob".into(), &own, None, 10).await.unwrap().len(), 2);
    }
}
