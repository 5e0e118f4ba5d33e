use crate::domain::account::{AccountId, Amount};
use crate::domain::changes::ChangeSet;
use crate::domain::ports::StoreHandle;
use crate::domain::request::{PendingRequest, RequestId};
use crate::domain::transaction::{
    HistoryCursor, NewRecord, RecordFilter, TransactionId, TransactionKind, TransactionRecord,
    TransactionStatus,
};
use crate::error::{LedgerError, Result};
use tracing::debug;

/// Front of the append-only transaction log.
///
/// Besides the standalone `append`/`update_status`, it knows the record
/// shapes of every monetary event so other components can stage them into
/// their own change sets.
#[derive(Clone)]
pub struct TransactionJournal {
    store: StoreHandle,
    page_size: usize,
}

impl TransactionJournal {
    pub fn new(store: StoreHandle, page_size: usize) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Appends a single record, returning its assigned id.
    pub async fn append(&self, record: NewRecord) -> Result<TransactionId> {
        record.validate()?;
        let mut changes = ChangeSet::new();
        changes.append(record);
        let ids = self.store.commit(changes).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("commit returned no record id".to_string()))
    }

    /// Flips records of `request` that are still in `from`. Matching nothing
    /// is not an error.
    pub async fn update_status(
        &self,
        request: RequestId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<()> {
        let mut changes = ChangeSet::new();
        changes.flip_status(request, from, to);
        self.store.commit(changes).await?;
        debug!(%request, %from, %to, "flipped record status");
        Ok(())
    }

    pub async fn get(&self, id: TransactionId) -> Result<Option<TransactionRecord>> {
        self.store.get_record(id).await
    }

    pub async fn by_request(&self, request: RequestId) -> Result<Vec<TransactionRecord>> {
        self.store.records_by_request(request).await
    }

    /// History of `account`, newest first.
    pub fn query(&self, account: &AccountId, filter: RecordFilter) -> TransactionQuery {
        TransactionQuery {
            store: self.store.clone(),
            account: account.clone(),
            filter,
            page_size: self.page_size,
            cursor: None,
            exhausted: false,
        }
    }

    pub fn stage_deposit(&self, changes: &mut ChangeSet, account: &AccountId, amount: Amount) {
        changes.append(NewRecord::new(
            TransactionKind::Deposit,
            account.clone(),
            None,
            amount,
            TransactionStatus::Completed,
        ));
    }

    /// One completed row per side of a direct transfer.
    pub fn stage_transfer(
        &self,
        changes: &mut ChangeSet,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
        memo: Option<&str>,
    ) {
        for (initiator, target) in [(from, to), (to, from)] {
            changes.append(
                NewRecord::new(
                    TransactionKind::Transfer,
                    initiator.clone(),
                    Some(target.clone()),
                    amount,
                    TransactionStatus::Completed,
                )
                .with_memo(memo),
            );
        }
    }

    /// The pending sent/received pair written alongside a new request.
    pub fn stage_request_pair(&self, changes: &mut ChangeSet, request: &PendingRequest) {
        let memo = request.memo.as_deref();
        let sides = [
            (TransactionKind::RequestSent, &request.requester, &request.payer),
            (TransactionKind::RequestReceived, &request.payer, &request.requester),
        ];
        for (kind, initiator, target) in sides {
            changes.append(
                NewRecord::new(
                    kind,
                    initiator.clone(),
                    Some(target.clone()),
                    request.amount,
                    TransactionStatus::Pending,
                )
                .with_memo(memo)
                .with_request(request.id),
            );
        }
    }

    /// The resolution event plus the flip of the pending pair.
    pub fn stage_resolution(&self, changes: &mut ChangeSet, request: &PendingRequest, approved: bool) {
        let (kind, status) = if approved {
            (TransactionKind::RequestApproved, TransactionStatus::Completed)
        } else {
            (TransactionKind::RequestDenied, TransactionStatus::Rejected)
        };
        changes.flip_status(request.id, TransactionStatus::Pending, status);
        changes.append(
            NewRecord::new(
                kind,
                request.payer.clone(),
                Some(request.requester.clone()),
                request.amount,
                status,
            )
            .with_memo(request.memo.as_deref())
            .with_request(request.id),
        );
    }

    pub fn split_record(&self, payer: &AccountId, total: Amount, memo: Option<&str>) -> NewRecord {
        NewRecord::new(
            TransactionKind::SplitSent,
            payer.clone(),
            None,
            total,
            TransactionStatus::Completed,
        )
        .with_memo(memo)
    }
}

/// A lazy, finite walk over one account's history.
///
/// Pages are fetched on demand with a keyset cursor; [`TransactionQuery::rewind`]
/// starts over from the newest record.
#[derive(Clone)]
pub struct TransactionQuery {
    store: StoreHandle,
    account: AccountId,
    filter: RecordFilter,
    page_size: usize,
    cursor: Option<HistoryCursor>,
    exhausted: bool,
}

impl TransactionQuery {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The next page, or `None` once the history is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<TransactionRecord>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self
            .store
            .records_for(&self.account, &self.filter, self.cursor, self.page_size)
            .await?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        match page.last() {
            Some(last) => {
                self.cursor = Some(last.cursor());
                Ok(Some(page))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    pub fn rewind(&mut self) {
        self.cursor = None;
        self.exhausted = false;
    }

    /// Drains the remaining pages.
    pub async fn collect_all(&mut self) -> Result<Vec<TransactionRecord>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }
        Ok(records)
    }
}
