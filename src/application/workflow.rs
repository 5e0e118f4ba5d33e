use super::journal::TransactionJournal;
use super::ledger::AccountLedger;
use super::locks::LockTable;
use crate::domain::account::{AccountId, Amount};
use crate::domain::changes::ChangeSet;
use crate::domain::ports::{DirectoryHandle, NotifierHandle, StoreHandle};
use crate::domain::request::{PendingRequest, RequestId, RequestStatus};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The pending-request state machine: `Pending -> Approved | Denied`.
#[derive(Clone)]
pub struct RequestWorkflow {
    store: StoreHandle,
    locks: Arc<LockTable>,
    ledger: AccountLedger,
    journal: TransactionJournal,
    directory: DirectoryHandle,
    notifier: NotifierHandle,
}

impl RequestWorkflow {
    pub fn new(
        store: StoreHandle,
        locks: Arc<LockTable>,
        ledger: AccountLedger,
        journal: TransactionJournal,
        directory: DirectoryHandle,
        notifier: NotifierHandle,
    ) -> Self {
        Self {
            store,
            locks,
            ledger,
            journal,
            directory,
            notifier,
        }
    }

    async fn ensure_known(&self, account: &AccountId) -> Result<()> {
        if self.directory.resolve_account(account).await? {
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(account.clone()))
        }
    }

    /// Asks `payer` to send `amount` to `requester`.
    #[instrument(skip_all, fields(requester = %requester, payer = %payer, amount = %amount))]
    pub async fn create(
        &self,
        requester: &AccountId,
        payer: &AccountId,
        amount: Amount,
        memo: Option<&str>,
    ) -> Result<RequestId> {
        if requester == payer {
            return Err(LedgerError::SelfRequest(requester.clone()));
        }
        self.ensure_known(requester).await?;
        self.ensure_known(payer).await?;

        let _locks = self.locks.accounts(&[requester, payer]).await?;
        if let Some(existing) = self.store.find_pending(requester, payer, amount).await? {
            return Err(LedgerError::DuplicatePendingRequest {
                existing: existing.id,
                requester: requester.clone(),
                payer: payer.clone(),
                amount,
            });
        }

        let id = self.store.next_request_id().await?;
        let request = PendingRequest::new(
            id,
            requester.clone(),
            payer.clone(),
            amount,
            memo.map(str::to_owned),
            Utc::now(),
        );
        let mut changes = ChangeSet::new();
        self.journal.stage_request_pair(&mut changes, &request);
        changes.put_request(request);
        self.store.commit(changes).await?;
        info!(request = %id, "request created");

        self.notifier.notify(
            payer,
            "Payment request",
            &format!("{requester} requested {amount} from you"),
        );
        Ok(id)
    }

    async fn pending(&self, id: RequestId) -> Result<PendingRequest> {
        self.store
            .get_request(id)
            .await?
            .filter(PendingRequest::is_pending)
            .ok_or(LedgerError::RequestNotFound(id))
    }

    /// Pays the request out of the payer's balance.
    ///
    /// On insufficient funds the request stays pending and can still be
    /// approved later or denied.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: RequestId) -> Result<PendingRequest> {
        let _request_lock = self.locks.request(id).await?;
        let request = self.pending(id).await?;
        let _account_locks = self
            .locks
            .accounts(&[&request.payer, &request.requester])
            .await?;

        let mut changes = ChangeSet::new();
        if let Err(err) = self
            .ledger
            .stage_transfer(&mut changes, &request.payer, &request.requester, request.amount)
            .await
        {
            warn!(%err, "approval failed");
            if matches!(err, LedgerError::InsufficientFunds { .. }) {
                self.notifier.notify(
                    &request.requester,
                    "Payment request failed",
                    &format!(
                        "{} could not pay your request for {}",
                        request.payer, request.amount
                    ),
                );
            }
            return Err(err);
        }

        let approved = request.resolve(RequestStatus::Approved, Utc::now());
        self.journal.stage_resolution(&mut changes, &approved, true);
        changes.put_request(approved.clone());
        self.store.commit(changes).await?;
        info!(payer = %approved.payer, requester = %approved.requester, "request approved");

        self.notifier.notify(
            &approved.requester,
            "Payment received",
            &format!("{} paid your request for {}", approved.payer, approved.amount),
        );
        Ok(approved)
    }

    /// Declines the request; no funds move.
    #[instrument(skip(self))]
    pub async fn deny(&self, id: RequestId) -> Result<PendingRequest> {
        let _request_lock = self.locks.request(id).await?;
        let request = self.pending(id).await?;

        let denied = request.resolve(RequestStatus::Denied, Utc::now());
        let mut changes = ChangeSet::new();
        self.journal.stage_resolution(&mut changes, &denied, false);
        changes.put_request(denied.clone());
        self.store.commit(changes).await?;
        info!(payer = %denied.payer, requester = %denied.requester, "request denied");

        self.notifier.notify(
            &denied.requester,
            "Payment request denied",
            &format!("{} denied your request for {}", denied.payer, denied.amount),
        );
        Ok(denied)
    }

    pub async fn get(&self, id: RequestId) -> Result<Option<PendingRequest>> {
        self.store.get_request(id).await
    }

    /// Requests waiting on `payer`, newest first.
    pub async fn pending_for(&self, payer: &AccountId) -> Result<Vec<PendingRequest>> {
        self.store.pending_for_payer(payer).await
    }
}
