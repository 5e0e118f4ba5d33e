use super::journal::{TransactionJournal, TransactionQuery};
use super::ledger::AccountLedger;
use super::locks::LockTable;
use super::split::{SplitCoordinator, SplitOutcome};
use super::workflow::RequestWorkflow;
use crate::config::EngineConfig;
use crate::domain::account::{Account, AccountId, Amount, Balance};
use crate::domain::changes::ChangeSet;
use crate::domain::ports::{DirectoryHandle, NotifierHandle, StoreHandle};
use crate::domain::request::{PendingRequest, RequestId};
use crate::domain::transaction::{RecordFilter, TransactionId, TransactionRecord};
use crate::error::{LedgerError, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// The main entry point for the ledger.
///
/// `PaymentEngine` wires the account ledger, transaction journal, request
/// workflow and split coordinator around one injected storage handle and
/// exposes the operations the transport layer calls. Amounts come in as raw
/// minor units and are validated here.
pub struct PaymentEngine {
    store: StoreHandle,
    locks: Arc<LockTable>,
    directory: DirectoryHandle,
    ledger: AccountLedger,
    journal: TransactionJournal,
    workflow: RequestWorkflow,
    splits: SplitCoordinator,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - Storage shared by every component.
    /// * `directory` - Identity lookup deciding which accounts exist.
    /// * `notifier` - Alerts counterparties after state changes commit.
    /// * `config` - Lock timeout and history page size.
    pub fn new(
        store: StoreHandle,
        directory: DirectoryHandle,
        notifier: NotifierHandle,
        config: EngineConfig,
    ) -> Self {
        let locks = Arc::new(LockTable::new(config.lock_timeout));
        let ledger = AccountLedger::new(store.clone(), locks.clone());
        let journal = TransactionJournal::new(store.clone(), config.page_size);
        let workflow = RequestWorkflow::new(
            store.clone(),
            locks.clone(),
            ledger.clone(),
            journal.clone(),
            directory.clone(),
            notifier,
        );
        let splits = SplitCoordinator::new(workflow.clone(), journal.clone());
        Self {
            store,
            locks,
            directory,
            ledger,
            journal,
            workflow,
            splits,
        }
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn journal(&self) -> &TransactionJournal {
        &self.journal
    }

    pub fn workflow(&self) -> &RequestWorkflow {
        &self.workflow
    }

    async fn ensure_known(&self, account: &AccountId) -> Result<()> {
        if self.directory.resolve_account(account).await? {
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(account.clone()))
        }
    }

    /// Balance of a known account; one without a ledger row reads as zero.
    pub async fn get_balance(&self, account: &AccountId) -> Result<Balance> {
        self.ensure_known(account).await?;
        match self.ledger.get_balance(account).await {
            Err(LedgerError::AccountNotFound(_)) => Ok(Balance::ZERO),
            other => other,
        }
    }

    /// Tops up an account from outside the ledger.
    #[instrument(skip_all, fields(account = %account, amount = amount))]
    pub async fn deposit(&self, account: &AccountId, amount: i64) -> Result<TransactionId> {
        let amount = Amount::new(amount)?;
        self.ensure_known(account).await?;

        let _locks = self.locks.accounts(&[account]).await?;
        let mut changes = ChangeSet::new();
        self.ledger.stage_credit(&mut changes, account, amount).await?;
        self.journal.stage_deposit(&mut changes, account, amount);
        let ids = self.store.commit(changes).await?;
        info!(%amount, "deposit committed");
        first_id(ids)
    }

    /// Sends funds directly, journaling one completed record per side.
    #[instrument(skip_all, fields(from = %from, to = %to, amount = amount))]
    pub async fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: i64,
        memo: Option<&str>,
    ) -> Result<Vec<TransactionId>> {
        let amount = Amount::new(amount)?;
        if from == to {
            return Err(LedgerError::SelfTransfer(from.clone()));
        }
        self.ensure_known(from).await?;
        self.ensure_known(to).await?;

        let _locks = self.locks.accounts(&[from, to]).await?;
        let mut changes = ChangeSet::new();
        self.ledger.stage_transfer(&mut changes, from, to, amount).await?;
        self.journal.stage_transfer(&mut changes, from, to, amount, memo);
        let ids = self.store.commit(changes).await?;
        info!(%amount, "transfer committed");
        Ok(ids)
    }

    pub async fn create_request(
        &self,
        requester: &AccountId,
        payer: &AccountId,
        amount: i64,
        memo: Option<&str>,
    ) -> Result<RequestId> {
        let amount = Amount::new(amount)?;
        self.workflow.create(requester, payer, amount, memo).await
    }

    pub async fn approve_request(&self, id: RequestId) -> Result<PendingRequest> {
        self.workflow.approve(id).await
    }

    pub async fn deny_request(&self, id: RequestId) -> Result<PendingRequest> {
        self.workflow.deny(id).await
    }

    /// Splits `total` into one request per recipient, all payable to `payer`.
    pub async fn create_split(
        &self,
        payer: &AccountId,
        recipients: &[(AccountId, i64)],
        total: i64,
        memo: Option<&str>,
    ) -> Result<SplitOutcome> {
        let total = Amount::new(total)?;
        self.ensure_known(payer).await?;
        self.splits.split(payer, recipients, total, memo).await
    }

    /// Requests `account` has been asked to pay, newest first.
    pub async fn list_pending_requests(&self, account: &AccountId) -> Result<Vec<PendingRequest>> {
        self.workflow.pending_for(account).await
    }

    /// Full history of `account`, newest first.
    pub async fn list_transactions(&self, account: &AccountId) -> Result<Vec<TransactionRecord>> {
        self.history(account, RecordFilter::default())
            .collect_all()
            .await
    }

    /// Lazy, restartable history of `account`.
    pub fn history(&self, account: &AccountId, filter: RecordFilter) -> TransactionQuery {
        self.journal.query(account, filter)
    }

    /// Accounts the stored state proves exist: ledger rows plus both parties
    /// of every request. Used to reseed the identity directory on restart.
    pub async fn known_holders(&self) -> Result<BTreeSet<AccountId>> {
        let mut holders: BTreeSet<AccountId> = self
            .store
            .all_accounts()
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        for request in self.store.all_requests().await? {
            holders.insert(request.requester);
            holders.insert(request.payer);
        }
        Ok(holders)
    }

    /// Every ledger row, sorted by account id.
    pub async fn accounts(&self) -> Result<Vec<Account>> {
        let mut accounts = self.store.all_accounts().await?;
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }
}

fn first_id(ids: Vec<TransactionId>) -> Result<TransactionId> {
    ids.into_iter()
        .next()
        .ok_or_else(|| LedgerError::Storage("commit returned no record id".to_string()))
}
