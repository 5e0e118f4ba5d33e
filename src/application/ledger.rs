use super::locks::LockTable;
use crate::domain::account::{Account, AccountId, Amount, Balance};
use crate::domain::changes::ChangeSet;
use crate::domain::ports::StoreHandle;
use crate::error::{LedgerError, Result};
use std::sync::Arc;
use tracing::{info, instrument};

/// Owns account balances and the debit/credit primitives.
///
/// The `stage_*` methods only compute new rows into a [`ChangeSet`]; callers
/// must already hold the account locks and commit the set themselves. The
/// public `debit`, `credit` and `transfer` lock, stage and commit in one go.
#[derive(Clone)]
pub struct AccountLedger {
    store: StoreHandle,
    locks: Arc<LockTable>,
}

impl AccountLedger {
    pub fn new(store: StoreHandle, locks: Arc<LockTable>) -> Self {
        Self { store, locks }
    }

    /// Balance of an account with a ledger row.
    pub async fn get_balance(&self, account: &AccountId) -> Result<Balance> {
        self.store
            .get_account(account)
            .await?
            .map(|a| a.balance)
            .ok_or_else(|| LedgerError::AccountNotFound(account.clone()))
    }

    async fn current(&self, changes: &ChangeSet, id: &AccountId) -> Result<Option<Account>> {
        if let Some(staged) = changes.staged_account(id) {
            return Ok(Some(staged.clone()));
        }
        self.store.get_account(id).await
    }

    /// An account without a ledger row has nothing to give, so debiting it
    /// fails the funds check rather than creating it.
    pub async fn stage_debit(
        &self,
        changes: &mut ChangeSet,
        account: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        let mut row = self
            .current(changes, account)
            .await?
            .ok_or_else(|| LedgerError::InsufficientFunds {
                account: account.clone(),
                balance: Balance::ZERO,
                needed: amount,
            })?;
        row.debit(amount)?;
        changes.put_account(row);
        Ok(())
    }

    pub async fn stage_credit(
        &self,
        changes: &mut ChangeSet,
        account: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        let mut row = self
            .current(changes, account)
            .await?
            .unwrap_or_else(|| Account::new(account.clone()));
        row.credit(amount)?;
        changes.put_account(row);
        Ok(())
    }

    /// Stages the debit then the credit; nothing is staged if either fails.
    pub async fn stage_transfer(
        &self,
        changes: &mut ChangeSet,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<()> {
        if from == to {
            return Err(LedgerError::SelfTransfer(from.clone()));
        }
        let mut staged = changes.clone();
        self.stage_debit(&mut staged, from, amount).await?;
        self.stage_credit(&mut staged, to, amount).await?;
        *changes = staged;
        Ok(())
    }

    #[instrument(skip_all, fields(account = %account, amount = %amount))]
    pub async fn debit(&self, account: &AccountId, amount: Amount) -> Result<Balance> {
        let _locks = self.locks.accounts(&[account]).await?;
        let mut changes = ChangeSet::new();
        self.stage_debit(&mut changes, account, amount).await?;
        let balance = staged_balance(&changes, account);
        self.store.commit(changes).await?;
        info!(%balance, "debited");
        Ok(balance)
    }

    #[instrument(skip_all, fields(account = %account, amount = %amount))]
    pub async fn credit(&self, account: &AccountId, amount: Amount) -> Result<Balance> {
        let _locks = self.locks.accounts(&[account]).await?;
        let mut changes = ChangeSet::new();
        self.stage_credit(&mut changes, account, amount).await?;
        let balance = staged_balance(&changes, account);
        self.store.commit(changes).await?;
        info!(%balance, "credited");
        Ok(balance)
    }

    /// Moves funds between two accounts as one unit, without journaling.
    #[instrument(skip_all, fields(from = %from, to = %to, amount = %amount))]
    pub async fn transfer(&self, from: &AccountId, to: &AccountId, amount: Amount) -> Result<()> {
        let _locks = self.locks.accounts(&[from, to]).await?;
        let mut changes = ChangeSet::new();
        self.stage_transfer(&mut changes, from, to, amount).await?;
        self.store.commit(changes).await?;
        info!("transferred");
        Ok(())
    }
}

fn staged_balance(changes: &ChangeSet, account: &AccountId) -> Balance {
    changes
        .staged_account(account)
        .map(|a| a.balance)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryStore;
    use std::time::Duration;

    fn ledger() -> AccountLedger {
        let store: StoreHandle = Arc::new(InMemoryStore::new());
        AccountLedger::new(store, Arc::new(LockTable::new(Duration::from_millis(100))))
    }

    fn amount(minor: i64) -> Amount {
        Amount::new(minor).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_account_has_no_balance() {
        let ledger = ledger();
        let result = ledger.get_balance(&"ghost".into()).await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_credit_creates_row() {
        let ledger = ledger();
        let alice = AccountId::from("alice");
        assert_eq!(ledger.credit(&alice, amount(300)).await.unwrap(), Balance::new(300));
        assert_eq!(ledger.get_balance(&alice).await.unwrap(), Balance::new(300));
    }

    #[tokio::test]
    async fn test_debit_unknown_account_is_insufficient() {
        let ledger = ledger();
        let result = ledger.debit(&"ghost".into(), amount(1)).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert!(ledger.get_balance(&"ghost".into()).await.is_err());
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let ledger = ledger();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        ledger.credit(&alice, amount(10_000)).await.unwrap();

        ledger.transfer(&alice, &bob, amount(2_500)).await.unwrap();

        assert_eq!(ledger.get_balance(&alice).await.unwrap(), Balance::new(7_500));
        assert_eq!(ledger.get_balance(&bob).await.unwrap(), Balance::new(2_500));
    }

    #[tokio::test]
    async fn test_failed_transfer_leaves_no_partial_state() {
        let ledger = ledger();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        ledger.credit(&alice, amount(100)).await.unwrap();

        let result = ledger.transfer(&alice, &bob, amount(101)).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.get_balance(&alice).await.unwrap(), Balance::new(100));
        assert!(matches!(
            ledger.get_balance(&bob).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_transfer_rejects_self() {
        let ledger = ledger();
        let alice = AccountId::from("alice");
        let mut changes = ChangeSet::new();
        let result = ledger.stage_transfer(&mut changes, &alice, &alice, amount(1)).await;
        assert!(matches!(result, Err(LedgerError::SelfTransfer(_))));
        assert!(changes.is_empty());
    }
}
