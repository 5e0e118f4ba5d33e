use crate::domain::account::AccountId;
use crate::domain::ports::AccountDirectory;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of known account holders, standing in for the identity system.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    accounts: Arc<RwLock<HashSet<AccountId>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts<I, A>(accounts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<AccountId>,
    {
        Self {
            accounts: Arc::new(RwLock::new(accounts.into_iter().map(Into::into).collect())),
        }
    }

    /// Returns `false` if the account was already registered.
    pub async fn register(&self, account: AccountId) -> bool {
        self.accounts.write().await.insert(account)
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDirectory {
    async fn resolve_account(&self, id: &AccountId) -> Result<bool> {
        Ok(self.accounts.read().await.contains(id))
    }
}
