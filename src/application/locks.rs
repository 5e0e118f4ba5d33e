use crate::domain::account::AccountId;
use crate::domain::request::RequestId;
use crate::error::{LedgerError, Result};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// What a lock serializes access to.
///
/// The derived order is the acquisition order: request keys sort before
/// account keys, so a caller holding a request lock may go on to lock
/// accounts but never the other way round.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Request(RequestId),
    Account(AccountId),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Request(id) => write!(f, "request {id}"),
            LockKey::Account(id) => write!(f, "account {id}"),
        }
    }
}

type Slots = Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>;

/// Drops the slots of `keys` that nobody holds or waits on any more.
///
/// Every holder or waiter owns a clone of the slot's `Arc`, and clones are
/// only handed out under the map mutex, so a count of one means the map is
/// the last owner.
fn prune(slots: &Slots, keys: &[LockKey]) {
    let mut slots = slots.lock().unwrap_or_else(PoisonError::into_inner);
    for key in keys {
        if slots.get(key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(key);
        }
    }
}

/// Guards held for the duration of one atomic unit; released on drop.
#[must_use]
pub struct LockSet {
    guards: Vec<OwnedMutexGuard<()>>,
    keys: Vec<LockKey>,
    slots: Slots,
}

impl Drop for LockSet {
    fn drop(&mut self) {
        // Guards hold slot references; release them before pruning.
        self.guards.clear();
        prune(&self.slots, &self.keys);
    }
}

/// Per-key serialization points for the ledger.
///
/// Operations on disjoint keys run in parallel. Acquisition is bounded by a
/// timeout and surfaces [`LedgerError::Busy`] instead of waiting forever.
/// Slots live only while some caller holds or awaits them.
pub struct LockTable {
    slots: Slots,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    fn slot(&self, key: &LockKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.entry(key.clone()).or_default().clone()
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Locks every key in canonical order. Duplicate keys are locked once.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = LockKey>) -> Result<LockSet> {
        let keys: Vec<LockKey> = keys.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let slots: Vec<_> = keys.iter().map(|key| self.slot(key)).collect();

        let acquire_all = async move {
            let mut guards = Vec::with_capacity(slots.len());
            for slot in slots {
                guards.push(slot.lock_owned().await);
            }
            guards
        };

        match tokio::time::timeout(self.timeout, acquire_all).await {
            Ok(guards) => Ok(LockSet {
                guards,
                keys,
                slots: self.slots.clone(),
            }),
            Err(_) => {
                // The abandoned acquisition released its slot references.
                prune(&self.slots, &keys);
                let names: Vec<String> = keys.iter().map(ToString::to_string).collect();
                debug!(keys = ?names, "lock acquisition timed out");
                Err(LedgerError::Busy(names.join(", ")))
            }
        }
    }

    pub async fn accounts(&self, accounts: &[&AccountId]) -> Result<LockSet> {
        self.acquire(accounts.iter().map(|id| LockKey::Account((*id).clone())))
            .await
    }

    pub async fn request(&self, id: RequestId) -> Result<LockSet> {
        self.acquire([LockKey::Request(id)]).await
    }
}
