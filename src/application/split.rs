use super::journal::TransactionJournal;
use super::workflow::RequestWorkflow;
use crate::domain::account::{AccountId, Amount};
use crate::domain::request::RequestId;
use crate::error::{LedgerError, Result};
use tracing::{debug, info, instrument};

/// Why a recipient got no request out of a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyPending(RequestId),
    UnknownAccount,
    InvalidAmount,
    SelfRequest,
}

/// Result of fanning a split out. Zero created requests is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    pub created: Vec<(AccountId, RequestId)>,
    pub skipped: Vec<(AccountId, SkipReason)>,
}

impl SplitOutcome {
    pub fn created_count(&self) -> usize {
        self.created.len()
    }
}

/// Turns one split instruction into independent requests.
#[derive(Clone)]
pub struct SplitCoordinator {
    workflow: RequestWorkflow,
    journal: TransactionJournal,
}

impl SplitCoordinator {
    pub fn new(workflow: RequestWorkflow, journal: TransactionJournal) -> Self {
        Self { workflow, journal }
    }

    /// Requests each recipient's share on behalf of `payer`, in order.
    ///
    /// Duplicates and invalid recipients are skipped without aborting the
    /// batch. One `split_sent` record for `total` is appended regardless of
    /// how many requests were created; storage and lock failures abort.
    #[instrument(skip_all, fields(payer = %payer, total = %total, recipients = recipients.len()))]
    pub async fn split(
        &self,
        payer: &AccountId,
        recipients: &[(AccountId, i64)],
        total: Amount,
        memo: Option<&str>,
    ) -> Result<SplitOutcome> {
        let mut outcome = SplitOutcome::default();

        for (recipient, share) in recipients {
            let created = match Amount::new(*share) {
                Ok(amount) => self.workflow.create(payer, recipient, amount, memo).await,
                Err(err) => Err(err),
            };
            let reason = match created {
                Ok(id) => {
                    outcome.created.push((recipient.clone(), id));
                    continue;
                }
                Err(LedgerError::DuplicatePendingRequest { existing, .. }) => {
                    SkipReason::AlreadyPending(existing)
                }
                Err(LedgerError::AccountNotFound(_)) => SkipReason::UnknownAccount,
                Err(LedgerError::InvalidAmount(_)) => SkipReason::InvalidAmount,
                Err(LedgerError::SelfRequest(_)) => SkipReason::SelfRequest,
                Err(err) => return Err(err),
            };
            debug!(%recipient, ?reason, "skipping split recipient");
            outcome.skipped.push((recipient.clone(), reason));
        }

        self.journal
            .append(self.journal.split_record(payer, total, memo))
            .await?;
        info!(created = outcome.created_count(), skipped = outcome.skipped.len(), "split sent");
        Ok(outcome)
    }
}
