use super::account::{AccountId, Amount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// An ask from `requester` for `payer` to send them `amount`.
///
/// Created `Pending`, then resolved exactly once to `Approved` or `Denied`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: RequestId,
    pub requester: AccountId,
    pub payer: AccountId,
    pub amount: Amount,
    pub status: RequestStatus,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl PendingRequest {
    pub fn new(
        id: RequestId,
        requester: AccountId,
        payer: AccountId,
        amount: Amount,
        memo: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requester,
            payer,
            amount,
            status: RequestStatus::Pending,
            memo,
            created_at,
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Whether this request blocks a new one for the same triple.
    pub fn duplicates(&self, requester: &AccountId, payer: &AccountId, amount: Amount) -> bool {
        self.is_pending()
            && self.requester == *requester
            && self.payer == *payer
            && self.amount == amount
    }

    /// Returns the resolved copy; terminal requests are returned unchanged.
    pub fn resolve(&self, status: RequestStatus, at: DateTime<Utc>) -> Self {
        if self.status.is_terminal() {
            return self.clone();
        }
        Self {
            status,
            resolved_at: Some(at),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PendingRequest {
        PendingRequest::new(
            RequestId(1),
            "alice".into(),
            "bob".into(),
            Amount::new(500).unwrap(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_duplicate_only_while_pending() {
        let request = sample();
        let amount = Amount::new(500).unwrap();
        assert!(request.duplicates(&"alice".into(), &"bob".into(), amount));
        assert!(!request.duplicates(&"bob".into(), &"alice".into(), amount));
        assert!(!request.duplicates(&"alice".into(), &"bob".into(), Amount::new(501).unwrap()));

        let denied = request.resolve(RequestStatus::Denied, Utc::now());
        assert!(!denied.duplicates(&"alice".into(), &"bob".into(), amount));
    }

    #[test]
    fn test_terminal_states_are_immutable() {
        let approved = sample().resolve(RequestStatus::Approved, Utc::now());
        assert_eq!(approved.status, RequestStatus::Approved);
        assert!(approved.resolved_at.is_some());

        let again = approved.resolve(RequestStatus::Denied, Utc::now());
        assert_eq!(again, approved);
    }
}
