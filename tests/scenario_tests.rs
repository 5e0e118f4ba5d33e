use peerpay::domain::account::Balance;
use peerpay::domain::request::RequestStatus;
use peerpay::domain::transaction::{RecordFilter, TransactionKind, TransactionStatus};
use peerpay::error::LedgerError;

mod common;
use common::{engine_with, id};

#[tokio::test]
async fn test_direct_transfer() {
    let (engine, _rx) = engine_with(&["a", "b"]);
    engine.deposit(&id("a"), 10_000).await.unwrap();

    let ids = engine.transfer(&id("a"), &id("b"), 2_500, Some("rent")).await.unwrap();
    assert_eq!(ids.len(), 2);

    assert_eq!(engine.get_balance(&id("a")).await.unwrap(), Balance::new(7_500));
    assert_eq!(engine.get_balance(&id("b")).await.unwrap(), Balance::new(2_500));

    let transfers = engine
        .history(
            &id("a"),
            RecordFilter {
                kind: Some(TransactionKind::Transfer),
                ..Default::default()
            },
        )
        .collect_all()
        .await
        .unwrap();
    assert_eq!(transfers.len(), 2);
    assert!(transfers.iter().all(|r| r.status == TransactionStatus::Completed));
    assert!(transfers.iter().all(|r| r.request.is_none()));
    assert!(transfers.iter().all(|r| r.memo.as_deref() == Some("rent")));
}

#[tokio::test]
async fn test_request_then_approve() {
    let (engine, mut rx) = engine_with(&["a", "b"]);
    engine.deposit(&id("b"), 500).await.unwrap();

    let request = engine.create_request(&id("a"), &id("b"), 500, None).await.unwrap();
    assert_eq!(rx.try_recv().unwrap().account, id("b"));

    let pending = engine.list_pending_requests(&id("b")).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request);

    let approved = engine.approve_request(request).await.unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(rx.try_recv().unwrap().account, id("a"));

    assert_eq!(engine.get_balance(&id("b")).await.unwrap(), Balance::ZERO);
    assert_eq!(engine.get_balance(&id("a")).await.unwrap(), Balance::new(500));
    assert!(engine.list_pending_requests(&id("b")).await.unwrap().is_empty());

    assert!(matches!(
        engine.approve_request(request).await,
        Err(LedgerError::RequestNotFound(_))
    ));
}

#[tokio::test]
async fn test_request_with_insufficient_funds() {
    let (engine, _rx) = engine_with(&["a", "b"]);

    let request = engine.create_request(&id("a"), &id("b"), 500, None).await.unwrap();
    assert!(matches!(
        engine.approve_request(request).await,
        Err(LedgerError::InsufficientFunds { .. })
    ));
    assert_eq!(engine.get_balance(&id("b")).await.unwrap(), Balance::ZERO);

    let still_pending = engine.list_pending_requests(&id("b")).await.unwrap();
    assert_eq!(still_pending.len(), 1);

    let denied = engine.deny_request(request).await.unwrap();
    assert_eq!(denied.status, RequestStatus::Denied);
}

#[tokio::test]
async fn test_split_with_existing_pending_request() {
    let (engine, _rx) = engine_with(&["p", "x", "y"]);
    engine.create_request(&id("p"), &id("x"), 400, None).await.unwrap();

    let outcome = engine
        .create_split(&id("p"), &[(id("x"), 400), (id("y"), 600)], 1_000, Some("dinner"))
        .await
        .unwrap();
    assert_eq!(outcome.created_count(), 1);
    assert_eq!(outcome.created[0].0, id("y"));

    let splits = engine
        .history(
            &id("p"),
            RecordFilter {
                kind: Some(TransactionKind::SplitSent),
                ..Default::default()
            },
        )
        .collect_all()
        .await
        .unwrap();
    assert_eq!(splits.len(), 1);
    assert_eq!(splits[0].amount.minor_units(), 1_000);
}

#[tokio::test]
async fn test_split_fans_out_to_every_recipient() {
    let (engine, _rx) = engine_with(&["p", "x", "y"]);

    let outcome = engine
        .create_split(&id("p"), &[(id("x"), 400), (id("y"), 600)], 1_000, None)
        .await
        .unwrap();
    assert_eq!(outcome.created_count(), 2);
    assert_eq!(engine.list_pending_requests(&id("x")).await.unwrap().len(), 1);
    assert_eq!(engine.list_pending_requests(&id("y")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_split_from_unknown_payer_fails() {
    let (engine, _rx) = engine_with(&["x"]);
    assert!(matches!(
        engine.create_split(&id("ghost"), &[(id("x"), 1)], 1, None).await,
        Err(LedgerError::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_duplicate_suppression_lifts_after_resolution() {
    let (engine, _rx) = engine_with(&["a", "b"]);
    engine.deposit(&id("b"), 1_000).await.unwrap();

    let first = engine.create_request(&id("a"), &id("b"), 300, None).await.unwrap();
    assert!(matches!(
        engine.create_request(&id("a"), &id("b"), 300, None).await,
        Err(LedgerError::DuplicatePendingRequest { .. })
    ));

    engine.approve_request(first).await.unwrap();
    let second = engine.create_request(&id("a"), &id("b"), 300, None).await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_audit_log_reconciles_with_approved_request() {
    let (engine, _rx) = engine_with(&["a", "b"]);
    engine.deposit(&id("b"), 900).await.unwrap();
    let request = engine.create_request(&id("a"), &id("b"), 700, Some("tickets")).await.unwrap();
    engine.approve_request(request).await.unwrap();

    let records = engine.journal().by_request(request).await.unwrap();
    let count = |kind: TransactionKind| records.iter().filter(|r| r.kind == kind).count();
    assert_eq!(count(TransactionKind::RequestSent), 1);
    assert_eq!(count(TransactionKind::RequestReceived), 1);
    assert_eq!(count(TransactionKind::RequestApproved), 1);
    assert!(
        records
            .iter()
            .all(|r| r.status == TransactionStatus::Completed && r.amount.minor_units() == 700)
    );

    assert_eq!(engine.get_balance(&id("b")).await.unwrap(), Balance::new(200));
    assert_eq!(engine.get_balance(&id("a")).await.unwrap(), Balance::new(700));
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let (engine, _rx) = engine_with(&["a", "b"]);
    engine.deposit(&id("a"), 1_000).await.unwrap();
    engine.transfer(&id("a"), &id("b"), 100, None).await.unwrap();
    engine.create_request(&id("b"), &id("a"), 50, None).await.unwrap();

    let history = engine.list_transactions(&id("a")).await.unwrap();
    let keys: Vec<_> = history.iter().map(|r| (r.timestamp, r.id)).collect();
    let mut sorted = keys.clone();
    sorted.sort_by(|x, y| y.cmp(x));
    assert_eq!(keys, sorted);
    assert_eq!(history.last().unwrap().kind, TransactionKind::Deposit);
}
