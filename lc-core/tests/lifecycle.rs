//! End-to-end LC lifecycle against the in-memory ledger

use chrono::{Duration as ChronoDuration, Utc};
use lc_core::crypto::hash_document;
use lc_core::ledger::{Fault, InMemoryLedger, MemoryLedgerConfig};
use lc_core::metrics::Metrics;
use lc_core::orchestrator::CreateLcRequest;
use lc_core::secrets::InMemorySecretStore;
use lc_core::{
    Address, Config, Error, ErrorKind, LcId, LcService, LcState, LedgerClient, ManualClock,
    OperationStatus,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

const SELLER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
const SELLER_BANK: &str = "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb";

struct World {
    service: Arc<LcService>,
    ledger: Arc<InMemoryLedger>,
    clock: Arc<ManualClock>,
    buyer: Address,
    bank: Address,
    outsider: Address,
}

fn world_with(confirmation_timeout_ms: u64) -> World {
    world_with_ledger(
        confirmation_timeout_ms,
        MemoryLedgerConfig {
            poll_interval: Duration::from_millis(5),
            ..MemoryLedgerConfig::default()
        },
    )
}

fn world_with_ledger(confirmation_timeout_ms: u64, ledger_config: MemoryLedgerConfig) -> World {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let ledger = Arc::new(InMemoryLedger::new(ledger_config, clock.clone()));

    let secrets = Arc::new(InMemorySecretStore::new());
    let buyer = secrets.insert_seed([1u8; 32]);
    let bank = secrets.insert_seed([2u8; 32]);
    let outsider = secrets.insert_seed([3u8; 32]);

    let mut config = Config::default();
    config.pipeline.confirmation_timeout_ms = confirmation_timeout_ms;
    config.pipeline.retry.initial_delay_ms = 1;
    config.pipeline.retry.max_delay_ms = 5;

    let service = Arc::new(LcService::new(
        ledger.clone(),
        secrets,
        &config,
        clock.clone(),
        Arc::new(Metrics::new().unwrap()),
    ));

    World {
        service,
        ledger,
        clock,
        buyer,
        bank,
        outsider,
    }
}

fn world() -> World {
    world_with(2_000)
}

fn request(bank: Address, amount: i64, expiry_days: i64) -> CreateLcRequest {
    CreateLcRequest {
        seller: SELLER.to_string(),
        seller_bank: SELLER_BANK.to_string(),
        buyer_bank: Some(bank.to_checksum()),
        amount: Decimal::from(amount),
        expiry_days: Decimal::from(expiry_days),
    }
}

#[tokio::test]
async fn test_full_lifecycle() {
    let w = world();

    let created = w
        .service
        .create_lc(request(w.bank, 1000, 30), w.buyer)
        .await
        .unwrap();
    assert_eq!(created.lc_id, LcId(1));
    assert!(created.reference.as_str().starts_with("0x"));

    let details = w.service.get_lc_details(LcId(1)).await.unwrap();
    assert_eq!(details.lc.state, LcState::Created);
    assert_eq!(details.lc.amount, 1000);
    assert!(details.is_active);

    w.service.approve_lc(LcId(1), w.bank).await.unwrap();
    assert_eq!(
        w.service.get_lc_details(LcId(1)).await.unwrap().lc.state,
        LcState::ApprovedByBank
    );

    let documents = b"%PDF-1.7 commercial invoice + bill of lading";
    let submitted = w
        .service
        .submit_documents(LcId(1), documents, w.buyer)
        .await
        .unwrap();
    assert_eq!(submitted.document_hash, hash_document(documents));

    let details = w.service.get_lc_details(LcId(1)).await.unwrap();
    assert_eq!(details.lc.state, LcState::DocumentsSubmitted);
    assert_eq!(details.lc.document_hash, Some(hash_document(documents)));

    w.service.close_lc(LcId(1), w.bank).await.unwrap();
    let details = w.service.get_lc_details(LcId(1)).await.unwrap();
    assert_eq!(details.lc.state, LcState::Closed);
    assert!(!details.is_active);
}

#[tokio::test]
async fn test_documents_before_approval_is_state_conflict() {
    let w = world();
    w.service
        .create_lc(request(w.bank, 1000, 30), w.buyer)
        .await
        .unwrap();
    let submissions = w.ledger.stats().submissions;

    let err = w
        .service
        .submit_documents(LcId(1), b"invoice", w.buyer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StateConflict);
    assert_eq!(w.ledger.stats().submissions, submissions);
    assert_eq!(
        w.service.get_lc_details(LcId(1)).await.unwrap().lc.state,
        LcState::Created
    );
}

#[tokio::test]
async fn test_expired_lc_is_inactive_and_cannot_be_approved() {
    let w = world();
    w.service
        .create_lc(request(w.bank, 500, 1), w.buyer)
        .await
        .unwrap();

    w.clock.advance(ChronoDuration::days(2));

    let details = w.service.get_lc_details(LcId(1)).await.unwrap();
    assert_eq!(details.lc.state, LcState::Created);
    assert!(!details.is_active);

    let err = w.service.approve_lc(LcId(1), w.bank).await.unwrap_err();
    assert!(matches!(err, Error::StateConflict(_)));
}

#[tokio::test]
async fn test_anyone_may_close_expired_lc() {
    let w = world();
    w.service
        .create_lc(request(w.bank, 500, 1), w.buyer)
        .await
        .unwrap();

    assert!(matches!(
        w.service.close_lc(LcId(1), w.outsider).await,
        Err(Error::Unauthorized(_))
    ));

    w.clock.advance(ChronoDuration::days(1));
    w.service.close_lc(LcId(1), w.outsider).await.unwrap();
    assert_eq!(
        w.service.get_lc_details(LcId(1)).await.unwrap().lc.state,
        LcState::Closed
    );
}

#[tokio::test]
async fn test_invalid_identity_never_reaches_ledger() {
    let w = world();
    let bad = CreateLcRequest {
        seller: "0xSeller".to_string(),
        ..request(w.bank, 1000, 30)
    };

    let err = w.service.create_lc(bad, w.buyer).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let stats = w.ledger.stats();
    assert_eq!(stats.submissions, 0);
    assert_eq!(stats.sequence_fetches, 0);
    assert_eq!(stats.fee_queries, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_from_one_signer() {
    // Submissions take long enough that unserialized callers would both
    // read the same nonce before either lands
    let w = world_with_ledger(
        2_000,
        MemoryLedgerConfig {
            poll_interval: Duration::from_millis(5),
            submission_delay: Duration::from_millis(50),
            ..MemoryLedgerConfig::default()
        },
    );

    let a = {
        let service = w.service.clone();
        let req = request(w.bank, 1000, 30);
        let buyer = w.buyer;
        tokio::spawn(async move { service.create_lc(req, buyer).await })
    };
    let b = {
        let service = w.service.clone();
        let req = request(w.bank, 2000, 60);
        let buyer = w.buyer;
        tokio::spawn(async move { service.create_lc(req, buyer).await })
    };

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_ne!(a.lc_id, b.lc_id);
    assert_ne!(a.reference, b.reference);
    assert_eq!(w.ledger.accepted_nonces(&w.buyer), vec![0, 1]);
    assert_eq!(w.ledger.stats().sequence_collisions, 0);
    assert_eq!(w.ledger.stats().submissions, 2);
}

#[tokio::test]
async fn test_different_signers_proceed_independently() {
    let w = world();
    w.service
        .create_lc(request(w.bank, 1000, 30), w.buyer)
        .await
        .unwrap();

    let (approved, created) = tokio::join!(
        w.service.approve_lc(LcId(1), w.bank),
        w.service.create_lc(request(w.bank, 750, 10), w.buyer),
    );
    approved.unwrap();
    assert_eq!(created.unwrap().lc_id, LcId(2));

    assert_eq!(w.ledger.accepted_nonces(&w.bank), vec![0]);
    assert_eq!(w.ledger.accepted_nonces(&w.buyer), vec![0, 1]);
    assert_eq!(w.ledger.stats().sequence_collisions, 0);
}

#[tokio::test]
async fn test_repeated_reads_are_identical() {
    let w = world();
    w.service
        .create_lc(request(w.bank, 1000, 30), w.buyer)
        .await
        .unwrap();

    let first = w.service.get_lc_details(LcId(1)).await.unwrap();
    let second = w.service.get_lc_details(LcId(1)).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_collision_is_retried_transparently() {
    let w = world();
    w.ledger.inject_fault(Fault::SequenceCollision);

    let created = w
        .service
        .create_lc(request(w.bank, 1000, 30), w.buyer)
        .await
        .unwrap();

    assert_eq!(created.lc_id, LcId(1));
    assert_eq!(w.ledger.stats().sequence_collisions, 1);
    assert_eq!(w.ledger.accepted_nonces(&w.buyer), vec![1]);
}

#[tokio::test]
async fn test_timeout_is_pending_and_requery_finds_it() {
    let w = world_with(40);
    w.ledger.inject_fault(Fault::WithholdReceipt);

    let err = w
        .service
        .create_lc(request(w.bank, 1000, 30), w.buyer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
    let reference = err.pending_reference().cloned().unwrap();
    assert_eq!(
        w.service.operation_status(&reference).await.unwrap(),
        OperationStatus::Pending
    );

    w.ledger.release_withheld();
    match w.service.operation_status(&reference).await.unwrap() {
        OperationStatus::Finalized(receipt) => {
            assert_eq!(receipt.created_lc_id(), Some(LcId(1)))
        }
        other => panic!("expected finalized receipt, got {other:?}"),
    }

    // Nothing was resubmitted behind the caller's back
    assert_eq!(w.ledger.stats().submissions, 1);
}

#[tokio::test]
async fn test_unknown_lc_is_not_found() {
    let w = world();
    let err = w.service.get_lc_details(LcId(404)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(w.ledger.query_state(LcId(404)).await.is_err());
}
