//! User Registration Transaction Tests
//!
//! Tests for the transactional insert:
//! - every call ends its transaction with exactly one of commit or rollback
//! - a row is visible only when the insert succeeded and the commit went through
//! - concurrent calls run independent transactions with distinct ids

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use storegate::api::AddUserRequest;
use storegate::core::RequestContext;
use storegate::services::UserRegistrar;
use storegate::store::{MemoryRelationalStore, TxStep};

// =============================================================================
// Test Utilities
// =============================================================================

fn request(name: &str, age: i32) -> Option<AddUserRequest> {
    Some(AddUserRequest {
        name: name.to_string(),
        age,
    })
}

fn registrar(db: &Arc<MemoryRelationalStore>) -> UserRegistrar {
    UserRegistrar::new(db.clone(), "public")
}

/// How many times `tx` ended, by commit or rollback
fn endings(db: &MemoryRelationalStore, tx: u64) -> usize {
    db.steps(tx)
        .into_iter()
        .filter(|s| matches!(s, TxStep::Commit | TxStep::Rollback))
        .count()
}

// =============================================================================
// Exactly One Ending
// =============================================================================

/// Every begun transaction ends exactly once, whatever step fails
#[tokio::test]
async fn test_every_transaction_ends_exactly_once() {
    let scenarios = [
        (None, true),
        (Some(TxStep::Insert), false),
        (Some(TxStep::Commit), false),
        (Some(TxStep::Rollback), true),
    ];

    for (fail_at, should_succeed) in scenarios {
        let db = match fail_at {
            Some(step) => Arc::new(MemoryRelationalStore::new().fail_at(step)),
            None => Arc::new(MemoryRelationalStore::new()),
        };

        let result = registrar(&db)
            .add_user(&RequestContext::detached(), request("Alex", 22))
            .await;
        assert_eq!(result.is_ok(), should_succeed, "fail_at {:?}", fail_at);

        for tx in db.transactions() {
            assert_eq!(endings(&db, tx), 1, "fail_at {:?}", fail_at);
        }
    }
}

/// A begin failure leaves nothing to end
#[tokio::test]
async fn test_begin_failure_has_no_ending() {
    let db = Arc::new(MemoryRelationalStore::new().fail_at(TxStep::Begin));

    let result = registrar(&db)
        .add_user(&RequestContext::detached(), request("Alex", 22))
        .await;

    assert!(result.is_err());
    assert_eq!(db.count(TxStep::Commit), 0);
    assert_eq!(db.count(TxStep::Rollback), 0);
}

/// Rows appear only for committed inserts
#[tokio::test]
async fn test_row_visible_only_after_successful_commit() {
    let ok = Arc::new(MemoryRelationalStore::new());
    registrar(&ok)
        .add_user(&RequestContext::detached(), request("Alex", 22))
        .await
        .unwrap();
    assert_eq!(ok.rows().len(), 1);

    for step in [TxStep::Insert, TxStep::Commit] {
        let db = Arc::new(MemoryRelationalStore::new().fail_at(step));
        let _ = registrar(&db)
            .add_user(&RequestContext::detached(), request("Alex", 22))
            .await;
        assert!(db.rows().is_empty(), "fail_at {:?}", step);
    }
}

// =============================================================================
// Concurrency
// =============================================================================

/// Two concurrent registrations get distinct ids and separate transactions
#[tokio::test]
async fn test_concurrent_registrations_distinct_ids() {
    let db = Arc::new(MemoryRelationalStore::new().with_insert_delay(Duration::from_millis(10)));
    let users = registrar(&db);
    let ctx_a = RequestContext::detached();
    let ctx_b = RequestContext::detached();

    let (a, b) = tokio::join!(
        users.add_user(&ctx_a, request("Alex", 22)),
        users.add_user(&ctx_b, request("Sam", 31)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.id, b.id);
    assert!(a.id > 0 && b.id > 0);

    let transactions = db.transactions();
    assert_eq!(transactions.len(), 2);
    for tx in transactions {
        assert_eq!(
            db.steps(tx),
            vec![TxStep::Begin, TxStep::Insert, TxStep::Commit]
        );
    }
}

/// Many concurrent registrations across tasks keep per-transaction order
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_registrations() {
    let db = Arc::new(MemoryRelationalStore::new().with_insert_delay(Duration::from_millis(2)));
    let users = registrar(&db);

    let calls = (0..32).map(|i| {
        let users = users.clone();
        tokio::spawn(async move {
            users
                .add_user(&RequestContext::detached(), request(&format!("user{}", i), i))
                .await
        })
    });

    let ids: HashSet<i64> = join_all(calls)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().id)
        .collect();

    assert_eq!(ids.len(), 32);
    assert_eq!(db.rows().len(), 32);
    for tx in db.transactions() {
        assert_eq!(
            db.steps(tx),
            vec![TxStep::Begin, TxStep::Insert, TxStep::Commit]
        );
    }
}

/// A failing call does not disturb a concurrent successful one
#[tokio::test]
async fn test_failure_is_isolated_per_transaction() {
    let db = Arc::new(MemoryRelationalStore::new());
    let failing = Arc::new(MemoryRelationalStore::new().fail_at(TxStep::Insert));
    let (healthy, broken) = (registrar(&db), registrar(&failing));
    let ctx = RequestContext::detached();

    let (ok, err) = tokio::join!(
        healthy.add_user(&ctx, request("Alex", 22)),
        broken.add_user(&ctx, request("Sam", 31)),
    );

    assert_eq!(ok.unwrap().id, 1);
    assert!(err.is_err());
    assert_eq!(db.count(TxStep::Rollback), 0);
    assert_eq!(failing.count(TxStep::Rollback), 1);
}
