//! In-process store implementations
//!
//! Used by the test suites and by `serve --in-memory`. The relational store
//! keeps a journal of every transaction step and can be told to fail at any
//! step, which is how the rollback paths are exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::BoxFuture;

use super::kv::KeyValueStore;
use super::relational::{RelationalStore, UserTransaction};
use super::{StoreError, StoreResult};

fn lock<T>(mutex: &Mutex<T>) -> StoreResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("Lock poisoned".to_string()))
}

// ==================
// Key-value store
// ==================

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, i64>>,
    calls: AtomicUsize,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose every call fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Seed a key
    pub fn with_value(self, key: impl Into<String>, value: i64) -> Self {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.into(), value);
        }
        self
    }

    /// Delay every call before it takes effect
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of increment calls received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Current value at `key`
    pub fn get(&self, key: &str) -> Option<i64> {
        self.values.lock().ok()?.get(key).copied()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn incr_by<'a>(&'a self, key: &'a str, delta: i64) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(message) = &self.failure {
                return Err(StoreError::Unavailable(message.clone()));
            }

            let mut values = lock(&self.values)?;
            let current = values.entry(key.to_string()).or_insert(0);
            *current = current.checked_add(delta).ok_or_else(|| {
                StoreError::Unavailable("increment or decrement would overflow".to_string())
            })?;
            Ok(*current)
        })
    }
}

// ==================
// Relational store
// ==================

/// A step in a transaction's life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxStep {
    Begin,
    Insert,
    Commit,
    Rollback,
}

/// One journaled transaction step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    /// Transaction the step belongs to
    pub tx: u64,
    pub step: TxStep,
    /// Whether the step succeeded
    pub ok: bool,
}

/// A committed row of the users table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub age: i32,
}

#[derive(Debug, Default)]
struct MemoryDb {
    next_id: AtomicI64,
    next_tx: AtomicU64,
    rows: Mutex<Vec<UserRow>>,
    journal: Mutex<Vec<JournalEntry>>,
    statements: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl MemoryDb {
    fn record(&self, tx: u64, step: TxStep, ok: bool) -> StoreResult<()> {
        lock(&self.journal)?.push(JournalEntry { tx, step, ok });
        Ok(())
    }
}

/// In-memory relational store
///
/// Ids come from a sequence that is never rewound, like a `SERIAL` column:
/// rolled back inserts burn their id. Rows become visible on commit.
#[derive(Debug, Default)]
pub struct MemoryRelationalStore {
    db: Arc<MemoryDb>,
    fail_at: HashSet<TxStep>,
    delays: HashMap<TxStep, Duration>,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every transaction fail at `step`
    pub fn fail_at(mut self, step: TxStep) -> Self {
        self.fail_at.insert(step);
        self
    }

    /// Delay every insert before it takes effect
    pub fn with_insert_delay(self, delay: Duration) -> Self {
        self.with_step_delay(TxStep::Insert, delay)
    }

    /// Delay `step` of every transaction before it takes effect. Begin is
    /// never delayed.
    pub fn with_step_delay(mut self, step: TxStep, delay: Duration) -> Self {
        self.delays.insert(step, delay);
        self
    }

    /// Every journaled step, in the order they completed
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.db
            .journal
            .lock()
            .map(|j| j.clone())
            .unwrap_or_default()
    }

    /// Steps of one transaction, in order
    pub fn steps(&self, tx: u64) -> Vec<TxStep> {
        self.journal()
            .into_iter()
            .filter(|e| e.tx == tx)
            .map(|e| e.step)
            .collect()
    }

    /// Ids of every transaction that was begun
    pub fn transactions(&self) -> Vec<u64> {
        self.journal()
            .into_iter()
            .filter(|e| e.step == TxStep::Begin)
            .map(|e| e.tx)
            .collect()
    }

    /// Count of journaled occurrences of `step`
    pub fn count(&self, step: TxStep) -> usize {
        self.journal().iter().filter(|e| e.step == step).count()
    }

    /// Committed rows
    pub fn rows(&self) -> Vec<UserRow> {
        self.db.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Every SQL statement received
    pub fn statements(&self) -> Vec<String> {
        self.db
            .statements
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.db.closed.load(Ordering::SeqCst)
    }
}

impl RelationalStore for MemoryRelationalStore {
    fn begin(&self) -> BoxFuture<'_, StoreResult<Box<dyn UserTransaction>>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(StoreError::Unavailable("pool closed".to_string()));
            }
            let tx = self.db.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_at.contains(&TxStep::Begin) {
                self.db.record(tx, TxStep::Begin, false)?;
                return Err(StoreError::Unavailable("begin failed".to_string()));
            }
            self.db.record(tx, TxStep::Begin, true)?;

            Ok(Box::new(MemoryTransaction {
                db: Arc::clone(&self.db),
                tx,
                fail_at: self.fail_at.clone(),
                delays: self.delays.clone(),
                pending: None,
            }) as Box<dyn UserTransaction>)
        })
    }

    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            if self.is_closed() {
                return Err(StoreError::Unavailable("pool closed".to_string()));
            }
            lock(&self.db.statements)?.push(sql.to_string());
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.db.closed.store(true, Ordering::SeqCst);
        })
    }
}

struct MemoryTransaction {
    db: Arc<MemoryDb>,
    tx: u64,
    fail_at: HashSet<TxStep>,
    delays: HashMap<TxStep, Duration>,
    pending: Option<UserRow>,
}

async fn pause(delays: &HashMap<TxStep, Duration>, step: TxStep) {
    if let Some(delay) = delays.get(&step) {
        tokio::time::sleep(*delay).await;
    }
}

impl UserTransaction for MemoryTransaction {
    fn insert_returning_id<'a>(
        &'a mut self,
        sql: &'a str,
        name: &'a str,
        age: i32,
    ) -> BoxFuture<'a, StoreResult<i64>> {
        Box::pin(async move {
            lock(&self.db.statements)?.push(sql.to_string());
            pause(&self.delays, TxStep::Insert).await;
            if self.fail_at.contains(&TxStep::Insert) {
                self.db.record(self.tx, TxStep::Insert, false)?;
                return Err(StoreError::Unavailable("insert failed".to_string()));
            }

            let id = self.db.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.pending = Some(UserRow {
                id,
                name: name.to_string(),
                age,
            });
            self.db.record(self.tx, TxStep::Insert, true)?;
            Ok(id)
        })
    }

    fn commit(self: Box<Self>) -> BoxFuture<'static, StoreResult<()>> {
        let MemoryTransaction {
            db,
            tx,
            fail_at,
            delays,
            pending,
        } = *self;

        Box::pin(async move {
            pause(&delays, TxStep::Commit).await;
            if fail_at.contains(&TxStep::Commit) {
                db.record(tx, TxStep::Commit, false)?;
                return Err(StoreError::Unavailable("commit failed".to_string()));
            }
            if let Some(row) = pending {
                lock(&db.rows)?.push(row);
            }
            db.record(tx, TxStep::Commit, true)
        })
    }

    fn rollback(self: Box<Self>) -> BoxFuture<'static, StoreResult<()>> {
        let MemoryTransaction {
            db,
            tx,
            fail_at,
            delays,
            ..
        } = *self;

        Box::pin(async move {
            pause(&delays, TxStep::Rollback).await;
            let ok = !fail_at.contains(&TxStep::Rollback);
            db.record(tx, TxStep::Rollback, ok)?;
            if ok {
                Ok(())
            } else {
                Err(StoreError::Unavailable("rollback failed".to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_increment_accumulates() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.incr_by("Alex", 23).await.unwrap(), 23);
        assert_eq!(store.incr_by("Alex", 2).await.unwrap(), 25);
        assert_eq!(store.incr_by("Alex", -30).await.unwrap(), -5);
        assert_eq!(store.calls(), 3);
        assert_eq!(store.get("Alex"), Some(-5));
    }

    #[tokio::test]
    async fn test_increment_overflow_rejected() {
        let store = MemoryKeyValueStore::new().with_value("k", i64::MAX);
        assert!(store.incr_by("k", 1).await.is_err());
        assert_eq!(store.get("k"), Some(i64::MAX));
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MemoryKeyValueStore::failing("connection refused");
        let err = store.incr_by("k", 1).await.unwrap_err();
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }

    #[tokio::test]
    async fn test_rows_visible_after_commit() {
        let store = MemoryRelationalStore::new();

        let mut tx = store.begin().await.unwrap();
        let id = tx.insert_returning_id("INSERT", "Alex", 22).await.unwrap();
        assert_eq!(id, 1);
        assert!(store.rows().is_empty());

        tx.commit().await.unwrap();
        assert_eq!(
            store.rows(),
            vec![UserRow {
                id: 1,
                name: "Alex".to_string(),
                age: 22
            }]
        );
        assert_eq!(
            store.steps(1),
            vec![TxStep::Begin, TxStep::Insert, TxStep::Commit]
        );
    }

    #[tokio::test]
    async fn test_rollback_discards_row_and_burns_id() {
        let store = MemoryRelationalStore::new();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert_returning_id("INSERT", "a", 1).await.unwrap(), 1);
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.insert_returning_id("INSERT", "b", 2).await.unwrap(), 2);
        tx.commit().await.unwrap();

        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.rows()[0].id, 2);
    }

    #[tokio::test]
    async fn test_closed_store_refuses_transactions() {
        let store = MemoryRelationalStore::new();
        store.close().await;
        assert!(store.begin().await.is_err());
        assert!(store.execute("SELECT 1").await.is_err());
    }
}
