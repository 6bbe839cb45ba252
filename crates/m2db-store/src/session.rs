use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::cache::{CacheStats, StatementCache};
use crate::consistency::Consistency;
use crate::error::{StoreError, StoreResult};
use crate::prepared::{BoundStatement, PreparedStatement};
use crate::row::Rows;
use crate::statement::Statement;
use crate::traits::DataStore;
use crate::value::Value;

/// Session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum prepared statements kept in the LRU.
    pub statement_cache_capacity: usize,
    /// Consistency applied to statements that do not choose one.
    pub default_consistency: Consistency,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            statement_cache_capacity: 100,
            default_consistency: Consistency::One,
        }
    }
}

enum Job {
    Execute(BoundStatement),
    Barrier(oneshot::Sender<()>),
}

/// Client handle passed to every component.
///
/// Owns the backend, a bounded cache of prepared statements keyed by CQL
/// text, and a detached executor: a background worker that runs
/// fire-and-forget statements in submission order and logs their failures
/// instead of returning them.
pub struct Session {
    store: Arc<dyn DataStore>,
    cache: Mutex<StatementCache>,
    config: SessionConfig,
    detached: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(store: Arc<dyn DataStore>, config: SessionConfig) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let backend = Arc::clone(&store);
        let worker = std::thread::spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                match job {
                    Job::Execute(bound) => {
                        if let Err(e) = backend.execute(&bound) {
                            warn!(
                                cql = bound.prepared().cql(),
                                error = %e,
                                "detached statement failed"
                            );
                        }
                    }
                    Job::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("detached executor stopped");
        });
        Self {
            store,
            cache: Mutex::new(StatementCache::new(config.statement_cache_capacity)),
            config,
            detached: Some(tx),
            worker: Some(worker),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn cache(&self) -> MutexGuard<'_, StatementCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prepare through the cache; the backend sees each CQL text once while
    /// it stays cached.
    pub fn prepare(&self, statement: &Statement) -> StoreResult<PreparedStatement> {
        let cql = statement.to_string();
        if let Some(prepared) = self.cache().get(&cql) {
            return Ok(prepared);
        }
        let prepared = self.store.prepare(statement)?;
        self.cache().insert(prepared.clone());
        Ok(prepared)
    }

    /// Execute synchronously, propagating backend failures.
    pub fn execute(&self, bound: BoundStatement) -> StoreResult<Rows> {
        let bound = bound.or_consistency(self.config.default_consistency);
        self.store.execute(&bound)
    }

    /// Prepare, bind and execute in one call.
    pub fn run(&self, statement: &Statement, values: Vec<Value>) -> StoreResult<Rows> {
        let bound = self.prepare(statement)?.bind(values)?;
        self.execute(bound)
    }

    /// Queue a statement on the detached executor. Never blocks and never
    /// fails: preparation errors and execution errors are logged and dropped.
    pub fn execute_detached(&self, bound: BoundStatement) {
        let bound = bound.or_consistency(self.config.default_consistency);
        let sent = self
            .detached
            .as_ref()
            .map(|tx| tx.send(Job::Execute(bound)).is_ok())
            .unwrap_or(false);
        if !sent {
            warn!("detached executor closed, statement dropped");
        }
    }

    /// Prepare, bind and queue in one call; see [`execute_detached`](Self::execute_detached).
    pub fn run_detached(&self, statement: &Statement, values: Vec<Value>) {
        match self.prepare(statement).and_then(|p| p.bind(values)) {
            Ok(bound) => self.execute_detached(bound),
            Err(e) => warn!(cql = %statement, error = %e, "detached statement not queued"),
        }
    }

    /// Block until every statement queued before this call has run.
    ///
    /// Must not be called from within an async runtime worker.
    pub fn drain(&self) -> StoreResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.detached
            .as_ref()
            .ok_or(StoreError::ExecutorClosed)?
            .send(Job::Barrier(done_tx))
            .map_err(|_| StoreError::ExecutorClosed)?;
        done_rx.blocking_recv().map_err(|_| StoreError::ExecutorClosed)
    }

    /// Execute a schema change.
    pub fn execute_unprepared(&self, statement: &Statement) -> StoreResult<()> {
        self.store.execute_unprepared(statement)
    }

    pub fn table_exists(&self, table: &str) -> StoreResult<bool> {
        self.store.table_exists(table)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache().stats()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish queued jobs and exit.
        self.detached.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("cached_statements", &self.cache().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::statement::{Insert, Select, TableSchema};
    use crate::value::ColumnType;

    fn setup() -> (Arc<MemoryStore>, Session) {
        let store = Arc::new(MemoryStore::new());
        store
            .execute_unprepared(
                &TableSchema::new("kv")
                    .column("k", ColumnType::Text)
                    .column("v", ColumnType::Text)
                    .partition_key(["k"])
                    .into(),
            )
            .unwrap();
        let session = Session::new(store.clone(), SessionConfig::default());
        (store, session)
    }

    fn put() -> Statement {
        Insert::new("kv").columns(["k", "v"]).into()
    }

    #[test]
    fn prepares_each_cql_text_once() {
        let (store, session) = setup();
        for i in 0..5 {
            session.run(&put(), vec![format!("k{i}").into(), "v".into()]).unwrap();
        }
        assert_eq!(store.prepared_count(), 1);
        let stats = session.cache_stats();
        assert_eq!((stats.hits, stats.misses), (4, 1));
    }

    #[test]
    fn cache_is_bounded() {
        let store = Arc::new(MemoryStore::new());
        for t in ["a", "b", "c"] {
            store
                .execute_unprepared(
                    &TableSchema::new(t)
                        .column("k", ColumnType::Text)
                        .partition_key(["k"])
                        .into(),
                )
                .unwrap();
        }
        let session = Session::new(
            store.clone(),
            SessionConfig {
                statement_cache_capacity: 2,
                ..SessionConfig::default()
            },
        );
        for t in ["a", "b", "c", "a"] {
            session.prepare(&Select::new(t).into()).unwrap();
        }
        assert_eq!(session.cache_stats().evictions, 2);
        assert_eq!(store.prepared_count(), 4);
    }

    #[test]
    fn detached_writes_land_after_drain() {
        let (store, session) = setup();
        for i in 0..20 {
            session.run_detached(&put(), vec![format!("k{i}").into(), "v".into()]);
        }
        session.drain().unwrap();
        assert_eq!(store.row_count("kv"), 20);
    }

    #[test]
    fn detached_failures_are_swallowed() {
        let (store, session) = setup();
        store.fail_writes_to("kv");
        session.run_detached(&put(), vec!["a".into(), "v".into()]);
        // Preparation failure is swallowed as well.
        session.run_detached(&Insert::new("missing").columns(["k"]).into(), vec!["a".into()]);
        session.drain().unwrap();
        assert_eq!(store.row_count("kv"), 0);

        store.restore_writes_to("kv");
        assert!(session.run(&put(), vec!["a".into(), "v".into()]).is_ok());
    }

    #[test]
    fn synchronous_failures_propagate() {
        let (store, session) = setup();
        store.fail_writes_to("kv");
        let err = session.run(&put(), vec!["a".into(), "v".into()]).unwrap_err();
        assert_eq!(err, StoreError::Unavailable("kv".into()));
    }

    #[test]
    fn drop_flushes_queued_jobs() {
        let (store, session) = setup();
        session.run_detached(&put(), vec!["a".into(), "v".into()]);
        drop(session);
        assert_eq!(store.row_count("kv"), 1);
    }
}
