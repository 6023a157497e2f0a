//! Repository - lifecycle owner and connection factory
//!
//! A [`Repository`] owns the configured backend behind a mutex. That mutex is
//! also the commit lock: every sequence of backend calls that must appear
//! atomic (apply a batch, validate and commit, undo) runs while holding it.
//! Connections keep an `Arc` to the shared state and may live on other
//! threads.

pub mod connection;
pub mod result;
pub mod transaction;

pub use connection::Connection;
pub use result::RepositoryResult;
pub use transaction::{IsolationLevel, TransactionStatus};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use crate::backend::Backend;
use crate::config::RepositoryConfig;
use crate::indexing::{IndexHealth, RecoveryReport};
use crate::parser::{default_registry, ParserRegistry};
use crate::statement::Statement;
use crate::storage::StoreBackend;
use crate::{Error, Result};
use transaction::{Change, PendingOp, Transaction};

/// Behaviour shared by every connection of a repository
#[derive(Debug)]
pub struct RepositorySettings {
    pub default_isolation: IsolationLevel,
    /// Whether reads inside a transaction see its pending writes
    pub read_own_writes: bool,
    pub parsers: ParserRegistry,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            default_isolation: IsolationLevel::default(),
            read_own_writes: true,
            parsers: default_registry(),
        }
    }
}

impl From<&RepositoryConfig> for RepositorySettings {
    fn from(config: &RepositoryConfig) -> Self {
        Self {
            default_isolation: config.default_isolation,
            read_own_writes: config.read_own_writes,
            parsers: default_registry().preserve_blank_node_ids(config.preserve_blank_node_ids),
        }
    }
}

/// A repository over a store backend
pub struct Repository<B: StoreBackend = Backend> {
    shared: Arc<Shared<B>>,
}

impl<B: StoreBackend> Clone for Repository<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: StoreBackend> fmt::Debug for Repository<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("default_isolation", &self.shared.settings.default_isolation)
            .field("read_own_writes", &self.shared.settings.read_own_writes)
            .finish()
    }
}

impl Repository {
    /// Open the stores named by `config` and recover the index if needed
    pub fn open(config: &RepositoryConfig) -> Result<Self> {
        let backend = Backend::open(config)?;
        tracing::info!(
            "Opening repository (storage: {}, index: {})",
            config.storage_directory,
            config.index_directory.as_deref().unwrap_or("none")
        );
        Repository::with_settings(backend, RepositorySettings::from(config))
    }
}

impl<B: StoreBackend> Repository<B> {
    /// Wrap an already constructed backend with default settings
    pub fn with_backend(backend: B) -> Result<Self> {
        Self::with_settings(backend, RepositorySettings::default())
    }

    pub fn with_settings(mut backend: B, settings: RepositorySettings) -> Result<Self> {
        let report = backend.recover()?;
        if report.reindexed {
            tracing::info!("Startup recovery: {}", report);
        } else {
            tracing::debug!("Startup recovery: {}", report);
        }

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    backend,
                    open: true,
                    version: 0,
                    log: Vec::new(),
                    readers: BTreeMap::new(),
                }),
                settings,
                next_txn: AtomicU64::new(1),
            }),
        })
    }

    /// A new connection. Fails once the repository is shut down.
    pub fn connection(&self) -> Result<Connection<B>> {
        drop(self.shared.lock()?);
        Ok(Connection::new(Arc::clone(&self.shared)))
    }

    pub fn settings(&self) -> &RepositorySettings {
        &self.shared.settings
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().is_ok()
    }

    /// Flush and close the backend. Later calls on any connection fail.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = match self.shared.state.lock() {
            Ok(state) => state,
            Err(_) => return Err(Error::State("repository lock poisoned".to_string())),
        };
        if !state.open {
            return Ok(());
        }
        state.open = false;
        state.backend.close()?;
        tracing::info!("Repository shut down after {} commits", state.version);
        Ok(())
    }

    pub fn stats(&self) -> Result<RepositoryStats> {
        let state = self.shared.lock()?;
        Ok(RepositoryStats {
            statements: state.backend.len()?,
            contexts: state.backend.contexts()?.len(),
            epoch: state.backend.epoch()?,
            commits: state.version,
            index_entries: state.backend.index_len()?,
        })
    }

    /// Compare the full-text index with the store
    pub fn verify_index(&self) -> Result<IndexHealth> {
        self.shared.lock()?.backend.verify()
    }

    /// Rebuild the full-text index from the store
    pub fn reindex(&self) -> Result<RecoveryReport> {
        self.shared.lock()?.backend.reindex()
    }
}

/// Repository counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStats {
    pub statements: usize,
    pub contexts: usize,
    /// Durable commit epoch of the store
    pub epoch: u64,
    /// Commits since the repository was opened
    pub commits: u64,
    /// Full-text entries, `None` without an index
    pub index_entries: Option<usize>,
}

impl fmt::Display for RepositoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Repository Statistics:")?;
        writeln!(f, "  Statements: {}", self.statements)?;
        writeln!(f, "  Contexts: {}", self.contexts)?;
        writeln!(f, "  Epoch: {}", self.epoch)?;
        match self.index_entries {
            Some(entries) => write!(f, "  Index entries: {}", entries),
            None => write!(f, "  Index entries: (no index)"),
        }
    }
}

/// State reachable from every connection
pub(crate) struct Shared<B: StoreBackend> {
    state: Mutex<State<B>>,
    pub(crate) settings: RepositorySettings,
    next_txn: AtomicU64,
}

pub(crate) struct State<B: StoreBackend> {
    pub(crate) backend: B,
    open: bool,
    /// Bumped by every batch that changed the store
    version: u64,
    /// Changes per version, kept while a serializable transaction may need them
    log: Vec<CommitRecord>,
    /// Start versions of running serializable transactions
    readers: BTreeMap<u64, usize>,
}

struct CommitRecord {
    version: u64,
    changed: Vec<Statement>,
}

impl<B: StoreBackend> Shared<B> {
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, State<B>>> {
        let state = self
            .state
            .lock()
            .map_err(|_| Error::State("repository lock poisoned".to_string()))?;
        if !state.open {
            return Err(Error::State("repository is shut down".to_string()));
        }
        Ok(state)
    }

    pub(crate) fn begin(&self, level: IsolationLevel) -> Result<Transaction> {
        let mut state = self.lock()?;
        let id = self.next_txn.fetch_add(1, Ordering::Relaxed);
        let txn = Transaction::new(id, level, state.version);
        if level == IsolationLevel::Serializable {
            *state.readers.entry(txn.start_version).or_default() += 1;
        }
        tracing::debug!("Began transaction {} ({}) at version {}", id, level, txn.start_version);
        Ok(txn)
    }

    /// Stop tracking a finished transaction
    pub(crate) fn release(&self, txn: &mut Transaction) {
        if !txn.registered {
            return;
        }
        txn.registered = false;
        if txn.level != IsolationLevel::Serializable {
            return;
        }
        // Runs from drop paths too; a poisoned lock only loses pruning
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(count) = state.readers.get_mut(&txn.start_version) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&txn.start_version);
            }
        }
        state.prune_log();
    }

    /// Apply `ops` as one atomic backend batch
    pub(crate) fn apply(&self, ops: &[PendingOp]) -> Result<Vec<Change>> {
        let mut state = self.lock()?;
        state.apply(ops)
    }

    /// Validate (when serializable) and apply a transaction's buffered writes
    pub(crate) fn commit_buffered(&self, txn: &Transaction) -> Result<Vec<Change>> {
        let mut state = self.lock()?;
        if txn.level == IsolationLevel::Serializable {
            state.validate(txn)?;
        }
        state.apply(&txn.pending)
    }
}

impl<B: StoreBackend> State<B> {
    fn apply(&mut self, ops: &[PendingOp]) -> Result<Vec<Change>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        self.backend.begin()?;
        let mut changes = Vec::new();
        if let Err(e) = apply_ops(&mut self.backend, ops, &mut changes) {
            if let Err(undo) = self.backend.rollback() {
                tracing::error!("Rolling back failed batch also failed: {}", undo);
            }
            return Err(e);
        }
        if let Err(e) = self.backend.commit() {
            // the backend may already have released the batch itself
            if let Err(undo) = self.backend.rollback() {
                tracing::debug!("Rollback after failed commit: {}", undo);
            }
            return Err(e);
        }

        if !changes.is_empty() {
            self.version += 1;
            if !self.readers.is_empty() {
                self.log.push(CommitRecord {
                    version: self.version,
                    changed: changes.iter().map(|c| c.statement().clone()).collect(),
                });
            }
        }
        Ok(changes)
    }

    fn validate(&self, txn: &Transaction) -> Result<()> {
        for record in self.log.iter().filter(|r| r.version > txn.start_version) {
            if let Some(statement) = record.changed.iter().find(|st| txn.conflicts_with(st)) {
                return Err(Error::Isolation(format!(
                    "transaction {} conflicts with a concurrent commit (version {}) changing {}",
                    txn.id, record.version, statement
                )));
            }
        }
        Ok(())
    }

    fn prune_log(&mut self) {
        match self.readers.keys().next().copied() {
            Some(oldest) => self.log.retain(|r| r.version > oldest),
            None => self.log.clear(),
        }
    }
}

fn apply_ops<B: StoreBackend>(backend: &mut B, ops: &[PendingOp], changes: &mut Vec<Change>) -> Result<()> {
    for op in ops {
        match op {
            PendingOp::Add(statement) => {
                if backend.add(statement)? {
                    changes.push(Change::Added(statement.clone()));
                }
            }
            PendingOp::Remove(pattern) => {
                let doomed = backend.match_pattern(pattern)?;
                if doomed.is_empty() {
                    continue;
                }
                backend.remove(pattern)?;
                changes.extend(doomed.into_iter().map(Change::Removed));
            }
        }
    }
    Ok(())
}

impl<B: StoreBackend> Drop for Shared<B> {
    fn drop(&mut self) {
        let Ok(state) = self.state.get_mut() else {
            return;
        };
        if state.open {
            state.open = false;
            if let Err(e) = state.backend.close() {
                tracing::warn!("Closing backend on drop failed: {}", e);
            }
        }
    }
}
