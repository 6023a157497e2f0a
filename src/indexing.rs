//! Indexing decorator - keeps the full-text index in lockstep with the store
//!
//! [`IndexingStore`] owns a primary store and a full-text index and is itself
//! a [`StoreBackend`]. Every mutation goes to the store first, then to the
//! index; when the second step fails the first is undone before the error
//! is returned, so a failed call leaves no trace.
//!
//! Commit order is index flush, then store commit. Both sides record the
//! same commit epoch. After a crash between the two steps the epochs differ
//! and [`StoreBackend::recover`] rebuilds the index from the store. The store
//! is the source of truth; the index is never used to repair it.

use std::collections::HashSet;
use std::fmt;
use crate::index::{IndexBackend, SearchHit};
use crate::statement::{Pattern, Statement};
use crate::storage::StoreBackend;
use crate::term::Resource;
use crate::{Error, Result};

/// A store whose writes are mirrored into a full-text index
#[derive(Debug)]
pub struct IndexingStore<S: StoreBackend, I: IndexBackend> {
    store: S,
    index: I,
}

impl<S: StoreBackend, I: IndexBackend> IndexingStore<S, I> {
    pub fn new(store: S, index: I) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn into_parts(self) -> (S, I) {
        (self.store, self.index)
    }

    /// Undo a partially applied remove: put the statements back into the
    /// store and re-index the ones already deindexed.
    fn restore_removed(&mut self, removed: &[Statement], deindexed: usize) -> Result<()> {
        for statement in removed {
            self.store.add(statement)?;
        }
        for statement in &removed[..deindexed] {
            self.index.index(statement)?;
        }
        Ok(())
    }

    /// The index was flushed but the store batch did not commit. Re-derive
    /// the index from the store; if that fails too, the epoch mismatch is
    /// left for startup recovery.
    fn heal_after_store_failure(&mut self, cause: &Error) {
        tracing::warn!("Store commit failed after index flush ({}); rebuilding full-text index", cause);
        if let Err(e) = self.reindex() {
            tracing::error!("Full-text index diverged from store and could not be rebuilt: {}", e);
        }
    }
}

fn rebuild_index<I: IndexBackend>(index: &mut I, statements: &[Statement], epoch: u64) -> Result<()> {
    index.clear()?;
    for statement in statements {
        index.index(statement)?;
    }
    index.set_epoch(epoch)
}

impl<S: StoreBackend, I: IndexBackend> StoreBackend for IndexingStore<S, I> {
    fn begin(&mut self) -> Result<()> {
        self.store.begin()?;
        if let Err(e) = self.index.begin() {
            if let Err(undo) = self.store.rollback() {
                tracing::error!("Failed to release store batch after index begin failed: {}", undo);
            }
            return Err(e);
        }
        Ok(())
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        if !self.store.add(statement)? {
            return Ok(false);
        }

        if let Err(err) = self.index.index(statement) {
            tracing::warn!("Index write failed for {}; removing it from the store", statement);
            if let Err(undo) = self.store.remove(&Pattern::exact(statement)) {
                tracing::error!("Compensating remove of {} failed: {}", statement, undo);
                return Err(Error::Corrupt(format!(
                    "store holds unindexed {} after index failure ({}) and failed compensation ({})",
                    statement, err, undo
                )));
            }
            return Err(err);
        }

        tracing::debug!("Added {}", statement);
        Ok(true)
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        let doomed = self.store.match_pattern(pattern)?;
        if doomed.is_empty() {
            return Ok(0);
        }
        let removed = self.store.remove(pattern)?;

        for (done, statement) in doomed.iter().enumerate() {
            if let Err(err) = self.index.deindex(statement) {
                tracing::warn!("Deindex failed for {}; restoring {} statements", statement, doomed.len());
                if let Err(undo) = self.restore_removed(&doomed, done) {
                    tracing::error!("Compensating restore for pattern {} failed: {}", pattern, undo);
                    return Err(Error::Corrupt(format!(
                        "remove of {} half applied after index failure ({}) and failed compensation ({})",
                        pattern, err, undo
                    )));
                }
                return Err(err);
            }
        }

        tracing::debug!("Removed {} statements matching {}", removed, pattern);
        Ok(removed)
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        self.store.match_pattern(pattern)
    }

    fn contains(&self, statement: &Statement) -> Result<bool> {
        self.store.contains(statement)
    }

    fn len(&self) -> Result<usize> {
        self.store.len()
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        self.store.contexts()
    }

    fn commit(&mut self) -> Result<()> {
        let next = self.store.epoch()?.max(self.index.epoch()?) + 1;

        if let Err(e) = self.index.set_epoch(next).and_then(|_| self.index.flush()) {
            tracing::warn!("Index flush failed ({}); rolling back both backends", e);
            if let Err(undo) = self.rollback() {
                tracing::error!("Rollback after failed index flush also failed: {}", undo);
            }
            return Err(e);
        }

        if let Err(e) = self.store.set_epoch(next).and_then(|_| self.store.commit()) {
            if let Err(undo) = self.store.rollback() {
                tracing::error!("Store rollback after failed commit also failed: {}", undo);
            }
            self.heal_after_store_failure(&e);
            return Err(e);
        }

        tracing::debug!("Committed epoch {}", next);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let store = self.store.rollback();
        let index = self.index.rollback();
        store.and(index)
    }

    fn epoch(&self) -> Result<u64> {
        self.store.epoch()
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.store.set_epoch(epoch)?;
        self.index.set_epoch(epoch)
    }

    fn close(&mut self) -> Result<()> {
        let store = self.store.close();
        let index = self.index.close();
        store.and(index)
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.index.search(query, limit)
    }

    fn recover(&mut self) -> Result<RecoveryReport> {
        let store_epoch = self.store.epoch()?;
        let index_epoch = self.index.epoch()?;
        if store_epoch == index_epoch {
            return Ok(RecoveryReport {
                reindexed: false,
                store_epoch,
                index_epoch,
                entries: self.index.len()?,
            });
        }

        tracing::warn!(
            "Full-text index epoch {} differs from store epoch {}; rebuilding from store",
            index_epoch,
            store_epoch
        );
        self.reindex()
    }

    fn reindex(&mut self) -> Result<RecoveryReport> {
        let statements = self.store.match_pattern(&Pattern::any())?;
        let epoch = self.store.epoch()?;

        self.index.begin()?;
        if let Err(e) = rebuild_index(&mut self.index, &statements, epoch) {
            if let Err(undo) = self.index.rollback() {
                tracing::error!("Index rollback after failed rebuild also failed: {}", undo);
            }
            return Err(e);
        }
        self.index.flush()?;

        let entries = self.index.len()?;
        tracing::info!("Rebuilt full-text index: {} entries at epoch {}", entries, epoch);
        Ok(RecoveryReport {
            reindexed: true,
            store_epoch: epoch,
            index_epoch: epoch,
            entries,
        })
    }

    fn verify(&self) -> Result<IndexHealth> {
        let expected: HashSet<Statement> = self
            .store
            .match_pattern(&Pattern::any())?
            .into_iter()
            .filter(Statement::has_literal_object)
            .collect();
        let actual: HashSet<Statement> = self.index.entries()?.into_iter().collect();

        let mut missing: Vec<Statement> = expected.difference(&actual).cloned().collect();
        let mut stale: Vec<Statement> = actual.difference(&expected).cloned().collect();
        missing.sort();
        stale.sort();

        Ok(IndexHealth {
            missing,
            stale,
            store_epoch: self.store.epoch()?,
            index_epoch: self.index.epoch()?,
        })
    }

    fn index_len(&self) -> Result<Option<usize>> {
        Ok(Some(self.index.len()?))
    }
}

/// Outcome of startup recovery or an explicit reindex
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Whether the index was rebuilt from the store
    pub reindexed: bool,
    pub store_epoch: u64,
    pub index_epoch: u64,
    /// Index entries after recovery
    pub entries: usize,
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reindexed {
            write!(f, "Index rebuilt: {} entries at epoch {}", self.entries, self.store_epoch)
        } else {
            write!(f, "Index consistent: {} entries at epoch {}", self.entries, self.store_epoch)
        }
    }
}

/// Difference between the index and the store's indexable statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexHealth {
    /// Literal statements in the store without an index entry
    pub missing: Vec<Statement>,
    /// Index entries with no matching store statement
    pub stale: Vec<Statement>,
    pub store_epoch: u64,
    pub index_epoch: u64,
}

impl IndexHealth {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty() && self.store_epoch == self.index_epoch
    }
}

impl fmt::Display for IndexHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index Health:")?;
        writeln!(f, "  Store epoch: {}", self.store_epoch)?;
        writeln!(f, "  Index epoch: {}", self.index_epoch)?;
        writeln!(f, "  Missing entries: {}", self.missing.len())?;
        write!(f, "  Stale entries: {}", self.stale.len())
    }
}
