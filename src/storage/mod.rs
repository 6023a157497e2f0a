//! Storage Layer - primary statement stores
//!
//! The primary store is the system of record. Two implementations:
//! - [`MemoryStore`]: hash-indexed statements held in memory
//! - [`SqliteStore`]: SQLite with tables `statements(subject, predicate, object, context)`
//!   and `store_meta(key, value)`
//!
//! Every mutation happens between `begin` and `commit`/`rollback`; the
//! repository brackets each batch while holding its commit lock.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::index::SearchHit;
use crate::indexing::{IndexHealth, RecoveryReport};
use crate::statement::{Pattern, Statement};
use crate::term::Resource;
use crate::{Error, Result};

/// Capability set of a primary statement store.
///
/// Set semantics: adding a statement that is already present is a no-op.
/// `match_pattern` returns a fresh snapshot on every call.
pub trait StoreBackend: Send {
    /// Open a write batch
    fn begin(&mut self) -> Result<()>;

    /// Add a statement, returning `true` when it was not present before
    fn add(&mut self, statement: &Statement) -> Result<bool>;

    /// Remove every statement matching `pattern`, returning how many were removed
    fn remove(&mut self, pattern: &Pattern) -> Result<usize>;

    /// Statements matching `pattern` at call time
    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>>;

    fn contains(&self, statement: &Statement) -> Result<bool> {
        Ok(!self.match_pattern(&Pattern::exact(statement))?.is_empty())
    }

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Distinct named contexts holding at least one statement
    fn contexts(&self) -> Result<Vec<Resource>>;

    /// Make the open write batch durable
    fn commit(&mut self) -> Result<()>;

    /// Discard the open write batch
    fn rollback(&mut self) -> Result<()>;

    /// Commit counter persisted alongside the data
    fn epoch(&self) -> Result<u64>;

    /// Record the commit counter inside the open write batch
    fn set_epoch(&mut self, epoch: u64) -> Result<()>;

    /// Flush and release resources
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Full-text search over indexed literals
    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
        Err(Error::Index("no full-text index configured".to_string()))
    }

    /// Bring derived structures back in line with the store after a restart
    fn recover(&mut self) -> Result<RecoveryReport> {
        Ok(RecoveryReport::default())
    }

    /// Rebuild derived structures from the store unconditionally
    fn reindex(&mut self) -> Result<RecoveryReport> {
        Ok(RecoveryReport::default())
    }

    /// Compare derived structures against the store
    fn verify(&self) -> Result<IndexHealth> {
        Ok(IndexHealth::default())
    }

    /// Number of full-text entries, `None` without an index
    fn index_len(&self) -> Result<Option<usize>> {
        Ok(None)
    }
}

/// The primary store selected by configuration
#[derive(Debug)]
pub enum PrimaryStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

macro_rules! delegate {
    ($self:ident, $store:ident => $body:expr) => {
        match $self {
            PrimaryStore::Memory($store) => $body,
            PrimaryStore::Sqlite($store) => $body,
        }
    };
}

impl StoreBackend for PrimaryStore {
    fn begin(&mut self) -> Result<()> {
        delegate!(self, s => s.begin())
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        delegate!(self, s => s.add(statement))
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        delegate!(self, s => s.remove(pattern))
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        delegate!(self, s => s.match_pattern(pattern))
    }

    fn contains(&self, statement: &Statement) -> Result<bool> {
        delegate!(self, s => s.contains(statement))
    }

    fn len(&self) -> Result<usize> {
        delegate!(self, s => s.len())
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        delegate!(self, s => s.contexts())
    }

    fn commit(&mut self) -> Result<()> {
        delegate!(self, s => s.commit())
    }

    fn rollback(&mut self) -> Result<()> {
        delegate!(self, s => s.rollback())
    }

    fn epoch(&self) -> Result<u64> {
        delegate!(self, s => s.epoch())
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        delegate!(self, s => s.set_epoch(epoch))
    }

    fn close(&mut self) -> Result<()> {
        delegate!(self, s => s.close())
    }
}
