//! Full-text index layer
//!
//! The index is derived data: one entry per statement whose object is a
//! literal, always recomputable from the primary store.

pub mod fts;
pub mod schema;

pub use fts::FtsIndex;

use crate::statement::Statement;
use crate::Result;
use serde::Serialize;

/// Capability set of a secondary full-text index.
///
/// Every failure is reported as [`crate::Error::Index`] so callers can tell
/// index failures apart from store failures.
pub trait IndexBackend: Send {
    /// Open a write batch
    fn begin(&mut self) -> Result<()>;

    /// Index a statement. Statements without a literal object are ignored.
    fn index(&mut self, statement: &Statement) -> Result<()>;

    /// Remove a statement's entry, if any
    fn deindex(&mut self, statement: &Statement) -> Result<()>;

    /// Make the open write batch durable
    fn flush(&mut self) -> Result<()>;

    /// Discard the open write batch
    fn rollback(&mut self) -> Result<()>;

    /// Drop every entry (inside the open write batch)
    fn clear(&mut self) -> Result<()>;

    /// Ranked full-text matches, best first
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;

    /// Statements that currently have an entry
    fn entries(&self) -> Result<Vec<Statement>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Commit counter of the last flushed batch
    fn epoch(&self) -> Result<u64>;

    /// Record the commit counter inside the open write batch
    fn set_epoch(&mut self, epoch: u64) -> Result<()>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A full-text search match
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub statement: Statement,
    /// Relevance, higher is better
    pub score: f64,
    /// Matching fragment with hits wrapped in `[` `]`
    pub snippet: String,
}
