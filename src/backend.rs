//! The backend a repository is configured with
//!
//! Configuration picks a primary store and, optionally, a full-text index
//! directory. With an index the store is wrapped in [`IndexingStore`].

use crate::config::{RepositoryConfig, StorageLocation};
use crate::index::{FtsIndex, SearchHit};
use crate::indexing::{IndexHealth, IndexingStore, RecoveryReport};
use crate::statement::{Pattern, Statement};
use crate::storage::{MemoryStore, PrimaryStore, SqliteStore, StoreBackend};
use crate::term::Resource;
use crate::Result;

/// Configured backend: a plain primary store or one decorated with an index
#[derive(Debug)]
pub enum Backend {
    Plain(PrimaryStore),
    Indexed(IndexingStore<PrimaryStore, FtsIndex>),
}

impl Backend {
    /// Open the stores named by `config`
    pub fn open(config: &RepositoryConfig) -> Result<Self> {
        let store = match &config.storage()? {
            StorageLocation::Memory => PrimaryStore::Memory(MemoryStore::new()),
            StorageLocation::Directory(dir) => PrimaryStore::Sqlite(SqliteStore::open_in_dir(dir)?),
        };

        let backend = match config.index()? {
            None => Backend::Plain(store),
            Some(StorageLocation::Memory) => {
                Backend::Indexed(IndexingStore::new(store, FtsIndex::open_in_memory()?))
            }
            Some(StorageLocation::Directory(dir)) => {
                Backend::Indexed(IndexingStore::new(store, FtsIndex::open_in_dir(&dir)?))
            }
        };
        Ok(backend)
    }

    /// Whether writes are mirrored into a full-text index
    pub fn is_indexed(&self) -> bool {
        matches!(self, Backend::Indexed(_))
    }
}

macro_rules! delegate {
    ($self:ident, $b:ident => $body:expr) => {
        match $self {
            Backend::Plain($b) => $body,
            Backend::Indexed($b) => $body,
        }
    };
}

impl StoreBackend for Backend {
    fn begin(&mut self) -> Result<()> {
        delegate!(self, b => b.begin())
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        delegate!(self, b => b.add(statement))
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        delegate!(self, b => b.remove(pattern))
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        delegate!(self, b => b.match_pattern(pattern))
    }

    fn contains(&self, statement: &Statement) -> Result<bool> {
        delegate!(self, b => b.contains(statement))
    }

    fn len(&self) -> Result<usize> {
        delegate!(self, b => b.len())
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        delegate!(self, b => b.contexts())
    }

    fn commit(&mut self) -> Result<()> {
        delegate!(self, b => b.commit())
    }

    fn rollback(&mut self) -> Result<()> {
        delegate!(self, b => b.rollback())
    }

    fn epoch(&self) -> Result<u64> {
        delegate!(self, b => b.epoch())
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        delegate!(self, b => b.set_epoch(epoch))
    }

    fn close(&mut self) -> Result<()> {
        delegate!(self, b => b.close())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        delegate!(self, b => b.search(query, limit))
    }

    fn recover(&mut self) -> Result<RecoveryReport> {
        delegate!(self, b => b.recover())
    }

    fn reindex(&mut self) -> Result<RecoveryReport> {
        delegate!(self, b => b.reindex())
    }

    fn verify(&self) -> Result<IndexHealth> {
        delegate!(self, b => b.verify())
    }

    fn index_len(&self) -> Result<Option<usize>> {
        delegate!(self, b => b.index_len())
    }
}
