#![allow(dead_code)]

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tristore::{
    Error, FtsIndex, IndexBackend, Iri, Literal, MemoryStore, Pattern, Resource, Result, SearchHit, Statement,
    StoreBackend, Value,
};

/// Statements in the fixture document
pub const BEET_STATEMENTS: usize = 68;
/// Fixture statements with a literal object
pub const BEET_LITERALS: usize = 43;
/// Fixture statements mentioning a blank node
pub const BEET_BLANK: usize = 16;

pub fn beet_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/beet.nt")
}

pub fn beet_document() -> String {
    std::fs::read_to_string(beet_path()).unwrap()
}

pub fn ex(local: &str) -> Iri {
    Iri::new(format!("http://example.org/test/{}", local)).unwrap()
}

pub fn label(subject: &str, text: &str) -> Statement {
    Statement::new(ex(subject).into(), ex("label"), Literal::simple(text))
}

pub fn link(subject: &str, object: &str) -> Statement {
    Statement::new(ex(subject).into(), ex("link"), ex(object))
}

/// Whether the statement mentions a blank node
pub fn has_blank(statement: &Statement) -> bool {
    matches!(statement.subject, Resource::Blank(_))
        || matches!(statement.object, Value::Blank(_))
        || matches!(statement.context, Some(Resource::Blank(_)))
}

/// Statements free of blank nodes, whose identity does not depend on the load
pub fn ground(statements: impl IntoIterator<Item = Statement>) -> HashSet<Statement> {
    statements.into_iter().filter(|st| !has_blank(st)).collect()
}

pub fn subject(local: &str) -> Pattern {
    Pattern::any().subject(Resource::Iri(ex(local)))
}

/// Switches shared between a test and the [`FaultyIndex`] it handed to a repository
#[derive(Clone, Default)]
pub struct Faults {
    fail_text: Arc<Mutex<Option<String>>>,
    fail_flush: Arc<AtomicBool>,
}

impl Faults {
    /// Fail indexing of literals whose text contains `text`
    pub fn fail_indexing(&self, text: &str) {
        *self.fail_text.lock().unwrap() = Some(text.to_string());
    }

    pub fn fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        *self.fail_text.lock().unwrap() = None;
        self.fail_flush(false);
    }
}

/// Full-text index that fails on demand
pub struct FaultyIndex {
    inner: FtsIndex,
    faults: Faults,
}

impl FaultyIndex {
    pub fn new(faults: Faults) -> Self {
        Self {
            inner: FtsIndex::open_in_memory().unwrap(),
            faults,
        }
    }
}

impl IndexBackend for FaultyIndex {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn index(&mut self, statement: &Statement) -> Result<()> {
        let poisoned = self.faults.fail_text.lock().unwrap().clone();
        if let (Some(poison), Some(literal)) = (poisoned, statement.object.as_literal()) {
            if literal.lexical().contains(&poison) {
                return Err(Error::Index(format!("injected failure indexing {}", statement)));
            }
        }
        self.inner.index(statement)
    }

    fn deindex(&mut self, statement: &Statement) -> Result<()> {
        self.inner.deindex(statement)
    }

    fn flush(&mut self) -> Result<()> {
        if self.faults.fail_flush.load(Ordering::SeqCst) {
            return Err(Error::Index("injected flush failure".to_string()));
        }
        self.inner.flush()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn clear(&mut self) -> Result<()> {
        self.inner.clear()
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.inner.search(query, limit)
    }

    fn entries(&self) -> Result<Vec<Statement>> {
        self.inner.entries()
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    fn epoch(&self) -> Result<u64> {
        self.inner.epoch()
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.inner.set_epoch(epoch)
    }
}

/// Memory store that reports corruption on add while the switch is on
pub struct CorruptibleStore {
    inner: MemoryStore,
    corrupt: Arc<AtomicBool>,
}

impl CorruptibleStore {
    pub fn new(corrupt: Arc<AtomicBool>) -> Self {
        Self {
            inner: MemoryStore::new(),
            corrupt,
        }
    }
}

impl StoreBackend for CorruptibleStore {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(Error::Corrupt(format!("page checksum mismatch writing {}", statement)));
        }
        self.inner.add(statement)
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        self.inner.remove(pattern)
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        self.inner.match_pattern(pattern)
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        self.inner.contexts()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn epoch(&self) -> Result<u64> {
        self.inner.epoch()
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.inner.set_epoch(epoch)
    }
}

/// Memory store whose batch commit fails while the switch is on
pub struct CommitFailingStore {
    inner: MemoryStore,
    fail_commit: Arc<AtomicBool>,
}

impl CommitFailingStore {
    pub fn new(fail_commit: Arc<AtomicBool>) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_commit,
        }
    }
}

impl StoreBackend for CommitFailingStore {
    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        self.inner.add(statement)
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        self.inner.remove(pattern)
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        self.inner.match_pattern(pattern)
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        self.inner.contexts()
    }

    fn commit(&mut self) -> Result<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::Store("injected commit failure".to_string()));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn epoch(&self) -> Result<u64> {
        self.inner.epoch()
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.inner.set_epoch(epoch)
    }
}
