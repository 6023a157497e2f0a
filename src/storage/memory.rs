//! In-memory statement store
//!
//! Statements live in a hash set with secondary indexes by subject and
//! predicate. A write batch keeps a journal of effective changes so that
//! `rollback` can undo them in reverse order.

use std::collections::{BTreeSet, HashMap, HashSet};
use super::StoreBackend;
use crate::statement::{Pattern, Statement};
use crate::term::{Iri, Resource};
use crate::{Error, Result};

#[derive(Debug, Clone)]
enum Change {
    Inserted(Statement),
    Deleted(Statement),
}

#[derive(Debug)]
struct Batch {
    journal: Vec<Change>,
    epoch_before: u64,
}

/// Hash-indexed in-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// All statements
    statements: HashSet<Statement>,
    /// Statements indexed by subject
    by_subject: HashMap<Resource, HashSet<Statement>>,
    /// Statements indexed by predicate
    by_predicate: HashMap<Iri, HashSet<Statement>>,
    epoch: u64,
    batch: Option<Batch>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, statement: &Statement) -> bool {
        if !self.statements.insert(statement.clone()) {
            return false;
        }
        self.by_subject
            .entry(statement.subject.clone())
            .or_default()
            .insert(statement.clone());
        self.by_predicate
            .entry(statement.predicate.clone())
            .or_default()
            .insert(statement.clone());
        true
    }

    fn delete(&mut self, statement: &Statement) -> bool {
        if !self.statements.remove(statement) {
            return false;
        }
        if let Some(set) = self.by_subject.get_mut(&statement.subject) {
            set.remove(statement);
            if set.is_empty() {
                self.by_subject.remove(&statement.subject);
            }
        }
        if let Some(set) = self.by_predicate.get_mut(&statement.predicate) {
            set.remove(statement);
            if set.is_empty() {
                self.by_predicate.remove(&statement.predicate);
            }
        }
        true
    }

    fn record(&mut self, change: Change) {
        if let Some(batch) = self.batch.as_mut() {
            batch.journal.push(change);
        }
    }

    /// Candidates from the most selective index, unfiltered
    fn candidates(&self, pattern: &Pattern) -> Box<dyn Iterator<Item = &Statement> + '_> {
        if let Some(subject) = &pattern.subject {
            match self.by_subject.get(subject) {
                Some(set) => Box::new(set.iter()),
                None => Box::new(std::iter::empty()),
            }
        } else if let Some(predicate) = &pattern.predicate {
            match self.by_predicate.get(predicate) {
                Some(set) => Box::new(set.iter()),
                None => Box::new(std::iter::empty()),
            }
        } else {
            Box::new(self.statements.iter())
        }
    }
}

impl StoreBackend for MemoryStore {
    fn begin(&mut self) -> Result<()> {
        if self.batch.is_some() {
            return Err(Error::Store("memory store: write batch already open".to_string()));
        }
        self.batch = Some(Batch {
            journal: Vec::new(),
            epoch_before: self.epoch,
        });
        Ok(())
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        let inserted = self.insert(statement);
        if inserted {
            self.record(Change::Inserted(statement.clone()));
        }
        Ok(inserted)
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        let doomed = self.match_pattern(pattern)?;
        for statement in &doomed {
            if self.delete(statement) {
                self.record(Change::Deleted(statement.clone()));
            }
        }
        Ok(doomed.len())
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        let mut matches: Vec<Statement> = self
            .candidates(pattern)
            .filter(|st| pattern.matches(st))
            .cloned()
            .collect();
        matches.sort();
        Ok(matches)
    }

    fn contains(&self, statement: &Statement) -> Result<bool> {
        Ok(self.statements.contains(statement))
    }

    fn len(&self) -> Result<usize> {
        Ok(self.statements.len())
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        let contexts: BTreeSet<&Resource> = self
            .statements
            .iter()
            .filter_map(|st| st.context.as_ref())
            .collect();
        Ok(contexts.into_iter().cloned().collect())
    }

    fn commit(&mut self) -> Result<()> {
        self.batch
            .take()
            .map(|_| ())
            .ok_or_else(|| Error::Store("memory store: no write batch to commit".to_string()))
    }

    fn rollback(&mut self) -> Result<()> {
        let batch = self
            .batch
            .take()
            .ok_or_else(|| Error::Store("memory store: no write batch to roll back".to_string()))?;
        for change in batch.journal.into_iter().rev() {
            match change {
                Change::Inserted(st) => {
                    self.delete(&st);
                }
                Change::Deleted(st) => {
                    self.insert(&st);
                }
            }
        }
        self.epoch = batch.epoch_before;
        Ok(())
    }

    fn epoch(&self) -> Result<u64> {
        Ok(self.epoch)
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.epoch = epoch;
        Ok(())
    }
}
