//! Client handle onto a repository
//!
//! Without an active transaction every write call is auto-committed as one
//! atomic batch. Inside a transaction, writes either go straight to the
//! backend with an undo log (`IsolationLevel::None`) or are buffered until
//! commit.

use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use super::transaction::{inverse, PendingOp, Transaction};
use super::{IsolationLevel, RepositoryResult, Shared, TransactionStatus};
use crate::backend::Backend;
use crate::index::SearchHit;
use crate::parser::{Input, RdfFormat};
use crate::statement::{Pattern, Statement};
use crate::storage::StoreBackend;
use crate::term::{Iri, Resource};
use crate::{Error, Result};

/// A connection. Single owner; send it to another thread to use it there.
pub struct Connection<B: StoreBackend = Backend> {
    shared: Arc<Shared<B>>,
    /// `Some` while a transaction is active or was aborted and not yet replaced
    txn: Option<Transaction>,
    closed: bool,
}

impl<B: StoreBackend> Connection<B> {
    pub(crate) fn new(shared: Arc<Shared<B>>) -> Self {
        Self {
            shared,
            txn: None,
            closed: false,
        }
    }

    // ========== Transactions ==========

    /// Begin a transaction at the repository's default isolation level
    pub fn begin(&mut self) -> Result<()> {
        self.begin_with(self.shared.settings.default_isolation)
    }

    pub fn begin_with(&mut self, level: IsolationLevel) -> Result<()> {
        self.ensure_open()?;
        if let Some(txn) = &self.txn {
            if txn.is_active() {
                return Err(Error::State(format!("transaction {} is already active", txn.id())));
            }
        }
        self.txn = Some(self.shared.begin(level)?);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.txn.as_ref().is_some_and(Transaction::is_active)
    }

    /// Status of the current transaction; `None` in auto-commit mode
    pub fn status(&self) -> Option<TransactionStatus> {
        self.txn.as_ref().map(Transaction::status)
    }

    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.txn.as_ref().map(Transaction::level)
    }

    /// Make the transaction's writes durable and visible
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        let shared = &self.shared;
        let txn = active(&mut self.txn)?;

        if txn.level.buffers_writes() {
            match shared.commit_buffered(txn) {
                Ok(changes) => {
                    tracing::debug!("Transaction {} committed {} changes", txn.id, changes.len());
                }
                Err(e) => {
                    if e.is_fatal() || matches!(e, Error::Isolation(_)) {
                        abort(shared, txn, &e);
                    }
                    return Err(e);
                }
            }
        } else {
            tracing::debug!("Transaction {} committed {} applied changes", txn.id, txn.undo.len());
        }

        txn.finish(TransactionStatus::Committed);
        shared.release(txn);
        self.txn = None;
        Ok(())
    }

    /// Discard the transaction's writes
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        let shared = &self.shared;
        let txn = active(&mut self.txn)?;

        if !txn.undo.is_empty() {
            if let Err(e) = shared.apply(&inverse(&txn.undo)) {
                if e.is_fatal() {
                    abort(shared, txn, &e);
                }
                return Err(e);
            }
        }

        tracing::debug!("Transaction {} rolled back", txn.id);
        txn.finish(TransactionStatus::RolledBack);
        shared.release(txn);
        self.txn = None;
        Ok(())
    }

    // ========== Writes ==========

    /// Parse `input` completely, then add every statement.
    ///
    /// With a non-empty `contexts` each statement is added to every listed
    /// context instead of the one it was parsed with. Returns the number of
    /// statements submitted. The call is atomic: on error nothing is added.
    pub fn add(
        &mut self,
        input: Input<'_>,
        base: Option<&Iri>,
        format: Option<RdfFormat>,
        contexts: &[Resource],
    ) -> Result<usize> {
        self.ensure_writable()?;
        let source = input.describe();
        let statements = self.shared.settings.parsers.parse(input, base, format)?;

        let ops: Vec<PendingOp> = if contexts.is_empty() {
            statements.into_iter().map(PendingOp::Add).collect()
        } else {
            statements
                .iter()
                .flat_map(|st| {
                    contexts
                        .iter()
                        .map(move |context| PendingOp::Add(st.with_context(Some(context.clone()))))
                })
                .collect()
        };

        let count = ops.len();
        self.write(ops)?;
        tracing::debug!("Added {} statements from {}", count, source);
        Ok(count)
    }

    pub fn add_statement(&mut self, statement: Statement) -> Result<()> {
        self.write(vec![PendingOp::Add(statement)])
    }

    /// Add several statements as one atomic write
    pub fn add_statements(&mut self, statements: impl IntoIterator<Item = Statement>) -> Result<()> {
        self.write(statements.into_iter().map(PendingOp::Add).collect())
    }

    /// Remove every statement matching `pattern`
    pub fn remove(&mut self, pattern: &Pattern) -> Result<()> {
        self.write(vec![PendingOp::Remove(pattern.clone())])
    }

    pub fn remove_statement(&mut self, statement: &Statement) -> Result<()> {
        self.remove(&Pattern::exact(statement))
    }

    fn write(&mut self, ops: Vec<PendingOp>) -> Result<()> {
        self.ensure_writable()?;
        if ops.is_empty() {
            return Ok(());
        }

        let shared = &self.shared;
        let Some(txn) = self.txn.as_mut() else {
            let changes = shared.apply(&ops)?;
            tracing::debug!("Auto-committed {} changes", changes.len());
            return Ok(());
        };

        if txn.level.buffers_writes() {
            txn.pending.extend(ops);
            return Ok(());
        }

        match shared.apply(&ops) {
            Ok(changes) => {
                txn.undo.extend(changes);
                Ok(())
            }
            Err(e) => {
                if e.is_fatal() {
                    abort(shared, txn, &e);
                }
                Err(e)
            }
        }
    }

    // ========== Reads ==========

    /// Statements matching `pattern`, including this transaction's pending
    /// writes when the repository reads its own writes
    pub fn get_statements(&mut self, pattern: &Pattern) -> Result<RepositoryResult> {
        Ok(RepositoryResult::new(self.read(pattern)?))
    }

    pub fn has_statement(&mut self, statement: &Statement) -> Result<bool> {
        Ok(!self.read(&Pattern::exact(statement))?.is_empty())
    }

    /// Number of statements in `contexts` (every context when empty)
    pub fn size(&mut self, contexts: &[Option<Resource>]) -> Result<usize> {
        let pattern = Pattern::any().contexts(contexts.iter().cloned());
        if pattern.contexts.is_empty() && !self.overlays() {
            self.ensure_open()?;
            self.note_read(&pattern);
            return self.shared.lock()?.backend.len();
        }
        Ok(self.read(&pattern)?.len())
    }

    /// Named contexts holding at least one statement
    pub fn get_context_ids(&mut self) -> Result<Vec<Resource>> {
        if !self.overlays() {
            self.ensure_open()?;
            self.note_read(&Pattern::any());
            return self.shared.lock()?.backend.contexts();
        }
        let contexts: BTreeSet<Resource> = self
            .read(&Pattern::any())?
            .into_iter()
            .filter_map(|st| st.context)
            .collect();
        Ok(contexts.into_iter().collect())
    }

    /// Full-text search over committed literals
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.ensure_open()?;
        self.shared.lock()?.backend.search(query, limit)
    }

    /// Write matching statements as N-Quads, returning how many were written
    pub fn export(&mut self, pattern: &Pattern, mut writer: impl Write) -> Result<usize> {
        let statements = self.read(pattern)?;
        for statement in &statements {
            writeln!(writer, "{}", statement)?;
        }
        writer.flush()?;
        Ok(statements.len())
    }

    fn read(&mut self, pattern: &Pattern) -> Result<Vec<Statement>> {
        self.ensure_open()?;
        let committed = self.shared.lock()?.backend.match_pattern(pattern)?;
        self.note_read(pattern);

        match self.txn.as_ref() {
            Some(txn) if txn.is_active() && self.shared.settings.read_own_writes => {
                Ok(txn.overlay(pattern, committed))
            }
            _ => Ok(committed),
        }
    }

    /// Whether reads must merge pending writes
    fn overlays(&self) -> bool {
        self.shared.settings.read_own_writes
            && self
                .txn
                .as_ref()
                .is_some_and(|txn| txn.is_active() && !txn.pending.is_empty())
    }

    fn note_read(&mut self, pattern: &Pattern) {
        if let Some(txn) = self.txn.as_mut() {
            if txn.is_active() {
                txn.record_read(pattern);
            }
        }
    }

    // ========== Lifecycle ==========

    /// Roll back any active transaction and release the connection
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let result = if self.is_active() {
            tracing::warn!("Closing connection with an active transaction; rolling back");
            self.rollback()
        } else {
            Ok(())
        };

        if let Some(mut txn) = self.txn.take() {
            if txn.is_active() {
                txn.finish(TransactionStatus::RolledBack);
            }
            self.shared.release(&mut txn);
        }
        self.closed = true;
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::State("connection is closed".to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        match &self.txn {
            Some(txn) if txn.aborted => Err(aborted(txn)),
            _ => Ok(()),
        }
    }
}

impl<B: StoreBackend> Drop for Connection<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Closing dropped connection failed: {}", e);
        }
    }
}

fn aborted(txn: &Transaction) -> Error {
    Error::State(format!(
        "transaction {} was rolled back after a failure; call begin() to start a new one",
        txn.id()
    ))
}

/// The active transaction, or a state error
fn active(txn: &mut Option<Transaction>) -> Result<&mut Transaction> {
    match txn {
        Some(txn) if !txn.is_active() => Err(aborted(txn)),
        Some(txn) => Ok(txn),
        None => Err(Error::State("no active transaction".to_string())),
    }
}

/// Roll a transaction back after a fatal or isolation failure
fn abort<B: StoreBackend>(shared: &Shared<B>, txn: &mut Transaction, cause: &Error) {
    tracing::warn!("Rolling back transaction {} after failure: {}", txn.id, cause);
    if !txn.undo.is_empty() {
        if let Err(e) = shared.apply(&inverse(&txn.undo)) {
            tracing::error!("Undoing applied writes of transaction {} failed: {}", txn.id, e);
        }
    }
    txn.finish(TransactionStatus::RolledBack);
    txn.aborted = true;
    shared.release(txn);
}
