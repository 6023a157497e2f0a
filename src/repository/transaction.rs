//! Transaction state: pending writes, undo log and read set

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::statement::{Pattern, Statement};
use crate::{Error, Result};

/// How much of other connections' concurrent work a transaction may observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Writes hit the backend immediately and are visible to everyone
    None,
    /// Writes are buffered and applied atomically at commit
    #[default]
    ReadCommitted,
    /// ReadCommitted plus commit-time validation of reads and writes
    Serializable,
}

impl IsolationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::None => "none",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::Serializable => "serializable",
        }
    }

    /// Whether writes are held back until commit
    pub fn buffers_writes(&self) -> bool {
        !matches!(self, IsolationLevel::None)
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "none" => Ok(IsolationLevel::None),
            "read_committed" | "readcommitted" => Ok(IsolationLevel::ReadCommitted),
            "serializable" => Ok(IsolationLevel::Serializable),
            _ => Err(Error::Config(format!(
                "unknown isolation level {:?} (expected none, read_committed or serializable)",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Active,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::RolledBack => write!(f, "rolled back"),
        }
    }
}

/// A write waiting to be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    Add(Statement),
    Remove(Pattern),
}

impl PendingOp {
    /// Whether this write is affected by a change to `statement`
    pub fn touches(&self, statement: &Statement) -> bool {
        match self {
            PendingOp::Add(st) => st == statement,
            PendingOp::Remove(pattern) => pattern.matches(statement),
        }
    }
}

/// A change that actually happened in the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Added(Statement),
    Removed(Statement),
}

impl Change {
    pub fn statement(&self) -> &Statement {
        match self {
            Change::Added(st) | Change::Removed(st) => st,
        }
    }
}

/// Writes that undo `changes`, in application order
pub fn inverse(changes: &[Change]) -> Vec<PendingOp> {
    changes
        .iter()
        .rev()
        .map(|change| match change {
            Change::Added(st) => PendingOp::Remove(Pattern::exact(st)),
            Change::Removed(st) => PendingOp::Add(st.clone()),
        })
        .collect()
}

/// One transaction of a connection
#[derive(Debug)]
pub struct Transaction {
    pub(crate) id: u64,
    pub(crate) level: IsolationLevel,
    pub(crate) status: TransactionStatus,
    /// Repository version observed at begin
    pub(crate) start_version: u64,
    /// Buffered writes (buffering levels)
    pub(crate) pending: Vec<PendingOp>,
    /// Changes already applied (level `None`), oldest first
    pub(crate) undo: Vec<Change>,
    /// Patterns read (level `Serializable`)
    pub(crate) reads: Vec<Pattern>,
    /// Rolled back after a fatal or isolation failure
    pub(crate) aborted: bool,
    /// Whether the repository still tracks this transaction
    pub(crate) registered: bool,
}

impl Transaction {
    pub(crate) fn new(id: u64, level: IsolationLevel, start_version: u64) -> Self {
        Self {
            id,
            level,
            status: TransactionStatus::Active,
            start_version,
            pending: Vec::new(),
            undo: Vec::new(),
            reads: Vec::new(),
            aborted: false,
            registered: true,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn level(&self) -> IsolationLevel {
        self.level
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn record_read(&mut self, pattern: &Pattern) {
        if self.level == IsolationLevel::Serializable && !self.reads.contains(pattern) {
            self.reads.push(pattern.clone());
        }
    }

    /// Whether a concurrent change to `statement` invalidates this transaction
    pub(crate) fn conflicts_with(&self, statement: &Statement) -> bool {
        self.reads.iter().any(|p| p.matches(statement))
            || self.pending.iter().any(|op| op.touches(statement))
    }

    /// Overlay buffered writes onto a committed snapshot matching `pattern`
    pub(crate) fn overlay(&self, pattern: &Pattern, committed: Vec<Statement>) -> Vec<Statement> {
        if self.pending.is_empty() {
            return committed;
        }

        let mut statements = committed;
        for op in &self.pending {
            match op {
                PendingOp::Add(st) => {
                    if pattern.matches(st) && !statements.contains(st) {
                        statements.push(st.clone());
                    }
                }
                PendingOp::Remove(removed) => statements.retain(|st| !removed.matches(st)),
            }
        }
        statements
    }

    pub(crate) fn finish(&mut self, status: TransactionStatus) {
        self.status = status;
        self.pending.clear();
        self.undo.clear();
        self.reads.clear();
    }
}
