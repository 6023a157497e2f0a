//! # tristore - Transactional RDF statement store
//!
//! A graph store that bulk-loads RDF statements through connections and
//! keeps a full-text index in lockstep with the primary store.
//!
//! tristore provides:
//! - RDF terms and statements with N-Triples canonical encoding
//! - Pluggable primary stores (in-memory, SQLite) behind [`StoreBackend`]
//! - A SQLite FTS5 full-text index behind [`IndexBackend`]
//! - [`IndexingStore`], the decorator that keeps both consistent
//! - Repository / connection / transaction API with isolation levels

pub mod term;
pub mod statement;
pub mod storage;
pub mod index;
pub mod indexing;
pub mod backend;
pub mod parser;
pub mod repository;
pub mod config;
pub mod discover;
pub mod ui;

// Re-exports for convenient access
pub use term::{BlankNode, Iri, Literal, Resource, Value};
pub use statement::{Pattern, Statement};
pub use storage::{MemoryStore, PrimaryStore, SqliteStore, StoreBackend};
pub use index::{FtsIndex, IndexBackend, SearchHit};
pub use indexing::{IndexHealth, IndexingStore, RecoveryReport};
pub use backend::Backend;
pub use parser::{Input, ParserRegistry, RdfFormat, RdfParser};
pub use repository::{
    Connection, IsolationLevel, Repository, RepositoryResult, RepositorySettings, RepositoryStats,
    TransactionStatus,
};
pub use config::{RepositoryConfig, StorageLocation};

/// Result type alias for tristore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tristore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid term: {0}")]
    InvalidTerm(String),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Storage error: {context}: {source}")]
    Sqlite {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store corrupted: {0}")]
    Corrupt(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Isolation error: {0}")]
    Isolation(String),

    #[error("Illegal state: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classification used by callers to decide how to recover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; retry with another format or fixed input
    Format,
    /// Primary store failure
    Store,
    /// Full-text index failure
    Index,
    /// Isolation level unsupported or violated
    Isolation,
    /// Invalid API sequencing
    State,
    /// Invalid or missing configuration
    Config,
    /// Underlying I/O failure while reading input or files
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Format => "format",
            ErrorKind::Store => "store",
            ErrorKind::Index => "index",
            ErrorKind::Isolation => "isolation",
            ErrorKind::State => "state",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTerm(_) | Error::Format(_) => ErrorKind::Format,
            Error::Store(_) | Error::Sqlite { .. } | Error::Corrupt(_) => ErrorKind::Store,
            Error::Index(_) => ErrorKind::Index,
            Error::Isolation(_) => ErrorKind::Isolation,
            Error::State(_) => ErrorKind::State,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the error indicates the backend can no longer be trusted.
    ///
    /// A fatal error during an add rolls the active transaction back.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Corrupt(_) => true,
            Error::Sqlite { source, .. } => matches!(
                source.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseCorrupt) | Some(rusqlite::ErrorCode::NotADatabase)
            ),
            _ => false,
        }
    }

    pub(crate) fn store(context: &str, source: rusqlite::Error) -> Self {
        Error::Sqlite {
            context: context.to_string(),
            source,
        }
    }

    pub(crate) fn index(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Index(format!("{}: {}", context, err))
    }
}
