//! Database schema definitions for the SQLite statement store

/// SQL to create the statements table.
///
/// Terms are stored in N-Triples syntax; the default graph is the empty
/// string in `context`.
pub const CREATE_STATEMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS statements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject TEXT NOT NULL,
    predicate TEXT NOT NULL,
    object TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT '',
    UNIQUE(subject, predicate, object, context)
)
"#;

/// SQL to create the store metadata table (commit epoch)
pub const CREATE_META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_statements_predicate ON statements(predicate)",
    "CREATE INDEX IF NOT EXISTS idx_statements_object ON statements(object)",
    "CREATE INDEX IF NOT EXISTS idx_statements_context ON statements(context)",
];

/// Key of the commit epoch in `store_meta`
pub const EPOCH_KEY: &str = "epoch";

/// File name of the statement database inside the storage directory
pub const STORE_FILE: &str = "statements.db";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_STATEMENTS_TABLE, CREATE_META_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
