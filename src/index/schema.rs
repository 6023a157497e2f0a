//! Database schema definitions for the full-text index

/// Indexed statements, addressed by [`crate::Statement::key`]
pub const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    predicate TEXT NOT NULL,
    object TEXT NOT NULL,
    context TEXT NOT NULL DEFAULT ''
)
"#;

/// FTS5 table holding the literal text of each entry
pub const CREATE_TEXT_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS entry_text USING fts5(
    key UNINDEXED,
    text,
    tokenize = 'unicode61 remove_diacritics 2'
)
"#;

pub const CREATE_META_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)
"#;

pub const EPOCH_KEY: &str = "epoch";

/// File name of the index database inside the index directory
pub const INDEX_FILE: &str = "fulltext.db";

pub fn all_schema_statements() -> Vec<&'static str> {
    vec![CREATE_ENTRIES_TABLE, CREATE_TEXT_TABLE, CREATE_META_TABLE]
}
