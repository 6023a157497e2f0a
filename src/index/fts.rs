//! SQLite FTS5 full-text index

use std::path::Path;
use rusqlite::{Connection, params, OptionalExtension};
use super::{schema, IndexBackend, SearchHit};
use crate::statement::Statement;
use crate::storage::sqlite::{encode_context, SqliteStore};
use crate::term::Value;
use crate::{Error, Result};

/// Full-text index over literal objects, stored in its own SQLite database
#[derive(Debug)]
pub struct FtsIndex {
    conn: Connection,
    in_batch: bool,
}

impl FtsIndex {
    /// Open an index database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::index("open index", e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| Error::index("configure index", e))?;
        let index = Self { conn, in_batch: false };
        index.initialize_schema()?;
        tracing::debug!("Opened full-text index at {}", path.display());
        Ok(index)
    }

    /// Open the index file inside an index directory, creating the directory
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| Error::index("create index directory", e))?;
        Self::open(&dir.join(schema::INDEX_FILE))
    }

    /// Open an in-memory index (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::index("open index", e))?;
        let index = Self { conn, in_batch: false };
        index.initialize_schema()?;
        Ok(index)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn
                .execute(stmt, [])
                .map_err(|e| Error::index("create index schema", e))?;
        }
        Ok(())
    }

    /// Turn free text into an FTS5 query: every word must occur.
    ///
    /// Words are quoted so that FTS5 operators in user input are taken literally.
    fn to_match_query(query: &str) -> Option<String> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
            .collect();
        if terms.is_empty() { None } else { Some(terms.join(" ")) }
    }
}

impl IndexBackend for FtsIndex {
    fn begin(&mut self) -> Result<()> {
        if self.in_batch {
            return Err(Error::Index("write batch already open".to_string()));
        }
        self.conn
            .execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::index("begin index batch", e))?;
        self.in_batch = true;
        Ok(())
    }

    fn index(&mut self, statement: &Statement) -> Result<()> {
        let Value::Literal(literal) = &statement.object else {
            return Ok(());
        };
        let key = statement.key();
        let inserted = self
            .conn
            .execute(
                r#"
                INSERT OR IGNORE INTO entries (key, subject, predicate, object, context)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    key,
                    statement.subject.to_string(),
                    statement.predicate.to_string(),
                    statement.object.to_string(),
                    encode_context(&statement.context),
                ],
            )
            .map_err(|e| Error::index(&format!("index {}", statement), e))?;

        if inserted > 0 {
            self.conn
                .execute(
                    "INSERT INTO entry_text (key, text) VALUES (?1, ?2)",
                    params![key, literal.lexical()],
                )
                .map_err(|e| Error::index(&format!("index text of {}", statement), e))?;
        }
        Ok(())
    }

    fn deindex(&mut self, statement: &Statement) -> Result<()> {
        let key = statement.key();
        let removed = self
            .conn
            .execute("DELETE FROM entries WHERE key = ?1", [&key])
            .map_err(|e| Error::index(&format!("deindex {}", statement), e))?;
        if removed > 0 {
            self.conn
                .execute("DELETE FROM entry_text WHERE key = ?1", [&key])
                .map_err(|e| Error::index(&format!("deindex text of {}", statement), e))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.in_batch {
            return Err(Error::Index("no write batch to flush".to_string()));
        }
        self.conn
            .execute("COMMIT", [])
            .map_err(|e| Error::index("flush index", e))?;
        self.in_batch = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_batch {
            return Err(Error::Index("no write batch to roll back".to_string()));
        }
        self.in_batch = false;
        self.conn
            .execute("ROLLBACK", [])
            .map_err(|e| Error::index("roll back index", e))?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM entries; DELETE FROM entry_text;")
            .map_err(|e| Error::index("clear index", e))
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(match_query) = Self::to_match_query(query) else {
            return Ok(Vec::new());
        };

        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT e.subject, e.predicate, e.object, e.context,
                       bm25(entry_text) AS rank,
                       snippet(entry_text, 1, '[', ']', '...', 12)
                FROM entry_text
                JOIN entries e ON e.key = entry_text.key
                WHERE entry_text MATCH ?1
                ORDER BY rank
                LIMIT ?2
                "#,
            )
            .map_err(|e| Error::index("prepare search", e))?;

        let hits = stmt
            .query_map(params![match_query, limit as i64], |row| {
                let statement = SqliteStore::row_to_statement(row)?;
                let rank: f64 = row.get(4)?;
                Ok(SearchHit {
                    statement,
                    // bm25 is lower-is-better
                    score: -rank,
                    snippet: row.get(5)?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| Error::index(&format!("search {:?}", query), e))?;

        Ok(hits)
    }

    fn entries(&self) -> Result<Vec<Statement>> {
        let mut stmt = self
            .conn
            .prepare("SELECT subject, predicate, object, context FROM entries ORDER BY key")
            .map_err(|e| Error::index("list entries", e))?;
        stmt.query_map([], SqliteStore::row_to_statement)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| Error::index("list entries", e))
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .map_err(|e| Error::index("count entries", e))?;
        Ok(count as usize)
    }

    fn epoch(&self) -> Result<u64> {
        let epoch: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                [schema::EPOCH_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::index("read index epoch", e))?;
        Ok(epoch.unwrap_or(0) as u64)
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
                params![schema::EPOCH_KEY, epoch as i64],
            )
            .map_err(|e| Error::index("write index epoch", e))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.in_batch {
            tracing::warn!("Closing full-text index with an open write batch; rolling back");
            self.rollback()?;
        }
        Ok(())
    }
}
