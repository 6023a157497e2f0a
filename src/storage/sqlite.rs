//! SQLite storage implementation

use std::path::Path;
use rusqlite::{Connection, params, params_from_iter, OptionalExtension};
use super::{schema, StoreBackend};
use crate::statement::{Pattern, Statement};
use crate::term::{Iri, Resource, Value};
use crate::{Error, Result};

/// SQLite-backed statement store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    in_batch: bool,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let opening = format!("open statement store {}", path.display());
        let conn = Connection::open(path).map_err(|e| Error::store(&opening, e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| Error::store(&opening, e))?;
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(|e| Error::store(&opening, e))?;
        let store = Self { conn, in_batch: false };
        store.initialize_schema()?;
        tracing::debug!("Opened statement store at {}", path.display());
        Ok(store)
    }

    /// Open the store file inside a storage directory, creating the directory
    pub fn open_in_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open(&dir.join(schema::STORE_FILE))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::store("open in-memory statement store", e))?;
        let store = Self { conn, in_batch: false };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn
                .execute(stmt, [])
                .map_err(|e| Error::store("create store schema", e))?;
        }
        Ok(())
    }

    /// Build the WHERE clause and positional parameters for a pattern
    fn where_clause(pattern: &Pattern) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        let mut bind = |column: &str, value: String, clauses: &mut Vec<String>| {
            values.push(value);
            clauses.push(format!("{} = ?{}", column, values.len()));
        };
        if let Some(subject) = &pattern.subject {
            bind("subject", subject.to_string(), &mut clauses);
        }
        if let Some(predicate) = &pattern.predicate {
            bind("predicate", predicate.to_string(), &mut clauses);
        }
        if let Some(object) = &pattern.object {
            bind("object", object.to_string(), &mut clauses);
        }

        if !pattern.contexts.is_empty() {
            let placeholders: Vec<String> = pattern
                .contexts
                .iter()
                .map(|context| {
                    values.push(encode_context(context));
                    format!("?{}", values.len())
                })
                .collect();
            clauses.push(format!("context IN ({})", placeholders.join(", ")));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }

    /// Helper to convert a row to a Statement
    pub(crate) fn row_to_statement(row: &rusqlite::Row) -> rusqlite::Result<Statement> {
        fn decode<T>(idx: usize, text: &str, parse: impl Fn(&str) -> Result<T>) -> rusqlite::Result<T> {
            parse(text).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            })
        }

        let subject: String = row.get(0)?;
        let predicate: String = row.get(1)?;
        let object: String = row.get(2)?;
        let context: String = row.get(3)?;

        Ok(Statement {
            subject: decode(0, &subject, Resource::parse)?,
            predicate: decode(1, &predicate, |s| s.parse::<Iri>())?,
            object: decode(2, &object, Value::parse)?,
            context: if context.is_empty() {
                None
            } else {
                Some(decode(3, &context, Resource::parse)?)
            },
        })
    }
}

pub(crate) fn encode_context(context: &Option<Resource>) -> String {
    context.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl StoreBackend for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        if self.in_batch {
            return Err(Error::Store("sqlite store: write batch already open".to_string()));
        }
        self.conn
            .execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::store("begin statement batch", e))?;
        self.in_batch = true;
        Ok(())
    }

    fn add(&mut self, statement: &Statement) -> Result<bool> {
        let changed = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO statements (subject, predicate, object, context)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                statement.subject.to_string(),
                statement.predicate.to_string(),
                statement.object.to_string(),
                encode_context(&statement.context),
            ],
        )
        .map_err(|e| Error::store(&format!("add {}", statement), e))?;
        Ok(changed > 0)
    }

    fn remove(&mut self, pattern: &Pattern) -> Result<usize> {
        let (clause, values) = Self::where_clause(pattern);
        let sql = format!("DELETE FROM statements{}", clause);
        let removed = self
            .conn
            .execute(&sql, params_from_iter(values.iter()))
            .map_err(|e| Error::store(&format!("remove {}", pattern), e))?;
        Ok(removed)
    }

    fn match_pattern(&self, pattern: &Pattern) -> Result<Vec<Statement>> {
        let (clause, values) = Self::where_clause(pattern);
        let sql = format!(
            "SELECT subject, predicate, object, context FROM statements{} ORDER BY id",
            clause
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| Error::store(&format!("match {}", pattern), e))?;

        stmt.query_map(params_from_iter(values.iter()), Self::row_to_statement)
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| Error::store(&format!("match {}", pattern), e))
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM statements", [], |row| row.get(0))
            .map_err(|e| Error::store("count statements", e))?;
        Ok(count as usize)
    }

    fn contexts(&self) -> Result<Vec<Resource>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT context FROM statements WHERE context != '' ORDER BY context")
            .map_err(|e| Error::store("list contexts", e))?;
        let encoded = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| Error::store("list contexts", e))?;
        encoded.iter().map(|c| Resource::parse(c)).collect()
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_batch {
            return Err(Error::Store("sqlite store: no write batch to commit".to_string()));
        }
        self.conn
            .execute("COMMIT", [])
            .map_err(|e| Error::store("commit statement batch", e))?;
        self.in_batch = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if !self.in_batch {
            return Err(Error::Store("sqlite store: no write batch to roll back".to_string()));
        }
        self.in_batch = false;
        self.conn
            .execute("ROLLBACK", [])
            .map_err(|e| Error::store("roll back statement batch", e))?;
        Ok(())
    }

    fn epoch(&self) -> Result<u64> {
        let epoch: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                [schema::EPOCH_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::store("read store epoch", e))?;
        Ok(epoch.unwrap_or(0) as u64)
    }

    fn set_epoch(&mut self, epoch: u64) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
            params![schema::EPOCH_KEY, epoch as i64],
        )
        .map_err(|e| Error::store("write store epoch", e))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.in_batch {
            tracing::warn!("Closing statement store with an open write batch; rolling back");
            self.rollback()?;
        }
        self.conn
            .execute_batch("PRAGMA optimize")
            .map_err(|e| Error::store("optimize statement store", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{Literal, Iri};

    fn ex(local: &str) -> Iri {
        Iri::new(format!("http://example.org/{}", local)).unwrap()
    }

    fn sample(subject: &str, label: &str) -> Statement {
        Statement::new(ex(subject).into(), ex("label"), Literal::with_language(label, "en").unwrap())
    }

    #[test]
    fn test_statement_crud() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let st = sample("beet", "Beet");
        assert!(store.add(&st).unwrap());
        assert!(!store.add(&st).unwrap());
        assert!(store.contains(&st).unwrap());
        assert_eq!(store.len().unwrap(), 1);

        let all = store.match_pattern(&Pattern::any()).unwrap();
        assert_eq!(all, vec![st.clone()]);

        assert_eq!(store.remove(&Pattern::exact(&st)).unwrap(), 1);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_pattern_filters() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.add(&sample("beet", "Beet")).unwrap();
        store.add(&sample("beet", "Mangold")).unwrap();
        store.add(&sample("chard", "Chard").with_context(Some(ex("g").into()))).unwrap();

        let beet = store.match_pattern(&Pattern::any().subject(ex("beet").into())).unwrap();
        assert_eq!(beet.len(), 2);

        let by_object = Pattern::any().object(Literal::with_language("Chard", "en").unwrap());
        assert_eq!(store.match_pattern(&by_object).unwrap().len(), 1);

        let default_graph = store.match_pattern(&Pattern::any().contexts([None])).unwrap();
        assert_eq!(default_graph.len(), 2);

        let both = Pattern::any().contexts([None, Some(ex("g").into())]);
        assert_eq!(store.match_pattern(&both).unwrap().len(), 3);

        assert_eq!(store.contexts().unwrap(), vec![Resource::Iri(ex("g"))]);
    }

    #[test]
    fn test_batch_rollback() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.begin().unwrap();
        store.add(&sample("beet", "Beet")).unwrap();
        store.set_epoch(3).unwrap();
        store.rollback().unwrap();

        assert_eq!(store.len().unwrap(), 0);
        assert_eq!(store.epoch().unwrap(), 0);
        assert!(store.rollback().is_err());
    }

    #[test]
    fn test_errors_name_the_operation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open_in_dir(dir.path()).unwrap();
        store.conn.busy_timeout(std::time::Duration::ZERO).unwrap();

        let other = Connection::open(dir.path().join(schema::STORE_FILE)).unwrap();
        other.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let err = store.begin().unwrap_err();
        assert!(matches!(err, Error::Sqlite { .. }));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("begin statement batch"), "{}", err);

        let st = sample("beet", "Beet");
        let err = store.add(&st).unwrap_err();
        assert!(err.to_string().contains(&format!("add {}", st)), "{}", err);

        other.execute_batch("ROLLBACK").unwrap();
        store.begin().unwrap();
        assert!(store.add(&st).unwrap());
        store.commit().unwrap();
    }

    #[test]
    fn test_epoch_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SqliteStore::open_in_dir(dir.path()).unwrap();
            store.begin().unwrap();
            store.add(&sample("beet", "Beet")).unwrap();
            store.set_epoch(5).unwrap();
            store.commit().unwrap();
            store.close().unwrap();
        }
        let store = SqliteStore::open_in_dir(dir.path()).unwrap();
        assert_eq!(store.epoch().unwrap(), 5);
        assert_eq!(store.len().unwrap(), 1);
    }
}
