mod common;

use common::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tristore::{
    Error, Input, IsolationLevel, Pattern, Repository, RepositoryConfig, TransactionStatus,
};

fn memory_repo() -> Repository {
    Repository::open(&RepositoryConfig::memory()).unwrap()
}

#[test]
fn test_uncommitted_writes_are_invisible_to_other_connections() {
    let repo = memory_repo();
    let mut writer = repo.connection().unwrap();
    let mut reader = repo.connection().unwrap();

    writer.begin().unwrap();
    writer.add(Input::file(&beet_path()), None, None, &[]).unwrap();
    assert_eq!(writer.size(&[]).unwrap(), BEET_STATEMENTS);
    assert_eq!(reader.size(&[]).unwrap(), 0);
    assert!(reader.search("beetroot", 10).unwrap().is_empty());

    writer.commit().unwrap();
    assert_eq!(reader.size(&[]).unwrap(), BEET_STATEMENTS);
    assert!(!reader.search("beetroot", 10).unwrap().is_empty());
}

#[test]
fn test_read_own_writes_can_be_disabled() {
    let repo = Repository::open(&RepositoryConfig::memory().with_read_own_writes(false)).unwrap();
    let mut conn = repo.connection().unwrap();

    conn.begin().unwrap();
    conn.add_statement(label("beet", "beet")).unwrap();
    assert!(!conn.has_statement(&label("beet", "beet")).unwrap());
    assert_eq!(conn.size(&[]).unwrap(), 0);
    conn.commit().unwrap();

    assert!(conn.has_statement(&label("beet", "beet")).unwrap());
}

#[test]
fn test_result_is_a_snapshot() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    conn.add_statement(label("beet", "one")).unwrap();

    let mut result = conn.get_statements(&Pattern::any()).unwrap();
    conn.add_statement(label("beet", "two")).unwrap();
    assert_eq!(result.remaining(), 1);
    assert_eq!(result.next(), Some(label("beet", "one")));
    result.close();
    assert_eq!(conn.size(&[]).unwrap(), 2);
}

#[test]
fn test_none_isolation_applies_immediately() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    let mut other = repo.connection().unwrap();

    conn.begin_with(IsolationLevel::None).unwrap();
    conn.add_statement(label("beet", "sugar beet")).unwrap();
    assert!(other.has_statement(&label("beet", "sugar beet")).unwrap());
    assert_eq!(other.search("sugar", 10).unwrap().len(), 1);

    conn.rollback().unwrap();
    assert!(!other.has_statement(&label("beet", "sugar beet")).unwrap());
    assert!(other.search("sugar", 10).unwrap().is_empty());
    assert!(repo.verify_index().unwrap().is_consistent());
}

#[test]
fn test_serializable_conflict_rolls_back() {
    let repo = memory_repo();
    let mut reader = repo.connection().unwrap();
    let mut writer = repo.connection().unwrap();

    reader.begin_with(IsolationLevel::Serializable).unwrap();
    assert_eq!(reader.get_statements(&subject("beet")).unwrap().count(), 0);
    reader.add_statement(label("summary", "no beets yet")).unwrap();

    writer.add_statement(label("beet", "sneaked in")).unwrap();

    let err = reader.commit().unwrap_err();
    assert!(matches!(err, Error::Isolation(_)));
    assert_eq!(reader.status(), Some(TransactionStatus::RolledBack));
    assert!(matches!(reader.commit(), Err(Error::State(_))));
    assert!(!writer.has_statement(&label("summary", "no beets yet")).unwrap());

    // a fresh transaction that reads after the write commits fine
    reader.begin_with(IsolationLevel::Serializable).unwrap();
    assert_eq!(reader.get_statements(&subject("beet")).unwrap().count(), 1);
    reader.add_statement(label("summary", "one beet")).unwrap();
    reader.commit().unwrap();
}

#[test]
fn test_serializable_ignores_unrelated_commits() {
    let repo = memory_repo();
    let mut reader = repo.connection().unwrap();
    let mut writer = repo.connection().unwrap();

    reader.begin_with(IsolationLevel::Serializable).unwrap();
    reader.get_statements(&subject("beet")).unwrap().close();
    reader.add_statement(label("beet", "mine")).unwrap();

    writer.add_statement(label("chard", "theirs")).unwrap();
    reader.commit().unwrap();

    assert_eq!(writer.size(&[]).unwrap(), 2);
}

#[test]
fn test_serializable_write_write_conflict() {
    let repo = memory_repo();
    let mut first = repo.connection().unwrap();
    let mut second = repo.connection().unwrap();

    first.begin_with(IsolationLevel::Serializable).unwrap();
    first.remove(&subject("beet")).unwrap();

    second.add_statement(label("beet", "late")).unwrap();
    assert!(matches!(first.commit(), Err(Error::Isolation(_))));
    assert!(second.has_statement(&label("beet", "late")).unwrap());
}

#[test]
fn test_fatal_error_rolls_back_transaction() {
    let corrupt = Arc::new(AtomicBool::new(false));
    let repo = Repository::with_backend(CorruptibleStore::new(Arc::clone(&corrupt))).unwrap();
    let mut conn = repo.connection().unwrap();

    conn.begin_with(IsolationLevel::None).unwrap();
    conn.add_statement(label("beet", "before")).unwrap();
    corrupt.store(true, Ordering::SeqCst);

    let err = conn.add_statement(label("beet", "during")).unwrap_err();
    assert!(err.is_fatal());
    assert!(!conn.is_active());
    assert_eq!(conn.status(), Some(TransactionStatus::RolledBack));
    assert_eq!(conn.size(&[]).unwrap(), 0);

    assert!(matches!(conn.add_statement(label("beet", "after")), Err(Error::State(_))));
    assert!(matches!(conn.commit(), Err(Error::State(_))));
    assert!(matches!(conn.rollback(), Err(Error::State(_))));

    corrupt.store(false, Ordering::SeqCst);
    conn.begin().unwrap();
    conn.add_statement(label("beet", "after")).unwrap();
    conn.commit().unwrap();
    assert_eq!(conn.size(&[]).unwrap(), 1);
}

#[test]
fn test_fatal_error_at_commit_rolls_back() {
    let corrupt = Arc::new(AtomicBool::new(false));
    let repo = Repository::with_backend(CorruptibleStore::new(Arc::clone(&corrupt))).unwrap();
    let mut conn = repo.connection().unwrap();

    conn.begin().unwrap();
    conn.add_statement(label("beet", "buffered")).unwrap();
    corrupt.store(true, Ordering::SeqCst);

    assert!(conn.commit().unwrap_err().is_fatal());
    assert_eq!(conn.status(), Some(TransactionStatus::RolledBack));
    assert!(matches!(conn.add_statement(label("beet", "x")), Err(Error::State(_))));

    corrupt.store(false, Ordering::SeqCst);
    assert_eq!(conn.size(&[]).unwrap(), 0);
}

#[test]
fn test_concurrent_commits_are_atomic() {
    const WRITERS: usize = 4;
    const BATCH: usize = 25;

    let repo = memory_repo();
    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let repo = repo.clone();
            thread::spawn(move || {
                let mut conn = repo.connection().unwrap();
                conn.begin().unwrap();
                for i in 0..BATCH {
                    conn.add_statement(label(&format!("w{}-{}", w, i), &format!("writer {} item {}", w, i)))
                        .unwrap();
                }
                conn.commit().unwrap();
            })
        })
        .collect();

    let observer = {
        let repo = repo.clone();
        thread::spawn(move || {
            let mut conn = repo.connection().unwrap();
            for _ in 0..200 {
                let size = conn.size(&[]).unwrap();
                assert_eq!(size % BATCH, 0, "observed a partial commit: {}", size);
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    observer.join().unwrap();

    let mut conn = repo.connection().unwrap();
    assert_eq!(conn.size(&[]).unwrap(), WRITERS * BATCH);
    assert_eq!(repo.stats().unwrap().index_entries, Some(WRITERS * BATCH));
    assert!(repo.verify_index().unwrap().is_consistent());
}

#[test]
fn test_dropped_connection_releases_transaction() {
    let repo = memory_repo();
    {
        let mut conn = repo.connection().unwrap();
        conn.begin_with(IsolationLevel::None).unwrap();
        conn.add_statement(label("beet", "temporary")).unwrap();
    }
    let mut conn = repo.connection().unwrap();
    assert_eq!(conn.size(&[]).unwrap(), 0);
}

#[test]
fn test_operations_after_shutdown_fail() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    conn.begin().unwrap();
    repo.shutdown().unwrap();

    assert!(matches!(conn.add_statement(link("a", "b")).and_then(|_| conn.commit()), Err(Error::State(_))));
    assert!(matches!(repo.connection(), Err(Error::State(_))));
}
