mod common;

use common::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor};
use tristore::parser::default_registry;
use tristore::{Input, Pattern, RdfFormat, Repository, RepositoryConfig, Statement};

fn memory_repo() -> Repository {
    Repository::open(&RepositoryConfig::memory()).unwrap()
}

fn parsed_beet() -> Vec<Statement> {
    default_registry().parse(Input::file(&beet_path()), None, None).unwrap()
}

#[test]
fn test_file_bytes_and_text_sources_agree() {
    let path = beet_path();
    let mut snapshots = Vec::new();

    for source in ["file", "bytes", "text"] {
        let input = match source {
            "file" => Input::file(&path),
            "bytes" => Input::bytes(File::open(&path).unwrap()),
            _ => Input::text(BufReader::new(File::open(&path).unwrap())),
        };

        let repo = memory_repo();
        let mut conn = repo.connection().unwrap();
        conn.begin().unwrap();
        let added = conn.add(input, None, None, &[]).unwrap();
        conn.commit().unwrap();

        assert_eq!(added, BEET_STATEMENTS, "{}", source);
        assert_eq!(conn.size(&[]).unwrap(), BEET_STATEMENTS, "{}", source);
        let stored: Vec<Statement> = conn.get_statements(&Pattern::any()).unwrap().collect();
        assert_eq!(stored.iter().filter(|st| has_blank(st)).count(), BEET_BLANK, "{}", source);
        snapshots.push(ground(stored));
    }

    assert_eq!(snapshots[0].len(), BEET_STATEMENTS - BEET_BLANK);
    assert_eq!(snapshots[0], snapshots[1]);
    assert_eq!(snapshots[1], snapshots[2]);
}

#[test]
fn test_commit_matches_document_and_index_covers_literals() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    conn.begin().unwrap();
    conn.add(Input::text(Cursor::new(beet_document())), None, Some(RdfFormat::NTriples), &[])
        .unwrap();
    conn.commit().unwrap();

    let stored: Vec<Statement> = conn.get_statements(&Pattern::any()).unwrap().collect();
    assert_eq!(ground(stored), ground(parsed_beet()));

    let stats = repo.stats().unwrap();
    assert_eq!(stats.statements, BEET_STATEMENTS);
    assert_eq!(stats.index_entries, Some(BEET_LITERALS));
    assert!(repo.verify_index().unwrap().is_consistent());

    let hits = conn.search("chioggia", 10).unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.statement.has_literal_object()));
}

#[test]
fn test_adding_twice_is_idempotent() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();

    conn.add(Input::file(&beet_path()), None, None, &[]).unwrap();
    let stored: Vec<Statement> = conn.get_statements(&Pattern::any()).unwrap().collect();
    conn.begin().unwrap();
    conn.add_statements(stored).unwrap();
    conn.commit().unwrap();
    conn.add_statement(label("beet", "beet")).unwrap();
    conn.add_statement(label("beet", "beet")).unwrap();

    assert_eq!(conn.size(&[]).unwrap(), BEET_STATEMENTS + 1);
    assert_eq!(repo.stats().unwrap().index_entries, Some(BEET_LITERALS + 1));
    assert!(repo.verify_index().unwrap().is_consistent());
}

#[test]
fn test_documents_sharing_a_blank_label_stay_apart() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    let name = "<http://example.org/test/name>";

    conn.add(Input::text(format!("_:b0 {} \"Alice\" .\n", name).as_bytes()), None, None, &[])
        .unwrap();
    conn.add(Input::text(format!("_:b0 {} \"Bob\" .\n", name).as_bytes()), None, None, &[])
        .unwrap();

    let subjects: HashSet<_> = conn
        .get_statements(&Pattern::any())
        .unwrap()
        .map(|st| st.subject)
        .collect();
    assert_eq!(subjects.len(), 2);
}

#[test]
fn test_preserved_blank_labels_make_reloading_idempotent() {
    let config = RepositoryConfig::memory().with_preserved_blank_node_ids(true);
    let repo = Repository::open(&config).unwrap();
    let mut conn = repo.connection().unwrap();

    conn.add(Input::file(&beet_path()), None, None, &[]).unwrap();
    conn.begin().unwrap();
    conn.add(Input::file(&beet_path()), None, None, &[]).unwrap();
    conn.commit().unwrap();

    assert_eq!(conn.size(&[]).unwrap(), BEET_STATEMENTS);
    assert_eq!(repo.stats().unwrap().index_entries, Some(BEET_LITERALS));
    let origin = tristore::Resource::parse("_:origin0").unwrap();
    assert_eq!(conn.get_statements(&Pattern::any().subject(origin)).unwrap().count(), 1);
}

#[test]
fn test_rollback_restores_store_and_index() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    conn.add_statement(label("kept", "kept label")).unwrap();

    conn.begin().unwrap();
    conn.add(Input::file(&beet_path()), None, None, &[]).unwrap();
    conn.remove_statement(&label("kept", "kept label")).unwrap();
    assert_eq!(conn.size(&[]).unwrap(), BEET_STATEMENTS);
    conn.rollback().unwrap();

    assert_eq!(conn.size(&[]).unwrap(), 1);
    assert!(conn.search("beetroot", 10).unwrap().is_empty());
    assert_eq!(conn.search("kept", 10).unwrap().len(), 1);
    assert!(repo.verify_index().unwrap().is_consistent());
}

#[test]
fn test_malformed_input_adds_nothing() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    let mut document = beet_document();
    document.push_str("<http://example.org/broken> \"not a predicate\" \"x\" .\n");

    conn.begin().unwrap();
    let err = conn
        .add(Input::text(Cursor::new(document)), None, None, &[])
        .unwrap_err();
    assert_eq!(err.kind(), tristore::ErrorKind::Format);
    assert!(conn.is_active());
    conn.commit().unwrap();

    assert_eq!(conn.size(&[]).unwrap(), 0);
}

#[test]
fn test_unsupported_format_is_rejected() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    let err = conn
        .add(Input::text(Cursor::new("<rdf:RDF/>")), None, Some(RdfFormat::RdfXml), &[])
        .unwrap_err();
    assert!(matches!(err, tristore::Error::Format(_)));
}

#[test]
fn test_sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = RepositoryConfig::new(dir.path().join("store").display().to_string())
        .with_index(dir.path().join("fulltext").display().to_string());

    let committed: HashSet<Statement> = {
        let repo = Repository::open(&config).unwrap();
        let mut conn = repo.connection().unwrap();
        conn.begin().unwrap();
        conn.add(Input::file(&beet_path()), None, None, &[]).unwrap();
        conn.commit().unwrap();
        let committed = conn.get_statements(&Pattern::any()).unwrap().collect();
        conn.close().unwrap();
        repo.shutdown().unwrap();
        committed
    };

    let repo = Repository::open(&config).unwrap();
    let mut conn = repo.connection().unwrap();
    assert_eq!(conn.size(&[]).unwrap(), BEET_STATEMENTS);
    let stored: HashSet<Statement> = conn.get_statements(&Pattern::any()).unwrap().collect();
    assert_eq!(stored, committed);
    assert_eq!(repo.stats().unwrap().index_entries, Some(BEET_LITERALS));
    assert!(repo.verify_index().unwrap().is_consistent());
}

#[test]
fn test_export_round_trips_through_nquads() {
    let repo = memory_repo();
    let mut conn = repo.connection().unwrap();
    let graph = tristore::Resource::Iri(ex("graph"));
    conn.add(Input::file(&beet_path()), None, None, &[graph.clone()]).unwrap();

    let mut exported = Vec::new();
    assert_eq!(conn.export(&Pattern::any(), &mut exported).unwrap(), BEET_STATEMENTS);

    let other = memory_repo();
    let mut other_conn = other.connection().unwrap();
    other_conn
        .add(Input::bytes(Cursor::new(exported)), None, Some(RdfFormat::NQuads), &[])
        .unwrap();
    assert_eq!(other_conn.size(&[Some(graph.clone())]).unwrap(), BEET_STATEMENTS);
    assert_eq!(other_conn.get_context_ids().unwrap(), vec![graph]);
}
