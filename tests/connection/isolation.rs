//! Snapshot isolation of iterators.

use crate::{collect_all, commit_pairs, pairs, TestLog};
use logdb::{Buffer, Error};
use std::sync::{Arc, Barrier};
use std::thread;

/// Drain an iterator into owned pairs.
fn drain(it: &mut logdb::SnapshotIterator) -> Vec<(String, String)> {
    let mut out = Vec::new();
    while it.advance().unwrap() {
        out.push((
            String::from_utf8(it.current_key().unwrap().to_vec().unwrap()).unwrap(),
            String::from_utf8(it.current_value().unwrap().to_vec().unwrap()).unwrap(),
        ));
    }
    out
}

#[test]
fn iterator_ignores_later_commits() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1"), ("b", "2")]);

    let mut it = log.conn.iterate_all().unwrap();
    commit_pairs(&log.conn, &[("a", "changed"), ("c", "3")]);
    log.conn.begin_transaction().unwrap();
    log.conn.delete(&Buffer::from("b")).unwrap();
    log.conn.commit_transaction().unwrap();

    assert_eq!(drain(&mut it), pairs(&[("a", "1"), ("b", "2")]));
    assert_eq!(
        collect_all(&log.conn),
        pairs(&[("a", "changed"), ("c", "3")])
    );
}

#[test]
fn iterator_mid_walk_ignores_commits() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1"), ("b", "2"), ("c", "3")]);

    let mut it = log.conn.iterate_all().unwrap();
    assert!(it.advance().unwrap());
    commit_pairs(&log.conn, &[("b", "new"), ("d", "4")]);

    let rest = drain(&mut it);
    assert_eq!(rest, pairs(&[("b", "2"), ("c", "3")]));
}

#[test]
fn staged_writes_are_invisible() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    log.conn.begin_transaction().unwrap();
    log.conn
        .put(&Buffer::from("a"), &Buffer::from("staged"))
        .unwrap();

    assert_eq!(collect_all(&log.conn), pairs(&[("a", "1")]));
    assert_eq!(log.conn.get(b"a").unwrap().unwrap().to_vec().unwrap(), b"1");
    log.conn.rollback_transaction().unwrap();
}

#[test]
fn iterator_outlives_close() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1"), ("b", "2")]);

    let mut it = log.conn.iterate_all().unwrap();
    log.conn.close().unwrap();

    assert_eq!(drain(&mut it), pairs(&[("a", "1"), ("b", "2")]));
}

#[test]
fn iterator_state_errors() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);

    let mut it = log.conn.iterate_all().unwrap();
    assert!(matches!(it.current_key(), Err(Error::InvalidIteratorState)));
    assert!(it.advance().unwrap());
    assert!(!it.advance().unwrap());
    assert!(matches!(it.current_value(), Err(Error::InvalidIteratorState)));
    // Exhausted stays exhausted
    assert!(!it.advance().unwrap());

    it.release();
    it.release();
    assert!(matches!(it.advance(), Err(Error::ObjectDisposed(_))));
}

#[test]
fn empty_log_iterates_nothing() {
    let log = TestLog::new();
    let mut it = log.conn.iterate_all().unwrap();
    assert!(!it.advance().unwrap());
}

#[test]
fn iterator_as_std_iterator() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("x", "1"), ("y", "2")]);

    let keys: Vec<Vec<u8>> = log
        .conn
        .iterate_all()
        .unwrap()
        .map(|item| item.unwrap().0.to_vec().unwrap())
        .collect();
    assert_eq!(keys, vec![b"x".to_vec(), b"y".to_vec()]);
}

#[test]
fn concurrent_readers_see_consistent_snapshots() {
    let log = TestLog::new();
    for round in 0..10 {
        let value = round.to_string();
        commit_pairs(&log.conn, &[("a", value.as_str()), ("b", value.as_str())]);
    }

    let conn = Arc::new(log.conn);
    let barrier = Arc::new(Barrier::new(5));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let conn = Arc::clone(&conn);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    let snapshot = collect_all(&conn);
                    // Both keys are written by every commit, so they agree
                    assert_eq!(snapshot.len(), 2);
                    assert_eq!(snapshot[0].1, snapshot[1].1);
                }
            })
        })
        .collect();

    barrier.wait();
    for round in 10..60 {
        let value = round.to_string();
        commit_pairs(&conn, &[("a", value.as_str()), ("b", value.as_str())]);
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(collect_all(&conn), pairs(&[("a", "59"), ("b", "59")]));
}

#[test]
fn iterator_survives_truncating_reopen() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1"), ("b", "2")]);
    let path = log.path();

    let mut it = log.conn.iterate_all().unwrap();
    log.conn.close().unwrap();

    let conn = logdb::OpenOptions::new()
        .mode(logdb::OpenMode::Existing)
        .truncate(true)
        .open(&path)
        .unwrap();
    assert!(conn.is_empty().unwrap());
    commit_pairs(&conn, &[("a", "X"), ("c", "Y")]);

    assert_eq!(drain(&mut it), pairs(&[("a", "1"), ("b", "2")]));
    assert_eq!(collect_all(&conn), pairs(&[("a", "X"), ("c", "Y")]));

    // No staging file is left next to the log
    let names: Vec<_> = std::fs::read_dir(log.dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("test.log")]);
}
