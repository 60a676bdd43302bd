//! Commits whose log append fails.
//!
//! Failures are injected through the `fault-injection` feature, which the
//! dev-dependency on `logdb-engine` switches on for this test binary.

use crate::{collect_all, commit_pairs, pairs, TestLog};
use logdb::{Buffer, Error};
use logdb_engine::FailPoint;
use std::fs;

fn failed_commit(log: &TestLog, point: FailPoint) {
    log.conn.begin_transaction().unwrap();
    log.conn
        .put(&Buffer::from("lost"), &Buffer::from("value"))
        .unwrap();
    log.conn
        .put(&Buffer::from("a"), &Buffer::from("overwritten?"))
        .unwrap();
    log.conn.inject_log_failure(point).unwrap();

    let result = log.conn.commit_transaction();
    assert!(matches!(result, Err(Error::Commit(_))), "got {:?}", result);
}

#[test]
fn failed_write_publishes_nothing() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    let len_before = fs::metadata(log.path()).unwrap().len();

    failed_commit(&log, FailPoint::Write);

    assert_eq!(fs::metadata(log.path()).unwrap().len(), len_before);
    assert_eq!(collect_all(&log.conn), pairs(&[("a", "1")]));
    assert!(log.conn.get(b"lost").unwrap().is_none());
}

#[test]
fn failed_sync_publishes_nothing() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    let len_before = fs::metadata(log.path()).unwrap().len();

    failed_commit(&log, FailPoint::Sync);

    assert_eq!(fs::metadata(log.path()).unwrap().len(), len_before);
    assert_eq!(collect_all(&log.conn), pairs(&[("a", "1")]));
}

#[test]
fn failed_commit_ends_the_transaction() {
    let log = TestLog::new();
    failed_commit(&log, FailPoint::Write);

    assert!(!log.conn.has_active_transaction());
    assert!(matches!(
        log.conn.commit_transaction(),
        Err(Error::NoActiveTransaction)
    ));

    // A fresh transaction goes through
    commit_pairs(&log.conn, &[("retry", "ok")]);
    assert_eq!(collect_all(&log.conn), pairs(&[("retry", "ok")]));
}

#[test]
fn failed_commit_leaves_nothing_for_recovery() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    failed_commit(&log, FailPoint::Sync);
    commit_pairs(&log.conn, &[("b", "2")]);

    let log = log.reopen();
    let stats = log.conn.recovery_stats().unwrap();
    assert_eq!(stats.records_replayed, 2);
    assert_eq!(stats.bytes_truncated, 0);
    assert_eq!(collect_all(&log.conn), pairs(&[("a", "1"), ("b", "2")]));
}

#[test]
fn open_iterator_is_unaffected_by_failed_commit() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    let mut it = log.conn.iterate_all().unwrap();

    failed_commit(&log, FailPoint::Write);

    assert!(it.advance().unwrap());
    assert_eq!(it.current_value().unwrap().to_vec().unwrap(), b"1");
    assert!(!it.advance().unwrap());
}
