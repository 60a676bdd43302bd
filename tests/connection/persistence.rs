//! Close/reopen behaviour, crash recovery and opening rules.

use crate::{collect_all, commit_pairs, pairs, TestLog};
use logdb::{Buffer, Connection, DurabilityMode, Error, LogDbConfig, OpenMode, OpenOptions};
use std::fs::{self, OpenOptions as FsOpenOptions};
use std::io::Write;

#[test]
fn committed_data_survives_reopen() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1"), ("b", "2")]);
    commit_pairs(&log.conn, &[("c", "3"), ("a", "4")]);

    let log = log.reopen();
    assert_eq!(
        collect_all(&log.conn),
        pairs(&[("a", "4"), ("b", "2"), ("c", "3")])
    );
    assert_eq!(log.conn.recovery_stats().unwrap().records_replayed, 2);
}

#[test]
fn deletes_survive_reopen() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1"), ("b", "2")]);
    log.conn.begin_transaction().unwrap();
    log.conn.delete(&Buffer::from("a")).unwrap();
    log.conn.commit_transaction().unwrap();

    let log = log.reopen();
    assert_eq!(collect_all(&log.conn), pairs(&[("b", "2")]));
}

#[test]
fn rolled_back_data_never_reaches_the_log() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("kept", "1")]);
    let len_before = fs::metadata(log.path()).unwrap().len();

    log.conn.begin_transaction().unwrap();
    log.conn
        .put(&Buffer::from("dropped"), &Buffer::from("2"))
        .unwrap();
    log.conn.rollback_transaction().unwrap();
    assert_eq!(fs::metadata(log.path()).unwrap().len(), len_before);

    let log = log.reopen();
    assert_eq!(collect_all(&log.conn), pairs(&[("kept", "1")]));
}

#[test]
fn close_rolls_back_open_transaction() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    log.conn.begin_transaction().unwrap();
    log.conn
        .put(&Buffer::from("b"), &Buffer::from("2"))
        .unwrap();

    let log = log.reopen();
    assert_eq!(collect_all(&log.conn), pairs(&[("a", "1")]));
}

#[test]
fn drop_without_close_keeps_commits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.log");
    {
        let conn = Connection::open(&path, OpenMode::Create).unwrap();
        commit_pairs(&conn, &[("a", "1")]);
    }
    let conn = Connection::open(&path, OpenMode::Existing).unwrap();
    assert_eq!(collect_all(&conn), pairs(&[("a", "1")]));
}

// ============================================================================
// Torn tails and foreign files
// ============================================================================

#[test]
fn torn_tail_is_truncated_on_reopen() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    commit_pairs(&log.conn, &[("b", "2")]);
    let path = log.path();
    let TestLog { conn, dir } = log;
    conn.close().unwrap();
    drop(conn);

    let good_len = fs::metadata(&path).unwrap().len();
    // A record header promising 100 payload bytes, followed by only 3
    let mut file = FsOpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&100u32.to_le_bytes()).unwrap();
    file.write_all(b"abc").unwrap();
    drop(file);

    let conn = Connection::open(&path, OpenMode::Existing).unwrap();
    let stats = conn.recovery_stats().unwrap();
    assert_eq!(stats.records_replayed, 2);
    assert_eq!(stats.bytes_truncated, 7);
    assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    assert_eq!(collect_all(&conn), pairs(&[("a", "1"), ("b", "2")]));

    // Appends continue cleanly after the truncation point
    commit_pairs(&conn, &[("c", "3")]);
    conn.close().unwrap();
    drop(conn);
    let conn = Connection::open(&path, OpenMode::Existing).unwrap();
    assert_eq!(conn.recovery_stats().unwrap().bytes_truncated, 0);
    assert_eq!(
        collect_all(&conn),
        pairs(&[("a", "1"), ("b", "2"), ("c", "3")])
    );
    drop(dir);
}

#[test]
fn corrupted_last_record_is_dropped() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    commit_pairs(&log.conn, &[("b", "2")]);
    let path = log.path();
    let TestLog { conn, dir } = log;
    conn.close().unwrap();
    drop(conn);

    // Flip the final checksum byte
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let conn = Connection::open(&path, OpenMode::Existing).unwrap();
    assert_eq!(collect_all(&conn), pairs(&[("a", "1")]));
    assert!(conn.recovery_stats().unwrap().bytes_truncated > 0);
    drop(dir);
}

#[test]
fn foreign_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.log");
    fs::write(&path, b"this is definitely not a log file").unwrap();

    let result = Connection::open(&path, OpenMode::Existing);
    assert!(matches!(result, Err(Error::Open { .. })));
    // Left untouched
    assert_eq!(
        fs::read(&path).unwrap(),
        b"this is definitely not a log file"
    );
}

#[test]
fn empty_existing_file_is_initialized() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.log");
    fs::write(&path, b"").unwrap();

    let conn = Connection::open(&path, OpenMode::Existing).unwrap();
    assert!(conn.recovery_stats().unwrap().header_written);
    assert!(conn.is_empty().unwrap());
    assert_eq!(fs::metadata(&path).unwrap().len(), 16);
}

// ============================================================================
// Open modes and options
// ============================================================================

#[test]
fn existing_mode_requires_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.log");
    let result = Connection::open(&path, OpenMode::Existing);
    assert!(matches!(result, Err(Error::Open { .. })));
    assert!(!path.exists());
}

#[test]
fn create_mode_makes_a_fresh_log() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("new.log");
    let conn = Connection::open(&path, OpenMode::Create).unwrap();
    assert!(path.exists());
    assert!(conn.is_empty().unwrap());
    assert_eq!(conn.durability_mode(), DurabilityMode::Always);
    assert_eq!(conn.path(), path.as_path());
}

#[test]
fn missing_parent_directory_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no").join("such").join("dir.log");
    assert!(matches!(
        Connection::open(&path, OpenMode::Create),
        Err(Error::Open { .. })
    ));
}

#[test]
fn truncate_discards_previous_contents() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    let path = log.path();
    let TestLog { conn, dir } = log;
    drop(conn);

    let conn = OpenOptions::new()
        .mode(OpenMode::Existing)
        .truncate(true)
        .open(&path)
        .unwrap();
    assert!(conn.is_empty().unwrap());
    assert!(conn.recovery_stats().unwrap().header_written);
    drop(dir);
}

#[test]
fn nosync_skips_commit_fsync() {
    let log = TestLog::new();
    assert_eq!(log.conn.durability_mode(), DurabilityMode::NoSync);
    for i in 0..5 {
        let key = format!("k{}", i);
        commit_pairs(&log.conn, &[(key.as_str(), "v")]);
    }
    let counters = log.conn.log_counters().unwrap();
    assert_eq!(counters.appends, 5);
    assert_eq!(counters.sync_calls, 0);

    // Still readable after a clean close
    let log = log.reopen();
    assert_eq!(log.conn.len().unwrap(), 5);
}

#[test]
fn always_mode_fsyncs_each_commit() {
    let dir = tempfile::tempdir().unwrap();
    let conn = Connection::open(dir.path().join("sync.log"), OpenMode::Create).unwrap();
    commit_pairs(&conn, &[("a", "1")]);
    commit_pairs(&conn, &[("b", "2")]);
    let counters = conn.log_counters().unwrap();
    assert_eq!(counters.appends, 2);
    assert!(counters.sync_calls >= 2);
}

#[test]
fn config_file_drives_open_options() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join(logdb::CONFIG_FILE_NAME);
    fs::write(
        &config_path,
        "create_if_missing = true\ndurability = \"nosync\"\n",
    )
    .unwrap();

    let config = LogDbConfig::from_file(&config_path).unwrap();
    let conn = config
        .open_options()
        .unwrap()
        .open(dir.path().join("configured.log"))
        .unwrap();
    assert_eq!(conn.durability_mode(), DurabilityMode::NoSync);
}

#[test]
fn config_without_create_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = LogDbConfig::from_toml_str("create_if_missing = false").unwrap();
    let result = config
        .open_options()
        .unwrap()
        .open(dir.path().join("absent.log"));
    assert!(matches!(result, Err(Error::Open { .. })));
}

// ============================================================================
// Exclusive access
// ============================================================================

#[test]
fn second_open_is_refused_while_first_is_open() {
    let log = TestLog::new();
    let second = Connection::open(log.path(), OpenMode::Existing);
    assert!(matches!(second, Err(Error::Open { .. })));

    // The first connection is unaffected
    commit_pairs(&log.conn, &[("a", "1")]);
    assert_eq!(log.conn.len().unwrap(), 1);
}

#[test]
fn lock_is_released_on_close() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);
    log.conn.close().unwrap();

    let second = Connection::open(log.path(), OpenMode::Existing).unwrap();
    assert_eq!(collect_all(&second), pairs(&[("a", "1")]));
}

#[test]
fn refused_truncate_leaves_data_alone() {
    let log = TestLog::new();
    commit_pairs(&log.conn, &[("a", "1")]);

    let result = OpenOptions::new().truncate(true).open(log.path());
    assert!(matches!(result, Err(Error::Open { .. })));
    assert_eq!(collect_all(&log.conn), pairs(&[("a", "1")]));
}
