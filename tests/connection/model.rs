//! Property test: the store behaves like an ordered last-write-wins map.
//!
//! Random transactions are committed or rolled back against both a real
//! connection and a tiny in-memory model. After every run, and again after
//! reopening the log, iteration must match the model exactly.

use crate::{collect_all, TestLog};
use logdb::Buffer;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put(u8, u16),
    Delete(u8),
}

#[derive(Debug, Clone)]
struct Txn {
    ops: Vec<Op>,
    commit: bool,
}

/// Keys in first-commit order; `None` marks a deleted key.
#[derive(Default)]
struct Model {
    slots: Vec<(String, Option<String>)>,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::Put(k, v) => {
                let key = key_name(*k);
                let value = Some(v.to_string());
                match self.slots.iter_mut().find(|(existing, _)| *existing == key) {
                    Some(slot) => slot.1 = value,
                    None => self.slots.push((key, value)),
                }
            }
            Op::Delete(k) => {
                let key = key_name(*k);
                if let Some(slot) = self.slots.iter_mut().find(|(existing, _)| *existing == key) {
                    slot.1 = None;
                }
            }
        }
    }

    fn live(&self) -> Vec<(String, String)> {
        self.slots
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

fn key_name(k: u8) -> String {
    format!("key-{}", k)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..12, any::<u16>()).prop_map(|(k, v)| Op::Put(k, v)),
        1 => (0u8..12).prop_map(Op::Delete),
    ]
}

fn txn_strategy() -> impl Strategy<Value = Txn> {
    (prop::collection::vec(op_strategy(), 0..8), prop::bool::weighted(0.8))
        .prop_map(|(ops, commit)| Txn { ops, commit })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn iteration_matches_model(txns in prop::collection::vec(txn_strategy(), 1..20)) {
        let log = TestLog::new();
        let mut model = Model::default();

        for txn in &txns {
            log.conn.begin_transaction().unwrap();
            for op in &txn.ops {
                match op {
                    Op::Put(k, v) => log
                        .conn
                        .put(&Buffer::from(key_name(*k).as_str()), &Buffer::from(v.to_string().as_str()))
                        .unwrap(),
                    Op::Delete(k) => log
                        .conn
                        .delete(&Buffer::from(key_name(*k).as_str()))
                        .unwrap(),
                }
            }
            if txn.commit {
                log.conn.commit_transaction().unwrap();
                for op in &txn.ops {
                    model.apply(op);
                }
            } else {
                log.conn.rollback_transaction().unwrap();
            }
        }

        prop_assert_eq!(collect_all(&log.conn), model.live());
        prop_assert_eq!(log.conn.len().unwrap(), model.live().len());

        let log = log.reopen();
        prop_assert_eq!(collect_all(&log.conn), model.live());
    }
}
