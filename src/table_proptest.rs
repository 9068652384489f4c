#![cfg(test)]

// Property tests for Table kept inside the crate so they can interrupt
// growth and partially migrate, which the public API never allows.

use crate::shared::Value;
use crate::table::{Insertion, Table};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i64),
    InsertShared(usize),
    Remove(usize),
    Pop(usize),
    Find(usize),
    Interrupt,
    Migrate(usize),
    Enumerate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{1,6}", 1..=24).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i64>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => idx.clone().prop_map(Op::InsertShared),
            2 => idx.clone().prop_map(Op::Remove),
            1 => idx.clone().prop_map(Op::Pop),
            2 => idx.clone().prop_map(Op::Find),
            1 => Just(Op::Interrupt),
            1 => (0usize..64).prop_map(Op::Migrate),
            1 => Just(Op::Enumerate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

#[derive(Clone, Debug, PartialEq)]
enum Model {
    Int(i64),
    Shared,
}

// Property: state-machine equivalence against std::collections::HashMap,
// with growth interrupted and migrations left half done at random points.
// Invariants exercised:
// - insert reports Created iff the key was absent; find yields the latest value.
// - remove/pop report presence exactly as the model does.
// - len matches the model and bucket_stats never reports corruption.
// - enumeration visits each stored key exactly once, mid-migration included.
// - the shared resource's strong count equals 1 + entries holding it,
//   so every reference taken by the table is given back exactly once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let shared = Rc::new(String::from("resource"));
        let mut sut: Table<Rc<String>> = Table::new();
        let mut model: HashMap<String, Model> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let k = &pool[i];
                    let res = sut.insert(k, &Value::int(v)).unwrap();
                    let was = model.insert(k.clone(), Model::Int(v));
                    prop_assert_eq!(res == Insertion::Replaced, was.is_some());
                }
                Op::InsertShared(i) => {
                    let k = &pool[i];
                    let res = sut.insert(k, &Value::Resource(shared.clone())).unwrap();
                    let was = model.insert(k.clone(), Model::Shared);
                    prop_assert_eq!(res == Insertion::Replaced, was.is_some());
                }
                Op::Remove(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.remove(k), model.remove(k).is_some());
                }
                Op::Pop(i) => {
                    let k = &pool[i];
                    match (sut.pop(k), model.remove(k)) {
                        (None, None) => {}
                        (Some(v), Some(Model::Int(n))) => prop_assert_eq!(v.as_int(), Some(n)),
                        (Some(v), Some(Model::Shared)) => {
                            prop_assert!(v.is_resource());
                            v.release();
                        }
                        (got, want) => prop_assert!(false, "pop mismatch: {:?} vs {:?}", got, want),
                    }
                }
                Op::Find(i) => {
                    let k = &pool[i];
                    let got = sut.find(k).map(|e| match e.value() {
                        Value::Scalar(b) => Model::Int(*b as i64),
                        Value::Resource(_) => Model::Shared,
                    });
                    prop_assert_eq!(got.as_ref(), model.get(k));
                }
                Op::Interrupt => {
                    // Bounded so the scans below stay cheap.
                    if sut.target_size() < 512 {
                        sut.grow_interrupted().unwrap();
                    }
                }
                Op::Migrate(n) => {
                    sut.migrate_prefix(n);
                }
                Op::Enumerate => {
                    let mut seen = BTreeSet::new();
                    let mut cur = sut.first_key();
                    while let Some(k) = cur {
                        prop_assert!(seen.insert(k.to_string()), "visited {} twice", k);
                        cur = sut.next_key(k).unwrap();
                    }
                    let expected: BTreeSet<String> = model.keys().cloned().collect();
                    prop_assert_eq!(seen, expected);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            prop_assert!(sut.bucket_stats().is_ok());
            let holders = model.values().filter(|m| **m == Model::Shared).count();
            prop_assert_eq!(Rc::strong_count(&shared), 1 + holders);
        }

        drop(sut);
        prop_assert_eq!(Rc::strong_count(&shared), 1);
    }
}
