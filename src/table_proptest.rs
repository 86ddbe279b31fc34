#![cfg(test)]

// Property tests for Table kept inside the crate so they can reach the
// internal table and its consistency check.

use crate::config::RehashPolicy;
use crate::error::Error;
use crate::table::Table;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Slot {
    value: Option<String>,
    immutable: bool,
}

// Pool-indexed operations so shrinking moves towards earlier keys and
// shorter op lists.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, Option<u8>),
    PutImmutable(usize, Option<u8>),
    Remove(usize),
    Find(usize),
    Rehash(usize),
    Clear,
    Iterate,
}

fn value_of(v: Option<u8>) -> Option<String> {
    v.map(|b| format!("v{}", b % 4))
}

fn arb_value() -> impl Strategy<Value = Option<u8>> {
    proptest::option::weighted(0.85, any::<u8>())
}

fn arb_ops(pool_len: usize) -> impl Strategy<Value = Vec<OpI>> {
    let idx = 0..pool_len;
    let op = prop_oneof![
        6 => (idx.clone(), arb_value()).prop_map(|(i, v)| OpI::Put(i, v)),
        2 => (idx.clone(), arb_value()).prop_map(|(i, v)| OpI::PutImmutable(i, v)),
        3 => idx.clone().prop_map(OpI::Remove),
        3 => idx.prop_map(OpI::Find),
        1 => (0usize..400).prop_map(OpI::Rehash),
        1 => Just(OpI::Clear),
        1 => Just(OpI::Iterate),
    ];
    proptest::collection::vec(op, 1..120)
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::btree_set("[a-zA-Z0-9._]{1,8}", 1..=40).prop_flat_map(|pool| {
        let pool: Vec<String> = pool.into_iter().collect();
        let n = pool.len();
        arb_ops(n).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Keys built from "Aa"/"BB" blocks share one string hash.
fn colliding_pool() -> Vec<String> {
    (0..64usize)
        .map(|i| {
            (0..6)
                .map(|bit| if i >> bit & 1 == 1 { "BB" } else { "Aa" })
                .collect()
        })
        .collect()
}

fn run(
    mut sut: Table,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, Slot> = HashMap::new();
    for op in ops {
        match op {
            OpI::Put(i, v) | OpI::PutImmutable(i, v) => {
                let immutable = matches!(op, OpI::PutImmutable(..));
                let k = &pool[i];
                let v = value_of(v);
                let cap_before = sut.capacity();
                let res = sut.insert_value(k, v.as_deref(), immutable);
                prop_assert!(sut.capacity() >= cap_before, "capacity never shrinks on put");
                match model.get(k).cloned() {
                    Some(old) if old.immutable && old.value != v => {
                        prop_assert!(
                            matches!(res, Err(Error::ImmutableConflict { .. })),
                            "changing an immutable entry must fail"
                        );
                    }
                    Some(old) => {
                        let prev = res.expect("put on existing key succeeds");
                        prop_assert_eq!(
                            prev.map(|p| p.map(|s| s.to_string())),
                            Some(old.value.clone())
                        );
                        model.insert(
                            k.clone(),
                            Slot {
                                value: v,
                                immutable: old.immutable || immutable,
                            },
                        );
                    }
                    None => {
                        prop_assert!(res.expect("put of new key succeeds").is_none());
                        model.insert(k.clone(), Slot { value: v, immutable });
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove(k);
                match model.remove(k) {
                    Some(old) => {
                        let e = removed.expect("model key present in table");
                        prop_assert_eq!(e.key(), k.as_str());
                        prop_assert_eq!(e.value().map(|s| s.to_string()), old.value);
                    }
                    None => prop_assert!(removed.is_none()),
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let found = sut.get(k).map(|e| {
                    Slot {
                        value: e.value().map(|s| s.to_string()),
                        immutable: e.is_immutable(),
                    }
                });
                prop_assert_eq!(found.as_ref(), model.get(k));
            }
            OpI::Rehash(min) => {
                let cap_before = sut.capacity();
                let rehashes = sut.quality().rehashes;
                sut.rehash(None, min);
                prop_assert!(sut.capacity() > cap_before);
                prop_assert!(sut.capacity() >= min);
                prop_assert_eq!(sut.quality().rehashes, rehashes + 1);
            }
            OpI::Clear => {
                sut.clear(71);
                model.clear();
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<String> = sut.iter().map(|e| e.key().to_owned()).collect();
                let m_keys: BTreeSet<String> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        sut.assert_consistent();
        prop_assert_eq!(sut.len(), model.len());
    }
    for (k, slot) in &model {
        let e = sut.get(k).expect("every model key retrievable");
        prop_assert_eq!(&e.value().map(|s| s.to_string()), &slot.value);
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - put returns the previous value; immutable conflicts fail and change nothing.
// - remove returns the removed entry; lookups agree with the model.
// - rehash grows the table and keeps the entry set.
// - After every op: no duplicate keys, every entry inside the probe window,
//   size parity with the model.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_table_state_machine((pool, ops) in arb_scenario()) {
        run(Table::new(71, RehashPolicy::default()), &pool, ops)?;
    }
}

// Same invariants with every key on one hash chain and a tight probe
// policy, so the rehash trigger and the wide probe windows are exercised.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_table_state_machine_with_collisions(ops in arb_ops(64)) {
        let policy = RehashPolicy { max_probe: 3, scan_limit: 5 };
        run(Table::new(11, policy), &colliding_pool(), ops)?;
    }
}

// Property: a detached table shares immutable entries and nothing else.
proptest! {
    #[test]
    fn prop_detach_mutable(flags in proptest::collection::vec(any::<bool>(), 1..50)) {
        let mut original = Table::new(71, RehashPolicy::default());
        for (i, immutable) in flags.iter().enumerate() {
            original.insert_value(&format!("k{i}"), Some("v"), *immutable).unwrap();
        }
        let mut copy = original.clone();
        let copied = copy.detach_mutable();
        prop_assert_eq!(copied, flags.iter().filter(|f| !**f).count());
        for e in original.iter() {
            let c = copy.get(e.key()).unwrap();
            prop_assert_eq!(Arc::ptr_eq(e, c), e.is_immutable());
        }
        copy.assert_consistent();
    }
}
