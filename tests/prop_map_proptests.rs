// PropMap property tests.
//
// Property 1: state-machine equivalence with a HashMap model.
//  - Model: key -> Option<value> (absent value distinct from "").
//  - Operations: put, put absent, remove, get, add, rehash, clone+deepen.
//  - Invariant after each op: len and every pool key agree with the model;
//    sorted_keys lists each model key exactly once.
//
// Property 2: escape round trip for arbitrary text, and with it store/load
// round trip of whole maps.
//
// Property 3: clone isolation after deepen for random edit sequences.
use propmap::{escape, escape_key, unescape, PropMap};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

#[derive(Clone, Debug)]
enum Op {
    Put(usize, u8),
    PutAbsent(usize),
    Remove(usize),
    Get(usize),
    Add(usize, u8),
    Rehash,
    CloneDeepen,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::btree_set("[a-z][a-z0-9._ -]{0,6}[a-z0-9]", 1..=24).prop_flat_map(
        |pool| {
            let pool: Vec<String> = pool.into_iter().collect();
            let n = pool.len();
            let op = prop_oneof![
                5 => (0..n, any::<u8>()).prop_map(|(i, v)| Op::Put(i, v)),
                1 => (0..n).prop_map(Op::PutAbsent),
                2 => (0..n).prop_map(Op::Remove),
                2 => (0..n).prop_map(Op::Get),
                1 => (0..n, any::<u8>()).prop_map(|(i, v)| Op::Add(i, v)),
                1 => Just(Op::Rehash),
                1 => Just(Op::CloneDeepen),
            ];
            proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_map_matches_model((pool, ops) in arb_scenario()) {
        let mut sut = PropMap::new();
        let mut model: HashMap<String, Option<String>> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(i, v) => {
                    let v = v.to_string();
                    let prev = sut.put(&pool[i], Some(v.as_str())).unwrap();
                    let mprev = model.insert(pool[i].clone(), Some(v));
                    prop_assert_eq!(prev, mprev.flatten());
                }
                Op::PutAbsent(i) => {
                    sut.put(&pool[i], None).unwrap();
                    model.insert(pool[i].clone(), None);
                }
                Op::Remove(i) => {
                    let removed = sut.remove(&pool[i]);
                    let mremoved = model.remove(&pool[i]);
                    prop_assert_eq!(removed.is_some(), mremoved.is_some());
                    if let (Some(e), Some(v)) = (removed, mremoved) {
                        prop_assert_eq!(e.value().map(|s| s.to_string()), v);
                    }
                }
                Op::Get(i) => {
                    let e = sut.entry(&pool[i]);
                    let m = model.get(&pool[i]);
                    prop_assert_eq!(e.is_some(), m.is_some());
                    prop_assert_eq!(sut.get(&pool[i]), m.cloned().flatten());
                }
                Op::Add(i, v) => {
                    let v = v.to_string();
                    let added = sut.add(&pool[i], Some(v.as_str())).unwrap();
                    let madded = !model.contains_key(&pool[i]);
                    if madded {
                        model.insert(pool[i].clone(), Some(v));
                    }
                    prop_assert_eq!(added, madded);
                }
                Op::Rehash => {
                    let cap = sut.capacity();
                    sut.rehash();
                    prop_assert!(sut.capacity() > cap);
                }
                Op::CloneDeepen => {
                    let copy = sut.clone();
                    copy.deepen();
                    prop_assert!(copy == sut);
                    sut = copy;
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            let mut keys: Vec<String> = model.keys().cloned().collect();
            keys.sort();
            prop_assert_eq!(sut.sorted_keys(), keys);
        }
        for k in &pool {
            prop_assert_eq!(sut.get(k), model.get(k).cloned().flatten());
        }
    }
}

proptest! {
    #[test]
    fn prop_escape_round_trip(s in any::<String>()) {
        prop_assert_eq!(unescape(&escape(&s, true)).unwrap(), s.clone());
        prop_assert_eq!(unescape(&escape(&s, false)).unwrap(), s.clone());
        prop_assert_eq!(unescape(&escape_key(&s)).unwrap(), s);
    }

    #[test]
    fn prop_escape_round_trip_bmp(chars in proptest::collection::vec(
        prop_oneof![proptest::char::range('\u{0}', '\u{D7FF}'), proptest::char::range('\u{E000}', '\u{FFFF}')],
        0..40,
    )) {
        let s: String = chars.into_iter().collect();
        let escaped = escape(&s, true);
        prop_assert!(escaped.chars().all(|c| (c as u32) <= 0xFE));
        prop_assert_eq!(unescape(&escaped).unwrap(), s);
    }

    #[test]
    fn prop_store_load_round_trip(entries in proptest::collection::btree_map(
        "[^\\x00-\\x20]|[^\\x00-\\x20].*[^\\x00-\\x20]",
        proptest::option::of(any::<String>()),
        0..20,
    )) {
        let m = PropMap::new();
        for (k, v) in &entries {
            m.put(k, v.as_deref()).unwrap();
        }
        let mut out = Vec::new();
        m.store(&mut out, Some("prop"), Some("UTF-8")).unwrap();
        let back = PropMap::new();
        back.load(out.as_slice(), None).unwrap();
        let got: BTreeMap<String, Option<String>> = back
            .sorted_entries()
            .iter()
            .map(|e| (e.key().to_owned(), e.value().map(|v| v.to_string())))
            .collect();
        prop_assert_eq!(got, entries);
    }
}

proptest! {
    #[test]
    fn prop_deepened_clone_is_isolated(
        base in proptest::collection::vec(("[a-e]", any::<u8>()), 1..10),
        edits in proptest::collection::vec(("[a-e]", any::<u8>(), any::<bool>()), 0..20),
    ) {
        let original = PropMap::new();
        for (k, v) in &base {
            original.put(k, Some(v.to_string().as_str())).unwrap();
        }
        let snapshot: Vec<(String, Option<String>)> = original
            .sorted_keys()
            .into_iter()
            .map(|k| { let v = original.get(&k); (k, v) })
            .collect();

        let copy = original.clone();
        copy.deepen();
        for (k, v, remove) in &edits {
            if *remove {
                copy.remove(k);
            } else {
                copy.put(k, Some(v.to_string().as_str())).unwrap();
            }
        }
        for (k, v) in snapshot {
            prop_assert_eq!(original.get(&k), v);
        }
    }
}
