#![cfg(test)]

// Property tests for StrStrMap kept inside the crate so they can check the
// slot/arena layout after every step, not just the public behaviour.

use crate::cursor::{Cursor, CursorState};
use crate::error::Error;
use crate::{StrMapConfig, StrStrMap};
use core::hash::{BuildHasher, Hasher};
use hashbrown::HashMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::BTreeMap;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, String),
    Delete(usize),
    Remove(usize),
    Get(usize),
    GetOrDefault(usize),
    Update(Vec<(usize, String)>),
    Iterate,
    CursorStep,
    Shrink,
    Clear,
}

fn arb_value() -> impl Strategy<Value = String> {
    "[a-z]{0,6}"
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => (idx.clone(), arb_value()).prop_map(|(i, v)| OpI::Set(i, v)),
            3 => idx.clone().prop_map(OpI::Delete),
            1 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Get),
            1 => idx.clone().prop_map(OpI::GetOrDefault),
            1 => proptest::collection::vec((idx.clone(), arb_value()), 0..6).prop_map(OpI::Update),
            1 => Just(OpI::Iterate),
            3 => Just(OpI::CursorStep),
            1 => Just(OpI::Shrink),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

/// Drives `sut` and a `hashbrown::HashMap` model through `ops`.
///
/// Invariants exercised across random operation sequences:
/// - `len` equals the model's key count after every op.
/// - `get`/`get_or_default` agree with the model; misses are `KeyNotFound`.
/// - `delete`/`remove` fail exactly when the model lacks the key.
/// - Iteration yields the model's contents exactly once each.
/// - A cursor yields model entries until a successful mutation, then fails
///   with `IteratorInvalidated` on its next step.
/// - Slot counters, arena accounting and the load factor stay consistent.
fn run_scenario<S: BuildHasher>(
    mut sut: StrStrMap<S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, String> = HashMap::new();
    let mut cursor: Option<(Cursor, bool)> = None;

    for op in ops {
        let mut mutated = false;
        match op {
            OpI::Set(i, v) => {
                sut.set(&pool[i], &v).expect("string arguments");
                model.insert(pool[i].clone(), v);
                mutated = true;
            }
            OpI::Delete(i) => {
                let k = &pool[i];
                match sut.delete(k) {
                    Ok(()) => {
                        prop_assert!(model.remove(k).is_some(), "deleted a key the model lacks");
                        mutated = true;
                    }
                    Err(e) => {
                        prop_assert_eq!(e, Error::KeyNotFound);
                        prop_assert!(!model.contains_key(k));
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                match sut.remove(k) {
                    Ok(v) => {
                        prop_assert_eq!(Some(v), model.remove(k));
                        mutated = true;
                    }
                    Err(e) => {
                        prop_assert_eq!(e, Error::KeyNotFound);
                        prop_assert!(!model.contains_key(k));
                    }
                }
            }
            OpI::Get(i) => {
                let k = &pool[i];
                match model.get(k) {
                    Some(v) => prop_assert_eq!(sut.get(k), Ok(v.as_str())),
                    None => prop_assert_eq!(sut.get(k), Err(Error::KeyNotFound)),
                }
            }
            OpI::GetOrDefault(i) => {
                let k = &pool[i];
                let expected = model.get(k).map(String::as_str).unwrap_or("<default>");
                prop_assert_eq!(sut.get_or_default(k, "<default>"), Ok(expected));
            }
            OpI::Update(batch) => {
                let pairs: Vec<(&String, &String)> = batch.iter().map(|(i, v)| (&pool[*i], v)).collect();
                sut.update(pairs.iter().copied()).expect("string arguments");
                mutated = !pairs.is_empty();
                for (k, v) in pairs {
                    model.insert(k.clone(), v.clone());
                }
            }
            OpI::Iterate => {
                let seen: BTreeMap<&str, &str> = sut.iter().collect();
                prop_assert_eq!(seen.len(), sut.len(), "iteration repeated an entry");
                let expected: BTreeMap<&str, &str> =
                    model.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
                prop_assert_eq!(seen, expected);
            }
            OpI::CursorStep => {
                let (cur, dirty) = cursor.get_or_insert_with(|| (sut.cursor(), false));
                let before = cur.state();
                let step = cur.next(&sut);
                match (before, *dirty) {
                    (CursorState::Exhausted, _) => prop_assert_eq!(step, Ok(None)),
                    (CursorState::Invalidated, _) | (CursorState::Active, true) => {
                        prop_assert_eq!(step, Err(Error::IteratorInvalidated));
                    }
                    (CursorState::Active, false) => match step {
                        Ok(Some((k, v))) => {
                            prop_assert_eq!(model.get(k).map(String::as_str), Some(v));
                        }
                        Ok(None) => prop_assert_eq!(cur.state(), CursorState::Exhausted),
                        Err(e) => prop_assert!(false, "unexpected cursor error {:?}", e),
                    },
                }
                if cur.state() != CursorState::Active {
                    cursor = None;
                }
            }
            OpI::Shrink => {
                sut.shrink_to_fit();
                prop_assert_eq!(sut.stats().dead_bytes, 0);
                prop_assert_eq!(sut.stats().tombstones, 0);
                mutated = true;
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
                mutated = true;
            }
        }

        if mutated {
            if let Some((_, dirty)) = cursor.as_mut() {
                *dirty = true;
            }
        }
        sut.assert_consistent();
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence with the default hasher and policy.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(StrStrMap::new(), &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: same invariants when every key lands on one collision chain, and
// with a high load factor and eager compaction so rebuilds, tombstone
// reuse and remapping all happen within short op sequences.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let cfg = StrMapConfig::default()
            .with_max_load_factor(0.9)
            .with_compaction_threshold(0.2);
        let sut = StrStrMap::with_config_and_hasher(cfg, ConstBuildHasher).unwrap();
        run_scenario(sut, &pool, ops)?;
    }
}
