use super::*;

use proptest::prelude::*;
use std::collections::HashSet;

fn validate_table(dj: &DoubleJump) {
    assert_eq!(
        dj.index.len(),
        dj.live.len(),
        "name index must track live count"
    );
    assert!(dj.live.len() <= dj.slots.len());

    let live_slots = dj.slots.iter().filter(|s| s.is_live()).count();
    assert_eq!(live_slots, dj.live.len(), "live list out of sync with slots");

    let mut seen = HashSet::new();
    for (rank, &idx) in dj.live.iter().enumerate() {
        assert!(seen.insert(idx), "slot {idx} listed twice");
        match &dj.slots[idx] {
            Slot::Live { node, rank: r } => {
                assert_eq!(*r, rank, "rank of slot {idx} is stale");
                assert_eq!(dj.index.get(node.as_ref()), Some(&idx));
            }
            Slot::Tombstone => panic!("live list points at tombstone {idx}"),
        }
    }

    for (node, &idx) in &dj.index {
        assert!(!node.is_empty(), "empty node id registered");
        assert_eq!(dj.slots[idx].node(), Some(node.as_ref()));
    }
}

/// Live nodes plus the slot count a correct table must report.
#[derive(Default)]
struct Model {
    live: Vec<String>,
    loose: usize,
}

impl Model {
    fn add(&mut self, node: &str) -> bool {
        if node.is_empty() || self.live.iter().any(|n| n == node) {
            return false;
        }
        self.live.push(node.to_owned());
        self.loose += 1;
        true
    }

    fn remove(&mut self, node: &str) -> bool {
        match self.live.iter().position(|n| n == node) {
            Some(pos) => {
                self.live.remove(pos);
                true
            }
            None => false,
        }
    }

    fn shrink(&mut self) -> usize {
        let reclaimed = self.loose - self.live.len();
        self.loose = self.live.len();
        reclaimed
    }
}

#[derive(Clone, Debug)]
enum Op {
    Add(String),
    Remove(String),
    Get(Vec<u8>),
    Shrink,
}

fn node_strategy() -> impl Strategy<Value = String> + Clone {
    // Small alphabet so duplicates, re-adds and empty names show up often.
    "[a-f]{0,2}"
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let node = node_strategy();
    let op = prop_oneof![
        45 => node.clone().prop_map(Op::Add),
        30 => node.prop_map(Op::Remove),
        20 => prop::collection::vec(any::<u8>(), 0..=16).prop_map(Op::Get),
        5 => Just(Op::Shrink),
    ];
    prop::collection::vec(op, 0..=300)
}

fn build(ops: &[Op]) -> DoubleJump {
    let mut dj = DoubleJump::new();
    for op in ops {
        match op {
            Op::Add(node) => {
                dj.add(node);
            }
            Op::Remove(node) => {
                dj.remove(node);
            }
            Op::Get(_) => {}
            Op::Shrink => {
                dj.shrink();
            }
        }
    }
    dj
}

fn owners(dj: &DoubleJump, keys: usize) -> Vec<Option<String>> {
    (0..keys)
        .map(|i| dj.get(format!("key-{i}")).map(str::to_owned))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_model(ops in ops_strategy()) {
        let mut dj = DoubleJump::new();
        let mut m = Model::default();

        for op in ops {
            match op {
                Op::Add(node) => {
                    prop_assert_eq!(dj.add(&node), m.add(&node));
                }
                Op::Remove(node) => {
                    prop_assert_eq!(dj.remove(&node), m.remove(&node));
                }
                Op::Get(key) => {
                    let got = dj.get(&key);
                    prop_assert_eq!(got.is_some(), !m.live.is_empty());
                    if let Some(node) = got {
                        prop_assert!(m.live.iter().any(|n| n == node));
                    }
                    prop_assert_eq!(got, dj.get(&key));
                }
                Op::Shrink => {
                    prop_assert_eq!(dj.shrink(), m.shrink());
                }
            }

            prop_assert_eq!(dj.len(), m.live.len());
            prop_assert_eq!(dj.loose_len(), m.loose);
        }

        validate_table(&dj);
        let expected: Vec<&str> = m.live.iter().map(String::as_str).collect();
        prop_assert_eq!(dj.all(), expected);
    }

    #[test]
    fn prop_remove_only_moves_keys_of_removed_node(ops in ops_strategy(), pick in any::<prop::sample::Index>()) {
        let mut dj = build(&ops);
        prop_assume!(!dj.is_empty());

        let victim = pick.get(&dj.all()).to_string();
        let before = owners(&dj, 300);
        dj.remove(&victim);
        validate_table(&dj);
        let after = owners(&dj, 300);

        for (old, new) in before.iter().zip(&after) {
            if old.as_deref() == Some(victim.as_str()) {
                prop_assert_ne!(new.as_deref(), Some(victim.as_str()));
                prop_assert_eq!(new.is_some(), !dj.is_empty());
            } else {
                prop_assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn prop_add_only_moves_keys_to_new_node(ops in ops_strategy()) {
        let mut dj = build(&ops);
        let before = owners(&dj, 300);
        prop_assert!(dj.add("fresh-node"));
        validate_table(&dj);
        let after = owners(&dj, 300);

        for (old, new) in before.iter().zip(&after) {
            if old != new {
                prop_assert_eq!(new.as_deref(), Some("fresh-node"));
            }
        }
    }

    #[test]
    fn prop_shrink_keeps_membership(ops in ops_strategy()) {
        let mut dj = build(&ops);
        let before: Vec<String> = dj.all().into_iter().map(str::to_owned).collect();
        let tombstones = dj.tombstones();

        prop_assert_eq!(dj.shrink(), tombstones);
        validate_table(&dj);
        prop_assert_eq!(dj.loose_len(), dj.len());
        prop_assert_eq!(dj.all(), before);
    }
}

#[test]
fn exhaustive_remove_order_keeps_survivors() {
    let names = ["a", "b", "c", "d", "e"];
    let base: DoubleJump = names.iter().collect();
    let keys = 200;

    // Remove in every order; each step may only move keys off the removed node.
    fn rec(dj: &DoubleJump, remaining: &[&str], keys: usize) {
        if remaining.is_empty() {
            assert!(dj.is_empty());
            assert_eq!(dj.get("k"), None);
            return;
        }
        let before = owners(dj, keys);
        for (i, victim) in remaining.iter().enumerate() {
            let mut next = dj.clone();
            assert!(next.remove(victim));
            validate_table(&next);
            for (old, new) in before.iter().zip(owners(&next, keys)) {
                if old.as_deref() != Some(*victim) {
                    assert_eq!(old, &new);
                }
            }
            let mut rest = remaining.to_vec();
            rest.remove(i);
            rec(&next, &rest, keys);
        }
    }

    rec(&base, &names, keys);
}
