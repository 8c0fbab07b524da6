//! Seeded differential suite: random edit scripts against naive oracles.
//!
//! The pipeline under test keeps a sorted view, a deduplicating view and a
//! filter view over one root; a plain `Vec` mirror derives the expected
//! contents after every operation. A size-asserting listener rides along
//! to check batch atomicity on every dispatch.

use std::sync::{Arc, Mutex};

use livelist_core::{ChangeBatch, Pipeline, ViewId};
use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

const SEEDS: [u64; 5] = [0x5eed_c0de, 1, 0xff, 0xc0_ffee, 0x0123_4567_89ab_cdef];

fn keep(v: &i32) -> bool {
    v % 3 == 0
}

fn sorted_oracle(mirror: &[i32]) -> Vec<i32> {
    let mut v = mirror.to_vec();
    v.sort();
    v
}

fn dedup_oracle(mirror: &[i32]) -> Vec<i32> {
    let mut v = sorted_oracle(mirror);
    v.dedup();
    v
}

fn filter_oracle(mirror: &[i32]) -> Vec<i32> {
    mirror.iter().copied().filter(keep).collect()
}

/// Assert, inside every listener callback, that the view length matches
/// what the batch arithmetic says it should be.
fn guard_atomicity(p: &mut Pipeline<i32>, view: ViewId) -> Arc<Mutex<usize>> {
    let fired = Arc::new(Mutex::new(0usize));
    let count = Arc::clone(&fired);
    let expected = Arc::new(Mutex::new(p.len(view) as isize));
    p.subscribe(view, move |pipe, v, batch| {
        let mut expected = expected.lock().unwrap();
        match batch {
            ChangeBatch::Edits(_) => *expected += batch.size_delta(),
            ChangeBatch::Reorder(perm) => assert_eq!(*expected, perm.len() as isize),
        }
        assert_eq!(
            pipe.len(v) as isize,
            *expected,
            "partial batch became visible"
        );
        *count.lock().unwrap() += 1;
    });
    fired
}

#[test]
fn differential_views_seeded_random_edits_match_oracles() {
    for seed in SEEDS {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let mut p = Pipeline::new();
        let root = p.root(Vec::new());
        let sorted = p.sorted(root, |a: &i32, b: &i32| a.cmp(b));
        let unique = p.dedup(root, |a: &i32, b: &i32| a.cmp(b));
        let filtered = p.filter(root, keep);
        let fired = guard_atomicity(&mut p, sorted);
        let mut mirror: Vec<i32> = Vec::new();

        for step in 0..600 {
            let value = (rng.next_u32() % 40) as i32;
            match rng.next_u32() % 4 {
                0 | 1 => {
                    let i = (rng.next_u32() as usize) % (mirror.len() + 1);
                    p.insert(root, i, value).unwrap();
                    mirror.insert(i, value);
                }
                2 if !mirror.is_empty() => {
                    let i = (rng.next_u32() as usize) % mirror.len();
                    assert_eq!(p.remove(root, i), Ok(mirror.remove(i)));
                }
                3 if !mirror.is_empty() => {
                    let i = (rng.next_u32() as usize) % mirror.len();
                    let old = mirror[i];
                    mirror[i] = value;
                    assert_eq!(p.set(root, i, value), Ok(old));
                }
                _ => continue,
            }

            assert_eq!(p.snapshot(root), mirror, "seed {seed} step {step}");
            assert_eq!(
                p.snapshot(sorted),
                sorted_oracle(&mirror),
                "seed {seed} step {step}"
            );
            assert_eq!(
                p.snapshot(unique),
                dedup_oracle(&mirror),
                "seed {seed} step {step}"
            );
            assert_eq!(
                p.snapshot(filtered),
                filter_oracle(&mirror),
                "seed {seed} step {step}"
            );
        }
        assert!(*fired.lock().unwrap() > 0);
    }
}

#[test]
fn differential_batched_edits_match_oracles() {
    for seed in SEEDS {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let mut p = Pipeline::new();
        let root = p.root(Vec::new());
        let sorted = p.sorted(root, |a: &i32, b: &i32| a.cmp(b));
        let unique = p.dedup(root, |a: &i32, b: &i32| a.cmp(b));
        let fired = guard_atomicity(&mut p, unique);
        let mut mirror: Vec<i32> = Vec::new();

        for _ in 0..60 {
            p.begin(root);
            for _ in 0..(1 + rng.next_u32() % 6) {
                let value = (rng.next_u32() % 20) as i32;
                match rng.next_u32() % 3 {
                    0 | 1 => {
                        let i = (rng.next_u32() as usize) % (mirror.len() + 1);
                        p.insert(root, i, value).unwrap();
                        mirror.insert(i, value);
                    }
                    2 if !mirror.is_empty() => {
                        let i = (rng.next_u32() as usize) % mirror.len();
                        p.remove(root, i).unwrap();
                        mirror.remove(i);
                    }
                    _ => continue,
                }
            }
            p.commit(root);

            assert_eq!(p.snapshot(sorted), sorted_oracle(&mirror), "seed {seed}");
            assert_eq!(p.snapshot(unique), dedup_oracle(&mirror), "seed {seed}");
        }
        assert!(*fired.lock().unwrap() > 0);
    }
}

#[test]
fn differential_resort_keeps_layers_consistent() {
    for seed in SEEDS {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let mut p = Pipeline::new();
        let root = p.root(Vec::new());
        let sorted = p.sorted(root, |a: &i32, b: &i32| a.cmp(b));
        let filtered = p.filter(sorted, keep);
        let mut mirror: Vec<i32> = Vec::new();

        for _ in 0..80 {
            let value = (rng.next_u32() % 30) as i32;
            let i = (rng.next_u32() as usize) % (mirror.len() + 1);
            p.insert(root, i, value).unwrap();
            mirror.insert(i, value);
        }

        // Ascending first.
        let mut expect = sorted_oracle(&mirror);
        assert_eq!(p.snapshot(sorted), expect);
        assert_eq!(
            p.snapshot(filtered),
            expect.iter().copied().filter(keep).collect::<Vec<_>>()
        );

        // Flip to descending: the filter must ride the reorder.
        p.set_comparator(sorted, |a: &i32, b: &i32| b.cmp(a));
        expect.reverse();
        assert_eq!(p.snapshot(sorted), expect, "seed {seed}");
        assert_eq!(
            p.snapshot(filtered),
            expect.iter().copied().filter(keep).collect::<Vec<_>>(),
            "seed {seed}"
        );

        // Edits keep working after the rebuild.
        p.push(root, 7);
        mirror.push(7);
        let mut expect = sorted_oracle(&mirror);
        expect.reverse();
        assert_eq!(p.snapshot(sorted), expect, "seed {seed}");
    }
}
