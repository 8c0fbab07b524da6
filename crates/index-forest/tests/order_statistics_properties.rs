//! Property suites for the order-statistics tree and the barcode.

use index_forest::{Barcode, Color, IndexedTree};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

/// Random edit script against a `Vec` mirror.
#[derive(Debug, Clone)]
enum Op {
    Insert(usize, i64),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), any::<i64>()).prop_map(|(i, v)| Op::Insert(i, v)),
        any::<usize>().prop_map(Op::Remove),
    ]
}

proptest! {
    /// For all insert/remove-at-index sequences the tree matches a `Vec`
    /// applying the same script, and `index_of` of a fresh insertion is the
    /// requested index.
    #[test]
    fn tree_matches_vec_mirror(ops in proptest::collection::vec(op_strategy(), 1..200)) {
        let mut tree = IndexedTree::new();
        let mut mirror: Vec<i64> = Vec::new();
        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    let i = i % (mirror.len() + 1);
                    let handle = tree.insert_at(i, v);
                    prop_assert_eq!(tree.index_of(handle), i);
                    mirror.insert(i, v);
                }
                Op::Remove(i) => {
                    if mirror.is_empty() {
                        continue;
                    }
                    let i = i % mirror.len();
                    prop_assert_eq!(tree.remove_at(i), mirror.remove(i));
                }
            }
            tree.check_invariants().map_err(TestCaseError::fail)?;
        }
        let collected: Vec<i64> = tree.iter().cloned().collect();
        prop_assert_eq!(collected, mirror);
    }

    /// AVL bound: height <= ceil(1.44 * log2(n + 2)) after any script.
    #[test]
    fn tree_height_stays_within_avl_bound(ops in proptest::collection::vec(op_strategy(), 1..400)) {
        let mut tree = IndexedTree::new();
        let mut len = 0usize;
        for op in ops {
            match op {
                Op::Insert(i, v) => {
                    tree.insert_at(i % (len + 1), v);
                    len += 1;
                }
                Op::Remove(i) => {
                    if len == 0 {
                        continue;
                    }
                    tree.remove_at(i % len);
                    len -= 1;
                }
            }
            let bound = (1.44 * ((len + 2) as f64).log2()).ceil() as usize;
            prop_assert!(
                tree.tree_height() <= bound,
                "height {} exceeds AVL bound {} at n = {}",
                tree.tree_height(),
                bound,
                len
            );
        }
    }

    /// Barcode round-trip: every kept natural index survives
    /// natural -> compressed -> natural, for both colours.
    #[test]
    fn barcode_round_trips_both_colours(colors in proptest::collection::vec(any::<bool>(), 0..300)) {
        let mut b = Barcode::new();
        for (i, black) in colors.iter().enumerate() {
            b.insert(i, if *black { Color::Black } else { Color::White });
        }
        b.check_invariants().map_err(TestCaseError::fail)?;
        for (i, black) in colors.iter().enumerate() {
            let c = if *black { Color::Black } else { Color::White };
            let k = b.compressed_index_of(i, c).expect("own colour is present");
            prop_assert_eq!(b.natural_index_of(k, c), i);
        }
    }

    /// Inversion is an involution that swaps every query.
    #[test]
    fn barcode_inversion_mirrors_queries(colors in proptest::collection::vec(any::<bool>(), 1..200)) {
        let mut b = Barcode::new();
        for (i, black) in colors.iter().enumerate() {
            b.insert(i, if *black { Color::Black } else { Color::White });
        }
        let blacks = b.color_size(Color::Black);
        let whites = b.color_size(Color::White);
        b.invert();
        prop_assert_eq!(b.color_size(Color::Black), whites);
        prop_assert_eq!(b.color_size(Color::White), blacks);
        for (i, black) in colors.iter().enumerate() {
            let seen = b.get(i);
            let expect = if *black { Color::White } else { Color::Black };
            prop_assert_eq!(seen, expect);
        }
        b.invert();
        for (i, black) in colors.iter().enumerate() {
            let expect = if *black { Color::Black } else { Color::White };
            prop_assert_eq!(b.get(i), expect);
        }
    }
}
