//! Deduplicating view: one element per run of comparator-equal elements.
//!
//! The source is always comparator-sorted (the factory layers a hidden
//! sorted stage), so equal elements form contiguous runs. A barcode marks
//! the first element of every run black; the rest of the run is white. All
//! transitions re-examine at most the two neighbours of the touched
//! position, so no rescan ever happens for a single-element source change,
//! and every source change produces at most one downstream change.
//!
//! Where a kept element disappears but its run survives, the surviving
//! duplicate is promoted and announced as an update of the same compressed
//! index, never as a delete/insert pair.

use std::cmp::Ordering;

use crate::event::ListChange;
use crate::pipeline::{Comparator, Pipeline, ViewId, ViewKind};
use index_forest::{Barcode, Color};

pub(crate) struct DedupState<T> {
    pub cmp: Comparator<T>,
    /// Black marks the first element of each run in the sorted source.
    pub barcode: Barcode,
}

fn state_mut<T>(p: &mut Pipeline<T>, view: ViewId) -> &mut DedupState<T> {
    match p.kind_mut(view) {
        ViewKind::Dedup(st) => st,
        _ => unreachable!("view is deduplicating"),
    }
}

fn state<T>(p: &Pipeline<T>, view: ViewId) -> &DedupState<T> {
    match p.kind(view) {
        ViewKind::Dedup(st) => st,
        _ => unreachable!("view is deduplicating"),
    }
}

/// Mark first-of-run positions over an already-sorted seed.
pub(crate) fn build<T>(seed: Vec<T>, cmp: Comparator<T>) -> DedupState<T> {
    let mut barcode = Barcode::new();
    for (i, value) in seed.iter().enumerate() {
        let dup = i > 0 && cmp(&seed[i - 1], value) == Ordering::Equal;
        barcode.insert(i, if dup { Color::White } else { Color::Black });
    }
    DedupState { cmp, barcode }
}

pub(crate) fn apply_change<T: Clone>(
    p: &mut Pipeline<T>,
    view: ViewId,
    change: &ListChange<T>,
) -> Vec<ListChange<T>> {
    let source = p.source_of(view);
    match change {
        ListChange::Insert { index, value } => {
            let i = *index;
            let cmp = std::sync::Arc::clone(&state(p, view).cmp);
            let eq_prev = i > 0
                && cmp(p.get(source, i - 1).expect("in bounds"), value) == Ordering::Equal;
            let eq_next = p
                .get(source, i + 1)
                .map_or(false, |next| cmp(value, next) == Ordering::Equal);
            let b = &mut state_mut(p, view).barcode;
            if eq_prev {
                // Another duplicate joins an existing run; nothing visible.
                b.insert(i, Color::White);
                vec![]
            } else if eq_next {
                // The new element becomes the run's kept position and the
                // formerly kept successor is demoted: one update, not an
                // insert/delete pair.
                b.insert(i, Color::Black);
                b.set_color(i + 1, Color::White);
                let k = b
                    .compressed_index_of(i, Color::Black)
                    .expect("just marked black");
                vec![ListChange::Update {
                    index: k,
                    value: value.clone(),
                }]
            } else {
                b.insert(i, Color::Black);
                let k = b
                    .compressed_index_of(i, Color::Black)
                    .expect("just marked black");
                vec![ListChange::Insert {
                    index: k,
                    value: value.clone(),
                }]
            }
        }
        ListChange::Delete { index } => {
            let i = *index;
            let b = &mut state_mut(p, view).barcode;
            if b.get(i) == Color::White {
                // A duplicate left a run; nothing visible.
                b.remove(i);
                return vec![];
            }
            let k = b
                .compressed_index_of(i, Color::Black)
                .expect("position is black");
            let successor_was_dup = i + 1 < b.len() && b.get(i + 1) == Color::White;
            b.remove(i);
            if successor_was_dup {
                // A duplicate was waiting to take over: promote it and
                // announce an update at the same compressed index.
                b.set_color(i, Color::Black);
                let value = p.get(source, i).expect("promoted survivor").clone();
                vec![ListChange::Update { index: k, value }]
            } else {
                vec![ListChange::Delete { index: k }]
            }
        }
        ListChange::Update { index, value } => {
            let i = *index;
            let cmp = std::sync::Arc::clone(&state(p, view).cmp);
            let source_len = p.len(source);
            let eq_prev = i > 0
                && cmp(p.get(source, i - 1).expect("in bounds"), value) == Ordering::Equal;
            let eq_next = i + 1 < source_len
                && cmp(value, p.get(source, i + 1).expect("in bounds")) == Ordering::Equal;
            let promoted = if i + 1 < source_len {
                p.get(source, i + 1).cloned()
            } else {
                None
            };
            let b = &mut state_mut(p, view).barcode;
            let was_kept = b.get(i) == Color::Black;
            let had_dup = was_kept && i + 1 < b.len() && b.get(i + 1) == Color::White;

            if !was_kept {
                if eq_prev {
                    // Still a duplicate of the run before it; suppressed
                    // either way.
                    return vec![];
                }
                if eq_next {
                    // Left its run and now equals the next run's kept
                    // element, which must yield to the earlier position.
                    b.set_color(i, Color::Black);
                    b.set_color(i + 1, Color::White);
                    let k = b
                        .compressed_index_of(i, Color::Black)
                        .expect("just marked black");
                    return vec![ListChange::Update {
                        index: k,
                        value: value.clone(),
                    }];
                }
                // Left its run and stands alone now.
                b.set_color(i, Color::Black);
                let k = b
                    .compressed_index_of(i, Color::Black)
                    .expect("just marked black");
                return vec![ListChange::Insert {
                    index: k,
                    value: value.clone(),
                }];
            }

            let k = b
                .compressed_index_of(i, Color::Black)
                .expect("position is black");
            if eq_prev {
                // The kept element merged into the run before it.
                if had_dup {
                    // Its old run survives through a promoted duplicate at
                    // the same compressed index.
                    b.set_color(i, Color::White);
                    b.set_color(i + 1, Color::Black);
                    let value = promoted.expect("duplicate exists");
                    return vec![ListChange::Update { index: k, value }];
                }
                b.set_color(i, Color::White);
                return vec![ListChange::Delete { index: k }];
            }
            if had_dup {
                if eq_next {
                    // Still equal to its duplicates; the kept value
                    // refreshed in place.
                    return vec![ListChange::Update {
                        index: k,
                        value: value.clone(),
                    }];
                }
                // The kept element split away from its duplicates: the run
                // keeps its compressed slot through the promoted duplicate
                // (comparator-equal, so not separately announced) and the
                // changed element appears before it.
                b.set_color(i + 1, Color::Black);
                return vec![ListChange::Insert {
                    index: k,
                    value: value.clone(),
                }];
            }
            if eq_next {
                // Two runs merged; the earlier position stays kept.
                b.set_color(i + 1, Color::White);
                return vec![ListChange::Delete { index: k }];
            }
            // Standalone kept element changed in place.
            vec![ListChange::Update {
                index: k,
                value: value.clone(),
            }]
        }
    }
}

/// Full rebuild after the sorted source reordered (comparator change): run
/// boundaries may move arbitrarily, so the barcode is rescanned and the
/// view republished as one delete-all/insert-all batch.
pub(crate) fn rebuild_for_reorder<T: Clone>(
    p: &mut Pipeline<T>,
    view: ViewId,
) -> Vec<ListChange<T>> {
    let source = p.source_of(view);
    let values = p.snapshot(source);
    let st = state_mut(p, view);
    let old_kept = st.barcode.color_size(Color::Black);

    let cmp = std::sync::Arc::clone(&st.cmp);
    let mut barcode = Barcode::new();
    let mut edits: Vec<ListChange<T>> = (0..old_kept)
        .map(|_| ListChange::Delete { index: 0 })
        .collect();
    let mut kept = 0usize;
    for (i, value) in values.iter().enumerate() {
        let dup = i > 0 && cmp(&values[i - 1], value) == Ordering::Equal;
        barcode.insert(i, if dup { Color::White } else { Color::Black });
        if !dup {
            edits.push(ListChange::Insert {
                index: kept,
                value: value.clone(),
            });
            kept += 1;
        }
    }
    state_mut(p, view).barcode = barcode;
    edits
}
