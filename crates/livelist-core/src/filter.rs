//! Filter view: predicate membership over a barcode.
//!
//! Black marks source positions the predicate accepts. Order never
//! changes relative to the source, so a source reorder translates to a
//! compressed reorder of the kept positions.

use crate::event::ListChange;
use crate::pipeline::{Pipeline, Predicate, ViewId, ViewKind};
use index_forest::{Barcode, Color};

pub(crate) struct FilterState<T> {
    pub pred: Predicate<T>,
    /// Black marks matching source positions.
    pub barcode: Barcode,
}

fn state_mut<T>(p: &mut Pipeline<T>, view: ViewId) -> &mut FilterState<T> {
    match p.kind_mut(view) {
        ViewKind::Filter(st) => st,
        _ => unreachable!("view is a filter"),
    }
}

pub(crate) fn build<T>(seed: Vec<T>, pred: Predicate<T>) -> FilterState<T> {
    let mut barcode = Barcode::new();
    for (i, value) in seed.iter().enumerate() {
        let keep = pred(value);
        barcode.insert(i, if keep { Color::Black } else { Color::White });
    }
    FilterState { pred, barcode }
}

pub(crate) fn apply_change<T: Clone>(
    p: &mut Pipeline<T>,
    view: ViewId,
    change: &ListChange<T>,
) -> Vec<ListChange<T>> {
    let st = state_mut(p, view);
    match change {
        ListChange::Insert { index, value } => {
            let keep = (st.pred)(value);
            let i = *index;
            st.barcode
                .insert(i, if keep { Color::Black } else { Color::White });
            if !keep {
                return vec![];
            }
            let k = st
                .barcode
                .compressed_index_of(i, Color::Black)
                .expect("just marked black");
            vec![ListChange::Insert {
                index: k,
                value: value.clone(),
            }]
        }
        ListChange::Delete { index } => {
            let i = *index;
            let was = st.barcode.get(i) == Color::Black;
            let k = st.barcode.compressed_index_of(i, Color::Black);
            st.barcode.remove(i);
            match (was, k) {
                (true, Some(k)) => vec![ListChange::Delete { index: k }],
                _ => vec![],
            }
        }
        ListChange::Update { index, value } => {
            let i = *index;
            let was = st.barcode.get(i) == Color::Black;
            let keep = (st.pred)(value);
            match (was, keep) {
                (true, true) => {
                    let k = st
                        .barcode
                        .compressed_index_of(i, Color::Black)
                        .expect("position is black");
                    vec![ListChange::Update {
                        index: k,
                        value: value.clone(),
                    }]
                }
                (true, false) => {
                    let k = st
                        .barcode
                        .compressed_index_of(i, Color::Black)
                        .expect("position is black");
                    st.barcode.set_color(i, Color::White);
                    vec![ListChange::Delete { index: k }]
                }
                (false, true) => {
                    st.barcode.set_color(i, Color::Black);
                    let k = st
                        .barcode
                        .compressed_index_of(i, Color::Black)
                        .expect("just marked black");
                    vec![ListChange::Insert {
                        index: k,
                        value: value.clone(),
                    }]
                }
                (false, false) => vec![],
            }
        }
    }
}

/// Translate a source reorder into a reorder of the kept positions. The
/// colour mapping is rebuilt first, because every position's identity
/// moves.
pub(crate) fn apply_reorder<T>(p: &mut Pipeline<T>, view: ViewId, perm: &[usize]) -> Vec<usize> {
    let st = state_mut(p, view);
    let n = st.barcode.len();
    debug_assert_eq!(n, perm.len());
    let old_colors: Vec<Color> = (0..n).map(|i| st.barcode.get(i)).collect();

    let mut new_colors = vec![Color::White; n];
    for (j, c) in old_colors.iter().enumerate() {
        new_colors[perm[j]] = *c;
    }
    let mut barcode = Barcode::new();
    for (i, c) in new_colors.iter().enumerate() {
        barcode.insert(i, *c);
    }

    let mut out = Vec::with_capacity(st.barcode.color_size(Color::Black));
    for (j, c) in old_colors.iter().enumerate() {
        if *c == Color::Black {
            let new_k = barcode
                .compressed_index_of(perm[j], Color::Black)
                .expect("colour carried over");
            out.push(new_k);
        }
    }
    st.barcode = barcode;
    out
}

/// Re-evaluate every element under a new predicate, emitting the minimal
/// per-position edits in one batch.
pub(crate) fn reapply<T: Clone>(
    p: &mut Pipeline<T>,
    view: ViewId,
    pred: Predicate<T>,
) -> Vec<ListChange<T>> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("reapply_predicate", view = view.0).entered();

    let source = p.source_of(view);
    let values = p.snapshot(source);
    let st = state_mut(p, view);
    st.pred = pred;

    let mut edits = Vec::new();
    let mut barcode = Barcode::new();
    // `k` is the position of element `i` in the progressively rewritten
    // view: everything before `i` already has its new membership,
    // everything at and after `i` still has the old one.
    let mut k = 0usize;
    for (i, value) in values.iter().enumerate() {
        let was = st.barcode.get(i) == Color::Black;
        let keep = (st.pred)(value);
        barcode.insert(i, if keep { Color::Black } else { Color::White });
        match (was, keep) {
            (true, false) => edits.push(ListChange::Delete { index: k }),
            (false, true) => edits.push(ListChange::Insert {
                index: k,
                value: value.clone(),
            }),
            _ => {}
        }
        if keep {
            k += 1;
        }
    }
    st.barcode = barcode;
    edits
}
