//! Sorted view: dual-tree incremental resort.
//!
//! Two trees over one element set. `by_source` mirrors the source order and
//! stores, per position, a handle into `by_order`; `by_order` holds the
//! elements in comparator order and stores the back-handle. A source index
//! resolves to an order position (and back) in O(log n), which is what
//! keeps single-element edits logarithmic.

use std::cmp::Ordering;

use crate::event::ListChange;
use crate::pipeline::{Comparator, Pipeline, ViewId, ViewKind};
use index_forest::{IndexedTree, NodeId};

pub(crate) struct Entry<T> {
    pub value: T,
    /// Handle into `by_source`; `None` only between allocation and linking.
    pub source: Option<NodeId>,
}

pub(crate) struct SortedState<T> {
    pub cmp: Comparator<T>,
    /// Source order; values are handles into `by_order`.
    pub by_source: IndexedTree<NodeId>,
    /// Comparator order; entries own the element.
    pub by_order: IndexedTree<Entry<T>>,
}

fn state_mut<T>(p: &mut Pipeline<T>, view: ViewId) -> &mut SortedState<T> {
    match p.kind_mut(view) {
        ViewKind::Sorted(st) => st,
        _ => unreachable!("view is sorted"),
    }
}

impl<T> SortedState<T> {
    /// Insert `value`, which sits at `source_index` in the source, after
    /// all comparator-equal elements. Returns the order position.
    fn insert(&mut self, source_index: usize, value: T) -> usize {
        let cmp = &self.cmp;
        let pos = self
            .by_order
            .partition_point(|e| cmp(&e.value, &value) != Ordering::Greater);
        let h_order = self.by_order.insert_at(
            pos,
            Entry {
                value,
                source: None,
            },
        );
        let h_source = self.by_source.insert_at(source_index, h_order);
        self.by_order.value_mut(h_order).source = Some(h_source);
        pos
    }

    fn remove(&mut self, source_index: usize) -> usize {
        let h_order = self.by_source.remove_at(source_index);
        let pos = self.by_order.index_of(h_order);
        self.by_order.remove_at(pos);
        pos
    }
}

/// Build a state from the source contents, preserving source order among
/// equal elements.
pub(crate) fn build<T>(seed: Vec<T>, cmp: Comparator<T>) -> SortedState<T> {
    let mut state = SortedState {
        cmp,
        by_source: IndexedTree::new(),
        by_order: IndexedTree::new(),
    };
    for (i, value) in seed.into_iter().enumerate() {
        state.insert(i, value);
    }
    state
}

pub(crate) fn apply_change<T: Clone>(
    p: &mut Pipeline<T>,
    view: ViewId,
    change: &ListChange<T>,
) -> Vec<ListChange<T>> {
    let st = state_mut(p, view);
    match change {
        ListChange::Insert { index, value } => {
            let pos = st.insert(*index, value.clone());
            vec![ListChange::Insert {
                index: pos,
                value: value.clone(),
            }]
        }
        ListChange::Delete { index } => {
            let pos = st.remove(*index);
            vec![ListChange::Delete { index: pos }]
        }
        ListChange::Update { index, value } => {
            let h_order = *st.by_source.get(*index).expect("source index in bounds");
            let pos = st.by_order.index_of(h_order);
            let cmp = &st.cmp;
            let len = st.by_order.len();
            let prev_ok = pos == 0
                || cmp(&st.by_order.get(pos - 1).expect("in bounds").value, value)
                    != Ordering::Greater;
            let next_ok = pos + 1 >= len
                || cmp(value, &st.by_order.get(pos + 1).expect("in bounds").value)
                    != Ordering::Greater;
            if prev_ok && next_ok {
                // Sort key did not move; refresh in place.
                st.by_order.value_mut(h_order).value = value.clone();
                vec![ListChange::Update {
                    index: pos,
                    value: value.clone(),
                }]
            } else {
                // Delete-then-reinsert at the new position.
                st.by_order.remove_at(pos);
                let cmp = &st.cmp;
                let new_pos = st
                    .by_order
                    .partition_point(|e| cmp(&e.value, value) != Ordering::Greater);
                let h_new = st.by_order.insert_at(
                    new_pos,
                    Entry {
                        value: value.clone(),
                        source: None,
                    },
                );
                let h_source = st.by_source.node_at(*index);
                *st.by_source.value_mut(h_source) = h_new;
                st.by_order.value_mut(h_new).source = Some(h_source);
                vec![
                    ListChange::Delete { index: pos },
                    ListChange::Insert {
                        index: new_pos,
                        value: value.clone(),
                    },
                ]
            }
        }
    }
}

/// Absorb a reorder from the source: the comparator order is unaffected,
/// only the source-order tree is rebuilt to the permutation. Ties settle
/// in permutation order; nothing is emitted downstream.
pub(crate) fn absorb_reorder<T>(p: &mut Pipeline<T>, view: ViewId, perm: &[usize]) {
    let st = state_mut(p, view);
    let old: Vec<NodeId> = st.by_source.iter().copied().collect();
    debug_assert_eq!(old.len(), perm.len());
    let mut reordered: Vec<Option<NodeId>> = vec![None; old.len()];
    for (j, h) in old.into_iter().enumerate() {
        reordered[perm[j]] = Some(h);
    }
    st.by_source.clear();
    for (k, h_order) in reordered.into_iter().enumerate() {
        let h_order = h_order.expect("permutation is total");
        let h_source = st.by_source.insert_at(k, h_order);
        st.by_order.value_mut(h_order).source = Some(h_source);
    }
}

/// Rebuild the order under a new comparator. Returns the permutation
/// (`perm[old] == new`) the caller publishes; empty when the view is empty.
pub(crate) fn resort<T: Clone>(
    p: &mut Pipeline<T>,
    view: ViewId,
    cmp: Comparator<T>,
) -> Vec<usize> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("resort", view = view.0).entered();

    let st = state_mut(p, view);
    st.cmp = cmp;
    let n = st.by_order.len();
    if n == 0 {
        return Vec::new();
    }
    // Old order positions, each with its element and source handle.
    let old: Vec<(T, NodeId)> = st
        .by_order
        .iter()
        .map(|e| (e.value.clone(), e.source.expect("entry linked")))
        .collect();
    let mut order: Vec<usize> = (0..n).collect();
    let cmp = std::sync::Arc::clone(&st.cmp);
    order.sort_by(|&a, &b| cmp(&old[a].0, &old[b].0));

    let mut perm = vec![0usize; n];
    for (new, &o) in order.iter().enumerate() {
        perm[o] = new;
    }

    st.by_order.clear();
    for (new, &o) in order.iter().enumerate() {
        let (value, h_source) = (&old[o].0, old[o].1);
        let h_order = st.by_order.insert_at(
            new,
            Entry {
                value: value.clone(),
                source: Some(h_source),
            },
        );
        *st.by_source.value_mut(h_source) = h_order;
    }
    perm
}
