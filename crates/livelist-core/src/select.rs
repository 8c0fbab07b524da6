//! Selection: two mirror facet views over one barcode.
//!
//! The controller is a pass-through mirror of its source that owns the
//! selection state; Black marks selected positions. The selected and
//! deselected facets are live views over the same barcode, one per
//! colour. Inverting the selection relabels the colours in O(1): the
//! facet batches describe the membership change, the structure itself is
//! untouched.
//!
//! During propagation the controller translates each source change into
//! facet changes and stages them; the facets, which are its dependents,
//! pick their staged changes up in the same transaction.

use crate::event::{ChangeBatch, ListChange};
use crate::pipeline::{Pipeline, ViewId, ViewKind};
use index_forest::{Barcode, Color};

const SELECTED: Color = Color::Black;

fn facet_color(selected: bool) -> Color {
    if selected {
        SELECTED
    } else {
        SELECTED.other()
    }
}

pub(crate) struct SelectionState<T> {
    /// Black marks selected positions.
    pub barcode: Barcode,
    pub selected_facet: Option<ViewId>,
    pub deselected_facet: Option<ViewId>,
    pending_selected: Option<ChangeBatch<T>>,
    pending_deselected: Option<ChangeBatch<T>>,
}

pub(crate) fn build<T>(len: usize) -> SelectionState<T> {
    let mut barcode = Barcode::new();
    for i in 0..len {
        barcode.insert(i, facet_color(false));
    }
    SelectionState {
        barcode,
        selected_facet: None,
        deselected_facet: None,
        pending_selected: None,
        pending_deselected: None,
    }
}

fn state<T>(p: &Pipeline<T>, controller: ViewId) -> &SelectionState<T> {
    match p.kind(controller) {
        ViewKind::Selection(st) => st,
        _ => unreachable!("view is a selection controller"),
    }
}

fn state_mut<T>(p: &mut Pipeline<T>, controller: ViewId) -> &mut SelectionState<T> {
    match p.kind_mut(controller) {
        ViewKind::Selection(st) => st,
        _ => unreachable!("view is a selection controller"),
    }
}

pub(crate) fn facet_len<T>(p: &Pipeline<T>, controller: ViewId, selected: bool) -> usize {
    state(p, controller).barcode.color_size(facet_color(selected))
}

pub(crate) fn facet_natural<T>(
    p: &Pipeline<T>,
    controller: ViewId,
    selected: bool,
    index: usize,
) -> Option<usize> {
    let st = state(p, controller);
    let color = facet_color(selected);
    if index >= st.barcode.color_size(color) {
        return None;
    }
    Some(st.barcode.natural_index_of(index, color))
}

pub(crate) fn is_selected<T>(p: &Pipeline<T>, controller: ViewId, natural: usize) -> bool {
    state(p, controller).barcode.get(natural) == SELECTED
}

fn stage<T>(st: &mut SelectionState<T>, selected_side: bool, change: ListChange<T>) {
    let pending = if selected_side {
        &mut st.pending_selected
    } else {
        &mut st.pending_deselected
    };
    match pending {
        Some(ChangeBatch::Edits(edits)) => edits.push(change),
        None => *pending = Some(ChangeBatch::Edits(vec![change])),
        Some(ChangeBatch::Reorder(_)) => {
            unreachable!("a facet stages one batch kind per transaction")
        }
    }
}

/// Controller translation: partition the source change onto the facets and
/// mirror it downstream unchanged.
pub(crate) fn apply_change<T: Clone>(
    p: &mut Pipeline<T>,
    controller: ViewId,
    change: &ListChange<T>,
) -> Vec<ListChange<T>> {
    let st = state_mut(p, controller);
    match change {
        ListChange::Insert { index, value } => {
            // New elements start deselected.
            let i = *index;
            st.barcode.insert(i, facet_color(false));
            let k = st
                .barcode
                .compressed_index_of(i, facet_color(false))
                .expect("just inserted");
            stage(
                st,
                false,
                ListChange::Insert {
                    index: k,
                    value: value.clone(),
                },
            );
        }
        ListChange::Delete { index } => {
            let i = *index;
            let color = st.barcode.get(i);
            let k = st
                .barcode
                .compressed_index_of(i, color)
                .expect("own colour is present");
            st.barcode.remove(i);
            stage(st, color == SELECTED, ListChange::Delete { index: k });
        }
        ListChange::Update { index, value } => {
            let i = *index;
            let color = st.barcode.get(i);
            let k = st
                .barcode
                .compressed_index_of(i, color)
                .expect("own colour is present");
            stage(
                st,
                color == SELECTED,
                ListChange::Update {
                    index: k,
                    value: value.clone(),
                },
            );
        }
    }
    vec![change.clone()]
}

/// Controller reorder: both compressed mappings are rebuilt from the
/// permutation before the per-facet permutations are derived, since every
/// position's identity moves, so node-by-node translation is impossible.
pub(crate) fn apply_reorder<T>(p: &mut Pipeline<T>, controller: ViewId, perm: &[usize]) -> Vec<usize> {
    let st = state_mut(p, controller);
    let n = st.barcode.len();
    debug_assert_eq!(n, perm.len());
    let old_colors: Vec<Color> = (0..n).map(|i| st.barcode.get(i)).collect();

    let mut new_colors = vec![facet_color(false); n];
    for (j, c) in old_colors.iter().enumerate() {
        new_colors[perm[j]] = *c;
    }
    let mut barcode = Barcode::new();
    for (i, c) in new_colors.iter().enumerate() {
        barcode.insert(i, *c);
    }

    let mut sel_perm = Vec::with_capacity(st.barcode.color_size(SELECTED));
    let mut desel_perm = Vec::with_capacity(n);
    for (j, c) in old_colors.iter().enumerate() {
        let new_k = barcode
            .compressed_index_of(perm[j], *c)
            .expect("colour carried over");
        if *c == SELECTED {
            sel_perm.push(new_k);
        } else {
            desel_perm.push(new_k);
        }
    }
    st.barcode = barcode;
    st.pending_selected = if sel_perm.is_empty() {
        None
    } else {
        Some(ChangeBatch::Reorder(sel_perm))
    };
    st.pending_deselected = if desel_perm.is_empty() {
        None
    } else {
        Some(ChangeBatch::Reorder(desel_perm))
    };
    perm.to_vec()
}

/// Facet pickup during edit propagation.
pub(crate) fn take_facet_pending<T>(p: &mut Pipeline<T>, facet: ViewId) -> Vec<ListChange<T>> {
    match take_facet_pending_batch(p, facet) {
        Some(ChangeBatch::Edits(edits)) => edits,
        Some(ChangeBatch::Reorder(_)) => unreachable!("edit transaction staged a reorder"),
        None => vec![],
    }
}

pub(crate) fn take_facet_pending_batch<T>(
    p: &mut Pipeline<T>,
    facet: ViewId,
) -> Option<ChangeBatch<T>> {
    let (controller, selected) = match p.kind(facet) {
        ViewKind::Facet {
            selection,
            selected,
        } => (*selection, *selected),
        _ => unreachable!("view is a facet"),
    };
    let st = state_mut(p, controller);
    if selected {
        st.pending_selected.take()
    } else {
        st.pending_deselected.take()
    }
}

// ── membership operations (invoked via the pipeline) ─────────────────

type Origins<T> = Vec<(ViewId, ChangeBatch<T>)>;

fn facets<T>(st: &SelectionState<T>) -> (ViewId, ViewId) {
    (
        st.selected_facet.expect("facets wired at construction"),
        st.deselected_facet.expect("facets wired at construction"),
    )
}

/// Select or deselect one element. Returns the facet batches to publish;
/// empty when the membership already matched.
pub(crate) fn set_membership<T: Clone>(
    p: &mut Pipeline<T>,
    controller: ViewId,
    natural: usize,
    selected: bool,
) -> Origins<T> {
    let len = p.len(controller);
    assert!(natural < len, "index {natural} out of bounds ({len})");
    let value = p.get(controller, natural).expect("in bounds").clone();
    let st = state_mut(p, controller);
    let target = facet_color(selected);
    if st.barcode.get(natural) == target {
        return Vec::new();
    }
    let from_k = st
        .barcode
        .compressed_index_of(natural, target.other())
        .expect("own colour is present");
    st.barcode.set_color(natural, target);
    let to_k = st
        .barcode
        .compressed_index_of(natural, target)
        .expect("just recoloured");
    let (sel, desel) = facets(st);
    let (from_facet, to_facet) = if selected { (desel, sel) } else { (sel, desel) };
    vec![
        (
            from_facet,
            ChangeBatch::Edits(vec![ListChange::Delete { index: from_k }]),
        ),
        (
            to_facet,
            ChangeBatch::Edits(vec![ListChange::Insert {
                index: to_k,
                value,
            }]),
        ),
    ]
}

/// Select or deselect everything. The batch moves each affected element;
/// untouched elements stay unannounced.
pub(crate) fn set_all<T: Clone>(
    p: &mut Pipeline<T>,
    controller: ViewId,
    selected: bool,
) -> Origins<T> {
    let target = facet_color(selected);
    let naturals: Vec<usize> = {
        let st = state(p, controller);
        let other = target.other();
        (0..st.barcode.color_size(other))
            .map(|k| st.barcode.natural_index_of(k, other))
            .collect()
    };
    if naturals.is_empty() {
        return Vec::new();
    }
    let moved: Vec<(usize, T)> = naturals
        .into_iter()
        .map(|natural| {
            let value = p.get(controller, natural).expect("in bounds").clone();
            (natural, value)
        })
        .collect();
    let st = state_mut(p, controller);
    for (natural, _) in &moved {
        st.barcode.set_color(*natural, target);
    }
    let (sel, desel) = facets(st);
    let (from_facet, to_facet) = if selected { (desel, sel) } else { (sel, desel) };

    // Ascending removals always hit the head of the shrinking facet;
    // ascending insertions land at their final positions.
    let deletes = ChangeBatch::Edits(
        (0..moved.len())
            .map(|_| ListChange::Delete { index: 0 })
            .collect(),
    );
    let inserts = ChangeBatch::Edits(
        moved
            .iter()
            .map(|(natural, value)| {
                let k = st
                    .barcode
                    .compressed_index_of(*natural, target)
                    .expect("just recoloured");
                ListChange::Insert {
                    index: k,
                    value: value.clone(),
                }
            })
            .collect(),
    );
    vec![(from_facet, deletes), (to_facet, inserts)]
}

/// Swap the two facets wholesale. The barcode inverts in O(1); the facet
/// batches republish both contents.
pub(crate) fn invert<T: Clone>(p: &mut Pipeline<T>, controller: ViewId) -> Origins<T> {
    let (old_selected, old_deselected) = {
        let st = state(p, controller);
        (
            st.barcode.color_size(SELECTED),
            st.barcode.color_size(SELECTED.other()),
        )
    };
    let st = state_mut(p, controller);
    st.barcode.invert();
    let (sel, desel) = facets(st);

    let mut origins: Origins<T> = Vec::new();
    let new_selected = p.snapshot(sel);
    let new_deselected = p.snapshot(desel);

    let mut sel_edits: Vec<ListChange<T>> = (0..old_selected)
        .map(|_| ListChange::Delete { index: 0 })
        .collect();
    sel_edits.extend(
        new_selected
            .into_iter()
            .enumerate()
            .map(|(k, value)| ListChange::Insert { index: k, value }),
    );
    let mut desel_edits: Vec<ListChange<T>> = (0..old_deselected)
        .map(|_| ListChange::Delete { index: 0 })
        .collect();
    desel_edits.extend(
        new_deselected
            .into_iter()
            .enumerate()
            .map(|(k, value)| ListChange::Insert { index: k, value }),
    );
    if !sel_edits.is_empty() {
        origins.push((sel, ChangeBatch::Edits(sel_edits)));
    }
    if !desel_edits.is_empty() {
        origins.push((desel, ChangeBatch::Edits(desel_edits)));
    }
    origins
}
