//! The view graph: one arena of collections, addressed by [`ViewId`].
//!
//! Every derived view holds exactly one source and is listed in that
//! source's dependents. Mutations enter at a root collection and propagate
//! change-by-change through the graph: each view translates an incoming
//! change against its progressively mutated state, applies it, and its own
//! emissions are forwarded to its dependents before the next change
//! arrives. External listeners fire only after the whole graph has
//! settled, so no listener can observe an inconsistent upstream/downstream
//! pair.
//!
//! The transformation kinds form a closed set dispatched here rather than
//! an open subclass hierarchy; parent/child references are arena indices
//! rather than owning pointers.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::dedup::{self, DedupState};
use crate::error::ListError;
use crate::event::{BatchBuilder, ChangeBatch, ListChange};
use crate::filter::{self, FilterState};
use crate::relay::{self, RelayPort, RelayState};
use crate::select::{self, SelectionState};
use crate::sorted::{self, SortedState};
use index_forest::Color;

/// Handle to one collection in the graph. Slots are never reused, so a
/// stale handle names a disposed view rather than an unrelated one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewId(pub(crate) u32);

/// Ordering rule for sorted and deduplicating views.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Membership rule for filter views.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Registered change listener. Listeners receive the settled pipeline, the
/// view the batch belongs to, and the batch itself. A listener cannot
/// mutate the pipeline (it only sees `&Pipeline`) and cannot remove itself
/// while it is being dispatched. `Send + Sync` so a pipeline can sit
/// behind a shared reader/writer lock.
pub type Listener<T> = Box<dyn FnMut(&Pipeline<T>, ViewId, &ChangeBatch<T>) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// The live views created by [`Pipeline::selection`].
#[derive(Clone, Copy, Debug)]
pub struct SelectionViews {
    /// Pass-through mirror of the source that owns the selection state.
    pub controller: ViewId,
    /// Live view of the selected elements.
    pub selected: ViewId,
    /// Live mirror view of the deselected elements.
    pub deselected: ViewId,
}

pub(crate) enum ViewKind<T> {
    Root { items: Vec<T> },
    Sorted(SortedState<T>),
    Dedup(DedupState<T>),
    Filter(FilterState<T>),
    Selection(SelectionState<T>),
    Facet { selection: ViewId, selected: bool },
    Relay(RelayState<T>),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Tag {
    Root,
    Sorted,
    Dedup,
    Filter,
    Selection,
    Facet,
    Relay,
}

pub(crate) struct ViewSlot<T> {
    pub(crate) source: Option<ViewId>,
    pub(crate) dependents: Vec<ViewId>,
    listeners: Vec<(u64, Listener<T>)>,
    next_listener: u64,
    pub(crate) kind: ViewKind<T>,
}

struct ActiveBatch<T> {
    root: ViewId,
    builder: BatchBuilder<T>,
}

/// Arena of collections plus the in-flight batch, if any.
pub struct Pipeline<T> {
    slots: Vec<Option<ViewSlot<T>>>,
    active: Option<ActiveBatch<T>>,
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pipeline<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            active: None,
        }
    }

    fn slot(&self, view: ViewId) -> &ViewSlot<T> {
        self.slots
            .get(view.0 as usize)
            .and_then(Option::as_ref)
            .expect("operating on a disposed view")
    }

    fn slot_mut(&mut self, view: ViewId) -> &mut ViewSlot<T> {
        self.slots
            .get_mut(view.0 as usize)
            .and_then(Option::as_mut)
            .expect("operating on a disposed view")
    }

    pub(crate) fn kind(&self, view: ViewId) -> &ViewKind<T> {
        &self.slot(view).kind
    }

    pub(crate) fn kind_mut(&mut self, view: ViewId) -> &mut ViewKind<T> {
        &mut self.slot_mut(view).kind
    }

    pub(crate) fn source_of(&self, view: ViewId) -> ViewId {
        self.slot(view).source.expect("view has a source")
    }

    fn tag(&self, view: ViewId) -> Tag {
        match &self.slot(view).kind {
            ViewKind::Root { .. } => Tag::Root,
            ViewKind::Sorted(_) => Tag::Sorted,
            ViewKind::Dedup(_) => Tag::Dedup,
            ViewKind::Filter(_) => Tag::Filter,
            ViewKind::Selection(_) => Tag::Selection,
            ViewKind::Facet { .. } => Tag::Facet,
            ViewKind::Relay(_) => Tag::Relay,
        }
    }

    /// The source collection of a derived view, `None` for a root. A
    /// deduplicating view reports its hidden sorted stage.
    pub fn source(&self, view: ViewId) -> Option<ViewId> {
        self.slot(view).source
    }

    pub fn is_disposed(&self, view: ViewId) -> bool {
        self.slots
            .get(view.0 as usize)
            .map_or(true, Option::is_none)
    }

    fn attach(&mut self, source: Option<ViewId>, kind: ViewKind<T>) -> ViewId {
        let id = ViewId(self.slots.len() as u32);
        self.slots.push(Some(ViewSlot {
            source,
            dependents: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            kind,
        }));
        if let Some(s) = source {
            self.slot_mut(s).dependents.push(id);
        }
        id
    }

    /// Unlink `view` from the graph. Idempotent; a second call is a no-op.
    /// Disposing a view that still has live dependents is a usage fault:
    /// a view must not outlive its source.
    pub fn dispose(&mut self, view: ViewId) {
        let Some(slot) = self.slots.get(view.0 as usize).and_then(Option::as_ref) else {
            return;
        };
        assert!(
            slot.dependents.is_empty(),
            "dispose: view still has live dependents"
        );
        let slot = self.slots[view.0 as usize].take().expect("checked above");
        if let Some(s) = slot.source {
            self.slot_mut(s).dependents.retain(|d| *d != view);
        }
        // A deduplicating view owns its hidden sorted stage.
        if let (ViewKind::Dedup(_), Some(hidden)) = (&slot.kind, slot.source) {
            self.dispose(hidden);
        }
    }

    // ── listener registry ────────────────────────────────────────────

    pub fn subscribe(
        &mut self,
        view: ViewId,
        listener: impl FnMut(&Pipeline<T>, ViewId, &ChangeBatch<T>) + Send + Sync + 'static,
    ) -> ListenerId {
        let slot = self.slot_mut(view);
        let id = slot.next_listener;
        slot.next_listener += 1;
        slot.listeners.push((id, Box::new(listener)));
        ListenerId(id)
    }

    pub fn unsubscribe(&mut self, view: ViewId, id: ListenerId) -> bool {
        let slot = self.slot_mut(view);
        let before = slot.listeners.len();
        slot.listeners.retain(|(lid, _)| *lid != id.0);
        slot.listeners.len() != before
    }
}

impl<T: Clone> Pipeline<T> {
    // ── factories ────────────────────────────────────────────────────

    /// Create a root collection seeded with `items`.
    pub fn root(&mut self, items: Vec<T>) -> ViewId {
        self.attach(None, ViewKind::Root { items })
    }

    /// Sorted view over `source`, ordered by `cmp`. Equal elements keep
    /// their source order on initial build and insert after their equals.
    pub fn sorted(
        &mut self,
        source: ViewId,
        cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> ViewId {
        let cmp: Comparator<T> = Arc::new(cmp);
        let seed = self.snapshot(source);
        let state = sorted::build(seed, cmp);
        self.attach(Some(source), ViewKind::Sorted(state))
    }

    /// Deduplicating view over `source`: one element per run of
    /// comparator-equal elements, in comparator order. Layers a hidden
    /// sorted stage under itself, which it owns and disposes with itself.
    pub fn dedup(
        &mut self,
        source: ViewId,
        cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) -> ViewId {
        let cmp: Comparator<T> = Arc::new(cmp);
        let hidden = {
            let cmp = Arc::clone(&cmp);
            let seed = self.snapshot(source);
            let state = sorted::build(seed, cmp);
            self.attach(Some(source), ViewKind::Sorted(state))
        };
        let seed = self.snapshot(hidden);
        let state = dedup::build(seed, cmp);
        self.attach(Some(hidden), ViewKind::Dedup(state))
    }

    /// Filter view over `source`, keeping the elements `pred` accepts, in
    /// source order.
    pub fn filter(
        &mut self,
        source: ViewId,
        pred: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> ViewId {
        let pred: Predicate<T> = Arc::new(pred);
        let seed = self.snapshot(source);
        let state = filter::build(seed, pred);
        self.attach(Some(source), ViewKind::Filter(state))
    }

    /// Selection over `source`: a controller mirroring the source plus two
    /// live facet views. New elements start deselected.
    pub fn selection(&mut self, source: ViewId) -> SelectionViews {
        let len = self.len(source);
        let controller = self.attach(
            Some(source),
            ViewKind::Selection(select::build(len)),
        );
        let selected = self.attach(
            Some(controller),
            ViewKind::Facet {
                selection: controller,
                selected: true,
            },
        );
        let deselected = self.attach(
            Some(controller),
            ViewKind::Facet {
                selection: controller,
                selected: false,
            },
        );
        if let ViewKind::Selection(state) = self.kind_mut(controller) {
            state.selected_facet = Some(selected);
            state.deselected_facet = Some(deselected);
        }
        SelectionViews {
            controller,
            selected,
            deselected,
        }
    }

    /// Thread-confinement relay over `source`. Batches arriving on
    /// `designated` dispatch to the port's subscribers synchronously;
    /// batches from any other thread are queued until the designated
    /// thread calls [`RelayPort::pump`], in arrival order.
    pub fn relay(
        &mut self,
        source: ViewId,
        designated: std::thread::ThreadId,
    ) -> (ViewId, RelayPort<T>) {
        let (state, port) = relay::build(designated);
        let view = self.attach(Some(source), ViewKind::Relay(state));
        (view, port)
    }

    // ── reads ────────────────────────────────────────────────────────

    pub fn len(&self, view: ViewId) -> usize {
        match self.kind(view) {
            ViewKind::Root { items } => items.len(),
            ViewKind::Sorted(st) => st.by_order.len(),
            ViewKind::Dedup(st) => st.barcode.color_size(Color::Black),
            ViewKind::Filter(st) => st.barcode.color_size(Color::Black),
            ViewKind::Selection(_) | ViewKind::Relay(_) => self.len(self.source_of(view)),
            ViewKind::Facet {
                selection,
                selected,
            } => select::facet_len(self, *selection, *selected),
        }
    }

    pub fn is_empty(&self, view: ViewId) -> bool {
        self.len(view) == 0
    }

    pub fn get(&self, view: ViewId, index: usize) -> Option<&T> {
        match self.kind(view) {
            ViewKind::Root { items } => items.get(index),
            ViewKind::Sorted(st) => st.by_order.get(index).map(|e| &e.value),
            ViewKind::Dedup(st) => {
                if index >= st.barcode.color_size(Color::Black) {
                    return None;
                }
                let natural = st.barcode.natural_index_of(index, Color::Black);
                self.get(self.source_of(view), natural)
            }
            ViewKind::Filter(st) => {
                if index >= st.barcode.color_size(Color::Black) {
                    return None;
                }
                let natural = st.barcode.natural_index_of(index, Color::Black);
                self.get(self.source_of(view), natural)
            }
            ViewKind::Selection(_) | ViewKind::Relay(_) => {
                self.get(self.source_of(view), index)
            }
            ViewKind::Facet {
                selection,
                selected,
            } => {
                let natural = select::facet_natural(self, *selection, *selected, index)?;
                self.get(self.source_of(*selection), natural)
            }
        }
    }

    /// Clone the current contents, in view order.
    pub fn snapshot(&self, view: ViewId) -> Vec<T> {
        (0..self.len(view))
            .map(|i| self.get(view, i).expect("index within len").clone())
            .collect()
    }

    // ── writes ───────────────────────────────────────────────────────

    /// Open an explicit batch on a root collection. Nestable; only the
    /// outermost commit flushes.
    pub fn begin(&mut self, root: ViewId) {
        assert!(
            matches!(self.kind(root), ViewKind::Root { .. }),
            "batches begin at a root collection"
        );
        match &mut self.active {
            Some(active) => {
                assert!(
                    active.root == root,
                    "a different root already has an open batch"
                );
                active.builder.begin();
            }
            None => {
                let len = self.len(root);
                let mut builder = BatchBuilder::new(len);
                builder.begin();
                self.active = Some(ActiveBatch { root, builder });
            }
        }
    }

    /// Close one batch level; the outermost close publishes the batch
    /// atomically to the whole graph.
    pub fn commit(&mut self, root: ViewId) {
        let active = self.active.as_mut().expect("commit without begin");
        assert!(active.root == root, "commit targets a different root");
        if active.builder.commit() {
            let batch = active.builder.take_batch();
            self.active = None;
            if let Some(batch) = batch {
                self.dispatch(root, batch);
            }
        }
    }

    /// Insert `value` at `index` of `view`. On comparator-ordered views
    /// the index is advisory: the element is appended to the root and the
    /// comparator decides its position.
    pub fn insert(&mut self, view: ViewId, index: usize, value: T) -> Result<(), ListError> {
        let (root, ri) = self.resolve_insert(view, index)?;
        if let ViewKind::Root { items } = self.kind_mut(root) {
            items.insert(ri, value.clone());
        }
        self.record(root, ListChange::Insert { index: ri, value });
        Ok(())
    }

    /// Append `value`.
    pub fn push(&mut self, view: ViewId, value: T) {
        let len = self.len(view);
        self.insert(view, len, value)
            .expect("append is always in bounds");
    }

    /// Replace the element at `index`, returning the old value.
    pub fn set(&mut self, view: ViewId, index: usize, value: T) -> Result<T, ListError> {
        let (root, ri) = self.resolve_existing(view, index)?;
        let old = match self.kind_mut(root) {
            ViewKind::Root { items } => std::mem::replace(&mut items[ri], value.clone()),
            _ => unreachable!("resolve_existing terminates at a root"),
        };
        self.record(root, ListChange::Update { index: ri, value });
        Ok(old)
    }

    /// Remove and return the element at `index`.
    pub fn remove(&mut self, view: ViewId, index: usize) -> Result<T, ListError> {
        let (root, ri) = self.resolve_existing(view, index)?;
        let old = match self.kind_mut(root) {
            ViewKind::Root { items } => items.remove(ri),
            _ => unreachable!("resolve_existing terminates at a root"),
        };
        self.record(root, ListChange::Delete { index: ri });
        Ok(old)
    }

    /// Map an insertion position on `view` down to a root position.
    fn resolve_insert(&self, view: ViewId, index: usize) -> Result<(ViewId, usize), ListError> {
        let mut v = view;
        let mut i = index;
        loop {
            let slot = self.slot(v);
            match &slot.kind {
                ViewKind::Root { items } => {
                    if i > items.len() {
                        return Err(ListError::oob(i, items.len()));
                    }
                    return Ok((v, i));
                }
                ViewKind::Sorted(_) | ViewKind::Dedup(_) => {
                    let src = slot.source.expect("view has a source");
                    i = self.len(src);
                    v = src;
                }
                ViewKind::Filter(st) => {
                    let size = st.barcode.color_size(Color::Black);
                    if i > size {
                        return Err(ListError::oob(i, size));
                    }
                    let src = slot.source.expect("view has a source");
                    i = if i == size {
                        self.len(src)
                    } else {
                        st.barcode.natural_index_of(i, Color::Black)
                    };
                    v = src;
                }
                ViewKind::Facet {
                    selection,
                    selected,
                } => {
                    let size = select::facet_len(self, *selection, *selected);
                    if i > size {
                        return Err(ListError::oob(i, size));
                    }
                    i = if i == size {
                        self.len(*selection)
                    } else {
                        select::facet_natural(self, *selection, *selected, i)
                            .expect("checked bounds")
                    };
                    v = *selection;
                }
                ViewKind::Selection(_) | ViewKind::Relay(_) => {
                    v = slot.source.expect("view has a source");
                }
            }
        }
    }

    /// Map an existing position on `view` down to its root position.
    fn resolve_existing(&self, view: ViewId, index: usize) -> Result<(ViewId, usize), ListError> {
        let mut v = view;
        let mut i = index;
        loop {
            let slot = self.slot(v);
            match &slot.kind {
                ViewKind::Root { items } => {
                    if i >= items.len() {
                        return Err(ListError::oob(i, items.len()));
                    }
                    return Ok((v, i));
                }
                ViewKind::Sorted(st) => {
                    if i >= st.by_order.len() {
                        return Err(ListError::oob(i, st.by_order.len()));
                    }
                    let handle = st.by_order.node_at(i);
                    let src_handle = st.by_order.value(handle).source.expect("entry linked");
                    i = st.by_source.index_of(src_handle);
                    v = slot.source.expect("view has a source");
                }
                ViewKind::Dedup(st) => {
                    let size = st.barcode.color_size(Color::Black);
                    if i >= size {
                        return Err(ListError::oob(i, size));
                    }
                    i = st.barcode.natural_index_of(i, Color::Black);
                    v = slot.source.expect("view has a source");
                }
                ViewKind::Filter(st) => {
                    let size = st.barcode.color_size(Color::Black);
                    if i >= size {
                        return Err(ListError::oob(i, size));
                    }
                    i = st.barcode.natural_index_of(i, Color::Black);
                    v = slot.source.expect("view has a source");
                }
                ViewKind::Facet {
                    selection,
                    selected,
                } => {
                    let size = select::facet_len(self, *selection, *selected);
                    if i >= size {
                        return Err(ListError::oob(i, size));
                    }
                    i = select::facet_natural(self, *selection, *selected, i)
                        .expect("checked bounds");
                    v = *selection;
                }
                ViewKind::Selection(_) | ViewKind::Relay(_) => {
                    v = slot.source.expect("view has a source");
                }
            }
        }
    }

    fn record(&mut self, root: ViewId, change: ListChange<T>) {
        if let Some(active) = self.active.as_mut() {
            assert!(
                active.root == root,
                "edit targets a root different from the open batch"
            );
            match change {
                ListChange::Insert { index, value } => active.builder.insert(index, value),
                ListChange::Update { index, value } => active.builder.update(index, value),
                ListChange::Delete { index } => active.builder.delete(index),
            }
        } else {
            self.dispatch(root, ChangeBatch::Edits(vec![change]));
        }
    }

    // ── reconfiguration ──────────────────────────────────────────────

    /// Swap the comparator of a sorted view (or of the hidden stage of a
    /// deduplicating view). Rebuilds the order in O(n log n) and publishes
    /// one reorder batch.
    pub fn set_comparator(
        &mut self,
        view: ViewId,
        cmp: impl Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    ) {
        assert!(self.active.is_none(), "cannot resort during an open batch");
        let cmp: Comparator<T> = Arc::new(cmp);
        let target = match self.tag(view) {
            Tag::Sorted => view,
            Tag::Dedup => {
                let hidden = self.source_of(view);
                if let ViewKind::Dedup(st) = self.kind_mut(view) {
                    st.cmp = Arc::clone(&cmp);
                }
                hidden
            }
            _ => panic!("set_comparator on a view without an order"),
        };
        let perm = sorted::resort(self, target, cmp);
        if !perm.is_empty() {
            self.dispatch(target, ChangeBatch::Reorder(perm));
        }
    }

    /// Swap the predicate of a filter view, publishing the membership
    /// differences as a single batch.
    pub fn set_predicate(
        &mut self,
        view: ViewId,
        pred: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) {
        assert!(
            self.active.is_none(),
            "cannot change a predicate during an open batch"
        );
        assert!(
            matches!(self.kind(view), ViewKind::Filter(_)),
            "set_predicate on a non-filter view"
        );
        let pred: Predicate<T> = Arc::new(pred);
        let edits = filter::reapply(self, view, pred);
        if !edits.is_empty() {
            self.dispatch(view, ChangeBatch::Edits(edits));
        }
    }

    // ── selection operations ─────────────────────────────────────────

    pub fn is_selected(&self, controller: ViewId, natural: usize) -> bool {
        select::is_selected(self, controller, natural)
    }

    /// Mark the element at `natural` selected. Returns `false` when it
    /// already was.
    pub fn select(&mut self, controller: ViewId, natural: usize) -> bool {
        let origins = select::set_membership(self, controller, natural, true);
        self.dispatch_origins(origins)
    }

    /// Mark the element at `natural` deselected. Returns `false` when it
    /// already was.
    pub fn deselect(&mut self, controller: ViewId, natural: usize) -> bool {
        let origins = select::set_membership(self, controller, natural, false);
        self.dispatch_origins(origins)
    }

    pub fn select_all(&mut self, controller: ViewId) -> bool {
        let origins = select::set_all(self, controller, true);
        self.dispatch_origins(origins)
    }

    pub fn deselect_all(&mut self, controller: ViewId) -> bool {
        let origins = select::set_all(self, controller, false);
        self.dispatch_origins(origins)
    }

    /// Swap the selected and deselected sets. The selection state flips in
    /// O(1); the facet batches describe the full membership change.
    pub fn invert_selection(&mut self, controller: ViewId) -> bool {
        let origins = select::invert(self, controller);
        self.dispatch_origins(origins)
    }

    fn dispatch_origins(&mut self, origins: Vec<(ViewId, ChangeBatch<T>)>) -> bool {
        if origins.iter().all(|(_, b)| b.is_empty()) {
            return false;
        }
        let mut settled: Vec<(ViewId, ChangeBatch<T>)> = Vec::new();
        for (view, batch) in origins {
            if batch.is_empty() {
                continue;
            }
            settled.push((view, batch.clone()));
            self.propagate(view, &batch, &mut settled);
        }
        self.finish(settled);
        true
    }

    // ── propagation ──────────────────────────────────────────────────

    fn dispatch(&mut self, origin: ViewId, batch: ChangeBatch<T>) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "dispatch_batch",
            origin = origin.0,
            ops = batch.op_count()
        )
        .entered();

        let mut settled = vec![(origin, batch.clone())];
        self.propagate(origin, &batch, &mut settled);
        self.finish(settled);
    }

    fn propagate(
        &mut self,
        view: ViewId,
        batch: &ChangeBatch<T>,
        settled: &mut Vec<(ViewId, ChangeBatch<T>)>,
    ) {
        match batch {
            ChangeBatch::Edits(edits) => {
                for change in edits {
                    self.propagate_change(view, change, settled);
                }
            }
            ChangeBatch::Reorder(perm) => self.propagate_reorder(view, perm, settled),
        }
    }

    /// Forward one change to every dependent of `view`. Each dependent
    /// applies it immediately and its own emissions continue downward
    /// before the next change arrives, so every view observes its source
    /// exactly in step.
    fn propagate_change(
        &mut self,
        view: ViewId,
        change: &ListChange<T>,
        settled: &mut Vec<(ViewId, ChangeBatch<T>)>,
    ) {
        let deps = self.slot(view).dependents.clone();
        for dep in deps {
            let outs = self.apply_change(dep, change);
            for out in outs {
                record_edit(settled, dep, out.clone());
                self.propagate_change(dep, &out, settled);
            }
        }
    }

    fn propagate_reorder(
        &mut self,
        view: ViewId,
        perm: &[usize],
        settled: &mut Vec<(ViewId, ChangeBatch<T>)>,
    ) {
        let deps = self.slot(view).dependents.clone();
        for dep in deps {
            match self.apply_reorder(dep, perm) {
                ReorderOut::Absorbed => {}
                ReorderOut::Perm(p2) => {
                    record_perm(settled, dep, p2.clone());
                    self.propagate_reorder(dep, &p2, settled);
                }
                ReorderOut::Edits(ops) => {
                    for op in ops {
                        record_edit(settled, dep, op.clone());
                        self.propagate_change(dep, &op, settled);
                    }
                }
            }
        }
    }

    fn apply_change(&mut self, view: ViewId, change: &ListChange<T>) -> Vec<ListChange<T>> {
        match self.tag(view) {
            Tag::Sorted => sorted::apply_change(self, view, change),
            Tag::Dedup => dedup::apply_change(self, view, change),
            Tag::Filter => filter::apply_change(self, view, change),
            Tag::Selection => select::apply_change(self, view, change),
            Tag::Facet => select::take_facet_pending(self, view),
            Tag::Relay => vec![change.clone()],
            Tag::Root => unreachable!("a root is never a dependent"),
        }
    }

    fn apply_reorder(&mut self, view: ViewId, perm: &[usize]) -> ReorderOut<T> {
        match self.tag(view) {
            Tag::Sorted => {
                sorted::absorb_reorder(self, view, perm);
                ReorderOut::Absorbed
            }
            Tag::Dedup => ReorderOut::Edits(dedup::rebuild_for_reorder(self, view)),
            Tag::Filter => ReorderOut::Perm(filter::apply_reorder(self, view, perm)),
            Tag::Selection => ReorderOut::Perm(select::apply_reorder(self, view, perm)),
            Tag::Facet => match select::take_facet_pending_batch(self, view) {
                Some(batch) => match batch {
                    ChangeBatch::Reorder(p) => ReorderOut::Perm(p),
                    ChangeBatch::Edits(ops) => ReorderOut::Edits(ops),
                },
                None => ReorderOut::Absorbed,
            },
            Tag::Relay => ReorderOut::Perm(perm.to_vec()),
            Tag::Root => unreachable!("a root is never a dependent"),
        }
    }

    /// Relay deliveries plus listener dispatch, after the graph settled.
    fn finish(&mut self, settled: Vec<(ViewId, ChangeBatch<T>)>) {
        for (view, batch) in &settled {
            if self.is_disposed(*view) {
                continue;
            }
            if let ViewKind::Relay(state) = self.kind(*view) {
                relay::deliver(state, batch);
            }
        }
        for (view, batch) in &settled {
            if self.is_disposed(*view) {
                continue;
            }
            let mut listeners = std::mem::take(&mut self.slot_mut(*view).listeners);
            for (_, listener) in listeners.iter_mut() {
                listener(&*self, *view, batch);
            }
            std::mem::swap(&mut self.slot_mut(*view).listeners, &mut listeners);
        }
    }
}

enum ReorderOut<T> {
    Absorbed,
    Perm(Vec<usize>),
    Edits(Vec<ListChange<T>>),
}

/// Append an edit to `view`'s accumulated batch, creating it on first
/// touch (which preserves settle order: a view is always touched after its
/// source).
fn record_edit<T>(
    settled: &mut Vec<(ViewId, ChangeBatch<T>)>,
    view: ViewId,
    change: ListChange<T>,
) {
    for (v, batch) in settled.iter_mut() {
        if *v == view {
            match batch {
                ChangeBatch::Edits(edits) => edits.push(change),
                ChangeBatch::Reorder(_) => {
                    unreachable!("a view emits one batch kind per transaction")
                }
            }
            return;
        }
    }
    settled.push((view, ChangeBatch::Edits(vec![change])));
}

fn record_perm<T>(settled: &mut Vec<(ViewId, ChangeBatch<T>)>, view: ViewId, perm: Vec<usize>) {
    debug_assert!(
        settled.iter().all(|(v, _)| *v != view),
        "a view emits at most one reorder per transaction"
    );
    settled.push((view, ChangeBatch::Reorder(perm)));
}
