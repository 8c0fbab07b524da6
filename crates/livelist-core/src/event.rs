//! Change batch vocabulary and the batch builder.
//!
//! A batch is the unit of notification: an ordered sequence of single-index
//! edits, or one reorder permutation, never both. Within a batch, indices
//! are interpreted against the collection as progressively mutated by the
//! prior edits of the same batch, not against a single snapshot.

/// One edit, carrying the affected value where one exists.
///
/// `Insert` and `Update` carry the (new) value so that derived views and
/// thread-confined consumers never have to read the source mid-batch.
/// `Delete` carries only the index; the removed value is returned to the
/// caller that performed the removal.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ListChange<T> {
    Insert { index: usize, value: T },
    Update { index: usize, value: T },
    Delete { index: usize },
}

impl<T> ListChange<T> {
    pub fn index(&self) -> usize {
        match self {
            ListChange::Insert { index, .. }
            | ListChange::Update { index, .. }
            | ListChange::Delete { index } => *index,
        }
    }
}

/// An atomic group of changes as published to listeners.
///
/// `Reorder` carries a permutation mapping old indices to new:
/// `perm[old] == new`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeBatch<T> {
    Edits(Vec<ListChange<T>>),
    Reorder(Vec<usize>),
}

impl<T> ChangeBatch<T> {
    pub fn is_empty(&self) -> bool {
        match self {
            ChangeBatch::Edits(edits) => edits.is_empty(),
            ChangeBatch::Reorder(perm) => perm.is_empty(),
        }
    }

    /// Number of operations carried.
    pub fn op_count(&self) -> usize {
        match self {
            ChangeBatch::Edits(edits) => edits.len(),
            ChangeBatch::Reorder(_) => 1,
        }
    }

    /// Net length change implied by the batch.
    pub fn size_delta(&self) -> isize {
        match self {
            ChangeBatch::Edits(edits) => edits
                .iter()
                .map(|e| match e {
                    ListChange::Insert { .. } => 1,
                    ListChange::Delete { .. } => -1,
                    ListChange::Update { .. } => 0,
                })
                .sum(),
            ChangeBatch::Reorder(_) => 0,
        }
    }
}

/// Accumulates one batch between `begin` and the matching outermost
/// `commit`. Nested begin/commit pairs flatten into the outer batch.
///
/// Every appended edit is validated against the running length the batch
/// implies so far; a bad index is a producer bug and fails fast.
#[derive(Debug)]
pub struct BatchBuilder<T> {
    depth: usize,
    running_len: usize,
    edits: Vec<ListChange<T>>,
    reorder: Option<Vec<usize>>,
}

impl<T> BatchBuilder<T> {
    /// `len` is the collection length at the moment the batch opens.
    pub fn new(len: usize) -> Self {
        Self {
            depth: 0,
            running_len: len,
            edits: Vec::new(),
            reorder: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn begin(&mut self) {
        self.depth += 1;
    }

    /// Close one nesting level. Returns `true` when the outermost level
    /// closed and the accumulated batch is ready to flush.
    pub fn commit(&mut self) -> bool {
        assert!(self.depth > 0, "commit without a matching begin");
        self.depth -= 1;
        self.depth == 0
    }

    fn assert_recording(&self) {
        assert!(self.depth > 0, "edit recorded outside begin/commit");
        assert!(
            self.reorder.is_none(),
            "a reorder batch cannot also carry edits"
        );
    }

    pub fn insert(&mut self, index: usize, value: T) {
        self.assert_recording();
        assert!(
            index <= self.running_len,
            "insert index {index} out of running bounds ({})",
            self.running_len
        );
        self.edits.push(ListChange::Insert { index, value });
        self.running_len += 1;
    }

    pub fn update(&mut self, index: usize, value: T) {
        self.assert_recording();
        assert!(
            index < self.running_len,
            "update index {index} out of running bounds ({})",
            self.running_len
        );
        self.edits.push(ListChange::Update { index, value });
    }

    pub fn delete(&mut self, index: usize) {
        self.assert_recording();
        assert!(
            index < self.running_len,
            "delete index {index} out of running bounds ({})",
            self.running_len
        );
        self.edits.push(ListChange::Delete { index });
        self.running_len -= 1;
    }

    pub fn reorder(&mut self, perm: Vec<usize>) {
        assert!(self.depth > 0, "edit recorded outside begin/commit");
        assert!(
            self.edits.is_empty() && self.reorder.is_none(),
            "a batch is either a pure permutation or a sequence of edits"
        );
        assert_eq!(
            perm.len(),
            self.running_len,
            "permutation length must match the collection length"
        );
        let mut seen = vec![false; perm.len()];
        for &to in &perm {
            assert!(
                to < perm.len() && !seen[to],
                "reorder array is not a permutation"
            );
            seen[to] = true;
        }
        self.reorder = Some(perm);
    }

    /// Take the finished batch; `None` when nothing was recorded.
    pub fn take_batch(&mut self) -> Option<ChangeBatch<T>> {
        assert_eq!(self.depth, 0, "batch taken while still open");
        if let Some(perm) = self.reorder.take() {
            return Some(ChangeBatch::Reorder(perm));
        }
        if self.edits.is_empty() {
            return None;
        }
        Some(ChangeBatch::Edits(std::mem::take(&mut self.edits)))
    }
}
