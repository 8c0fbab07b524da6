//! Index-addressable AVL tree over a slot arena.
//!
//! Every node caches its subtree size and height. Positions are resolved by
//! descending on left-subtree sizes; `index_of` walks from the node to the
//! root summing left-subtree sizes, and is computed on demand rather than
//! cached, since any structural change elsewhere in the tree would
//! invalidate a cached index.

/// Stable handle to a live node.
///
/// A handle stays valid until `remove_at` removes the node it names; using
/// a handle after that is a usage fault (the slot may have been reused).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

#[derive(Debug)]
struct Slot<V> {
    p: Option<u32>,
    l: Option<u32>,
    r: Option<u32>,
    /// Subtree size including this node.
    size: u32,
    /// Subtree height; a leaf has height 1.
    height: u32,
    /// `None` only while the slot sits on the free list.
    value: Option<V>,
}

/// Order-statistics AVL tree with owned values and stable [`NodeId`] handles.
#[derive(Debug, Default)]
pub struct IndexedTree<V> {
    slots: Vec<Slot<V>>,
    free: Vec<u32>,
    root: Option<u32>,
}

impl<V> IndexedTree<V> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.size(self.root) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    fn size(&self, i: Option<u32>) -> u32 {
        i.map_or(0, |i| self.slots[i as usize].size)
    }

    #[inline]
    fn height(&self, i: Option<u32>) -> u32 {
        i.map_or(0, |i| self.slots[i as usize].height)
    }

    #[inline]
    fn p(&self, i: u32) -> Option<u32> {
        self.slots[i as usize].p
    }

    #[inline]
    fn l(&self, i: u32) -> Option<u32> {
        self.slots[i as usize].l
    }

    #[inline]
    fn r(&self, i: u32) -> Option<u32> {
        self.slots[i as usize].r
    }

    #[inline]
    fn val(&self, i: u32) -> &V {
        self.slots[i as usize].value.as_ref().expect("live slot")
    }

    /// Recompute cached size and height from the children.
    fn pull_up(&mut self, i: u32) {
        let (l, r) = (self.l(i), self.r(i));
        let (ls, lh) = (self.size(l), self.height(l));
        let (rs, rh) = (self.size(r), self.height(r));
        let slot = &mut self.slots[i as usize];
        slot.size = 1 + ls + rs;
        slot.height = 1 + lh.max(rh);
    }

    #[inline]
    fn balance(&self, i: u32) -> i32 {
        self.height(self.l(i)) as i32 - self.height(self.r(i)) as i32
    }

    fn alloc(&mut self, value: V) -> u32 {
        if let Some(i) = self.free.pop() {
            self.slots[i as usize] = Slot {
                p: None,
                l: None,
                r: None,
                size: 1,
                height: 1,
                value: Some(value),
            };
            i
        } else {
            self.slots.push(Slot {
                p: None,
                l: None,
                r: None,
                size: 1,
                height: 1,
                value: Some(value),
            });
            (self.slots.len() - 1) as u32
        }
    }

    fn release(&mut self, i: u32) -> V {
        let value = self.slots[i as usize].value.take().expect("live slot");
        self.free.push(i);
        value
    }

    /// Replace `child`'s slot in `parent` (or the root) with `with`.
    fn replace_child(&mut self, parent: Option<u32>, child: u32, with: Option<u32>) {
        match parent {
            None => self.root = with,
            Some(p) => {
                if self.l(p) == Some(child) {
                    self.slots[p as usize].l = with;
                } else {
                    self.slots[p as usize].r = with;
                }
            }
        }
        if let Some(w) = with {
            self.slots[w as usize].p = parent;
        }
    }

    /// Left rotation around `n`; returns the new subtree root.
    fn rotate_left(&mut self, n: u32) -> u32 {
        let r = self.r(n).expect("right child exists");
        let rl = self.l(r);
        let p = self.p(n);
        self.slots[n as usize].r = rl;
        if let Some(rl) = rl {
            self.slots[rl as usize].p = Some(n);
        }
        self.slots[r as usize].l = Some(n);
        self.slots[n as usize].p = Some(r);
        self.replace_child(p, n, Some(r));
        self.pull_up(n);
        self.pull_up(r);
        r
    }

    /// Right rotation around `n`; returns the new subtree root.
    fn rotate_right(&mut self, n: u32) -> u32 {
        let l = self.l(n).expect("left child exists");
        let lr = self.r(l);
        let p = self.p(n);
        self.slots[n as usize].l = lr;
        if let Some(lr) = lr {
            self.slots[lr as usize].p = Some(n);
        }
        self.slots[l as usize].r = Some(n);
        self.slots[n as usize].p = Some(l);
        self.replace_child(p, n, Some(l));
        self.pull_up(n);
        self.pull_up(l);
        l
    }

    /// Walk from `from` to the root, refreshing caches and rotating where
    /// the AVL balance broke. Single vs double rotation is chosen by
    /// comparing child subtree heights.
    fn retrace(&mut self, from: Option<u32>) {
        let mut cur = from;
        while let Some(i) = cur {
            self.pull_up(i);
            let b = self.balance(i);
            let top = if b > 1 {
                let l = self.l(i).expect("left-heavy node has left child");
                if self.balance(l) < 0 {
                    self.rotate_left(l);
                }
                self.rotate_right(i)
            } else if b < -1 {
                let r = self.r(i).expect("right-heavy node has right child");
                if self.balance(r) > 0 {
                    self.rotate_right(r);
                }
                self.rotate_left(i)
            } else {
                i
            };
            cur = self.p(top);
        }
    }

    /// Insert `value` so that it ends up at position `index`.
    ///
    /// Panics if `index > len`: emitting a position that does not exist is
    /// a producer bug, not a recoverable condition.
    pub fn insert_at(&mut self, index: usize, value: V) -> NodeId {
        let len = self.len();
        assert!(index <= len, "insert index {index} out of bounds ({len})");
        let n = self.alloc(value);

        match self.root {
            None => self.root = Some(n),
            Some(mut cur) => {
                let mut k = index as u32;
                loop {
                    let ls = self.size(self.l(cur));
                    if k <= ls {
                        match self.l(cur) {
                            Some(l) => cur = l,
                            None => {
                                self.slots[cur as usize].l = Some(n);
                                self.slots[n as usize].p = Some(cur);
                                break;
                            }
                        }
                    } else {
                        k -= ls + 1;
                        match self.r(cur) {
                            Some(r) => cur = r,
                            None => {
                                self.slots[cur as usize].r = Some(n);
                                self.slots[n as usize].p = Some(cur);
                                break;
                            }
                        }
                    }
                }
                self.retrace(self.p(n));
            }
        }
        NodeId(n)
    }

    /// Remove and return the value at `index`.
    ///
    /// A two-child node is replaced by its in-order predecessor or
    /// successor, taken from the taller subtree so the relink causes the
    /// least rebalancing work. The replacement node is relinked
    /// structurally, so all other handles stay valid.
    pub fn remove_at(&mut self, index: usize) -> V {
        let len = self.len();
        assert!(index < len, "remove index {index} out of bounds ({len})");
        let n = self.node_at(index).0;
        let p = self.p(n);
        let (l, r) = (self.l(n), self.r(n));

        let retrace_from = match (l, r) {
            (None, None) => {
                self.replace_child(p, n, None);
                p
            }
            (Some(c), None) | (None, Some(c)) => {
                self.replace_child(p, n, Some(c));
                p
            }
            (Some(l), Some(r)) => {
                // Replacement from the taller side; ties prefer the larger
                // subtree.
                let from_left = match self.height(Some(l)).cmp(&self.height(Some(r))) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => self.size(Some(l)) >= self.size(Some(r)),
                };
                let v = if from_left {
                    let mut v = l;
                    while let Some(vr) = self.r(v) {
                        v = vr;
                    }
                    v
                } else {
                    let mut v = r;
                    while let Some(vl) = self.l(v) {
                        v = vl;
                    }
                    v
                };
                let vp = self.p(v).expect("replacement has a parent");
                let vc = if from_left { self.l(v) } else { self.r(v) };

                let deepest = if vp == n {
                    // The replacement is a direct child of `n` and keeps its
                    // own subtree on that side; only the far side is adopted.
                    Some(v)
                } else {
                    self.replace_child(Some(vp), v, vc);
                    Some(vp)
                };

                // Put `v` where `n` was and adopt `n`'s children, except the
                // slot `v` itself came out of.
                self.replace_child(p, n, Some(v));
                if !(from_left && vp == n) {
                    self.slots[v as usize].l = Some(l);
                    self.slots[l as usize].p = Some(v);
                }
                if !(!from_left && vp == n) {
                    self.slots[v as usize].r = Some(r);
                    self.slots[r as usize].p = Some(v);
                }
                deepest
            }
        };

        self.retrace(retrace_from);
        self.release(n)
    }

    /// Handle of the node currently at `index`. Panics when out of bounds.
    pub fn node_at(&self, index: usize) -> NodeId {
        let len = self.len();
        assert!(index < len, "index {index} out of bounds ({len})");
        let mut cur = self.root.expect("non-empty tree");
        let mut k = index as u32;
        loop {
            let ls = self.size(self.l(cur));
            if k < ls {
                cur = self.l(cur).expect("size says left child exists");
            } else if k == ls {
                return NodeId(cur);
            } else {
                k -= ls + 1;
                cur = self.r(cur).expect("size says right child exists");
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<&V> {
        if index >= self.len() {
            return None;
        }
        Some(self.val(self.node_at(index).0))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut V> {
        if index >= self.len() {
            return None;
        }
        let n = self.node_at(index).0;
        self.slots[n as usize].value.as_mut()
    }

    pub fn value(&self, node: NodeId) -> &V {
        self.val(node.0)
    }

    pub fn value_mut(&mut self, node: NodeId) -> &mut V {
        self.slots[node.0 as usize].value.as_mut().expect("live slot")
    }

    /// Current position of `node`, by walking to the root and summing
    /// left-subtree sizes plus one for every ancestor we sit right of.
    pub fn index_of(&self, node: NodeId) -> usize {
        let mut idx = self.size(self.l(node.0)) as usize;
        let mut cur = node.0;
        while let Some(p) = self.p(cur) {
            if self.r(p) == Some(cur) {
                idx += self.size(self.l(p)) as usize + 1;
            }
            cur = p;
        }
        idx
    }

    /// Number of leading values for which `pred` holds. The tree must be
    /// partitioned with respect to `pred` (true-prefix, false-suffix), which
    /// is the case for any comparator-ordered tree and a monotonic
    /// predicate.
    pub fn partition_point(&self, mut pred: impl FnMut(&V) -> bool) -> usize {
        let mut acc = 0usize;
        let mut cur = self.root;
        while let Some(i) = cur {
            if pred(self.val(i)) {
                acc += self.size(self.l(i)) as usize + 1;
                cur = self.r(i);
            } else {
                cur = self.l(i);
            }
        }
        acc
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
    }

    /// Lazy in-order iterator; restartable by calling `iter` again.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            tree: self,
            next: self.first(self.root),
        }
    }

    fn first(&self, root: Option<u32>) -> Option<u32> {
        let mut cur = root?;
        while let Some(l) = self.l(cur) {
            cur = l;
        }
        Some(cur)
    }

    fn next_in_order(&self, node: u32) -> Option<u32> {
        if let Some(r) = self.r(node) {
            return self.first(Some(r));
        }
        let mut cur = node;
        let mut p = self.p(node);
        while let Some(pi) = p {
            if self.r(pi) == Some(cur) {
                cur = pi;
                p = self.p(pi);
            } else {
                return Some(pi);
            }
        }
        None
    }

    /// Structural self-check used by the test suites.
    pub fn check_invariants(&self) -> Result<(), String> {
        fn walk<V>(t: &IndexedTree<V>, i: u32) -> Result<(u32, u32), String> {
            let (mut size, mut lh, mut rh) = (1u32, 0u32, 0u32);
            if let Some(l) = t.l(i) {
                if t.p(l) != Some(i) {
                    return Err("broken parent link on left child".to_string());
                }
                let (s, h) = walk(t, l)?;
                size += s;
                lh = h;
            }
            if let Some(r) = t.r(i) {
                if t.p(r) != Some(i) {
                    return Err("broken parent link on right child".to_string());
                }
                let (s, h) = walk(t, r)?;
                size += s;
                rh = h;
            }
            let slot = &t.slots[i as usize];
            if slot.value.is_none() {
                return Err("freed slot reachable from root".to_string());
            }
            if slot.size != size {
                return Err(format!("size cache mismatch: {} vs {}", slot.size, size));
            }
            let height = 1 + lh.max(rh);
            if slot.height != height {
                return Err(format!(
                    "height cache mismatch: {} vs {}",
                    slot.height, height
                ));
            }
            if (lh as i32 - rh as i32).abs() > 1 {
                return Err("AVL balance violated".to_string());
            }
            Ok((size, height))
        }
        match self.root {
            None => Ok(()),
            Some(root) => {
                if self.p(root).is_some() {
                    return Err("root has a parent".to_string());
                }
                walk(self, root).map(|_| ())
            }
        }
    }

    /// Tree height, exposed for the balance-bound tests.
    pub fn tree_height(&self) -> usize {
        self.height(self.root) as usize
    }
}

pub struct Iter<'a, V> {
    tree: &'a IndexedTree<V>,
    next: Option<u32>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next?;
        self.next = self.tree.next_in_order(i);
        Some(self.tree.val(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<V: Clone>(t: &IndexedTree<V>) -> Vec<V> {
        t.iter().cloned().collect()
    }

    #[test]
    fn insert_at_places_values() {
        let mut t = IndexedTree::new();
        t.insert_at(0, 'b');
        t.insert_at(0, 'a');
        t.insert_at(2, 'd');
        t.insert_at(2, 'c');
        assert_eq!(collect(&t), vec!['a', 'b', 'c', 'd']);
        t.check_invariants().unwrap();
    }

    #[test]
    fn insert_reports_its_own_index() {
        let mut t = IndexedTree::new();
        for i in 0..64 {
            let h = t.insert_at(i / 2, i);
            assert_eq!(t.index_of(h), i / 2);
            t.check_invariants().unwrap();
        }
    }

    #[test]
    fn remove_at_returns_value_and_keeps_order() {
        let mut t = IndexedTree::new();
        for (i, v) in "abcdefgh".chars().enumerate() {
            t.insert_at(i, v);
        }
        assert_eq!(t.remove_at(3), 'd');
        assert_eq!(t.remove_at(0), 'a');
        assert_eq!(t.remove_at(5), 'h');
        assert_eq!(collect(&t), vec!['b', 'c', 'e', 'f', 'g']);
        t.check_invariants().unwrap();
    }

    #[test]
    fn remove_last_clears_root() {
        let mut t = IndexedTree::new();
        t.insert_at(0, 1);
        assert_eq!(t.remove_at(0), 1);
        assert!(t.is_empty());
        assert_eq!(t.get(0), None);
    }

    #[test]
    fn handles_survive_unrelated_removals() {
        let mut t = IndexedTree::new();
        let handles: Vec<_> = (0..32).map(|i| t.insert_at(i, i)).collect();
        t.remove_at(0);
        t.remove_at(10);
        t.remove_at(20);
        // Handle of value 5 now sits at index 4 (one removal before it).
        assert_eq!(t.index_of(handles[5]), 4);
        assert_eq!(*t.value(handles[5]), 5);
        t.check_invariants().unwrap();
    }

    #[test]
    fn partition_point_matches_slice_behaviour() {
        let mut t = IndexedTree::new();
        for (i, v) in [1, 3, 3, 3, 7, 9].iter().enumerate() {
            t.insert_at(i, *v);
        }
        assert_eq!(t.partition_point(|&v| v < 3), 1);
        assert_eq!(t.partition_point(|&v| v <= 3), 4);
        assert_eq!(t.partition_point(|&v| v < 100), 6);
        assert_eq!(t.partition_point(|&v| v < 0), 0);
    }

    #[test]
    fn two_child_removal_from_either_side() {
        // Shape the tree so the removed node's taller side alternates.
        let mut t = IndexedTree::new();
        for i in 0..128 {
            t.insert_at(i, i);
        }
        for _ in 0..100 {
            t.remove_at(t.len() / 2);
            t.check_invariants().unwrap();
        }
        assert_eq!(t.len(), 28);
    }

    #[test]
    fn iter_is_restartable() {
        let mut t = IndexedTree::new();
        for i in 0..5 {
            t.insert_at(i, i * 10);
        }
        let once: Vec<_> = t.iter().cloned().collect();
        let twice: Vec<_> = t.iter().cloned().collect();
        assert_eq!(once, twice);
        assert_eq!(once, vec![0, 10, 20, 30, 40]);
    }
}
