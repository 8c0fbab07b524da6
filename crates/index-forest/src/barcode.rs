//! Two-colour compressed-index tree.
//!
//! A barcode assigns one of two colours to every position of a parent
//! sequence. Exactly one storage role is materialized: "real" positions are
//! tree nodes, "virtual" positions are run-length integers attached to the
//! next real node (`virt_before`), plus one structure-level trailing run.
//! A barcode tracking 100,000 suppressed positions and 5 kept ones
//! therefore uses 5 nodes.
//!
//! Which public colour maps to the real role is a single flag, so
//! [`Barcode::invert`] swaps the meaning of the two colours in O(1) without
//! touching the tree. Every node carries two parallel subtree accountings
//! (real count and virtual sum), so both colours can be ranked and selected
//! in O(log n).
//!
//! Same arena-and-rotations family as [`crate::tree`]; the two are kept as
//! parallel implementations rather than one abstracted over the other,
//! because the barcode's aggregates (dual counts, attached runs) change
//! every relink rule.

/// Position colour as seen through the public interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn other(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }
}

/// Storage role behind a colour. Real positions are nodes, virtual
/// positions are folded run counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Real,
    Virt,
}

#[derive(Debug)]
struct Slot {
    p: Option<u32>,
    l: Option<u32>,
    r: Option<u32>,
    height: u32,
    /// Length of the virtual run sitting immediately before this real
    /// position.
    virt_before: u32,
    /// Real positions in this subtree, including this node.
    sub_real: u32,
    /// Virtual positions in this subtree, including `virt_before`.
    sub_virt: u32,
    live: bool,
}

/// Located position: either a real node, or an offset into a virtual run
/// (`node: None` means the trailing run).
#[derive(Debug, Clone, Copy)]
enum Loc {
    Real { node: u32 },
    Virt { node: Option<u32>, offset: u32 },
}

#[derive(Debug, Default)]
pub struct Barcode {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<u32>,
    /// Virtual run after the last real position (the whole sequence, while
    /// no real position exists).
    trailing: u32,
    /// When set, [`Color::White`] maps to the real role instead of
    /// [`Color::Black`].
    swapped: bool,
}

impl Barcode {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn role_of(&self, color: Color) -> Role {
        match (color, self.swapped) {
            (Color::Black, false) | (Color::White, true) => Role::Real,
            (Color::White, false) | (Color::Black, true) => Role::Virt,
        }
    }

    #[inline]
    fn color_of(&self, role: Role) -> Color {
        match (role, self.swapped) {
            (Role::Real, false) | (Role::Virt, true) => Color::Black,
            (Role::Virt, false) | (Role::Real, true) => Color::White,
        }
    }

    /// Swap the meaning of the two colours. O(1): the tree is untouched.
    pub fn invert(&mut self) {
        self.swapped = !self.swapped;
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
    fn vb(&self, i: u32) -> u32 {
        self.slots[i as usize].virt_before
    }

    #[inline]
    fn sub_real(&self, i: Option<u32>) -> u32 {
        i.map_or(0, |i| self.slots[i as usize].sub_real)
    }

    #[inline]
    fn sub_virt(&self, i: Option<u32>) -> u32 {
        i.map_or(0, |i| self.slots[i as usize].sub_virt)
    }

    #[inline]
    fn span(&self, i: Option<u32>) -> u32 {
        self.sub_real(i) + self.sub_virt(i)
    }

    #[inline]
    fn height(&self, i: Option<u32>) -> u32 {
        i.map_or(0, |i| self.slots[i as usize].height)
    }

    /// Total number of tracked positions.
    pub fn len(&self) -> usize {
        (self.span(self.root) + self.trailing) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of positions holding `color`.
    pub fn color_size(&self, color: Color) -> usize {
        match self.role_of(color) {
            Role::Real => self.sub_real(self.root) as usize,
            Role::Virt => (self.sub_virt(self.root) + self.trailing) as usize,
        }
    }

    /// Colour at `natural`. Panics when out of bounds.
    pub fn get(&self, natural: usize) -> Color {
        let len = self.len();
        assert!(natural < len, "natural index {natural} out of bounds ({len})");
        let (loc, _, _) = self.locate(natural);
        match loc {
            Loc::Real { .. } => self.color_of(Role::Real),
            Loc::Virt { .. } => self.color_of(Role::Virt),
        }
    }

    /// Number of `color` positions strictly before `natural`.
    pub fn rank(&self, natural: usize, color: Color) -> usize {
        let len = self.len();
        assert!(natural <= len, "natural index {natural} out of bounds ({len})");
        if natural == len {
            return self.color_size(color);
        }
        let (_, reals, virts) = self.locate(natural);
        match self.role_of(color) {
            Role::Real => reals,
            Role::Virt => virts,
        }
    }

    /// Position of `natural` among the positions of its own colour, or
    /// `None` when `natural` holds the other colour.
    pub fn compressed_index_of(&self, natural: usize, color: Color) -> Option<usize> {
        let len = self.len();
        assert!(natural < len, "natural index {natural} out of bounds ({len})");
        let (loc, reals, virts) = self.locate(natural);
        let here = match loc {
            Loc::Real { .. } => Role::Real,
            Loc::Virt { .. } => Role::Virt,
        };
        if here != self.role_of(color) {
            return None;
        }
        Some(match here {
            Role::Real => reals,
            Role::Virt => virts,
        })
    }

    /// Natural index of the `compressed`-th position of `color`.
    pub fn natural_index_of(&self, compressed: usize, color: Color) -> usize {
        let size = self.color_size(color);
        assert!(
            compressed < size,
            "compressed index {compressed} out of bounds ({size})"
        );
        match self.role_of(color) {
            Role::Real => self.select_real(compressed as u32),
            Role::Virt => self.select_virt(compressed as u32),
        }
    }

    /// Insert a position of `color` at `natural`; positions at and after
    /// `natural` shift right by one.
    pub fn insert(&mut self, natural: usize, color: Color) {
        let len = self.len();
        assert!(natural <= len, "insert index {natural} out of bounds ({len})");
        let natural = natural as u32;
        let tree_span = self.span(self.root);
        match self.role_of(color) {
            Role::Virt => {
                if natural >= tree_span {
                    self.trailing += 1;
                } else {
                    match self.locate(natural as usize).0 {
                        Loc::Virt { node: Some(c), .. } | Loc::Real { node: c } => {
                            self.slots[c as usize].virt_before += 1;
                            self.add_virt_up(c, 1);
                        }
                        Loc::Virt { node: None, .. } => self.trailing += 1,
                    }
                }
            }
            Role::Real => {
                if natural >= tree_span {
                    let off = natural - tree_span;
                    let n = self.alloc(off);
                    self.trailing -= off;
                    self.attach_rightmost(n);
                } else {
                    match self.locate(natural as usize).0 {
                        Loc::Virt { node: Some(c), offset } => {
                            // Split the run: `offset` virtuals stay before
                            // the new node, the rest stay before `c`.
                            let n = self.alloc(offset);
                            self.slots[c as usize].virt_before -= offset;
                            self.attach_before(c, n);
                        }
                        Loc::Real { node: c } => {
                            // The new node lands exactly on `c`'s position
                            // and takes over the run before it.
                            let vb = self.vb(c);
                            let n = self.alloc(vb);
                            self.slots[c as usize].virt_before = 0;
                            self.attach_before(c, n);
                        }
                        Loc::Virt { node: None, offset } => {
                            let n = self.alloc(offset);
                            self.trailing -= offset;
                            self.attach_rightmost(n);
                        }
                    }
                }
            }
        }
    }

    /// Remove the position at `natural`, returning its colour; positions
    /// after it shift left by one.
    pub fn remove(&mut self, natural: usize) -> Color {
        let len = self.len();
        assert!(natural < len, "remove index {natural} out of bounds ({len})");
        if natural as u32 >= self.span(self.root) {
            self.trailing -= 1;
            return self.color_of(Role::Virt);
        }
        match self.locate(natural).0 {
            Loc::Virt { node: Some(c), .. } => {
                self.slots[c as usize].virt_before -= 1;
                self.add_virt_up(c, -1);
                self.color_of(Role::Virt)
            }
            Loc::Virt { node: None, .. } => {
                self.trailing -= 1;
                self.color_of(Role::Virt)
            }
            Loc::Real { node: c } => {
                // The run before a removed real position survives and
                // reattaches before its successor.
                let vb = self.vb(c);
                self.slots[c as usize].virt_before = 0;
                self.add_virt_up(c, -(vb as i64));
                let succ = self.next_in_order(c);
                self.unlink(c);
                match succ {
                    Some(s) => {
                        self.slots[s as usize].virt_before += vb;
                        self.add_virt_up(s, vb as i64);
                    }
                    None => self.trailing += vb,
                }
                self.color_of(Role::Real)
            }
        }
    }

    /// Recolour the position at `natural`. No-op when it already holds
    /// `color`.
    pub fn set_color(&mut self, natural: usize, color: Color) {
        let len = self.len();
        assert!(natural < len, "index {natural} out of bounds ({len})");
        if self.get(natural) == color {
            return;
        }
        self.remove(natural);
        self.insert(natural, color);
    }

    // ── descent helpers ──────────────────────────────────────────────

    /// Locate `natural` (must be `< span(root)` for tree hits; larger
    /// values resolve to the trailing run) together with the number of real
    /// and virtual positions strictly before it.
    fn locate(&self, natural: usize) -> (Loc, usize, usize) {
        let tree_span = self.span(self.root);
        if natural as u32 >= tree_span {
            let offset = natural as u32 - tree_span;
            return (
                Loc::Virt { node: None, offset },
                self.sub_real(self.root) as usize,
                (self.sub_virt(self.root) + offset) as usize,
            );
        }
        let mut cur = self.root.expect("span > 0 implies a root");
        let mut k = natural as u32;
        let mut reals = 0usize;
        let mut virts = 0usize;
        loop {
            let l = self.l(cur);
            let lspan = self.span(l);
            if k < lspan {
                cur = l.expect("span says left child exists");
                continue;
            }
            k -= lspan;
            reals += self.sub_real(l) as usize;
            virts += self.sub_virt(l) as usize;
            let vb = self.vb(cur);
            if k < vb {
                return (
                    Loc::Virt {
                        node: Some(cur),
                        offset: k,
                    },
                    reals,
                    virts + k as usize,
                );
            }
            k -= vb;
            virts += vb as usize;
            if k == 0 {
                return (Loc::Real { node: cur }, reals, virts);
            }
            k -= 1;
            reals += 1;
            cur = self.r(cur).expect("position is in the right subtree");
        }
    }

    /// Natural index of the `k`-th real position.
    fn select_real(&self, mut k: u32) -> usize {
        let mut cur = self.root.expect("real positions exist");
        let mut pos = 0u32;
        loop {
            let l = self.l(cur);
            let lr = self.sub_real(l);
            if k < lr {
                cur = l.expect("rank says left child exists");
                continue;
            }
            k -= lr;
            pos += self.span(l) + self.vb(cur);
            if k == 0 {
                return pos as usize;
            }
            k -= 1;
            pos += 1;
            cur = self.r(cur).expect("rank says right child exists");
        }
    }

    /// Natural index of the `k`-th virtual position.
    fn select_virt(&self, mut k: u32) -> usize {
        let in_tree = self.sub_virt(self.root);
        if k >= in_tree {
            return (self.span(self.root) + (k - in_tree)) as usize;
        }
        let mut cur = self.root.expect("virtual positions exist in the tree");
        let mut pos = 0u32;
        loop {
            let l = self.l(cur);
            let lv = self.sub_virt(l);
            if k < lv {
                cur = l.expect("rank says left child exists");
                continue;
            }
            k -= lv;
            pos += self.span(l);
            let vb = self.vb(cur);
            if k < vb {
                return (pos + k) as usize;
            }
            k -= vb;
            pos += vb + 1;
            cur = self.r(cur).expect("rank says right child exists");
        }
    }

    // ── structure maintenance ────────────────────────────────────────

    fn alloc(&mut self, virt_before: u32) -> u32 {
        let slot = Slot {
            p: None,
            l: None,
            r: None,
            height: 1,
            virt_before,
            sub_real: 1,
            sub_virt: virt_before,
            live: true,
        };
        if let Some(i) = self.free.pop() {
            self.slots[i as usize] = slot;
            i
        } else {
            self.slots.push(slot);
            (self.slots.len() - 1) as u32
        }
    }

    fn pull_up(&mut self, i: u32) {
        let (l, r) = (self.l(i), self.r(i));
        let sub_real = 1 + self.sub_real(l) + self.sub_real(r);
        let sub_virt = self.vb(i) + self.sub_virt(l) + self.sub_virt(r);
        let height = 1 + self.height(l).max(self.height(r));
        let slot = &mut self.slots[i as usize];
        slot.sub_real = sub_real;
        slot.sub_virt = sub_virt;
        slot.height = height;
    }

    /// Add `delta` virtual positions to the aggregates of `i` and all its
    /// ancestors. Heights are unaffected.
    fn add_virt_up(&mut self, from: u32, delta: i64) {
        let mut cur = Some(from);
        while let Some(i) = cur {
            let sv = self.slots[i as usize].sub_virt as i64 + delta;
            self.slots[i as usize].sub_virt = sv as u32;
            cur = self.p(i);
        }
    }

    #[inline]
    fn balance(&self, i: u32) -> i32 {
        self.height(self.l(i)) as i32 - self.height(self.r(i)) as i32
    }

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

    /// Attach `n` as the in-order predecessor of `c`.
    fn attach_before(&mut self, c: u32, n: u32) {
        match self.l(c) {
            None => {
                self.slots[c as usize].l = Some(n);
                self.slots[n as usize].p = Some(c);
            }
            Some(l) => {
                let mut rm = l;
                while let Some(r) = self.r(rm) {
                    rm = r;
                }
                self.slots[rm as usize].r = Some(n);
                self.slots[n as usize].p = Some(rm);
            }
        }
        self.retrace(self.p(n));
    }

    fn attach_rightmost(&mut self, n: u32) {
        match self.root {
            None => self.root = Some(n),
            Some(root) => {
                let mut rm = root;
                while let Some(r) = self.r(rm) {
                    rm = r;
                }
                self.slots[rm as usize].r = Some(n);
                self.slots[n as usize].p = Some(rm);
                self.retrace(Some(rm));
            }
        }
    }

    fn next_in_order(&self, node: u32) -> Option<u32> {
        if let Some(r) = self.r(node) {
            let mut cur = r;
            while let Some(l) = self.l(cur) {
                cur = l;
            }
            return Some(cur);
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

    /// Structurally remove node `n` (whose `virt_before` must already be
    /// zeroed out of the aggregates) and free its slot.
    fn unlink(&mut self, n: u32) {
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
                let from_left = self.height(Some(l)) >= self.height(Some(r));
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
                    Some(v)
                } else {
                    self.replace_child(Some(vp), v, vc);
                    Some(vp)
                };
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
        let slot = &mut self.slots[n as usize];
        slot.live = false;
        slot.p = None;
        slot.l = None;
        slot.r = None;
        self.free.push(n);
    }

    /// Structural self-check used by the test suites.
    pub fn check_invariants(&self) -> Result<(), String> {
        fn walk(b: &Barcode, i: u32) -> Result<(u32, u32, u32), String> {
            let slot = &b.slots[i as usize];
            if !slot.live {
                return Err("freed slot reachable from root".to_string());
            }
            let (mut reals, mut virts) = (1u32, slot.virt_before);
            let (mut lh, mut rh) = (0u32, 0u32);
            if let Some(l) = slot.l {
                if b.p(l) != Some(i) {
                    return Err("broken parent link on left child".to_string());
                }
                let (sr, sv, h) = walk(b, l)?;
                reals += sr;
                virts += sv;
                lh = h;
            }
            if let Some(r) = slot.r {
                if b.p(r) != Some(i) {
                    return Err("broken parent link on right child".to_string());
                }
                let (sr, sv, h) = walk(b, r)?;
                reals += sr;
                virts += sv;
                rh = h;
            }
            if slot.sub_real != reals {
                return Err(format!("real cache mismatch: {} vs {reals}", slot.sub_real));
            }
            if slot.sub_virt != virts {
                return Err(format!("virt cache mismatch: {} vs {virts}", slot.sub_virt));
            }
            let height = 1 + lh.max(rh);
            if slot.height != height {
                return Err(format!("height cache mismatch: {} vs {height}", slot.height));
            }
            if (lh as i32 - rh as i32).abs() > 1 {
                return Err("AVL balance violated".to_string());
            }
            Ok((reals, virts, height))
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
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Naive mirror of a barcode: one colour per position.
    fn mirror(b: &Barcode) -> Vec<Color> {
        (0..b.len()).map(|i| b.get(i)).collect()
    }

    #[test]
    fn starts_empty() {
        let b = Barcode::new();
        assert_eq!(b.len(), 0);
        assert_eq!(b.color_size(Color::Black), 0);
        assert_eq!(b.color_size(Color::White), 0);
    }

    #[test]
    fn pure_white_sequence_uses_no_nodes() {
        let mut b = Barcode::new();
        for i in 0..1000 {
            b.insert(i, Color::White);
        }
        assert_eq!(b.len(), 1000);
        assert_eq!(b.color_size(Color::White), 1000);
        assert_eq!(b.slots.len(), 0);
    }

    #[test]
    fn sparse_black_positions_stay_compact() {
        let mut b = Barcode::new();
        for i in 0..100_000 {
            b.insert(i, Color::White);
        }
        for k in 0..5 {
            b.insert(k * 20_000, Color::Black);
        }
        assert_eq!(b.len(), 100_005);
        assert_eq!(b.color_size(Color::Black), 5);
        assert_eq!(b.slots.len(), 5);
        b.check_invariants().unwrap();
    }

    #[test]
    fn insert_and_get_mixed() {
        let mut b = Barcode::new();
        // b W b b W W b
        for (i, c) in [
            Color::Black,
            Color::White,
            Color::Black,
            Color::Black,
            Color::White,
            Color::White,
            Color::Black,
        ]
        .iter()
        .enumerate()
        {
            b.insert(i, *c);
        }
        assert_eq!(
            mirror(&b),
            vec![
                Color::Black,
                Color::White,
                Color::Black,
                Color::Black,
                Color::White,
                Color::White,
                Color::Black
            ]
        );
        assert_eq!(b.color_size(Color::Black), 4);
        assert_eq!(b.color_size(Color::White), 3);
        b.check_invariants().unwrap();
    }

    #[test]
    fn compressed_and_natural_round_trip() {
        let mut b = Barcode::new();
        let colors = [
            Color::White,
            Color::Black,
            Color::White,
            Color::White,
            Color::Black,
            Color::Black,
            Color::White,
            Color::Black,
            Color::White,
        ];
        for (i, c) in colors.iter().enumerate() {
            b.insert(i, *c);
        }
        for (i, c) in colors.iter().enumerate() {
            let k = b.compressed_index_of(i, *c).unwrap();
            assert_eq!(b.natural_index_of(k, *c), i, "round trip at {i}");
            assert_eq!(b.compressed_index_of(i, c.other()), None);
        }
    }

    #[test]
    fn remove_shifts_and_merges_runs() {
        let mut b = Barcode::new();
        // W W b W W
        for (i, c) in [
            Color::White,
            Color::White,
            Color::Black,
            Color::White,
            Color::White,
        ]
        .iter()
        .enumerate()
        {
            b.insert(i, *c);
        }
        // Removing the black merges the two runs into the trailing run.
        assert_eq!(b.remove(2), Color::Black);
        assert_eq!(b.len(), 4);
        assert_eq!(b.color_size(Color::White), 4);
        assert_eq!(b.color_size(Color::Black), 0);
        b.check_invariants().unwrap();
    }

    #[test]
    fn set_color_flips_in_place() {
        let mut b = Barcode::new();
        for i in 0..10 {
            b.insert(i, Color::White);
        }
        b.set_color(3, Color::Black);
        b.set_color(7, Color::Black);
        assert_eq!(b.get(3), Color::Black);
        assert_eq!(b.compressed_index_of(7, Color::Black), Some(1));
        b.set_color(3, Color::White);
        assert_eq!(b.get(3), Color::White);
        assert_eq!(b.compressed_index_of(7, Color::Black), Some(0));
        assert_eq!(b.len(), 10);
        b.check_invariants().unwrap();
    }

    #[test]
    fn invert_swaps_colours_in_place() {
        let mut b = Barcode::new();
        for (i, c) in [Color::Black, Color::White, Color::White, Color::Black]
            .iter()
            .enumerate()
        {
            b.insert(i, *c);
        }
        b.invert();
        assert_eq!(
            mirror(&b),
            vec![Color::White, Color::Black, Color::Black, Color::White]
        );
        assert_eq!(b.color_size(Color::Black), 2);
        assert_eq!(b.natural_index_of(0, Color::Black), 1);
        // Mutations keep working against the swapped mapping.
        b.insert(0, Color::Black);
        assert_eq!(b.get(0), Color::Black);
        assert_eq!(b.len(), 5);
        b.check_invariants().unwrap();
    }

    #[test]
    fn rank_counts_strictly_before() {
        let mut b = Barcode::new();
        for (i, c) in [Color::Black, Color::White, Color::Black, Color::White]
            .iter()
            .enumerate()
        {
            b.insert(i, *c);
        }
        assert_eq!(b.rank(0, Color::Black), 0);
        assert_eq!(b.rank(2, Color::Black), 1);
        assert_eq!(b.rank(4, Color::Black), 2);
        assert_eq!(b.rank(4, Color::White), 2);
    }

    #[test]
    fn differential_against_vec_mirror() {
        use rand_xoshiro::rand_core::{RngCore, SeedableRng};
        use rand_xoshiro::Xoshiro256StarStar;

        for seed in [1u64, 0x5eed, 0xc0ffee] {
            let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
            let mut b = Barcode::new();
            let mut m: Vec<Color> = Vec::new();
            for _ in 0..2000 {
                let op = rng.next_u32() % 4;
                match op {
                    0 | 1 => {
                        let i = (rng.next_u32() as usize) % (m.len() + 1);
                        let c = if rng.next_u32() % 2 == 0 {
                            Color::Black
                        } else {
                            Color::White
                        };
                        b.insert(i, c);
                        m.insert(i, c);
                    }
                    2 if !m.is_empty() => {
                        let i = (rng.next_u32() as usize) % m.len();
                        assert_eq!(b.remove(i), m.remove(i));
                    }
                    3 if !m.is_empty() => {
                        let i = (rng.next_u32() as usize) % m.len();
                        let c = if rng.next_u32() % 2 == 0 {
                            Color::Black
                        } else {
                            Color::White
                        };
                        b.set_color(i, c);
                        m[i] = c;
                    }
                    _ => {}
                }
            }
            b.check_invariants().unwrap();
            assert_eq!(mirror(&b), m, "seed {seed}");
            for c in [Color::Black, Color::White] {
                let naturals: Vec<usize> =
                    (0..m.len()).filter(|&i| m[i] == c).collect();
                assert_eq!(b.color_size(c), naturals.len());
                for (k, &i) in naturals.iter().enumerate() {
                    assert_eq!(b.natural_index_of(k, c), i);
                    assert_eq!(b.compressed_index_of(i, c), Some(k));
                }
            }
        }
    }
}
