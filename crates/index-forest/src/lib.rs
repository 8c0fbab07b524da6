//! Arena-based order-statistics trees for incremental collection views.
//!
//! Two structures, both AVL-balanced and both addressed by position rather
//! than by key:
//!
//! - [`IndexedTree`]: an index-addressable sequence with O(log n)
//!   `insert_at` / `remove_at` / `get` and O(log n) `index_of` for a held
//!   node handle. Used as primary storage by sorted views.
//! - [`Barcode`]: a two-colour compressed-index structure that tracks, for
//!   every position of a parent sequence, whether that position is kept or
//!   suppressed in a derived view, and converts between natural and
//!   compressed indices in O(log n). Runs of suppressed positions are folded
//!   into integer counts, so density is proportional to the number of kept
//!   positions only.
//!
//! Instead of raw pointers, all "pointers" are `Option<u32>` indices into a
//! `Vec`-backed slot arena owned by the structure; removed slots go on a
//! free list and are reused. [`NodeId`] handles stay valid until the node
//! they name is removed.

pub mod barcode;
pub mod tree;

pub use barcode::{Barcode, Color};
pub use tree::{IndexedTree, NodeId};
