//! Incremental observable collections.
//!
//! Mutable, ordered collections that layer on top of one another
//! (sorting, deduplication, filtering, selection, thread marshalling) such
//! that any mutation to a root collection propagates as a precise, minimal
//! batch of change operations to every dependent view, in O(log n) per
//! affected element, with strict ordering and atomicity guarantees.
//!
//! # Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! [`event`] | Change vocabulary, [`event::ChangeBatch`], the nest-flattening batch builder |
//! [`pipeline`] | The view graph, propagation, the collection contract, factories |
//! [`lock`] | [`lock::SharedPipeline`] reader/writer discipline |
//! [`relay`] | [`relay::RelayPort`] thread-confined delivery |
//! [`error`] | Recoverable fault taxonomy |
//!
//! # Example
//!
//! ```
//! use livelist_core::Pipeline;
//!
//! let mut p = Pipeline::new();
//! let root = p.root(vec![3, 1, 4, 1, 5]);
//! let sorted = p.sorted(root, |a: &i32, b: &i32| a.cmp(b));
//! let unique = p.dedup(root, |a: &i32, b: &i32| a.cmp(b));
//!
//! p.push(root, 1);
//! assert_eq!(p.snapshot(sorted), vec![1, 1, 1, 3, 4, 5]);
//! assert_eq!(p.snapshot(unique), vec![1, 3, 4, 5]);
//! ```

pub mod error;
pub mod event;
pub mod lock;
pub mod pipeline;
pub mod relay;

mod dedup;
mod filter;
mod select;
mod sorted;

pub use error::ListError;
pub use event::{BatchBuilder, ChangeBatch, ListChange};
pub use lock::SharedPipeline;
pub use pipeline::{
    Comparator, Listener, ListenerId, Pipeline, Predicate, SelectionViews, ViewId,
};
pub use relay::{RelayPort, RelaySubscription};
