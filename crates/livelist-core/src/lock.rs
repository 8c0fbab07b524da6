//! Reader/writer discipline for a pipeline shared across threads.
//!
//! One lock guards the whole view graph. Reads and writes both go through
//! a guard, so a thread can never observe a half-applied batch: the writer
//! holds the write guard for the entire begin-to-commit span, and
//! propagation (a view "calling back into" its source) happens inside
//! that same single acquisition, which is what the re-entrant lock of a
//! per-collection design would otherwise have to allow.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pipeline::Pipeline;

/// Cheaply cloneable handle to a lock-guarded [`Pipeline`].
pub struct SharedPipeline<T> {
    inner: Arc<RwLock<Pipeline<T>>>,
}

impl<T> Clone for SharedPipeline<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SharedPipeline<T> {
    fn default() -> Self {
        Self::new(Pipeline::new())
    }
}

impl<T> SharedPipeline<T> {
    pub fn new(pipeline: Pipeline<T>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pipeline)),
        }
    }

    /// Shared read access. Multiple readers may hold this concurrently;
    /// none can while a writer is in a batch.
    pub fn read(&self) -> RwLockReadGuard<'_, Pipeline<T>> {
        self.inner.read().expect("pipeline lock poisoned")
    }

    /// Exclusive write access for the span of a mutation or an explicit
    /// begin/commit batch.
    pub fn write(&self) -> RwLockWriteGuard<'_, Pipeline<T>> {
        self.inner.write().expect("pipeline lock poisoned")
    }
}
