//! Capability seam for property access.
//!
//! Wrapper backends expose reads, writes, and deletions through one trait so
//! embedding code can hold "something observed" without caring which
//! interception strategy produced it. The trait fixes only the shape of the
//! seam; each backend keeps its own semantics (equality-checked vs
//! unconditional notification, eager vs lazy nested wrapping).

use crate::context::ReactiveError;
use crate::value::{Key, Value};

/// Get/set/delete dispatch over an observed object or array.
pub trait PropertyOps {
    /// What a read yields: a nested observed handle or a plain leaf,
    /// depending on the backend.
    type Nested;

    /// Fetch the child under `key`. `None` when the key is absent.
    fn read(&self, key: impl Into<Key>) -> Option<Self::Nested>;

    /// Store `value` under `key`. Whether and when this notifies is
    /// backend-defined; on notification failure the write is not applied.
    fn write(&self, key: impl Into<Key>, value: Value) -> Result<(), ReactiveError>;

    /// Delete the child under `key`, returning the prior value if any.
    fn remove(&self, key: impl Into<Key>) -> Result<Option<Value>, ReactiveError>;
}
