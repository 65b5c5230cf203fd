#![forbid(unsafe_code)]

//! Transparent backend: lazy pass-through handles.
//!
//! # Design
//!
//! The plain value itself stays the single source of truth, held behind a
//! shared root. [`wrap()`] never touches it: it just hands back a
//! [`ProxyHandle`] — a {root, path} pair — that traps reads, writes, and
//! deletions. Object-shaped reads extend the path into a **fresh** handle
//! on every read; there is no handle cache and no identity map, so two
//! reads of the same nested property yield two independent handles over the
//! same underlying data. Only primitive leaves come back as plain values.
//!
//! Writes and deletions notify unconditionally — no equality check against
//! the previous value — and only then touch the underlying data. Both of
//! those choices differ from the descriptor backend on purpose; each
//! backend reproduces its own source semantics.
//!
//! # Invariants
//!
//! 1. `read` never mutates and never notifies.
//! 2. `write`/`remove` notify first; when notification fails the underlying
//!    data is untouched.
//! 3. A value assigned after wrapping becomes reactive the moment it is
//!    read back (wrapping is per-read, not per-construction).
//!
//! # Failure Modes
//!
//! - **Detached handle**: a handle whose path no longer resolves (an
//!   ancestor was deleted or replaced by a primitive) reads as `None` and
//!   drops writes on the floor — after notifying, since notification never
//!   depended on the write landing.

use std::cell::RefCell;
use std::rc::Rc;

use databind_core::{Key, PropertyOps, ReactiveContext, ReactiveError, Value};

/// Convert a plain value into an observed value, taking ownership of the
/// data as the new shared root.
///
/// Primitives (including `Null`) pass through unchanged as
/// [`Proxied::Plain`].
#[must_use]
pub fn wrap(ctx: &ReactiveContext, value: Value) -> Proxied {
    if value.is_primitive() {
        return Proxied::Plain(value);
    }
    #[cfg(feature = "tracing")]
    tracing::trace!(message = "transparent.wrap", shape = ?value.shape());
    Proxied::Handle(ProxyHandle {
        ctx: ctx.clone(),
        root: Rc::new(RefCell::new(value)),
        path: Vec::new(),
    })
}

/// Wrap an already-shared root, producing an independent view over the same
/// underlying data.
///
/// Each call yields a fresh handle; views share nothing but the data and
/// the context, so both ultimately trigger the same single computation.
#[must_use]
pub fn wrap_shared(ctx: &ReactiveContext, root: &Rc<RefCell<Value>>) -> Proxied {
    if root.borrow().is_primitive() {
        return Proxied::Plain(root.borrow().clone());
    }
    Proxied::Handle(ProxyHandle {
        ctx: ctx.clone(),
        root: Rc::clone(root),
        path: Vec::new(),
    })
}

/// Result of wrapping with the transparent backend.
#[derive(Debug, Clone)]
pub enum Proxied {
    /// Pass-through primitive; never instrumented.
    Plain(Value),
    /// Intercepting handle over object-shaped data.
    Handle(ProxyHandle),
}

impl Proxied {
    /// Plain snapshot of the current state. A detached handle snapshots as
    /// `Null`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Proxied::Plain(value) => value.clone(),
            Proxied::Handle(handle) => handle.snapshot().unwrap_or(Value::Null),
        }
    }

    /// The intercepting handle, if this is one.
    #[must_use]
    pub fn as_handle(&self) -> Option<&ProxyHandle> {
        match self {
            Proxied::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// Whether the value passed through without instrumentation.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        matches!(self, Proxied::Plain(_))
    }
}

impl PartialEq<Value> for Proxied {
    fn eq(&self, other: &Value) -> bool {
        self.to_value() == *other
    }
}

/// A transparent intercepting handle: the shared root plus the path from it
/// to the node this handle addresses.
///
/// Handles are cheap to clone and carry no state of their own beyond the
/// path; all data lives in the root.
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    ctx: ReactiveContext,
    root: Rc<RefCell<Value>>,
    path: Vec<Key>,
}

impl ProxyHandle {
    /// The shared root this handle reads through. Useful for creating
    /// further independent views via [`wrap_shared`].
    #[must_use]
    pub fn root(&self) -> &Rc<RefCell<Value>> {
        &self.root
    }

    /// Snapshot the node this handle addresses. `None` when the handle is
    /// detached: the path no longer resolves, or resolves to a primitive —
    /// handles only ever address object-shaped data, so a primitive
    /// occupant means the original node is gone.
    #[must_use]
    pub fn snapshot(&self) -> Option<Value> {
        let data = self.root.borrow();
        self.resolve(&data).filter(|node| !node.is_primitive()).cloned()
    }

    /// Whether the path still resolves to object-shaped data.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.resolve(&self.root.borrow())
            .is_some_and(|node| !node.is_primitive())
    }

    fn resolve<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        let mut node = Some(data);
        for key in &self.path {
            node = node.and_then(|n| n.child(key));
        }
        node
    }

    fn resolve_mut<'a>(&self, data: &'a mut Value) -> Option<&'a mut Value> {
        let mut node = Some(data);
        for key in &self.path {
            node = node.and_then(|n| n.child_mut(key));
        }
        node
    }
}

impl PropertyOps for ProxyHandle {
    type Nested = Proxied;

    /// Fetch the child under `key`, wrapping object-shaped results into a
    /// fresh handle on every read. No caching: repeated reads of the same
    /// key yield distinct handles over the same underlying node.
    fn read(&self, key: impl Into<Key>) -> Option<Proxied> {
        let key = key.into();
        let leaf = {
            let data = self.root.borrow();
            let child = self.resolve(&data)?.child(&key)?;
            if child.is_primitive() {
                Some(child.clone())
            } else {
                None
            }
        };
        match leaf {
            Some(value) => Some(Proxied::Plain(value)),
            None => {
                let mut path = self.path.clone();
                path.push(key);
                Some(Proxied::Handle(ProxyHandle {
                    ctx: self.ctx.clone(),
                    root: Rc::clone(&self.root),
                    path,
                }))
            }
        }
    }

    /// Notify unconditionally — same-value writes included — then perform
    /// the underlying write. Missing keys are inserted.
    fn write(&self, key: impl Into<Key>, value: Value) -> Result<(), ReactiveError> {
        let key = key.into();
        self.ctx.notify()?;
        let mut data = self.root.borrow_mut();
        if let Some(node) = self.resolve_mut(&mut data) {
            node.set_child(&key, value);
        }
        Ok(())
    }

    /// Notify unconditionally, then perform the underlying deletion.
    /// Object keys are removed; array elements are holed out with `Null`.
    fn remove(&self, key: impl Into<Key>) -> Result<Option<Value>, ReactiveError> {
        let key = key.into();
        self.ctx.notify()?;
        let mut data = self.root.borrow_mut();
        Ok(self
            .resolve_mut(&mut data)
            .and_then(|node| node.remove_child(&key)))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
