//! Registration cell and synchronous notification.
//!
//! A [`ReactiveContext`] holds the single "active computation": the one
//! zero-argument callable that runs whenever an observed mutation occurs.
//! It replaces the ambient global slot of the source design with an explicit
//! handle that wrapper backends carry by clone, so there is no hidden
//! cross-module coupling.
//!
//! # Design
//!
//! The context is `Rc<..>` inside and cheap to clone; every clone aliases
//! the same cell. The computation slot is read out (and the borrow released)
//! before invocation, so a running computation may freely re-register or
//! mutate observed values — re-entrant notification is supported and, by
//! default, unguarded.
//!
//! # Invariants
//!
//! 1. Last registration wins: [`effect()`](ReactiveContext::effect) silently
//!    discards the previous computation. No stack, no history.
//! 2. [`notify()`](ReactiveContext::notify) invokes the computation exactly
//!    once, synchronously, on the caller's stack.
//! 3. An empty cell makes `notify()` fail; the mutation that wanted to
//!    notify is expected to not happen (backends notify before they write).
//!
//! # Failure Modes
//!
//! - **Runaway recursion**: a computation that unconditionally writes an
//!   observed value re-enters `notify()` forever. Not guarded by default;
//!   see [`ReactiveContext::with_reentrancy_limit`] for the opt-in guard.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Errors surfaced by the notification protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactiveError {
    /// `notify()` fired before any computation was registered.
    EmptyRegistration,
    /// Re-entrant notification exceeded the configured depth limit.
    /// Only produced by contexts built with
    /// [`ReactiveContext::with_reentrancy_limit`].
    ReentrancyLimit {
        /// Depth the rejected notification would have reached.
        depth: usize,
    },
}

impl fmt::Display for ReactiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRegistration => write!(f, "no active computation registered"),
            Self::ReentrancyLimit { depth } => {
                write!(f, "re-entrant notification exceeded limit at depth {depth}")
            }
        }
    }
}

impl std::error::Error for ReactiveError {}

struct ContextInner {
    /// The single active computation, or empty before first registration.
    slot: RefCell<Option<Rc<dyn Fn()>>>,
    /// Live notification frames on the current stack.
    depth: Cell<usize>,
    /// Opt-in re-entrancy guard; `None` means unguarded (the default).
    depth_limit: Option<usize>,
}

/// Handle to the registration cell shared by all wrappers of one runtime.
///
/// Cloning yields another handle to the **same** cell.
pub struct ReactiveContext {
    inner: Rc<ContextInner>,
}

impl Clone for ReactiveContext {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("registered", &self.is_registered())
            .field("depth", &self.inner.depth.get())
            .field("depth_limit", &self.inner.depth_limit)
            .finish()
    }
}

impl ReactiveContext {
    /// Create a context with an empty registration cell and no re-entrancy
    /// guard.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                slot: RefCell::new(None),
                depth: Cell::new(0),
                depth_limit: None,
            }),
        }
    }

    /// Create a context that rejects notification beyond `limit` nested
    /// frames.
    ///
    /// This is a labeled extension over the reference behavior: the default
    /// context leaves runaway re-entrant notification to the caller.
    #[must_use]
    pub fn with_reentrancy_limit(limit: usize) -> Self {
        Self {
            inner: Rc::new(ContextInner {
                slot: RefCell::new(None),
                depth: Cell::new(0),
                depth_limit: Some(limit),
            }),
        }
    }

    /// Register `computation` as the active computation, replacing whatever
    /// was registered before. Never fails; the discarded computation is
    /// dropped silently.
    pub fn effect(&self, computation: impl Fn() + 'static) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "databind.effect",
            replaced = self.is_registered()
        );
        *self.inner.slot.borrow_mut() = Some(Rc::new(computation));
    }

    /// Whether a computation is currently registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.inner.slot.borrow().is_some()
    }

    /// Number of notification frames currently live on the stack. Zero
    /// outside of notification; greater than one only during re-entrant
    /// notification.
    #[must_use]
    pub fn notify_depth(&self) -> usize {
        self.inner.depth.get()
    }

    /// Invoke the active computation, synchronously, on this stack.
    ///
    /// The slot borrow is released before invocation, so the computation may
    /// re-register or trigger further notifications. Fails with
    /// [`ReactiveError::EmptyRegistration`] when nothing was ever
    /// registered; callers are expected to propagate the error *instead of*
    /// applying the mutation that triggered it.
    pub fn notify(&self) -> Result<(), ReactiveError> {
        let computation = self.inner.slot.borrow().as_ref().map(Rc::clone);
        let Some(computation) = computation else {
            return Err(ReactiveError::EmptyRegistration);
        };

        let depth = self.inner.depth.get() + 1;
        if let Some(limit) = self.inner.depth_limit
            && depth > limit
        {
            return Err(ReactiveError::ReentrancyLimit { depth });
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(message = "databind.notify", depth);

        self.inner.depth.set(depth);
        computation();
        self.inner.depth.set(depth - 1);
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notify_invokes_registered_computation() {
        let ctx = ReactiveContext::new();
        let calls = Rc::new(Cell::new(0u32));
        let calls_in = Rc::clone(&calls);
        ctx.effect(move || calls_in.set(calls_in.get() + 1));

        ctx.notify().unwrap();
        ctx.notify().unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn notify_on_empty_cell_fails() {
        let ctx = ReactiveContext::new();
        assert_eq!(ctx.notify(), Err(ReactiveError::EmptyRegistration));
        assert!(!ctx.is_registered());
    }

    #[test]
    fn last_registration_wins() {
        let ctx = ReactiveContext::new();
        let a = Rc::new(Cell::new(0u32));
        let b = Rc::new(Cell::new(0u32));

        let a_in = Rc::clone(&a);
        ctx.effect(move || a_in.set(a_in.get() + 1));
        let b_in = Rc::clone(&b);
        ctx.effect(move || b_in.set(b_in.get() + 1));

        ctx.notify().unwrap();
        assert_eq!(a.get(), 0, "replaced computation must never run");
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn clones_share_the_cell() {
        let ctx = ReactiveContext::new();
        let other = ctx.clone();
        let calls = Rc::new(Cell::new(0u32));
        let calls_in = Rc::clone(&calls);
        other.effect(move || calls_in.set(calls_in.get() + 1));

        ctx.notify().unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn computation_may_re_register_while_running() {
        let ctx = ReactiveContext::new();
        let ctx_in = ctx.clone();
        let ran_second = Rc::new(Cell::new(false));
        let ran_second_in = Rc::clone(&ran_second);
        ctx.effect(move || {
            let flag = Rc::clone(&ran_second_in);
            ctx_in.effect(move || flag.set(true));
        });

        ctx.notify().unwrap();
        assert!(!ran_second.get());
        ctx.notify().unwrap();
        assert!(ran_second.get());
    }

    #[test]
    fn re_entrant_notification_is_permitted_by_default() {
        let ctx = ReactiveContext::new();
        let ctx_in = ctx.clone();
        let depth_seen = Rc::new(Cell::new(0usize));
        let depth_seen_in = Rc::clone(&depth_seen);
        let budget = Rc::new(Cell::new(3u32));
        let budget_in = Rc::clone(&budget);
        ctx.effect(move || {
            depth_seen_in.set(depth_seen_in.get().max(ctx_in.notify_depth()));
            if budget_in.get() > 0 {
                budget_in.set(budget_in.get() - 1);
                ctx_in.notify().unwrap();
            }
        });

        ctx.notify().unwrap();
        assert_eq!(depth_seen.get(), 4);
        assert_eq!(ctx.notify_depth(), 0);
    }

    #[test]
    fn reentrancy_limit_cuts_runaway_recursion() {
        let ctx = ReactiveContext::with_reentrancy_limit(8);
        let ctx_in = ctx.clone();
        let rejections = Rc::new(Cell::new(0u32));
        let rejections_in = Rc::clone(&rejections);
        // Recurse unconditionally; only the limit stops the stack growing.
        ctx.effect(move || {
            if ctx_in.notify().is_err() {
                rejections_in.set(rejections_in.get() + 1);
            }
        });

        ctx.notify().unwrap();
        assert_eq!(rejections.get(), 1);
        assert_eq!(ctx.notify_depth(), 0);
    }

    #[test]
    fn debug_format() {
        let ctx = ReactiveContext::new();
        let dbg = format!("{ctx:?}");
        assert!(dbg.contains("ReactiveContext"));
        assert!(dbg.contains("registered: false"));
    }
}
