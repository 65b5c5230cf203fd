#![forbid(unsafe_code)]

//! Core: plain-data value model and the change-notification protocol.
//!
//! This crate is the leaf of the databind workspace. It defines:
//!
//! - [`Value`]: an explicit tagged variant over primitives, objects, and
//!   arrays — the plain data that wrapper backends instrument.
//! - [`ReactiveContext`]: the registration cell holding the single active
//!   computation, plus the synchronous notification entry point.
//! - [`PropertyOps`]: the get/set/delete capability seam that every wrapper
//!   backend dispatches through.
//!
//! # Architecture
//!
//! Everything here is single-threaded by design: the context is an
//! `Rc<RefCell<..>>` handle, and notification is a direct call on the
//! mutator's stack. There is no scheduling, no batching, and no subscriber
//! list — exactly one computation is live at a time, and registering a new
//! one silently replaces the old one.
//!
//! # Invariants
//!
//! 1. One registration cell per context; last registration wins.
//! 2. `notify()` invokes the active computation synchronously, at most once
//!    per call, on the caller's stack.
//! 3. `notify()` with an empty cell fails with
//!    [`ReactiveError::EmptyRegistration`]; it never invents a default.
//! 4. Re-entrant notification is permitted (and unguarded) by default.

pub mod context;
pub mod ops;
pub mod value;

pub use context::{ReactiveContext, ReactiveError};
pub use ops::PropertyOps;
pub use value::{Key, Shape, Value};
