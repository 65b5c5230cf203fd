#![forbid(unsafe_code)]

//! Minimal reactive data-binding runtime.
//!
//! Plain data goes in, an observed value comes out: every subsequent
//! mutation through the observed value invokes the single computation
//! registered on the shared [`ReactiveContext`]. Two interchangeable
//! interception backends implement that contract:
//!
//! - [`descriptor`]: eager per-slot instrumentation. Nested objects are
//!   wrapped once, at construction time; writes are equality-checked and
//!   only changes notify.
//! - [`transparent`]: lazy pass-through handles over a shared plain tree.
//!   Nested values are wrapped on every read; writes and deletions notify
//!   unconditionally, equal value or not.
//!
//! The backends deliberately do **not** agree on the edges (post-wrap key
//! insertion, same-value writes, deletion); each reproduces its own source
//! semantics. What they share is the coarse notification contract: one
//! global computation, fired synchronously on the mutator's stack, last
//! registration wins.
//!
//! # Example
//!
//! ```
//! use databind::descriptor;
//! use databind::{PropertyOps, ReactiveContext, Value};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let ctx = ReactiveContext::new();
//! let renders = Rc::new(Cell::new(0u32));
//! let renders_in = Rc::clone(&renders);
//! ctx.effect(move || renders_in.set(renders_in.get() + 1));
//!
//! let state = descriptor::wrap(&ctx, Value::object([("count", 0.into())]));
//! let state = state.as_object().unwrap();
//! state.write("count", 1.into()).unwrap();
//! assert_eq!(renders.get(), 1);
//! ```

pub mod backend;
pub mod descriptor;
pub mod transparent;

pub use backend::Backend;
pub use databind_core::{Key, PropertyOps, ReactiveContext, ReactiveError, Shape, Value};
pub use descriptor::{ObservedArray, ObservedObject, Reactive};
pub use transparent::{Proxied, ProxyHandle};
