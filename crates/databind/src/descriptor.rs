#![forbid(unsafe_code)]

//! Descriptor backend: eager per-slot instrumentation.
//!
//! # Design
//!
//! [`wrap()`] walks the plain value once, at construction time, and captures
//! every key present at that moment into an instrumented slot. The captured
//! value — not the original storage — is what reads return and writes
//! compare against. Nested objects and arrays are wrapped recursively during
//! that single walk, eagerly and permanently.
//!
//! Arrays get an explicit wrapper type that owns the backing sequence and
//! exposes the seven mutating operations (`push`, `pop`, `shift`,
//! `unshift`, `splice`, `sort_by`, `reverse`) directly; each notifies
//! *before* delegating to the sequence. There is no shared method table to
//! patch.
//!
//! # Invariants
//!
//! 1. Slots exist only for keys present at wrap time; later insertions are
//!    uninstrumented (silent, no notification — a reproduced gap, not a
//!    bug to fix here).
//! 2. An equality-checked write notifies first, then stores. If
//!    notification fails the store does not happen.
//! 3. A value assigned into a slot after wrap time is **not** re-wrapped:
//!    nested objects arriving late never become reactive in this backend.
//! 4. Handles are shared: clones (and handles returned by reads) alias the
//!    same slots.
//!
//! # Failure Modes
//!
//! - **Same-value write**: silent no-op, by equality on the plain
//!   projection. NaN is unequal to itself, so NaN writes always notify.
//! - **Deletion**: never intercepted by this backend; `remove` bypasses
//!   notification entirely.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use databind_core::{Key, PropertyOps, ReactiveContext, ReactiveError, Value};

/// Convert a plain value into an observed value.
///
/// Primitives (including `Null`) pass through unchanged as
/// [`Reactive::Plain`]; objects and arrays come back instrumented.
#[must_use]
pub fn wrap(ctx: &ReactiveContext, value: Value) -> Reactive {
    match value {
        Value::Object(map) => Reactive::Object(ObservedObject::wrap(ctx, map)),
        Value::Array(items) => Reactive::Array(ObservedArray::wrap(ctx, items)),
        other => Reactive::Plain(other),
    }
}

/// One captured property or element.
#[derive(Debug, Clone)]
enum Slot {
    /// Wrapped at construction time; mutations through it notify.
    Wrapped(Reactive),
    /// Assigned after construction; plain storage, not instrumented.
    Plain(Value),
}

impl Slot {
    fn to_value(&self) -> Value {
        match self {
            Slot::Wrapped(observed) => observed.to_value(),
            Slot::Plain(value) => value.clone(),
        }
    }

    fn as_reactive(&self) -> Reactive {
        match self {
            Slot::Wrapped(observed) => observed.clone(),
            Slot::Plain(value) => Reactive::Plain(value.clone()),
        }
    }
}

/// Result of wrapping with the descriptor backend.
#[derive(Debug, Clone)]
pub enum Reactive {
    /// Pass-through primitive; never instrumented.
    Plain(Value),
    /// Instrumented object.
    Object(ObservedObject),
    /// Instrumented array.
    Array(ObservedArray),
}

impl Reactive {
    /// Plain snapshot of the current state.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Reactive::Plain(value) => value.clone(),
            Reactive::Object(object) => object.to_value(),
            Reactive::Array(array) => array.to_value(),
        }
    }

    /// The observed object, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObservedObject> {
        match self {
            Reactive::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The observed array, if this is one.
    #[must_use]
    pub fn as_array(&self) -> Option<&ObservedArray> {
        match self {
            Reactive::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Whether the value passed through without instrumentation.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        matches!(self, Reactive::Plain(_))
    }
}

impl PartialEq<Value> for Reactive {
    fn eq(&self, other: &Value) -> bool {
        self.to_value() == *other
    }
}

// ─── ObservedObject ──────────────────────────────────────────────────────────

/// An object whose keys were captured into instrumented slots at wrap time.
///
/// Cloning yields a handle to the **same** slots.
#[derive(Debug, Clone)]
pub struct ObservedObject {
    ctx: ReactiveContext,
    slots: Rc<RefCell<BTreeMap<String, Slot>>>,
}

impl ObservedObject {
    fn wrap(ctx: &ReactiveContext, map: BTreeMap<String, Value>) -> Self {
        #[cfg(feature = "tracing")]
        tracing::trace!(message = "descriptor.wrap_object", keys = map.len());
        let slots = map
            .into_iter()
            .map(|(key, value)| (key, Slot::Wrapped(wrap(ctx, value))))
            .collect();
        Self {
            ctx: ctx.clone(),
            slots: Rc::new(RefCell::new(slots)),
        }
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Whether no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// The keys currently stored, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.slots.borrow().keys().cloned().collect()
    }

    /// Plain snapshot of the current state.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.slots
                .borrow()
                .iter()
                .map(|(key, slot)| (key.clone(), slot.to_value()))
                .collect(),
        )
    }

    fn prop_name(key: Key) -> String {
        match key {
            Key::Prop(name) => name,
            // The source host coerces index keys on objects to strings.
            Key::Index(index) => index.to_string(),
        }
    }
}

impl PropertyOps for ObservedObject {
    type Nested = Reactive;

    fn read(&self, key: impl Into<Key>) -> Option<Reactive> {
        let name = Self::prop_name(key.into());
        self.slots.borrow().get(&name).map(Slot::as_reactive)
    }

    /// Equality-checked write: unchanged values are silent; changed values
    /// notify first, then store the incoming value as an uninstrumented
    /// plain slot (no re-wrap). Keys absent at wrap time insert silently.
    fn write(&self, key: impl Into<Key>, value: Value) -> Result<(), ReactiveError> {
        let name = Self::prop_name(key.into());
        // Borrow released before notify(): the computation may read or
        // write this object while it runs.
        let current = self.slots.borrow().get(&name).map(|slot| slot.to_value());
        match current {
            Some(current) => {
                if current == value {
                    return Ok(());
                }
                self.ctx.notify()?;
                self.slots.borrow_mut().insert(name, Slot::Plain(value));
                Ok(())
            }
            None => {
                // Key did not exist at wrap time: no accessor was installed,
                // so the insert bypasses instrumentation entirely.
                self.slots.borrow_mut().insert(name, Slot::Plain(value));
                Ok(())
            }
        }
    }

    /// Deletion was never intercepted by this backend: the slot is dropped
    /// without notification.
    fn remove(&self, key: impl Into<Key>) -> Result<Option<Value>, ReactiveError> {
        let name = Self::prop_name(key.into());
        Ok(self
            .slots
            .borrow_mut()
            .remove(&name)
            .map(|slot| slot.to_value()))
    }
}

// ─── ObservedArray ───────────────────────────────────────────────────────────

/// An array that owns its backing sequence and instruments the seven
/// mutating operations.
///
/// Cloning yields a handle to the **same** sequence. Every mutating
/// operation notifies *before* it touches the sequence, so a computation
/// observing the array sees the pre-mutation state.
#[derive(Debug, Clone)]
pub struct ObservedArray {
    ctx: ReactiveContext,
    items: Rc<RefCell<Vec<Slot>>>,
}

impl ObservedArray {
    fn wrap(ctx: &ReactiveContext, items: Vec<Value>) -> Self {
        #[cfg(feature = "tracing")]
        tracing::trace!(message = "descriptor.wrap_array", len = items.len());
        let items = items
            .into_iter()
            .map(|value| Slot::Wrapped(wrap(ctx, value)))
            .collect();
        Self {
            ctx: ctx.clone(),
            items: Rc::new(RefCell::new(items)),
        }
    }

    /// Current element count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the array is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Plain snapshot of the current state.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Array(self.items.borrow().iter().map(Slot::to_value).collect())
    }

    /// Append `value`. Notifies, then delegates. The appended value is not
    /// wrapped.
    pub fn push(&self, value: Value) -> Result<(), ReactiveError> {
        self.ctx.notify()?;
        self.items.borrow_mut().push(Slot::Plain(value));
        Ok(())
    }

    /// Remove and return the last element. Notifies even when empty.
    pub fn pop(&self) -> Result<Option<Value>, ReactiveError> {
        self.ctx.notify()?;
        Ok(self.items.borrow_mut().pop().map(|slot| slot.to_value()))
    }

    /// Remove and return the first element. Notifies even when empty.
    pub fn shift(&self) -> Result<Option<Value>, ReactiveError> {
        self.ctx.notify()?;
        let mut items = self.items.borrow_mut();
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(items.remove(0).to_value()))
        }
    }

    /// Prepend `value`. Notifies, then delegates.
    pub fn unshift(&self, value: Value) -> Result<(), ReactiveError> {
        self.ctx.notify()?;
        self.items.borrow_mut().insert(0, Slot::Plain(value));
        Ok(())
    }

    /// Remove `delete_count` elements starting at `start`, inserting
    /// `replacement` in their place; returns the removed elements. Bounds
    /// are clamped to the sequence, as in the source host.
    pub fn splice(
        &self,
        start: usize,
        delete_count: usize,
        replacement: Vec<Value>,
    ) -> Result<Vec<Value>, ReactiveError> {
        self.ctx.notify()?;
        let mut items = self.items.borrow_mut();
        let start = start.min(items.len());
        let end = start.saturating_add(delete_count).min(items.len());
        let removed = items
            .splice(start..end, replacement.into_iter().map(Slot::Plain))
            .map(|slot| slot.to_value())
            .collect();
        Ok(removed)
    }

    /// Sort in place by `compare` over plain projections. Notifies, then
    /// delegates.
    pub fn sort_by(
        &self,
        mut compare: impl FnMut(&Value, &Value) -> Ordering,
    ) -> Result<(), ReactiveError> {
        self.ctx.notify()?;
        self.items
            .borrow_mut()
            .sort_by(|a, b| compare(&a.to_value(), &b.to_value()));
        Ok(())
    }

    /// Reverse in place. Notifies, then delegates.
    pub fn reverse(&self) -> Result<(), ReactiveError> {
        self.ctx.notify()?;
        self.items.borrow_mut().reverse();
        Ok(())
    }

    fn index_of(key: Key) -> Option<usize> {
        match key {
            Key::Index(index) => Some(index),
            Key::Prop(name) => name.parse().ok(),
        }
    }
}

impl PropertyOps for ObservedArray {
    type Nested = Reactive;

    fn read(&self, key: impl Into<Key>) -> Option<Reactive> {
        let index = Self::index_of(key.into())?;
        self.items.borrow().get(index).map(Slot::as_reactive)
    }

    /// Index writes follow the same captured-slot rules as object keys:
    /// equality-checked for indices present at wrap time, silent
    /// (null-padded) extension for indices past the end.
    ///
    /// Non-numeric property keys are dropped silently, without
    /// notification. This diverges from the source host, which stores named
    /// properties on arrays as plain uninstrumented members; the backing
    /// sequence here has no place for named members, so the write has
    /// nowhere to land.
    fn write(&self, key: impl Into<Key>, value: Value) -> Result<(), ReactiveError> {
        let Some(index) = Self::index_of(key.into()) else {
            return Ok(());
        };
        let current = self.items.borrow().get(index).map(|slot| slot.to_value());
        match current {
            Some(current) => {
                if current == value {
                    return Ok(());
                }
                self.ctx.notify()?;
                self.items.borrow_mut()[index] = Slot::Plain(value);
                Ok(())
            }
            None => {
                let mut items = self.items.borrow_mut();
                items.resize(index, Slot::Plain(Value::Null));
                items.push(Slot::Plain(value));
                Ok(())
            }
        }
    }

    /// Uninstrumented, like object deletion; leaves a `Null` hole.
    fn remove(&self, key: impl Into<Key>) -> Result<Option<Value>, ReactiveError> {
        let Some(index) = Self::index_of(key.into()) else {
            return Ok(None);
        };
        let mut items = self.items.borrow_mut();
        if index < items.len() {
            let prior = std::mem::replace(&mut items[index], Slot::Plain(Value::Null));
            Ok(Some(prior.to_value()))
        } else {
            Ok(None)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_ctx() -> (ReactiveContext, Rc<Cell<u32>>) {
        let ctx = ReactiveContext::new();
        let calls = Rc::new(Cell::new(0u32));
        let calls_in = Rc::clone(&calls);
        ctx.effect(move || calls_in.set(calls_in.get() + 1));
        (ctx, calls)
    }

    #[test]
    fn primitives_pass_through() {
        let ctx = ReactiveContext::new();
        assert_eq!(wrap(&ctx, Value::Int(5)), Value::Int(5));
        assert_eq!(wrap(&ctx, Value::from("x")), Value::from("x"));
        assert_eq!(wrap(&ctx, Value::Null), Value::Null);
        assert!(wrap(&ctx, Value::Bool(true)).is_plain());
    }

    #[test]
    fn changed_write_notifies_once() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(&ctx, Value::object([("a", 1.into())]));
        let obj = obj.as_object().unwrap();

        obj.write("a", 2.into()).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(obj.read("a").unwrap(), Value::Int(2));
    }

    #[test]
    fn same_value_write_is_silent() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(&ctx, Value::object([("a", 1.into())]));
        let obj = obj.as_object().unwrap();

        obj.write("a", 2.into()).unwrap();
        obj.write("a", 2.into()).unwrap();
        obj.write("a", 2.into()).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn nan_write_always_notifies() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(&ctx, Value::object([("x", f64::NAN.into())]));
        let obj = obj.as_object().unwrap();

        obj.write("x", f64::NAN.into()).unwrap();
        obj.write("x", f64::NAN.into()).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn nested_objects_are_wrapped_eagerly() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(
            &ctx,
            Value::object([("inner", Value::object([("x", 1.into())]))]),
        );
        let obj = obj.as_object().unwrap();

        let inner = obj.read("inner").unwrap();
        let inner = inner.as_object().unwrap();
        inner.write("x", 2.into()).unwrap();
        assert_eq!(calls.get(), 1);

        // Both handles alias the same slots.
        assert_eq!(
            obj.to_value(),
            Value::object([("inner", Value::object([("x", 2.into())]))])
        );
    }

    #[test]
    fn late_assigned_nested_object_is_not_reactive() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(&ctx, Value::object([("inner", Value::Null)]));
        let obj = obj.as_object().unwrap();

        obj.write("inner", Value::object([("x", 1.into())])).unwrap();
        assert_eq!(calls.get(), 1);

        // The freshly assigned object comes back plain: mutating it cannot
        // notify. This asymmetry with the transparent backend is deliberate.
        let inner = obj.read("inner").unwrap();
        assert!(inner.is_plain());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn post_wrap_key_insert_is_silent() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(&ctx, Value::object([("a", 1.into())]));
        let obj = obj.as_object().unwrap();

        obj.write("b", 2.into()).unwrap();
        assert_eq!(calls.get(), 0, "new keys bypass instrumentation");
        assert_eq!(obj.read("b").unwrap(), Value::Int(2));

        // The silently inserted key stays uninstrumented on rewrite too.
        obj.write("b", 3.into()).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn remove_is_uninstrumented() {
        let (ctx, calls) = counting_ctx();
        let obj = wrap(&ctx, Value::object([("a", 1.into())]));
        let obj = obj.as_object().unwrap();

        assert_eq!(obj.remove("a").unwrap(), Some(Value::Int(1)));
        assert_eq!(calls.get(), 0);
        assert!(obj.read("a").is_none());
    }

    #[test]
    fn empty_registration_write_fails_and_keeps_value() {
        let ctx = ReactiveContext::new();
        let obj = wrap(&ctx, Value::object([("a", 1.into())]));
        let obj = obj.as_object().unwrap();

        assert_eq!(
            obj.write("a", 2.into()),
            Err(ReactiveError::EmptyRegistration)
        );
        assert_eq!(obj.read("a").unwrap(), Value::Int(1), "failed write must not land");

        // Same-value writes never reach notify, so they still succeed.
        obj.write("a", 1.into()).unwrap();
    }

    #[test]
    fn push_notifies_once_and_appends() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([1.into(), 2.into(), 3.into()]));
        let arr = arr.as_array().unwrap();

        arr.push(4.into()).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(
            arr.to_value(),
            Value::array([1.into(), 2.into(), 3.into(), 4.into()])
        );
    }

    #[test]
    fn computation_sees_pre_mutation_state() {
        let ctx = ReactiveContext::new();
        let arr = wrap(&ctx, Value::array([1.into()]));
        let arr = arr.as_array().unwrap();

        let seen = Rc::new(Cell::new(0usize));
        let seen_in = Rc::clone(&seen);
        let arr_in = arr.clone();
        ctx.effect(move || seen_in.set(arr_in.len()));

        arr.push(2.into()).unwrap();
        assert_eq!(seen.get(), 1, "notification precedes the mutation");
        assert_eq!(arr.len(), 2);
    }

    #[test]
    fn seven_mutators_each_notify() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([3.into(), 1.into(), 2.into()]));
        let arr = arr.as_array().unwrap();

        arr.push(4.into()).unwrap();
        assert_eq!(arr.pop().unwrap(), Some(Value::Int(4)));
        assert_eq!(arr.shift().unwrap(), Some(Value::Int(3)));
        arr.unshift(0.into()).unwrap();
        let removed = arr.splice(1, 1, vec![7.into(), 8.into()]).unwrap();
        assert_eq!(removed, vec![Value::Int(1)]);
        arr.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}"))).unwrap();
        arr.reverse().unwrap();
        assert_eq!(calls.get(), 7);
    }

    #[test]
    fn pop_on_empty_still_notifies() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([]));
        let arr = arr.as_array().unwrap();

        assert_eq!(arr.pop().unwrap(), None);
        assert_eq!(arr.shift().unwrap(), None);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn splice_clamps_bounds() {
        let (ctx, _calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([1.into(), 2.into()]));
        let arr = arr.as_array().unwrap();

        let removed = arr.splice(5, 9, vec![3.into()]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(arr.to_value(), Value::array([1.into(), 2.into(), 3.into()]));
    }

    #[test]
    fn index_writes_are_equality_checked() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([1.into(), 2.into()]));
        let arr = arr.as_array().unwrap();

        arr.write(0, 1.into()).unwrap();
        assert_eq!(calls.get(), 0);
        arr.write(0, 9.into()).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(arr.read(0).unwrap(), Value::Int(9));
    }

    #[test]
    fn out_of_bounds_index_write_extends_silently() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([1.into()]));
        let arr = arr.as_array().unwrap();

        arr.write(3, 9.into()).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(
            arr.to_value(),
            Value::array([1.into(), Value::Null, Value::Null, 9.into()])
        );
    }

    #[test]
    fn nested_array_elements_wrapped_eagerly() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([Value::object([("x", 1.into())])]));
        let arr = arr.as_array().unwrap();

        let first = arr.read(0).unwrap();
        first.as_object().unwrap().write("x", 2.into()).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(arr.to_value(), Value::array([Value::object([("x", 2.into())])]));
    }

    #[test]
    fn named_property_write_on_array_is_dropped_silently() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([1.into()]));
        let arr = arr.as_array().unwrap();

        // Numeric-string keys coerce to indices; anything else is dropped
        // without storage or notification.
        arr.write("label", "x".into()).unwrap();
        assert_eq!(calls.get(), 0);
        assert!(arr.read("label").is_none());
        assert_eq!(arr.to_value(), Value::array([1.into()]));

        arr.write("0", 9.into()).unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(arr.read(0usize).unwrap(), Value::Int(9));
    }

    #[test]
    fn array_remove_leaves_hole_without_notify() {
        let (ctx, calls) = counting_ctx();
        let arr = wrap(&ctx, Value::array([1.into(), 2.into()]));
        let arr = arr.as_array().unwrap();

        assert_eq!(arr.remove(0).unwrap(), Some(Value::Int(1)));
        assert_eq!(calls.get(), 0);
        assert_eq!(arr.to_value(), Value::array([Value::Null, 2.into()]));
    }

    #[test]
    fn last_registration_wins_through_wrapper() {
        let ctx = ReactiveContext::new();
        let obj = wrap(&ctx, Value::object([("a", 1.into())]));
        let obj = obj.as_object().unwrap();

        let a = Rc::new(Cell::new(0u32));
        let b = Rc::new(Cell::new(0u32));
        let a_in = Rc::clone(&a);
        ctx.effect(move || a_in.set(a_in.get() + 1));
        let b_in = Rc::clone(&b);
        ctx.effect(move || b_in.set(b_in.get() + 1));

        obj.write("a", 2.into()).unwrap();
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn snapshot_reflects_deep_mutation() {
        let (ctx, _calls) = counting_ctx();
        let obj = wrap(
            &ctx,
            Value::object([
                ("title", "draft".into()),
                ("tags", Value::array(["a".into()])),
            ]),
        );
        let obj = obj.as_object().unwrap();

        obj.read("tags")
            .unwrap()
            .as_array()
            .unwrap()
            .push("b".into())
            .unwrap();
        obj.write("title", "final".into()).unwrap();

        assert_eq!(
            obj.to_value(),
            Value::object([
                ("title", "final".into()),
                ("tags", Value::array(["a".into(), "b".into()])),
            ])
        );
    }
}
