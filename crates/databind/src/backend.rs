//! Backend selection.
//!
//! Both interception strategies satisfy one wrap signature, so embedding
//! code can stay generic over the strategy and still get the identical
//! notification contract: one global computation, fired synchronously,
//! last registration wins.

use databind_core::{ReactiveContext, Value};

use crate::{descriptor, transparent};

/// An interception strategy: how plain data becomes an observed value.
pub trait Backend {
    /// What wrapping produces (pass-through primitive or observed handle).
    type Observed;

    /// Convert a plain value into an observed value bound to `ctx`.
    fn wrap(ctx: &ReactiveContext, value: Value) -> Self::Observed;
}

/// The eager, equality-checked strategy ([`crate::descriptor`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct Descriptor;

impl Backend for Descriptor {
    type Observed = descriptor::Reactive;

    fn wrap(ctx: &ReactiveContext, value: Value) -> Self::Observed {
        descriptor::wrap(ctx, value)
    }
}

/// The lazy, unconditionally-notifying strategy ([`crate::transparent`]).
#[derive(Debug, Clone, Copy, Default)]
pub struct Transparent;

impl Backend for Transparent {
    type Observed = transparent::Proxied;

    fn wrap(ctx: &ReactiveContext, value: Value) -> Self::Observed {
        transparent::wrap(ctx, value)
    }
}
