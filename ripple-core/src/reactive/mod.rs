//! Reactive Primitives
//!
//! This module implements the reactivity engine: a dependency graph,
//! effects, reactive wrappers, refs and computed values. Together they give
//! Ripple transparent, fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An [`Effect`] is a re-runnable computation. While it runs, every reactive
//! read it makes registers it as a dependent; a later write to any of those
//! reads replays it (or calls its scheduler, if it has one).
//!
//! ## Reactive Wrappers
//!
//! [`reactive`], [`readonly`] and [`shallow_readonly`] wrap a record or list.
//! Mutable wrappers track reads and trigger on writes. Read-only wrappers
//! reject writes. Nested objects are wrapped lazily on access.
//!
//! ## Refs
//!
//! A [`Ref`] is a reactive box for a single value with its own private
//! dependency set. [`proxy_refs`] exposes a record of refs with automatic
//! unwrapping.
//!
//! ## Computed Values
//!
//! A [`Computed`] caches a derived value and recomputes it only when read
//! after an input changed.
//!
//! # Implementation Notes
//!
//! Tracking relies on a thread-local stack of running effects
//! ([`ReactiveContext`]). Reading a reactive property checks the top of the
//! stack and, if an effect is running, registers it in the [`Dep`] for that
//! (object, key) pair. The graph of deps lives in [`Runtime`].

mod computed;
mod context;
mod dep;
mod effect;
mod proxy;
mod refs;
mod runtime;
mod subscriber;
mod value;

pub use computed::{computed, Computed};
pub use context::{untrack, ReactiveContext};
pub use dep::Dep;
pub use effect::{effect, effect_with, stop, Effect, EffectOptions, EffectScheduler};
pub use proxy::{
    is_proxy, is_reactive, is_readonly, reactive, readonly, shallow_readonly, to_raw, ProxyKind,
    Reactive,
};
pub use refs::{is_ref, proxy_refs, ref_value, unref, ProxyRefs, Ref};
pub use runtime::{track, trigger, Runtime};
pub use subscriber::SubscriberId;
pub use value::{has_changed, Func, Key, ObjectData, ObjectId, RawObject, Value};
