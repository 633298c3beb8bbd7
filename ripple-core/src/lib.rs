//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (reactive objects, refs, effects, computed values)
//! - A dependency graph that replays effects when the state they read changes
//! - Virtual nodes and a renderer with a keyed children diff
//! - Components with props, slots, emit and provide/inject
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives and dependency tracking
//! - `render`: Virtual nodes, the renderer, components and the update scheduler
//! - `error`: The error type shared by both
//!
//! Everything is single-threaded: reactive state and rendered trees are `Rc`
//! based and the dependency graph is thread-local.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::{effect, reactive, Value};
//! use std::{cell::Cell, rc::Rc};
//!
//! let state = reactive(Value::from(serde_json::json!({ "count": 0 })));
//! let proxy = state.as_proxy().unwrap().clone();
//!
//! let seen = Rc::new(Cell::new(0));
//! let (reader, sink) = (proxy.clone(), seen.clone());
//! let _e = effect(move || sink.set(reader.get("count").as_int().unwrap_or_default()));
//!
//! proxy.set("count", 5).unwrap();
//! // The effect re-ran on the write.
//! assert_eq!(seen.get(), 5);
//! ```

pub mod error;
pub mod reactive;
pub mod render;

pub use error::{Error, Result};
