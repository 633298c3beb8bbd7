//! Rendering Pipeline
//!
//! This module turns vnode trees into mutations of a target surface.
//!
//! # Concepts
//!
//! ## VNodes
//!
//! A [`VNode`] describes an element, component, fragment or text node. A
//! fresh tree is built on every render; the [`Renderer`] diffs it against
//! the previous one.
//!
//! ## Hosts
//!
//! The renderer only talks to the surface through the [`Host`] trait.
//! [`MemoryHost`] is a retained in-memory implementation that records every
//! operation, used for tests and benchmarks.
//!
//! ## Components
//!
//! A [`Component`] renders inside an effect, so it re-renders when state it
//! read changes. Updates go through the [`scheduler`] and are batched.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::render::{h, props, MemoryHost, Renderer};
//!
//! let host = MemoryHost::new();
//! let root = host.create_root();
//! let renderer = Renderer::new(host.clone());
//!
//! renderer.render(h("p", props([("id", "greeting")]), "hello"), &root);
//! assert_eq!(host.serialize(root), "<p id=\"greeting\">hello</p>");
//! ```

mod app;
mod component;
mod host;
mod inject;
mod memory;
mod renderer;
pub mod scheduler;
mod sequence;
mod shape;
mod vnode;

pub use app::App;
pub use component::{
    camelize, should_update_component, to_handler_key, Component, ComponentInstance,
    PublicInstance, RenderFn, SetupContext, SetupFn, SetupResult,
};
pub use host::{event_name, is_on, Host};
pub use inject::ProvideScope;
pub use memory::{HostOp, MemoryHost, NodeId};
pub use renderer::Renderer;
pub use scheduler::{flush_jobs, next_tick, queue_job, run_local, Job};
pub use sequence::get_sequence;
pub use shape::ShapeFlags;
pub use vnode::{
    create_text_vnode, create_vnode, fragment, h, is_same_vnode_type, props, slot, Children,
    NodeKey, Props, SlotFn, Slots, VNode, VNodeType,
};
