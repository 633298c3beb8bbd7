//! Host Adapter
//!
//! The renderer never touches a concrete display surface. Everything it
//! does to the target goes through a [`Host`]: creating nodes, patching
//! props, inserting, removing and setting text. Any surface that can
//! implement these six operations can be rendered to: a DOM, a terminal
//! grid, a scene graph or the in-memory tree used in tests.
//!
//! Host methods take `&self`. The renderer is re-entrant (a component update
//! can run in the middle of patching its parent), so hosts keep their state
//! behind interior mutability.

use std::fmt::Debug;

use crate::reactive::Value;

/// Operations the renderer performs on a target surface.
pub trait Host: 'static {
    /// Handle to a node on the surface.
    type Node: Clone + PartialEq + Debug + 'static;

    /// Create an element node with the given tag.
    fn create_element(&self, tag: &str) -> Self::Node;

    /// Create a text node.
    fn create_text(&self, text: &str) -> Self::Node;

    /// Apply a prop change. `next == None` means the prop was removed.
    ///
    /// Keys shaped like `onClick` (see [`is_on`]) carry event handlers.
    fn patch_prop(
        &self,
        el: &Self::Node,
        key: &str,
        prev: Option<&Value>,
        next: Option<&Value>,
    );

    /// Insert `child` into `parent` before `anchor`, or at the end when
    /// there is no anchor. Inserting an attached node moves it.
    fn insert(&self, child: &Self::Node, parent: &Self::Node, anchor: Option<&Self::Node>);

    /// Detach a node from its parent.
    fn remove(&self, child: &Self::Node);

    /// Replace the text content of a node, dropping any children.
    fn set_element_text(&self, el: &Self::Node, text: &str);
}

/// Whether a prop key names an event handler: `on` followed by an
/// uppercase letter.
pub fn is_on(key: &str) -> bool {
    let bytes = key.as_bytes();
    bytes.len() > 2 && bytes.starts_with(b"on") && bytes[2].is_ascii_uppercase()
}

/// Event name for a handler key: `onClick` becomes `click`.
pub fn event_name(key: &str) -> String {
    key.get(2..).unwrap_or_default().to_ascii_lowercase()
}
