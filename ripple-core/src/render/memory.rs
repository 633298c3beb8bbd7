//! In-memory host.
//!
//! [`MemoryHost`] keeps a retained tree of nodes and records every operation
//! the renderer performs on it. Tests and benchmarks use it to inspect both
//! the resulting tree and the exact mutations that produced it.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;

use super::host::{event_name, is_on, Host};
use crate::reactive::{Func, Value};

/// Handle to a node in a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    Create {
        node: NodeId,
        tag: String,
    },
    CreateText {
        node: NodeId,
        text: String,
    },
    PatchProp {
        node: NodeId,
        key: String,
        value: Option<Value>,
    },
    Insert {
        node: NodeId,
        parent: NodeId,
        anchor: Option<NodeId>,
        /// The node was already attached, so this insert moved it.
        moved: bool,
    },
    Remove {
        node: NodeId,
    },
    SetText {
        node: NodeId,
        text: String,
    },
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, Value>,
        listeners: IndexMap<String, Func>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct MemoryTree {
    nodes: Vec<MemNode>,
    ops: Vec<HostOp>,
}

impl MemoryTree {
    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(MemNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes[node.0].parent.take() else {
            return false;
        };
        self.nodes[parent.0].children.retain(|&c| c != node);
        true
    }
}

/// A retained in-memory surface that logs every operation.
///
/// Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost(Rc<RefCell<MemoryTree>>);

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container element. Not recorded as an operation.
    pub fn create_root(&self) -> NodeId {
        self.0.borrow_mut().alloc(NodeKind::Element {
            tag: "root".to_owned(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        })
    }

    /// Operations recorded so far.
    pub fn ops(&self) -> Vec<HostOp> {
        self.0.borrow().ops.clone()
    }

    /// Forget recorded operations. The tree is kept.
    pub fn clear_ops(&self) {
        self.0.borrow_mut().ops.clear();
    }

    /// Number of recorded inserts that moved an attached node.
    pub fn move_count(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Insert { moved: true, .. }))
    }

    /// Number of recorded node creations, elements and text.
    pub fn create_count(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Create { .. } | HostOp::CreateText { .. }))
    }

    pub fn remove_count(&self) -> usize {
        self.count(|op| matches!(op, HostOp::Remove { .. }))
    }

    fn count(&self, f: impl Fn(&HostOp) -> bool) -> usize {
        self.0.borrow().ops.iter().filter(|op| f(op)).count()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.0.borrow().nodes[node.0].children.clone()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.0.borrow().nodes[node.0].parent
    }

    /// Tag of an element, `None` for text nodes.
    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.0.borrow().nodes[node.0].kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    /// Concatenated text of a node and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let tree = self.0.borrow();
        let mut out = String::new();
        collect_text(&tree, node, &mut out);
        out
    }

    /// Current value of an attribute.
    pub fn attr(&self, node: NodeId, key: &str) -> Option<Value> {
        match &self.0.borrow().nodes[node.0].kind {
            NodeKind::Element { attrs, .. } => attrs.get(key).cloned(),
            NodeKind::Text(_) => None,
        }
    }

    /// Call the listener registered for `event` on a node.
    ///
    /// Returns `None` when no listener is registered.
    pub fn dispatch(&self, node: NodeId, event: &str, args: &[Value]) -> Option<Value> {
        let listener = match &self.0.borrow().nodes[node.0].kind {
            NodeKind::Element { listeners, .. } => listeners.get(event).cloned(),
            NodeKind::Text(_) => None,
        };
        // The tree borrow is released so the handler can re-render.
        listener.map(|f| f.call(args))
    }

    /// Markup for a node's children, e.g. `<div id="a">hi</div>`.
    pub fn serialize(&self, node: NodeId) -> String {
        let tree = self.0.borrow();
        let mut out = String::new();
        for &child in &tree.nodes[node.0].children {
            write_node(&tree, child, &mut out);
        }
        out
    }

    fn record(&self, op: HostOp) {
        self.0.borrow_mut().ops.push(op);
    }
}

fn collect_text(tree: &MemoryTree, node: NodeId, out: &mut String) {
    let node = &tree.nodes[node.0];
    if let NodeKind::Text(text) = &node.kind {
        out.push_str(text);
    }
    for &child in &node.children {
        collect_text(tree, child, out);
    }
}

fn write_node(tree: &MemoryTree, id: NodeId, out: &mut String) {
    let node = &tree.nodes[id.0];
    match &node.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Element { tag, attrs, .. } => {
            let _ = write!(out, "<{tag}");
            for (key, value) in attrs {
                let _ = write!(out, " {key}=\"{}\"", value.to_display_string());
            }
            out.push('>');
            for &child in &node.children {
                write_node(tree, child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

impl Host for MemoryHost {
    type Node = NodeId;

    fn create_element(&self, tag: &str) -> NodeId {
        let node = self.0.borrow_mut().alloc(NodeKind::Element {
            tag: tag.to_owned(),
            attrs: IndexMap::new(),
            listeners: IndexMap::new(),
        });
        self.record(HostOp::Create {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text(&self, text: &str) -> NodeId {
        let node = self.0.borrow_mut().alloc(NodeKind::Text(text.to_owned()));
        self.record(HostOp::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn patch_prop(&self, el: &NodeId, key: &str, _prev: Option<&Value>, next: Option<&Value>) {
        {
            let mut tree = self.0.borrow_mut();
            if let NodeKind::Element {
                attrs, listeners, ..
            } = &mut tree.nodes[el.0].kind
            {
                if is_on(key) {
                    match next.and_then(Value::as_func) {
                        Some(f) => {
                            listeners.insert(event_name(key), f.clone());
                        }
                        None => {
                            listeners.shift_remove(&event_name(key));
                        }
                    }
                } else {
                    match next {
                        Some(value) if !value.is_null() => {
                            attrs.insert(key.to_owned(), value.clone());
                        }
                        _ => {
                            attrs.shift_remove(key);
                        }
                    }
                }
            }
        }
        self.record(HostOp::PatchProp {
            node: *el,
            key: key.to_owned(),
            value: next.cloned(),
        });
    }

    fn insert(&self, child: &NodeId, parent: &NodeId, anchor: Option<&NodeId>) {
        let moved = {
            let mut tree = self.0.borrow_mut();
            let moved = tree.detach(*child);
            let siblings = &mut tree.nodes[parent.0].children;
            let at = anchor
                .and_then(|a| siblings.iter().position(|c| c == a))
                .unwrap_or(siblings.len());
            siblings.insert(at, *child);
            tree.nodes[child.0].parent = Some(*parent);
            moved
        };
        self.record(HostOp::Insert {
            node: *child,
            parent: *parent,
            anchor: anchor.copied(),
            moved,
        });
    }

    fn remove(&self, child: &NodeId) {
        self.0.borrow_mut().detach(*child);
        self.record(HostOp::Remove { node: *child });
    }

    fn set_element_text(&self, el: &NodeId, text: &str) {
        {
            let mut tree = self.0.borrow_mut();
            let children = std::mem::take(&mut tree.nodes[el.0].children);
            for child in children {
                tree.nodes[child.0].parent = None;
            }
            if let NodeKind::Text(content) = &mut tree.nodes[el.0].kind {
                *content = text.to_owned();
            } else if !text.is_empty() {
                let text_node = tree.alloc(NodeKind::Text(text.to_owned()));
                tree.nodes[text_node.0].parent = Some(*el);
                tree.nodes[el.0].children.push(text_node);
            }
        }
        self.record(HostOp::SetText {
            node: *el,
            text: text.to_owned(),
        });
    }
}
