//! Virtual Nodes
//!
//! A [`VNode`] describes one node of a tree to render: an element, a
//! component, a fragment or a text node, with its props and children.
//! Nodes are rebuilt on every render pass and are immutable by convention,
//! apart from a few back-references filled in by the renderer:
//!
//! - `el`: the host node the vnode was realized as, once mounted. A
//!   fragment's `el` is an empty text node marking where it starts; a
//!   component's is the `el` of its rendered root.
//! - `anchor`: for fragments, the empty text node marking where they end.
//! - `component`: the live instance, for component vnodes.
//!
//! # Shape
//!
//! Every vnode carries [`ShapeFlags`] computed at construction, combining
//! what it is (element or stateful component) with what its children are
//! (text, array or slots). The renderer dispatches on these bits.
//!
//! # Keys
//!
//! The reserved prop `key` becomes the node's diff key. Keyed children are
//! matched across renders by key rather than by position.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::component::{Component, ComponentInstance};
use super::shape::ShapeFlags;
use crate::reactive::Value;

/// Props of a vnode, in insertion order.
pub type Props = IndexMap<Rc<str>, Value>;

/// A named slot: renders a list of nodes from the props it is given.
pub type SlotFn<N> = Rc<dyn Fn(&Value) -> Vec<VNode<N>>>;

/// Named slots passed to a component.
pub type Slots<N> = IndexMap<Rc<str>, SlotFn<N>>;

/// Build props from `(name, value)` pairs.
pub fn props<I, K, V>(entries: I) -> Props
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<Rc<str>>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Wrap a closure as a slot.
pub fn slot<N, F>(f: F) -> SlotFn<N>
where
    F: Fn(&Value) -> Vec<VNode<N>> + 'static,
{
    Rc::new(f)
}

/// What a vnode is.
pub enum VNodeType<N> {
    Element(Rc<str>),
    Component(Rc<Component<N>>),
    /// Renders its children directly into the parent, with no wrapper node.
    Fragment,
    Text,
}

impl<N> VNodeType<N> {
    /// Whether two types describe the same kind of node. Components compare
    /// by definition identity.
    pub fn same_as(&self, other: &VNodeType<N>) -> bool {
        match (self, other) {
            (VNodeType::Element(a), VNodeType::Element(b)) => a == b,
            (VNodeType::Component(a), VNodeType::Component(b)) => Rc::ptr_eq(a, b),
            (VNodeType::Fragment, VNodeType::Fragment) => true,
            (VNodeType::Text, VNodeType::Text) => true,
            _ => false,
        }
    }

    fn shape(&self) -> ShapeFlags {
        match self {
            VNodeType::Element(_) => ShapeFlags::ELEMENT,
            VNodeType::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
            VNodeType::Fragment | VNodeType::Text => ShapeFlags::empty(),
        }
    }
}

impl<N> Clone for VNodeType<N> {
    fn clone(&self) -> Self {
        match self {
            VNodeType::Element(tag) => VNodeType::Element(tag.clone()),
            VNodeType::Component(c) => VNodeType::Component(c.clone()),
            VNodeType::Fragment => VNodeType::Fragment,
            VNodeType::Text => VNodeType::Text,
        }
    }
}

impl<N> fmt::Debug for VNodeType<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeType::Element(tag) => write!(f, "Element({tag})"),
            VNodeType::Component(c) => write!(f, "Component({})", c.name()),
            VNodeType::Fragment => f.write_str("Fragment"),
            VNodeType::Text => f.write_str("Text"),
        }
    }
}

impl<N> From<&str> for VNodeType<N> {
    fn from(tag: &str) -> Self {
        VNodeType::Element(Rc::from(tag))
    }
}

impl<N> From<Component<N>> for VNodeType<N> {
    fn from(component: Component<N>) -> Self {
        VNodeType::Component(Rc::new(component))
    }
}

impl<N> From<Rc<Component<N>>> for VNodeType<N> {
    fn from(component: Rc<Component<N>>) -> Self {
        VNodeType::Component(component)
    }
}

/// Children of a vnode.
pub enum Children<N> {
    None,
    Text(Rc<str>),
    Nodes(Vec<VNode<N>>),
    Slots(Slots<N>),
}

impl<N> Children<N> {
    pub fn as_nodes(&self) -> Option<&[VNode<N>]> {
        match self {
            Children::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl<N> Clone for Children<N> {
    fn clone(&self) -> Self {
        match self {
            Children::None => Children::None,
            Children::Text(t) => Children::Text(t.clone()),
            Children::Nodes(nodes) => Children::Nodes(nodes.clone()),
            Children::Slots(slots) => Children::Slots(slots.clone()),
        }
    }
}

impl<N> fmt::Debug for Children<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Children::None => f.write_str("None"),
            Children::Text(t) => write!(f, "Text({t:?})"),
            Children::Nodes(nodes) => f.debug_list().entries(nodes).finish(),
            Children::Slots(slots) => f.debug_set().entries(slots.keys()).finish(),
        }
    }
}

impl<N> From<()> for Children<N> {
    fn from(_: ()) -> Self {
        Children::None
    }
}

impl<N> From<&str> for Children<N> {
    fn from(text: &str) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl<N> From<String> for Children<N> {
    fn from(text: String) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl<N> From<Rc<str>> for Children<N> {
    fn from(text: Rc<str>) -> Self {
        Children::Text(text)
    }
}

impl<N> From<Vec<VNode<N>>> for Children<N> {
    fn from(nodes: Vec<VNode<N>>) -> Self {
        Children::Nodes(nodes)
    }
}

impl<N> From<VNode<N>> for Children<N> {
    fn from(node: VNode<N>) -> Self {
        Children::Nodes(vec![node])
    }
}

impl<N> From<Slots<N>> for Children<N> {
    fn from(slots: Slots<N>) -> Self {
        Children::Slots(slots)
    }
}

/// Diff key of a vnode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Int(i64),
    Str(Rc<str>),
}

impl NodeKey {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(NodeKey::Int(*i)),
            Value::Str(s) => Some(NodeKey::Str(s.clone())),
            Value::Null => None,
            other => Some(NodeKey::Str(Rc::from(other.to_display_string()))),
        }
    }
}

struct VNodeInner<N> {
    ty: VNodeType<N>,
    props: Props,
    children: Children<N>,
    key: Option<NodeKey>,
    shape: ShapeFlags,
    el: RefCell<Option<N>>,
    anchor: RefCell<Option<N>>,
    component: RefCell<Option<ComponentInstance<N>>>,
}

/// A node of a virtual tree.
pub struct VNode<N>(Rc<VNodeInner<N>>);

impl<N: Clone + 'static> VNode<N> {
    pub fn ty(&self) -> &VNodeType<N> {
        &self.0.ty
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn children(&self) -> &Children<N> {
        &self.0.children
    }

    pub fn key(&self) -> Option<&NodeKey> {
        self.0.key.as_ref()
    }

    pub fn shape(&self) -> ShapeFlags {
        self.0.shape
    }

    /// The host node this vnode was realized as.
    pub fn el(&self) -> Option<N> {
        self.0.el.borrow().clone()
    }

    pub(crate) fn set_el(&self, el: Option<N>) {
        *self.0.el.borrow_mut() = el;
    }

    /// End marker of a mounted fragment.
    pub fn anchor(&self) -> Option<N> {
        self.0.anchor.borrow().clone()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<N>) {
        *self.0.anchor.borrow_mut() = anchor;
    }

    /// The live instance behind a component vnode.
    pub fn component(&self) -> Option<ComponentInstance<N>> {
        self.0.component.borrow().clone()
    }

    pub(crate) fn set_component(&self, instance: Option<ComponentInstance<N>>) {
        *self.0.component.borrow_mut() = instance;
    }

    /// Text of a text vnode, or the text children of an element.
    pub fn text(&self) -> Option<&str> {
        self.0.children.as_text()
    }

    pub fn ptr_eq(&self, other: &VNode<N>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakVNode<N> {
        WeakVNode(Rc::downgrade(&self.0))
    }
}

impl<N> Clone for VNode<N> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<N> fmt::Debug for VNode<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("ty", &self.0.ty);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if !self.0.props.is_empty() {
            s.field("props", &self.0.props);
        }
        s.field("children", &self.0.children).finish()
    }
}

/// Non-owning handle to a vnode.
pub(crate) struct WeakVNode<N>(Weak<VNodeInner<N>>);

impl<N> WeakVNode<N> {
    pub(crate) fn upgrade(&self) -> Option<VNode<N>> {
        self.0.upgrade().map(VNode)
    }
}

impl<N> Clone for WeakVNode<N> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Create a vnode, classifying its shape.
///
/// Text children of a fragment are wrapped in a text vnode, since a
/// fragment has no host node to hold text.
pub fn create_vnode<N>(ty: VNodeType<N>, props: Props, children: Children<N>) -> VNode<N> {
    let children = match (&ty, children) {
        (VNodeType::Fragment, Children::Text(text)) => {
            Children::Nodes(vec![create_text_vnode(text)])
        }
        (_, children) => children,
    };

    let mut shape = ty.shape();
    match &children {
        Children::Text(_) => shape |= ShapeFlags::TEXT_CHILDREN,
        Children::Nodes(_) => shape |= ShapeFlags::ARRAY_CHILDREN,
        Children::Slots(_) if shape.contains(ShapeFlags::STATEFUL_COMPONENT) => {
            shape |= ShapeFlags::SLOT_CHILDREN
        }
        _ => {}
    }

    let key = props.get("key").and_then(NodeKey::from_value);

    VNode(Rc::new(VNodeInner {
        ty,
        props,
        children,
        key,
        shape,
        el: RefCell::new(None),
        anchor: RefCell::new(None),
        component: RefCell::new(None),
    }))
}

/// Create a text vnode.
pub fn create_text_vnode<N>(text: impl Into<Rc<str>>) -> VNode<N> {
    create_vnode(VNodeType::Text, Props::new(), Children::Text(text.into()))
}

/// Create a fragment of nodes.
pub fn fragment<N>(children: Vec<VNode<N>>) -> VNode<N> {
    create_vnode(VNodeType::Fragment, Props::new(), Children::Nodes(children))
}

/// Shorthand for [`create_vnode`] with conversions.
pub fn h<N>(
    ty: impl Into<VNodeType<N>>,
    props: Props,
    children: impl Into<Children<N>>,
) -> VNode<N> {
    create_vnode(ty.into(), props, children.into())
}

/// Whether two vnodes can be patched into each other: same type and key.
pub fn is_same_vnode_type<N: Clone + 'static>(a: &VNode<N>, b: &VNode<N>) -> bool {
    a.ty().same_as(b.ty()) && a.key() == b.key()
}
