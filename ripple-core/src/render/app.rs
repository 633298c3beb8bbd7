//! Application entry point.

use std::rc::Rc;

use super::component::Component;
use super::host::Host;
use super::renderer::Renderer;
use super::vnode::{create_vnode, Children, Props, VNode, VNodeType};
use crate::reactive::Value;

/// A root component bound to a renderer, ready to mount.
pub struct App<H: Host> {
    renderer: Renderer<H>,
    root: Rc<Component<H::Node>>,
    props: Props,
    container: Option<H::Node>,
}

impl<H: Host> App<H> {
    pub(crate) fn new(renderer: Renderer<H>, root: Rc<Component<H::Node>>) -> Self {
        Self {
            renderer,
            root,
            props: Props::new(),
            container: None,
        }
    }

    /// Set a prop passed to the root component.
    pub fn with_prop(mut self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    /// Mount the root component into `container` and return its vnode.
    pub fn mount(&mut self, container: &H::Node) -> VNode<H::Node> {
        let vnode = create_vnode(
            VNodeType::Component(self.root.clone()),
            self.props.clone(),
            Children::None,
        );
        self.renderer.render(vnode.clone(), container);
        self.container = Some(container.clone());
        vnode
    }

    /// Unmount from the container used by [`mount`](Self::mount).
    pub fn unmount(&mut self) {
        if let Some(container) = self.container.take() {
            self.renderer.unmount(&container);
        }
    }

    pub fn renderer(&self) -> &Renderer<H> {
        &self.renderer
    }
}
