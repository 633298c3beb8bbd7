//! Renderer
//!
//! The renderer turns vnode trees into host mutations. It never builds a
//! tree itself: it compares the tree rendered last with the new one and
//! applies the difference through the [`Host`].
//!
//! # How Patching Works
//!
//! `patch(old, new)` dispatches on the new node:
//!
//! - Nodes of a different type or key are not patched at all. The new node
//!   is mounted in front of the old one and the old one is unmounted.
//! - Text nodes keep their host node and only update its text.
//! - Elements keep their host node, patch their children, then their props.
//! - Fragments are delimited by two empty text nodes in the parent. Their
//!   children are patched directly into the parent, in front of the end
//!   marker.
//! - Components either re-render (props or slots changed) or just adopt the
//!   new vnode.
//!
//! # Keyed Children
//!
//! Two lists of children are reconciled in five steps, see
//! [`Renderer::patch_keyed_children`]. Common prefixes and suffixes are
//! patched in place; whatever remains is matched by key, and the longest
//! run of matched nodes whose relative order survived stays put while the
//! rest are moved. This keeps host moves to a minimum.
//!
//! # Component Updates
//!
//! Every component instance renders inside an effect. Reactive reads made
//! by its render function subscribe the effect; a later write queues the
//! instance's update job with the scheduler rather than re-rendering on the
//! spot, so bursts of writes coalesce.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::app::App;
use super::component::{should_update_component, Component, ComponentInstance};
use super::host::Host;
use super::scheduler::queue_job;
use super::sequence::get_sequence;
use super::shape::ShapeFlags;
use super::vnode::{is_same_vnode_type, NodeKey, Props, VNode, VNodeType};
use crate::reactive::{effect_with, EffectOptions};

type Node<H> = <H as Host>::Node;

struct RendererInner<H: Host> {
    host: H,
    roots: RefCell<Vec<(Node<H>, VNode<Node<H>>)>>,
}

/// Renders vnode trees into containers of a host.
///
/// Handles are cheap to clone and share the same host and root table.
pub struct Renderer<H: Host>(Rc<RendererInner<H>>);

impl<H: Host> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<H: Host + fmt::Debug> fmt::Debug for Renderer<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("host", &self.0.host)
            .field("roots", &self.0.roots.borrow().len())
            .finish()
    }
}

impl<H: Host> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self(Rc::new(RendererInner {
            host,
            roots: RefCell::new(Vec::new()),
        }))
    }

    pub fn host(&self) -> &H {
        &self.0.host
    }

    /// Render `vnode` into `container`, patching against whatever was
    /// rendered there before.
    pub fn render(&self, vnode: VNode<Node<H>>, container: &Node<H>) {
        let prev = self.take_root(container);
        debug!(container = ?container, update = prev.is_some(), "render");
        self.patch(prev.as_ref(), &vnode, container, None, None);
        self.0.roots.borrow_mut().push((container.clone(), vnode));
    }

    /// Tear down whatever was rendered into `container`.
    pub fn unmount(&self, container: &Node<H>) {
        if let Some(prev) = self.take_root(container) {
            debug!(container = ?container, "unmount root");
            self.unmount_vnode(&prev, true);
        }
    }

    /// The tree currently rendered into `container`.
    pub fn root(&self, container: &Node<H>) -> Option<VNode<Node<H>>> {
        self.0
            .roots
            .borrow()
            .iter()
            .find(|(c, _)| c == container)
            .map(|(_, vnode)| vnode.clone())
    }

    /// An application rooted at `component`.
    pub fn create_app(&self, component: impl Into<Rc<Component<Node<H>>>>) -> App<H> {
        App::new(self.clone(), component.into())
    }

    fn take_root(&self, container: &Node<H>) -> Option<VNode<Node<H>>> {
        let mut roots = self.0.roots.borrow_mut();
        let index = roots.iter().position(|(c, _)| c == container)?;
        Some(roots.remove(index).1)
    }

    fn patch(
        &self,
        n1: Option<&VNode<Node<H>>>,
        n2: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        if let Some(old) = n1 {
            if !is_same_vnode_type(old, n2) {
                let anchor = old.el().or_else(|| anchor.cloned());
                self.patch(None, n2, container, anchor.as_ref(), parent);
                self.unmount_vnode(old, true);
                return;
            }
        }

        match n2.ty() {
            VNodeType::Fragment => self.process_fragment(n1, n2, container, anchor, parent),
            VNodeType::Text => self.process_text(n1, n2, container, anchor),
            _ if n2.shape().contains(ShapeFlags::ELEMENT) => {
                self.process_element(n1, n2, container, anchor, parent)
            }
            _ => self.process_component(n1, n2, container, anchor, parent),
        }
    }

    fn process_text(
        &self,
        n1: Option<&VNode<Node<H>>>,
        n2: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
    ) {
        let text = n2.text().unwrap_or_default();
        match n1 {
            None => {
                let el = self.0.host.create_text(text);
                n2.set_el(Some(el.clone()));
                self.0.host.insert(&el, container, anchor);
            }
            Some(old) => {
                let el = old.el();
                n2.set_el(el.clone());
                if old.text() != n2.text() {
                    if let Some(el) = el {
                        self.0.host.set_element_text(&el, text);
                    }
                }
            }
        }
    }

    fn process_fragment(
        &self,
        n1: Option<&VNode<Node<H>>>,
        n2: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        let host = &self.0.host;
        match n1 {
            None => {
                let start = host.create_text("");
                let end = host.create_text("");
                host.insert(&start, container, anchor);
                host.insert(&end, container, anchor);
                n2.set_el(Some(start));
                n2.set_anchor(Some(end.clone()));
                let children = n2.children().as_nodes().unwrap_or_default();
                self.mount_children(children, container, Some(&end), parent);
            }
            Some(old) => {
                let end = old.anchor();
                n2.set_el(old.el());
                n2.set_anchor(end.clone());
                self.patch_children(old, n2, container, end.as_ref(), parent);
            }
        }
    }

    fn process_element(
        &self,
        n1: Option<&VNode<Node<H>>>,
        n2: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        match n1 {
            None => self.mount_element(n2, container, anchor, parent),
            Some(old) => {
                let Some(el) = old.el() else { return };
                n2.set_el(Some(el.clone()));
                self.patch_children(old, n2, &el, None, parent);
                self.patch_props(&el, old.props(), n2.props());
            }
        }
    }

    fn mount_element(
        &self,
        vnode: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        let VNodeType::Element(tag) = vnode.ty() else {
            return;
        };
        let host = &self.0.host;
        let el = host.create_element(tag);
        vnode.set_el(Some(el.clone()));

        let shape = vnode.shape();
        if shape.contains(ShapeFlags::TEXT_CHILDREN) {
            host.set_element_text(&el, vnode.text().unwrap_or_default());
        } else if shape.contains(ShapeFlags::ARRAY_CHILDREN) {
            let children = vnode.children().as_nodes().unwrap_or_default();
            self.mount_children(children, &el, None, parent);
        }

        for (key, value) in vnode.props() {
            if key.as_ref() != "key" {
                host.patch_prop(&el, key, None, Some(value));
            }
        }

        host.insert(&el, container, anchor);
    }

    fn mount_children(
        &self,
        children: &[VNode<Node<H>>],
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        for child in children {
            self.patch(None, child, container, anchor, parent);
        }
    }

    fn patch_props(&self, el: &Node<H>, old: &Props, new: &Props) {
        let host = &self.0.host;
        for (key, next) in new {
            if key.as_ref() == "key" {
                continue;
            }
            let prev = old.get(key);
            if prev.map_or(true, |prev| !prev.same_value(next)) {
                host.patch_prop(el, key, prev, Some(next));
            }
        }
        for (key, prev) in old {
            if key.as_ref() != "key" && !new.contains_key(key) {
                host.patch_prop(el, key, Some(prev), None);
            }
        }
    }

    fn patch_children(
        &self,
        n1: &VNode<Node<H>>,
        n2: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        let host = &self.0.host;
        let prev_shape = n1.shape();
        let shape = n2.shape();
        let old_children = n1.children().as_nodes().unwrap_or_default();
        let new_children = n2.children().as_nodes().unwrap_or_default();

        if shape.contains(ShapeFlags::TEXT_CHILDREN) {
            if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.unmount_children(old_children);
            }
            if n1.text() != n2.text() {
                host.set_element_text(container, n2.text().unwrap_or_default());
            }
        } else if shape.contains(ShapeFlags::ARRAY_CHILDREN) {
            if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
                self.patch_keyed_children(old_children, new_children, container, anchor, parent);
            } else {
                if prev_shape.contains(ShapeFlags::TEXT_CHILDREN) {
                    host.set_element_text(container, "");
                }
                self.mount_children(new_children, container, anchor, parent);
            }
        } else if prev_shape.contains(ShapeFlags::TEXT_CHILDREN) {
            host.set_element_text(container, "");
        } else if prev_shape.contains(ShapeFlags::ARRAY_CHILDREN) {
            self.unmount_children(old_children);
        }
    }

    fn unmount_children(&self, children: &[VNode<Node<H>>]) {
        for child in children {
            self.unmount_vnode(child, true);
        }
    }

    /// Reconcile two child lists.
    ///
    /// 1. Patch the common prefix.
    /// 2. Patch the common suffix.
    /// 3. If the old list is used up, mount what is left of the new one.
    /// 4. If the new list is used up, unmount what is left of the old one.
    /// 5. Otherwise match the remaining middle by key (or, for unkeyed
    ///    nodes, by type), unmount what has no match, and walk the new
    ///    middle backwards mounting new nodes and moving every matched node
    ///    that is not on the longest increasing subsequence of old indices.
    fn patch_keyed_children(
        &self,
        c1: &[VNode<Node<H>>],
        c2: &[VNode<Node<H>>],
        container: &Node<H>,
        parent_anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        let l2 = c2.len() as isize;
        let mut i: isize = 0;
        let mut e1 = c1.len() as isize - 1;
        let mut e2 = l2 - 1;

        // 1. prefix
        while i <= e1 && i <= e2 {
            let (n1, n2) = (&c1[i as usize], &c2[i as usize]);
            if !is_same_vnode_type(n1, n2) {
                break;
            }
            self.patch(Some(n1), n2, container, parent_anchor, parent);
            i += 1;
        }

        // 2. suffix
        while i <= e1 && i <= e2 {
            let (n1, n2) = (&c1[e1 as usize], &c2[e2 as usize]);
            if !is_same_vnode_type(n1, n2) {
                break;
            }
            self.patch(Some(n1), n2, container, parent_anchor, parent);
            e1 -= 1;
            e2 -= 1;
        }

        // 3. mount the new tail or head
        if i > e1 {
            if i <= e2 {
                let next_pos = e2 + 1;
                let anchor = if next_pos < l2 {
                    c2[next_pos as usize].el()
                } else {
                    parent_anchor.cloned()
                };
                while i <= e2 {
                    self.patch(None, &c2[i as usize], container, anchor.as_ref(), parent);
                    i += 1;
                }
            }
            return;
        }

        // 4. unmount the old leftovers
        if i > e2 {
            while i <= e1 {
                self.unmount_vnode(&c1[i as usize], true);
                i += 1;
            }
            return;
        }

        // 5. unknown middle
        let (s1, s2) = (i as usize, i as usize);
        let (e1, e2) = (e1 as usize, e2 as usize);
        let to_be_patched = e2 - s2 + 1;

        let key_to_new_index: HashMap<&NodeKey, usize> = (s2..=e2)
            .filter_map(|j| c2[j].key().map(|key| (key, j)))
            .collect();

        // `old index + 1` per new position; 0 means no old node matched.
        let mut new_index_to_old_index = vec![0usize; to_be_patched];
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_index_so_far = 0;

        for (old_index, prev_child) in c1.iter().enumerate().take(e1 + 1).skip(s1) {
            if patched >= to_be_patched {
                self.unmount_vnode(prev_child, true);
                continue;
            }

            let new_index = match prev_child.key() {
                Some(key) => key_to_new_index.get(key).copied(),
                None => (s2..=e2).find(|&j| {
                    new_index_to_old_index[j - s2] == 0 && is_same_vnode_type(prev_child, &c2[j])
                }),
            };

            match new_index {
                None => self.unmount_vnode(prev_child, true),
                Some(new_index) => {
                    new_index_to_old_index[new_index - s2] = old_index + 1;
                    if new_index >= max_new_index_so_far {
                        max_new_index_so_far = new_index;
                    } else {
                        moved = true;
                    }
                    self.patch(Some(prev_child), &c2[new_index], container, None, parent);
                    patched += 1;
                }
            }
        }

        let stable = if moved {
            get_sequence(&new_index_to_old_index)
        } else {
            Vec::new()
        };
        let mut stable = stable.iter().rev().peekable();

        for k in (0..to_be_patched).rev() {
            let next_index = s2 + k;
            let next_child = &c2[next_index];
            let anchor = match c2.get(next_index + 1) {
                Some(next) => next.el(),
                None => parent_anchor.cloned(),
            };

            if new_index_to_old_index[k] == 0 {
                self.patch(None, next_child, container, anchor.as_ref(), parent);
            } else if moved {
                if stable.peek() == Some(&&k) {
                    stable.next();
                } else {
                    self.move_vnode(next_child, container, anchor.as_ref());
                }
            }
        }
    }

    /// Move the host nodes of a mounted vnode before `anchor`.
    fn move_vnode(&self, vnode: &VNode<Node<H>>, container: &Node<H>, anchor: Option<&Node<H>>) {
        if vnode.shape().contains(ShapeFlags::STATEFUL_COMPONENT) {
            if let Some(sub_tree) = vnode.component().and_then(|c| c.sub_tree()) {
                self.move_vnode(&sub_tree, container, anchor);
            }
            return;
        }
        if let VNodeType::Fragment = vnode.ty() {
            if let Some(start) = vnode.el() {
                self.0.host.insert(&start, container, anchor);
            }
            for child in vnode.children().as_nodes().unwrap_or_default() {
                self.move_vnode(child, container, anchor);
            }
            if let Some(end) = vnode.anchor() {
                self.0.host.insert(&end, container, anchor);
            }
            return;
        }
        if let Some(el) = vnode.el() {
            self.0.host.insert(&el, container, anchor);
        }
    }

    /// Unmount a vnode. Only the topmost host nodes are removed; nodes
    /// below them leave with their parent.
    fn unmount_vnode(&self, vnode: &VNode<Node<H>>, do_remove: bool) {
        if vnode.shape().contains(ShapeFlags::STATEFUL_COMPONENT) {
            if let Some(instance) = vnode.component() {
                debug!(component = %instance.name(), "unmount component");
                instance.stop();
                if let Some(sub_tree) = instance.sub_tree() {
                    self.unmount_vnode(&sub_tree, do_remove);
                }
            }
            return;
        }

        let children = vnode.children().as_nodes().unwrap_or_default();
        match vnode.ty() {
            VNodeType::Fragment => {
                for child in children {
                    self.unmount_vnode(child, do_remove);
                }
                if do_remove {
                    for marker in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        self.0.host.remove(&marker);
                    }
                }
            }
            _ => {
                for child in children {
                    self.unmount_vnode(child, false);
                }
                if do_remove {
                    if let Some(el) = vnode.el() {
                        self.0.host.remove(&el);
                    }
                }
            }
        }
    }

    fn process_component(
        &self,
        n1: Option<&VNode<Node<H>>>,
        n2: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        match n1 {
            None => self.mount_component(n2, container, anchor, parent),
            Some(old) => self.update_component(old, n2),
        }
    }

    fn mount_component(
        &self,
        vnode: &VNode<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
        parent: Option<&ComponentInstance<Node<H>>>,
    ) {
        let VNodeType::Component(component) = vnode.ty() else {
            return;
        };
        debug!(component = %component.name(), "mount component");
        let instance = ComponentInstance::new(component.clone(), vnode, parent);
        vnode.set_component(Some(instance.clone()));
        instance.setup();
        self.setup_render_effect(&instance, container, anchor);
    }

    fn update_component(&self, n1: &VNode<Node<H>>, n2: &VNode<Node<H>>) {
        let Some(instance) = n1.component() else {
            return;
        };
        n2.set_component(Some(instance.clone()));
        if should_update_component(n1, n2) {
            debug!(component = %instance.name(), "update component");
            instance.set_next(n2.clone());
            instance.update();
        } else {
            n2.set_el(n1.el());
            instance.set_vnode(n2);
        }
    }

    fn setup_render_effect(
        &self,
        instance: &ComponentInstance<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
    ) {
        let renderer: Weak<RendererInner<H>> = Rc::downgrade(&self.0);
        let weak_instance = instance.downgrade();
        let container = container.clone();
        // Only the first render uses the mount anchor. Later renders place
        // new nodes relative to the previous sub-tree.
        let mount_anchor = RefCell::new(anchor.cloned());
        let job = instance.job();

        let update = effect_with(
            move || {
                let (Some(renderer), Some(instance)) =
                    (renderer.upgrade(), ComponentInstance::upgrade(&weak_instance))
                else {
                    return;
                };
                let anchor = mount_anchor.borrow_mut().take();
                Renderer(renderer).render_component(&instance, &container, anchor.as_ref());
            },
            EffectOptions::new()
                .lazy()
                .scheduler(move || queue_job(job.clone())),
        );
        instance.set_update(update.clone());
        update.run();
    }

    /// Body of a component's render effect.
    fn render_component(
        &self,
        instance: &ComponentInstance<Node<H>>,
        container: &Node<H>,
        anchor: Option<&Node<H>>,
    ) {
        if instance.is_mounted() {
            if let Some(next) = instance.take_next() {
                instance.pre_render(&next);
            }
        }

        let sub_tree = instance.render_root();
        let prev = instance.replace_sub_tree(sub_tree.clone());
        self.patch(prev.as_ref(), &sub_tree, container, anchor, Some(instance));

        if let Some(vnode) = instance.vnode() {
            vnode.set_el(sub_tree.el());
        }
        instance.set_mounted();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::memory::MemoryHost;
    use crate::render::vnode::{h, props};

    fn li(key: &str) -> VNode<crate::render::memory::NodeId> {
        h("li", props([("key", key)]), key)
    }

    fn list(keys: &[&str]) -> VNode<crate::render::memory::NodeId> {
        h("ul", Props::new(), keys.iter().map(|k| li(k)).collect::<Vec<_>>())
    }

    fn rendered(host: &MemoryHost, root: crate::render::memory::NodeId) -> Vec<String> {
        let ul = host.children(root)[0];
        host.children(ul)
            .into_iter()
            .map(|li| host.text_content(li))
            .collect()
    }

    #[test]
    fn renders_and_patches_in_place() {
        let host = MemoryHost::new();
        let root = host.create_root();
        let renderer = Renderer::new(host.clone());

        renderer.render(list(&["a", "b", "c"]), &root);
        assert_eq!(rendered(&host, root), ["a", "b", "c"]);

        host.clear_ops();
        renderer.render(list(&["a", "b", "c"]), &root);
        assert_eq!(host.create_count(), 0);
        assert_eq!(host.move_count(), 0);
        assert_eq!(host.remove_count(), 0);
    }

    #[test]
    fn reorders_with_minimal_moves() {
        let host = MemoryHost::new();
        let root = host.create_root();
        let renderer = Renderer::new(host.clone());

        renderer.render(list(&["a", "b", "c", "d", "e", "f", "g"]), &root);
        host.clear_ops();
        renderer.render(list(&["a", "b", "e", "c", "d", "h", "f", "g"]), &root);

        assert_eq!(rendered(&host, root), ["a", "b", "e", "c", "d", "h", "f", "g"]);
        assert_eq!(host.move_count(), 1);
        assert_eq!(host.create_count(), 1);
        assert_eq!(host.remove_count(), 0);
    }

    #[test]
    fn unmount_clears_container() {
        let host = MemoryHost::new();
        let root = host.create_root();
        let renderer = Renderer::new(host.clone());

        renderer.render(list(&["a", "b"]), &root);
        renderer.unmount(&root);
        assert!(host.children(root).is_empty());
        assert!(renderer.root(&root).is_none());
        // Only the <ul> is removed; its items go with it.
        assert_eq!(host.remove_count(), 1);
    }
}
