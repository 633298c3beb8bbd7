//! Components
//!
//! A [`Component`] is a reusable definition: a name, an optional `setup`
//! function and an optional `render` function. Mounting a component vnode
//! creates a [`ComponentInstance`] holding everything that lives as long as
//! the mounted component does:
//!
//! - its props, kept in a record and exposed to `setup` through a shallow
//!   read-only wrapper;
//! - the state returned by `setup`, read through a ref-unwrapping view;
//! - the slots passed by the parent;
//! - a provide scope chained to the parent's;
//! - the render effect and the sub-tree it rendered last.
//!
//! # Setup
//!
//! `setup` runs once, untracked, with the props and a [`SetupContext`]. It
//! returns either a state record, which `render` reads through
//! [`PublicInstance::get`], or a render function that replaces the
//! component's own.
//!
//! # Ownership
//!
//! The vnode owns its instance; the instance only points back at its
//! current vnode and parent weakly. The render effect and the update job
//! hold the instance weakly too, so dropping a tree is enough to free it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::inject::ProvideScope;
use super::scheduler::{invalidate_job, Job};
use super::shape::ShapeFlags;
use super::vnode::{fragment, Children, Props, Slots, VNode, WeakVNode};
use crate::error::{Error, Result};
use crate::reactive::{
    untrack, Effect, Key, ProxyRefs, RawObject, Reactive, SubscriberId, Value,
};

/// Produces the component's tree.
pub type RenderFn<N> = Rc<dyn Fn(&PublicInstance<N>) -> VNode<N>>;

/// Runs once per instance with the props and a setup context.
pub type SetupFn<N> = Rc<dyn Fn(&Reactive, &SetupContext<N>) -> SetupResult<N>>;

/// What `setup` hands back.
pub enum SetupResult<N> {
    /// A record of state, exposed to `render` with refs unwrapped.
    State(Value),
    /// A render function used instead of the component's own.
    Render(RenderFn<N>),
    Empty,
}

impl<N> From<Value> for SetupResult<N> {
    fn from(state: Value) -> Self {
        SetupResult::State(state)
    }
}

impl<N> From<()> for SetupResult<N> {
    fn from(_: ()) -> Self {
        SetupResult::Empty
    }
}

/// A component definition.
pub struct Component<N> {
    name: Rc<str>,
    setup: Option<SetupFn<N>>,
    render: Option<RenderFn<N>>,
}

impl<N> Component<N> {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            render: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&Reactive, &SetupContext<N>) -> SetupResult<N> + 'static,
    {
        self.setup = Some(Rc::new(setup));
        self
    }

    pub fn render<F>(mut self, render: F) -> Self
    where
        F: Fn(&PublicInstance<N>) -> VNode<N> + 'static,
    {
        self.render = Some(Rc::new(render));
        self
    }
}

impl<N> fmt::Debug for Component<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("render", &self.render.is_some())
            .finish()
    }
}

pub(crate) struct InstanceInner<N> {
    id: SubscriberId,
    component: Rc<Component<N>>,
    vnode: RefCell<WeakVNode<N>>,
    next: RefCell<Option<VNode<N>>>,
    props: RawObject,
    props_view: Reactive,
    slots: RefCell<Slots<N>>,
    setup_state: RefCell<ProxyRefs>,
    render: RefCell<Option<RenderFn<N>>>,
    provides: Rc<ProvideScope>,
    parent: Option<Weak<InstanceInner<N>>>,
    is_mounted: Cell<bool>,
    sub_tree: RefCell<Option<VNode<N>>>,
    update: RefCell<Option<Effect<()>>>,
}

/// A mounted component.
pub struct ComponentInstance<N>(Rc<InstanceInner<N>>);

impl<N> Clone for ComponentInstance<N> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<N> fmt::Debug for ComponentInstance<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.0.id)
            .field("component", &self.0.component.name)
            .field("mounted", &self.0.is_mounted.get())
            .finish()
    }
}

impl<N: Clone + 'static> ComponentInstance<N> {
    pub(crate) fn new(
        component: Rc<Component<N>>,
        vnode: &VNode<N>,
        parent: Option<&ComponentInstance<N>>,
    ) -> Self {
        let props = RawObject::from_entries(
            vnode
                .props()
                .iter()
                .filter(|(k, _)| k.as_ref() != "key")
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        let provides = match parent {
            Some(parent) => ProvideScope::child(&parent.0.provides),
            None => ProvideScope::root(),
        };
        Self(Rc::new(InstanceInner {
            id: SubscriberId::new(),
            component,
            vnode: RefCell::new(vnode.downgrade()),
            next: RefCell::new(None),
            props_view: Reactive::shallow_readonly(props.clone()),
            props,
            slots: RefCell::new(slots_of(vnode)),
            setup_state: RefCell::new(ProxyRefs::empty()),
            render: RefCell::new(None),
            provides,
            parent: parent.map(|p| Rc::downgrade(&p.0)),
            is_mounted: Cell::new(false),
            sub_tree: RefCell::new(None),
            update: RefCell::new(None),
        }))
    }

    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        self.0.component.name()
    }

    /// Props as seen by `setup`: shallow and read-only.
    pub fn props(&self) -> Reactive {
        self.0.props_view.clone()
    }

    /// The vnode currently representing this instance.
    pub fn vnode(&self) -> Option<VNode<N>> {
        self.0.vnode.borrow().upgrade()
    }

    pub fn parent(&self) -> Option<ComponentInstance<N>> {
        self.0.parent.as_ref()?.upgrade().map(ComponentInstance)
    }

    pub fn provides(&self) -> &Rc<ProvideScope> {
        &self.0.provides
    }

    pub fn is_mounted(&self) -> bool {
        self.0.is_mounted.get()
    }

    /// The tree rendered last.
    pub fn sub_tree(&self) -> Option<VNode<N>> {
        self.0.sub_tree.borrow().clone()
    }

    /// The render effect, once mounted.
    pub fn update_effect(&self) -> Option<Effect<()>> {
        self.0.update.borrow().clone()
    }

    /// Call the handler the parent passed for `event`.
    ///
    /// `add-foo` looks for the prop `onAddFoo`. Returns the handler's
    /// result, or `None` when there is no handler.
    pub fn emit(&self, event: &str, args: &[Value]) -> Option<Value> {
        let handler_key = to_handler_key(&camelize(event));
        let handler = self.0.props.get(&Key::from(handler_key.as_str()));
        match handler.as_func() {
            Some(f) => {
                debug!(component = %self.name(), event, "emit");
                Some(f.call(args))
            }
            None => None,
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner<N>> {
        Rc::downgrade(&self.0)
    }

    pub(crate) fn upgrade(weak: &Weak<InstanceInner<N>>) -> Option<Self> {
        weak.upgrade().map(ComponentInstance)
    }

    /// Run `setup` and settle the render function.
    pub(crate) fn setup(&self) {
        let context = SetupContext {
            instance: self.clone(),
        };
        let result = match &self.0.component.setup {
            Some(setup) => untrack(|| setup(&self.0.props_view, &context)),
            None => SetupResult::Empty,
        };

        match result {
            SetupResult::State(state) => match ProxyRefs::new(state) {
                Ok(state) => *self.0.setup_state.borrow_mut() = state,
                Err(err) => warn!(component = %self.name(), %err, "setup state ignored"),
            },
            SetupResult::Render(render) => *self.0.render.borrow_mut() = Some(render),
            SetupResult::Empty => {}
        }

        let mut render = self.0.render.borrow_mut();
        if render.is_none() {
            *render = self.0.component.render.clone();
        }
        if render.is_none() {
            let err = Error::MissingRender {
                component: self.0.component.name.clone(),
            };
            warn!(%err, "rendering an empty fragment");
        }
    }

    /// Produce a fresh tree from the render function.
    pub(crate) fn render_root(&self) -> VNode<N> {
        let render = self.0.render.borrow().clone();
        match render {
            Some(render) => render(&PublicInstance {
                instance: self.clone(),
            }),
            None => fragment(Vec::new()),
        }
    }

    pub(crate) fn set_vnode(&self, vnode: &VNode<N>) {
        *self.0.vnode.borrow_mut() = vnode.downgrade();
    }

    pub(crate) fn set_next(&self, next: VNode<N>) {
        *self.0.next.borrow_mut() = Some(next);
    }

    pub(crate) fn take_next(&self) -> Option<VNode<N>> {
        self.0.next.borrow_mut().take()
    }

    pub(crate) fn set_mounted(&self) {
        self.0.is_mounted.set(true);
    }

    pub(crate) fn replace_sub_tree(&self, tree: VNode<N>) -> Option<VNode<N>> {
        self.0.sub_tree.borrow_mut().replace(tree)
    }

    pub(crate) fn set_update(&self, effect: Effect<()>) {
        *self.0.update.borrow_mut() = Some(effect);
    }

    /// Adopt `next` as the current vnode, syncing props and slots from it.
    pub(crate) fn pre_render(&self, next: &VNode<N>) {
        if let Some(current) = self.vnode() {
            next.set_el(current.el());
        }
        self.set_vnode(next);
        self.update_props(next.props());
        *self.0.slots.borrow_mut() = slots_of(next);
    }

    fn update_props(&self, next: &Props) {
        for key in self.0.props.keys() {
            let keep = matches!(&key, Key::Field(name) if next.contains_key(name));
            if !keep {
                self.0.props.remove(&key);
            }
        }
        for (name, value) in next {
            if name.as_ref() == "key" {
                continue;
            }
            if let Err(err) = self.0.props.set(Key::Field(name.clone()), value.clone()) {
                warn!(%err, "prop ignored");
            }
        }
    }

    /// Re-run the render effect now.
    pub(crate) fn update(&self) {
        invalidate_job(self.0.id);
        let effect = self.0.update.borrow().clone();
        if let Some(effect) = effect {
            if effect.is_active() {
                effect.run();
            }
        }
    }

    /// The queued form of [`update`](Self::update).
    pub(crate) fn job(&self) -> Job {
        let weak = self.downgrade();
        Job::new(self.0.id, move || {
            if let Some(instance) = ComponentInstance::upgrade(&weak) {
                instance.update();
            }
        })
    }

    /// Stop the render effect and drop any queued update.
    pub(crate) fn stop(&self) {
        invalidate_job(self.0.id);
        let effect = self.0.update.borrow().clone();
        if let Some(effect) = effect {
            effect.stop();
        }
    }
}

fn slots_of<N: Clone + 'static>(vnode: &VNode<N>) -> Slots<N> {
    if !vnode.shape().contains(ShapeFlags::SLOT_CHILDREN) {
        return Slots::new();
    }
    match vnode.children() {
        Children::Slots(slots) => slots.clone(),
        _ => Slots::new(),
    }
}

/// Whether a component vnode needs its instance to re-render.
///
/// True when a prop was added, removed or changed, or when the new vnode
/// carries slots (slot contents cannot be compared).
pub fn should_update_component<N: Clone + 'static>(prev: &VNode<N>, next: &VNode<N>) -> bool {
    if next.shape().contains(ShapeFlags::SLOT_CHILDREN) {
        return true;
    }
    let (prev, next) = (prev.props(), next.props());
    if prev.len() != next.len() {
        return true;
    }
    next.iter().any(|(key, value)| match prev.get(key) {
        Some(old) => !old.same_value(value),
        None => true,
    })
}

/// Handed to `setup`.
pub struct SetupContext<N> {
    instance: ComponentInstance<N>,
}

impl<N: Clone + 'static> SetupContext<N> {
    pub fn instance(&self) -> &ComponentInstance<N> {
        &self.instance
    }

    pub fn props(&self) -> Reactive {
        self.instance.props()
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> Option<Value> {
        self.instance.emit(event, args)
    }

    /// Provide a value to every descendant.
    pub fn provide(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) {
        self.instance.provides().provide(key, value);
    }

    /// Look up a value provided by an ancestor.
    pub fn inject(&self, key: &str) -> Option<Value> {
        self.instance.parent()?.provides().lookup(key)
    }

    pub fn inject_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.inject(key).unwrap_or_else(|| default.into())
    }

    /// Like [`inject_or`](Self::inject_or), building the default lazily.
    pub fn inject_with(&self, key: &str, default: impl FnOnce() -> Value) -> Value {
        self.inject(key).unwrap_or_else(default)
    }
}

/// The receiver of a render function.
pub struct PublicInstance<N> {
    instance: ComponentInstance<N>,
}

impl<N: Clone + 'static> PublicInstance<N> {
    /// Read setup state, falling back to props.
    pub fn get(&self, key: &str) -> Value {
        let key = Key::from(key);
        let state = self.instance.0.setup_state.borrow().clone();
        if state.contains_key(&key) {
            return state.get(key);
        }
        self.instance.0.props.get(&key)
    }

    /// Write setup state, storing into refs where present.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let state = self.instance.0.setup_state.borrow().clone();
        state.set(key, value)
    }

    /// The first host node of the rendered tree.
    pub fn el(&self) -> Option<N> {
        self.instance.vnode()?.el()
    }

    pub fn props(&self) -> Reactive {
        self.instance.props()
    }

    /// Slots passed by the parent, as of the last render.
    pub fn slots(&self) -> Slots<N> {
        self.instance.0.slots.borrow().clone()
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.instance.0.slots.borrow().contains_key(name)
    }

    /// Render a named slot as a fragment. A missing slot renders nothing.
    pub fn render_slot(&self, name: &str, props: impl Into<Value>) -> VNode<N> {
        let slot = self.instance.0.slots.borrow().get(name).cloned();
        match slot {
            Some(slot) => fragment(slot(&props.into())),
            None => fragment(Vec::new()),
        }
    }

    pub fn emit(&self, event: &str, args: &[Value]) -> Option<Value> {
        self.instance.emit(event, args)
    }

    pub fn instance(&self) -> &ComponentInstance<N> {
        &self.instance
    }
}

/// `add-foo` becomes `addFoo`.
pub fn camelize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper = false;
    for c in s.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `add` becomes `onAdd`.
pub fn to_handler_key(event: &str) -> String {
    let mut chars = event.chars();
    match chars.next() {
        Some(first) => format!("on{}{}", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}
