//! Live component instances and their hook slots.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::hooks::FrameGuard;
use crate::inspect::SlotInfo;
use crate::reconcile::{Mounted, Parked, Scope};
use crate::runtime::RuntimeHandle;
use crate::suspense::FALLBACK_PROP;
use crate::vnode::{Component, ComponentNode, Render, VNode};
use crate::{NodeId, RenderError};

pub(crate) type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

/// Effect body queued by a render, paired with the cleanup it replaces.
pub(crate) struct PendingEffect {
    pub(crate) cleanup: Option<Box<dyn FnOnce()>>,
    pub(crate) effect: Box<dyn FnOnce() -> EffectCleanup>,
}

/// What an effect body leaves behind.
#[derive(Default)]
pub struct EffectCleanup(Option<Box<dyn FnOnce()>>);

impl EffectCleanup {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(cleanup)))
    }

    pub(crate) fn into_inner(self) -> Option<Box<dyn FnOnce()>> {
        self.0
    }
}

impl From<()> for EffectCleanup {
    fn from(_: ()) -> Self {
        Self::none()
    }
}

/// Storage behind one hook call position.
pub(crate) trait HookState: 'static {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn info(&self) -> SlotInfo;

    fn take_effect(&mut self) -> Option<PendingEffect> {
        None
    }

    fn take_cleanup(&mut self) -> Option<Box<dyn FnOnce()>> {
        None
    }

    fn store_cleanup(&mut self, _cleanup: Option<Box<dyn FnOnce()>>) {}
}

pub(crate) struct Instance {
    id: InstanceId,
    component: Component,
    runtime: RuntimeHandle,
    node: RefCell<Rc<ComponentNode>>,
    slots: RefCell<Vec<Option<Box<dyn HookState>>>>,
    rendered: RefCell<Option<Mounted>>,
    parked: RefCell<Option<Parked>>,
    host: Cell<NodeId>,
    parent_node: Cell<NodeId>,
    boundary: Option<Weak<Instance>>,
    mounted: Cell<bool>,
    dirty: Cell<bool>,
    showing_fallback: Cell<bool>,
    pending: Cell<bool>,
    slot_count: Cell<Option<usize>>,
    render_count: Cell<u64>,
}

impl Instance {
    pub(crate) fn new(
        node: Rc<ComponentNode>,
        runtime: RuntimeHandle,
        parent_node: NodeId,
        scope: &Scope,
    ) -> Rc<Self> {
        let instance = Rc::new(Self {
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            component: node.component(),
            runtime,
            node: RefCell::new(node),
            slots: RefCell::new(Vec::new()),
            rendered: RefCell::new(None),
            parked: RefCell::new(None),
            host: Cell::new(parent_node),
            parent_node: Cell::new(parent_node),
            boundary: scope.boundary.clone(),
            mounted: Cell::new(true),
            dirty: Cell::new(true),
            showing_fallback: Cell::new(false),
            pending: Cell::new(false),
            slot_count: Cell::new(None),
            render_count: Cell::new(0),
        });
        log::trace!("mounting {} as instance {}", instance.name(), instance.id);
        instance
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn name(&self) -> &'static str {
        self.component.name()
    }

    pub(crate) fn component(&self) -> Component {
        self.component
    }

    pub(crate) fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub(crate) fn is_boundary(&self) -> bool {
        self.component.is_boundary()
    }

    pub(crate) fn is_showing_fallback(&self) -> bool {
        self.showing_fallback.get()
    }

    pub(crate) fn set_showing_fallback(&self, showing: bool) {
        if self.showing_fallback.replace(showing) != showing {
            log::debug!(
                "{} {} its fallback",
                self.name(),
                if showing { "shows" } else { "leaves" }
            );
        }
    }

    /// Whether the last render of this instance or its subtree was pending.
    pub(crate) fn set_pending(&self, pending: bool) {
        self.pending.set(pending);
    }

    pub(crate) fn render_count(&self) -> u64 {
        self.render_count.get()
    }

    pub(crate) fn node(&self) -> Rc<ComponentNode> {
        Rc::clone(&self.node.borrow())
    }

    pub(crate) fn set_node(&self, node: Rc<ComponentNode>) {
        *self.node.borrow_mut() = node;
    }

    pub(crate) fn parent_node(&self) -> NodeId {
        self.parent_node.get()
    }

    pub(crate) fn set_parent_node(&self, parent: NodeId) {
        self.parent_node.set(parent);
    }

    pub(crate) fn boundary(&self) -> Option<Rc<Instance>> {
        self.boundary.as_ref().and_then(Weak::upgrade)
    }

    /// Scope handed to the instances this one renders.
    pub(crate) fn child_scope(self: &Rc<Self>) -> Scope {
        Scope {
            boundary: if self.is_boundary() {
                Some(Rc::downgrade(self))
            } else {
                self.boundary.clone()
            },
        }
    }

    /// Scope of a boundary's fallback: a fallback that suspends is caught
    /// further up.
    pub(crate) fn outer_scope(&self) -> Scope {
        Scope {
            boundary: self.boundary.clone(),
        }
    }

    /// Whether some boundary above holds this instance off-screen.
    pub(crate) fn is_parked(&self) -> bool {
        let mut boundary = self.boundary();
        while let Some(current) = boundary {
            if current.has_parked() {
                return true;
            }
            boundary = current.boundary();
        }
        false
    }

    /// Whether an update with `next` can skip rendering.
    pub(crate) fn can_bail_out(&self, next: &Rc<ComponentNode>) -> bool {
        if self.dirty.get() || self.pending.get() || self.showing_fallback.get() {
            return false;
        }
        let current = self.node.borrow();
        Rc::ptr_eq(&current, next) || **current == **next
    }

    pub(crate) fn fallback(&self) -> VNode {
        self.node
            .borrow()
            .props()
            .node(FALLBACK_PROP)
            .cloned()
            .unwrap_or_else(|| VNode::text(""))
    }

    /// Display node this instance's output is rooted at.
    pub(crate) fn host(&self) -> NodeId {
        match self.rendered.try_borrow() {
            Ok(rendered) => rendered.as_ref().map_or(self.host.get(), Mounted::host),
            Err(_) => self.host.get(),
        }
    }

    pub(crate) fn take_rendered(&self) -> Option<Mounted> {
        self.rendered.borrow_mut().take()
    }

    pub(crate) fn put_rendered(&self, rendered: Option<Mounted>) {
        if let Some(mounted) = rendered.as_ref() {
            self.host.set(mounted.host());
        }
        *self.rendered.borrow_mut() = rendered;
    }

    pub(crate) fn with_rendered<R>(&self, f: impl FnOnce(Option<&Mounted>) -> R) -> R {
        f(self.rendered.borrow().as_ref())
    }

    pub(crate) fn has_parked(&self) -> bool {
        self.parked
            .try_borrow()
            .map_or(false, |parked| parked.is_some())
    }

    pub(crate) fn take_parked(&self) -> Option<Parked> {
        self.parked.borrow_mut().take()
    }

    pub(crate) fn put_parked(&self, parked: Parked) {
        *self.parked.borrow_mut() = Some(parked);
    }

    pub(crate) fn with_parked<R>(&self, f: impl FnOnce(Option<&Parked>) -> R) -> R {
        f(self.parked.borrow().as_ref())
    }

    pub(crate) fn request_render(self: &Rc<Self>) {
        self.runtime.schedule_render(self);
    }

    /// Runs the render function with this instance installed as the current
    /// hook frame.
    pub(crate) fn render(self: &Rc<Self>) -> Result<Render, RenderError> {
        let node = self.node();
        self.dirty.set(false);
        self.render_count.set(self.render_count.get() + 1);
        let frame = FrameGuard::enter(Rc::clone(self));
        let result = (self.component.render_fn())(node.props(), node.children());
        let used = frame.slots_used();
        drop(frame);
        self.check_slot_count(used);
        result.map_err(|err| err.in_component(self.name()))
    }

    fn check_slot_count(&self, used: usize) {
        let previous = self.slot_count.replace(Some(used));
        if !self.runtime.hook_order_diagnostics() {
            return;
        }
        if let Some(previous) = previous {
            if previous != used {
                log::warn!(
                    "{} called {used} hooks this render but {previous} the render before; \
                     hooks must be called unconditionally and in the same order",
                    self.name()
                );
            }
        }
    }

    /// Runs `f` against the typed state of hook slot `index`.
    ///
    /// `f` receives `None` on first use or when the slot held a different
    /// kind of hook, and returns the state to store back. No borrow of the
    /// slot table is held while `f` runs.
    pub(crate) fn hook<S, R>(&self, index: usize, hook: &'static str, f: impl FnOnce(Option<S>) -> (S, R)) -> R
    where
        S: HookState,
    {
        let existing = {
            let mut slots = self.slots.borrow_mut();
            if slots.len() <= index {
                slots.resize_with(index + 1, || None);
            }
            slots[index].take()
        };
        let typed = match existing {
            Some(existing) if existing.as_any().is::<S>() => {
                existing.into_any().downcast::<S>().ok().map(|state| *state)
            }
            Some(mut other) => {
                log::warn!(
                    "{}: {hook} found {:?} at hook slot {index}; hooks must be called in the same order every render",
                    self.name(),
                    other.info()
                );
                if let Some(cleanup) = other.take_cleanup() {
                    cleanup();
                }
                None
            }
            None => None,
        };
        let (state, result) = f(typed);
        let state: Box<dyn HookState> = Box::new(state);
        self.slots.borrow_mut()[index] = Some(state);
        result
    }

    pub(crate) fn slot_infos(&self) -> Vec<SlotInfo> {
        self.slots
            .borrow()
            .iter()
            .map(|slot| slot.as_ref().map_or(SlotInfo::Vacant, |slot| slot.info()))
            .collect()
    }

    /// Runs the effects queued by the last render, each after the cleanup of
    /// the run it replaces. Instances held off-screen keep theirs until the
    /// boundary reveals them.
    pub(crate) fn run_effects(&self) {
        if self.is_parked() {
            log::trace!("deferring effects of off-screen {}", self.name());
            return;
        }
        let pending: Vec<(usize, PendingEffect)> = self
            .slots
            .borrow_mut()
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| {
                let pending = slot.as_mut()?.take_effect()?;
                Some((index, pending))
            })
            .collect();
        for (index, pending) in pending {
            if !self.is_mounted() {
                return;
            }
            if let Some(cleanup) = pending.cleanup {
                cleanup();
            }
            let cleanup = (pending.effect)().into_inner();
            if let Some(Some(slot)) = self.slots.borrow_mut().get_mut(index) {
                slot.store_cleanup(cleanup);
            }
        }
    }

    /// Tears the instance down: descendants first, then this instance's
    /// effect cleanups. Display removal is the caller's job.
    pub(crate) fn unmount(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        log::trace!("unmounting {} (instance {})", self.name(), self.id);
        if let Some(rendered) = self.take_rendered() {
            rendered.unmount();
        }
        if let Some(parked) = self.take_parked() {
            parked.content.unmount();
        }
        let cleanups: Vec<Box<dyn FnOnce()>> = self
            .slots
            .borrow_mut()
            .iter_mut()
            .filter_map(|slot| slot.as_mut()?.take_cleanup())
            .collect();
        for cleanup in cleanups {
            cleanup();
        }
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        drop(slots);
        self.runtime.forget(self.id);
    }
}
