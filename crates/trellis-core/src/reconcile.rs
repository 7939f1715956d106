//! Diffing: turns the difference between the mounted tree and a new node tree
//! into [`Applier`] calls.
//!
//! Every operation leaves the mounted tree describing what the display tree
//! holds, also when it returns an error half way.

use std::rc::{Rc, Weak};

use crate::applier::Applier;
use crate::collections::{fast_map, fast_set};
use crate::error::{NodeError, RenderError};
use crate::instance::Instance;
use crate::runtime::RuntimeHandle;
use crate::suspense::SUSPENDED_HOLDER_TAG;
use crate::vnode::{
    ComponentNode, ElementNode, EventHandler, Key, PropValue, Props, Render, VNode, KEY_PROP,
};
use crate::NodeId;

/// Whether a subtree finished rendering or is waiting on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ready,
    Pending,
}

impl Status {
    pub fn is_pending(self) -> bool {
        self == Status::Pending
    }

    pub(crate) fn merge(self, other: Status) -> Status {
        if self.is_pending() || other.is_pending() {
            Status::Pending
        } else {
            Status::Ready
        }
    }
}

/// Context handed to newly created instances: the nearest suspense boundary
/// above them.
#[derive(Clone, Default)]
pub(crate) struct Scope {
    pub(crate) boundary: Option<Weak<Instance>>,
}

/// The mounted counterpart of a [`VNode`].
pub(crate) enum Mounted {
    Element {
        element: Rc<ElementNode>,
        node: NodeId,
        children: Vec<Mounted>,
    },
    Text {
        value: Rc<str>,
        node: NodeId,
    },
    Component {
        instance: Rc<Instance>,
    },
}

/// A boundary's suspended content, kept alive under a holder node that is
/// never attached to the display tree.
pub(crate) struct Parked {
    pub(crate) holder: NodeId,
    pub(crate) content: Mounted,
}

impl Mounted {
    pub(crate) fn host(&self) -> NodeId {
        match self {
            Mounted::Element { node, .. } | Mounted::Text { node, .. } => *node,
            Mounted::Component { instance } => instance.host(),
        }
    }

    fn key(&self) -> Option<Key> {
        match self {
            Mounted::Element { element, .. } => element.key().cloned(),
            Mounted::Component { instance } => instance.node().key().cloned(),
            Mounted::Text { .. } => None,
        }
    }

    fn same_kind(&self, node: &VNode) -> bool {
        match (self, node) {
            (Mounted::Element { element, .. }, VNode::Element(next)) => element.tag() == next.tag(),
            (Mounted::Text { .. }, VNode::Text(_)) => true,
            (Mounted::Component { instance }, VNode::Component(next)) => {
                instance.component() == next.component()
            }
            _ => false,
        }
    }

    /// Points the instances whose output roots this subtree at `parent`.
    fn set_parent(&self, parent: NodeId) {
        if let Mounted::Component { instance } = self {
            instance.set_parent_node(parent);
            instance.with_rendered(|rendered| {
                if let Some(rendered) = rendered {
                    rendered.set_parent(parent);
                }
            });
        }
    }

    /// Visits every instance in the subtree, parents first, including
    /// content boundaries hold off-screen.
    pub(crate) fn for_each_instance(&self, f: &mut dyn FnMut(&Rc<Instance>)) {
        match self {
            Mounted::Element { children, .. } => {
                for child in children {
                    child.for_each_instance(f);
                }
            }
            Mounted::Text { .. } => {}
            Mounted::Component { instance } => {
                f(instance);
                instance.with_rendered(|rendered| {
                    if let Some(rendered) = rendered {
                        rendered.for_each_instance(f);
                    }
                });
                instance.with_parked(|parked| {
                    if let Some(parked) = parked {
                        parked.content.for_each_instance(f);
                    }
                });
            }
        }
    }

    /// Unmounts component instances in the subtree, children before parents.
    pub(crate) fn unmount(self) {
        match self {
            Mounted::Element { children, .. } => {
                for child in children {
                    child.unmount();
                }
            }
            Mounted::Text { .. } => {}
            Mounted::Component { instance } => instance.unmount(),
        }
    }
}

pub(crate) struct Reconciler<'a> {
    applier: &'a mut dyn Applier,
    runtime: RuntimeHandle,
}

impl<'a> Reconciler<'a> {
    pub(crate) fn new(applier: &'a mut dyn Applier, runtime: RuntimeHandle) -> Self {
        Self { applier, runtime }
    }

    /// Reconciles the node in `slot`, displayed at `index` under `parent`,
    /// with `next`.
    pub(crate) fn diff(
        &mut self,
        slot: &mut Option<Mounted>,
        next: Option<&VNode>,
        parent: NodeId,
        index: usize,
        scope: &Scope,
    ) -> Result<Status, RenderError> {
        match (slot.as_mut(), next) {
            (None, None) => Ok(Status::Ready),
            (None, Some(next)) => {
                let (mounted, status) = self.create(next, parent, scope)?;
                let host = mounted.host();
                if let Err(err) = self.applier.insert_child(parent, index, host) {
                    self.discard(mounted);
                    return Err(err.into());
                }
                *slot = Some(mounted);
                Ok(status)
            }
            (Some(_), None) => {
                if let Some(old) = slot.take() {
                    self.remove(old, parent, index)?;
                }
                Ok(Status::Ready)
            }
            (Some(current), Some(next)) => self.patch(current, next, parent, index, scope),
        }
    }

    /// Renders an already-mounted instance again in place.
    ///
    /// A pending result puts the nearest boundary on its fallback. A ready
    /// result inside content a boundary holds off-screen retries that
    /// boundary.
    pub(crate) fn rerender(&mut self, instance: &Rc<Instance>) -> Result<Status, RenderError> {
        let status = self.render_instance(instance)?;
        let Some(boundary) = instance.boundary().filter(|boundary| boundary.is_mounted()) else {
            return Ok(status);
        };
        if status.is_pending() {
            return self.show_fallback(&boundary);
        }
        if boundary.has_parked() {
            log::trace!("{} is ready again; retrying {}", instance.name(), boundary.name());
            return self.render_instance(&boundary);
        }
        Ok(status)
    }

    fn patch(
        &mut self,
        current: &mut Mounted,
        next: &VNode,
        parent: NodeId,
        index: usize,
        scope: &Scope,
    ) -> Result<Status, RenderError> {
        if !current.same_kind(next) {
            log::trace!("kind changed under node {parent}; replacing subtree");
            let position = self.locate(parent, current.host(), index)?;
            let (mounted, status) = self.create(next, parent, scope)?;
            let host = mounted.host();
            let old = std::mem::replace(current, mounted);
            self.unmount(old);
            self.applier.replace_child(parent, position, host)?;
            return Ok(status);
        }

        match (current, next) {
            (Mounted::Text { value, node }, VNode::Text(text)) => {
                if **value != **text {
                    self.applier.set_text(*node, text)?;
                    *value = Rc::clone(text);
                }
                Ok(Status::Ready)
            }
            (
                Mounted::Element {
                    element,
                    node,
                    children,
                },
                VNode::Element(next),
            ) => {
                let node = *node;
                if !Rc::ptr_eq(element, next) {
                    self.update_props(node, element.props(), next.props())?;
                    if element.key() != next.key() {
                        if let Some(key) = next.key() {
                            self.applier.set_marker(node, key)?;
                        }
                    }
                }
                *element = Rc::clone(next);
                self.reconcile_children(node, children, next.children(), scope)
            }
            (Mounted::Component { instance }, VNode::Component(next)) => {
                let instance = Rc::clone(instance);
                instance.set_parent_node(parent);
                if instance.can_bail_out(next) {
                    instance.set_node(Rc::clone(next));
                    return Ok(Status::Ready);
                }
                instance.set_node(Rc::clone(next));
                self.render_instance(&instance)
            }
            _ => Ok(Status::Ready),
        }
    }

    fn remove(&mut self, old: Mounted, parent: NodeId, index: usize) -> Result<(), RenderError> {
        let host = old.host();
        self.unmount(old);
        let position = self.locate(parent, host, index)?;
        self.applier.remove_child(parent, position)?;
        Ok(())
    }

    /// Unmounts a subtree that was built but never attached.
    fn discard(&mut self, mounted: Mounted) {
        let host = mounted.host();
        self.unmount(mounted);
        self.applier.release(host);
    }

    /// Unmounts `old` and frees the holders of any content it kept
    /// off-screen. Removing `old`'s own display nodes is the caller's job.
    fn unmount(&mut self, old: Mounted) {
        let mut holders = Vec::new();
        old.for_each_instance(&mut |instance| {
            instance.with_parked(|parked| holders.extend(parked.map(|parked| parked.holder)));
        });
        old.unmount();
        for holder in holders {
            self.applier.release(holder);
        }
    }

    /// Drops an instance's off-screen content together with its holder.
    fn release_parked(&mut self, instance: &Instance) {
        if let Some(Parked { holder, content }) = instance.take_parked() {
            let host = content.host();
            self.unmount(content);
            self.applier.release(holder);
            self.applier.release(host);
        }
    }

    /// Current position of `child` under `parent`, checking `hint` first.
    fn locate(&self, parent: NodeId, child: NodeId, hint: usize) -> Result<usize, NodeError> {
        if self.applier.child_at(parent, hint)? == Some(child) {
            return Ok(hint);
        }
        self.applier
            .index_of(parent, child)?
            .ok_or(NodeError::NotAChild { parent, child })
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Builds the display subtree for `node` without attaching it.
    fn create(
        &mut self,
        node: &VNode,
        parent: NodeId,
        scope: &Scope,
    ) -> Result<(Mounted, Status), RenderError> {
        match node {
            VNode::Text(value) => {
                let id = self.applier.create_text(value);
                Ok((
                    Mounted::Text {
                        value: Rc::clone(value),
                        node: id,
                    },
                    Status::Ready,
                ))
            }
            VNode::Element(element) => self.create_element(element, scope),
            VNode::Component(component) => self.create_component(component, parent, scope),
        }
    }

    fn create_element(
        &mut self,
        element: &Rc<ElementNode>,
        scope: &Scope,
    ) -> Result<(Mounted, Status), RenderError> {
        let node = self.applier.create_element(element.tag());
        let mut children = Vec::with_capacity(element.children().len());
        let mut status = Status::Ready;
        let built = self.fill_element(node, element, scope, &mut children, &mut status);
        if let Err(err) = built {
            for child in children {
                self.unmount(child);
            }
            self.applier.release(node);
            return Err(err);
        }
        Ok((
            Mounted::Element {
                element: Rc::clone(element),
                node,
                children,
            },
            status,
        ))
    }

    fn fill_element(
        &mut self,
        node: NodeId,
        element: &ElementNode,
        scope: &Scope,
        children: &mut Vec<Mounted>,
        status: &mut Status,
    ) -> Result<(), RenderError> {
        if let Some(key) = element.key() {
            self.applier.set_marker(node, key)?;
        }
        self.update_props(node, &Props::new(), element.props())?;
        for (index, child) in element.children().iter().enumerate() {
            let (mounted, child_status) = self.create(child, node, scope)?;
            let host = mounted.host();
            children.push(mounted);
            self.applier.insert_child(node, index, host)?;
            *status = status.merge(child_status);
        }
        Ok(())
    }

    fn create_component(
        &mut self,
        node: &Rc<ComponentNode>,
        parent: NodeId,
        scope: &Scope,
    ) -> Result<(Mounted, Status), RenderError> {
        let instance = Instance::new(Rc::clone(node), self.runtime.clone(), parent, scope);
        match self.mount_instance(&instance, parent) {
            Ok(status) => Ok((Mounted::Component { instance }, status)),
            Err(err) => {
                if let Some(rendered) = instance.take_rendered() {
                    self.discard(rendered);
                }
                self.release_parked(&instance);
                instance.unmount();
                Err(err)
            }
        }
    }

    fn mount_instance(&mut self, instance: &Rc<Instance>, parent: NodeId) -> Result<Status, RenderError> {
        let (output, mut status) = split_render(instance.render()?);
        let child_scope = instance.child_scope();
        let (mounted, child_status) = self.create(&output, parent, &child_scope)?;
        status = status.merge(child_status);

        if status.is_pending() && instance.is_boundary() {
            let holder = self.applier.create_element(SUSPENDED_HOLDER_TAG);
            let content = mounted.host();
            mounted.set_parent(holder);
            instance.put_parked(Parked {
                holder,
                content: mounted,
            });
            self.applier.insert_child(holder, 0, content)?;
            let (fallback, fallback_status) =
                self.create(&instance.fallback(), parent, &instance.outer_scope())?;
            instance.put_rendered(Some(fallback));
            instance.set_showing_fallback(true);
            status = fallback_status;
        } else {
            instance.put_rendered(Some(mounted));
        }
        instance.set_pending(status.is_pending());
        if let Some(key) = instance.node().key() {
            self.applier.set_marker(instance.host(), key)?;
        }
        Ok(status)
    }

    // ========================================================================
    // Component updates
    // ========================================================================

    fn render_instance(&mut self, instance: &Rc<Instance>) -> Result<Status, RenderError> {
        let (output, status) = split_render(instance.render()?);
        if let Some(parked) = instance.take_parked() {
            return self.retry_parked(instance, parked, &output, status);
        }
        let parent = instance.parent_node();
        let previous_host = instance.host();
        let index = self.locate(parent, previous_host, 0)?;

        let mut rendered = instance.take_rendered();
        let result = self.diff(&mut rendered, Some(&output), parent, index, &instance.child_scope());
        instance.put_rendered(rendered);
        let status = status.merge(result?);
        self.keep_marker(instance, previous_host)?;

        if instance.is_boundary() && status.is_pending() {
            instance.set_pending(false);
            return self.show_fallback(instance);
        }
        instance.set_pending(status.is_pending());
        Ok(status)
    }

    /// Renders a boundary's off-screen content again with `output`, revealing
    /// it once nothing in it is pending.
    fn retry_parked(
        &mut self,
        boundary: &Rc<Instance>,
        parked: Parked,
        output: &VNode,
        status: Status,
    ) -> Result<Status, RenderError> {
        let Parked { holder, content } = parked;
        let mut slot = Some(content);
        let result = self.diff(&mut slot, Some(output), holder, 0, &boundary.child_scope());
        let Some(content) = slot else {
            self.applier.release(holder);
            return result;
        };
        boundary.put_parked(Parked { holder, content });
        if status.merge(result?).is_pending() {
            return self.show_fallback(boundary);
        }
        self.reveal(boundary)?;
        Ok(Status::Ready)
    }

    /// Puts a boundary on its fallback. Content already off-screen stays
    /// there; displayed content moves under a fresh holder with its
    /// instances intact.
    fn show_fallback(&mut self, boundary: &Rc<Instance>) -> Result<Status, RenderError> {
        let fallback = boundary.fallback();
        let parent = boundary.parent_node();
        let previous_host = boundary.host();
        let index = self.locate(parent, previous_host, 0)?;

        if boundary.has_parked() {
            let mut rendered = boundary.take_rendered();
            let result = self.diff(&mut rendered, Some(&fallback), parent, index, &boundary.outer_scope());
            boundary.put_rendered(rendered);
            let status = result?;
            self.keep_marker(boundary, previous_host)?;
            return Ok(status);
        }

        let Some(content) = boundary.take_rendered() else {
            return Ok(Status::Ready);
        };
        let (mounted, status) = match self.create(&fallback, parent, &boundary.outer_scope()) {
            Ok(created) => created,
            Err(err) => {
                boundary.put_rendered(Some(content));
                return Err(err);
            }
        };
        let host = mounted.host();
        if let Err(err) = self.applier.detach_child(parent, index) {
            boundary.put_rendered(Some(content));
            self.discard(mounted);
            return Err(err.into());
        }
        let holder = self.applier.create_element(SUSPENDED_HOLDER_TAG);
        let content_host = content.host();
        content.set_parent(holder);
        boundary.put_parked(Parked { holder, content });
        boundary.put_rendered(Some(mounted));
        boundary.set_showing_fallback(true);
        self.applier.insert_child(holder, 0, content_host)?;
        self.applier.insert_child(parent, index, host)?;
        self.keep_marker(boundary, previous_host)?;
        Ok(status)
    }

    /// Swaps a boundary's fallback for its off-screen content and queues the
    /// effects that content deferred.
    fn reveal(&mut self, boundary: &Rc<Instance>) -> Result<(), RenderError> {
        let parent = boundary.parent_node();
        let previous_host = boundary.host();
        let index = self.locate(parent, previous_host, 0)?;
        let Some(Parked { holder, content }) = boundary.take_parked() else {
            return Ok(());
        };

        let content_host = match self.applier.detach_child(holder, 0) {
            Ok(host) => host,
            Err(err) => {
                boundary.put_parked(Parked { holder, content });
                return Err(err.into());
            }
        };
        self.applier.release(holder);
        if let Some(fallback) = boundary.take_rendered() {
            self.unmount(fallback);
        }
        content.set_parent(parent);
        content.for_each_instance(&mut |instance| instance.runtime().enqueue_effects(instance));
        boundary.put_rendered(Some(content));
        boundary.set_showing_fallback(false);
        self.applier.replace_child(parent, index, content_host)?;
        self.keep_marker(boundary, previous_host)?;
        Ok(())
    }

    /// Moves a keyed instance's marker onto its new host after a re-render
    /// replaced it.
    fn keep_marker(&mut self, instance: &Instance, previous_host: NodeId) -> Result<(), NodeError> {
        let host = instance.host();
        if host == previous_host {
            return Ok(());
        }
        match instance.node().key() {
            Some(key) => self.applier.set_marker(host, key),
            None => Ok(()),
        }
    }

    // ========================================================================
    // Props
    // ========================================================================

    fn update_props(&mut self, node: NodeId, old: &Props, new: &Props) -> Result<(), NodeError> {
        for (name, value) in old.iter() {
            if name == KEY_PROP || new.contains(name) {
                continue;
            }
            match listener(name, value) {
                Some((event, handler)) => self.applier.remove_listener(node, &event, handler)?,
                None => self.applier.remove_attribute(node, name)?,
            }
        }

        for (name, value) in new.iter() {
            if name == KEY_PROP {
                continue;
            }
            let previous = old.get(name);
            if previous == Some(value) {
                continue;
            }
            let bound = listener(name, value);
            match previous.map(|previous| listener(name, previous)) {
                Some(Some((event, handler))) => self.applier.remove_listener(node, &event, handler)?,
                Some(None) if bound.is_some() => self.applier.remove_attribute(node, name)?,
                _ => {}
            }
            match bound {
                Some((event, handler)) => self.applier.add_listener(node, &event, handler)?,
                None => self.applier.set_attribute(node, name, value)?,
            }
        }
        Ok(())
    }

    // ========================================================================
    // Children
    // ========================================================================

    /// Matches `next` against the mounted children of `parent` (by key when
    /// keyed, by position among keyless siblings otherwise), then patches,
    /// removes, creates and reorders so the display children follow `next`.
    fn reconcile_children(
        &mut self,
        parent: NodeId,
        mounted: &mut Vec<Mounted>,
        next: &[VNode],
        scope: &Scope,
    ) -> Result<Status, RenderError> {
        let old_len = mounted.len();
        let mut old_keyed = fast_map(old_len);
        let mut old_keyless = Vec::new();
        for (index, child) in mounted.iter().enumerate() {
            match child.key() {
                Some(key) if !old_keyed.contains_key(&key) => {
                    old_keyed.insert(key, index);
                }
                _ => old_keyless.push(index),
            }
        }

        let mut seen = fast_set(next.len());
        let mut keyless_cursor = 0;
        let mut used = vec![false; old_len];
        let mut sources = Vec::with_capacity(next.len());
        for child in next {
            let source = match child.key() {
                Some(key) if seen.insert(key) => old_keyed.get(key).copied(),
                _ => {
                    let source = old_keyless.get(keyless_cursor).copied();
                    keyless_cursor += 1;
                    source
                }
            };
            if let Some(index) = source {
                used[index] = true;
            }
            sources.push(source);
        }

        for index in (0..old_len).rev() {
            if !used[index] {
                let old = mounted.remove(index);
                self.remove(old, parent, index)?;
            }
        }
        let mut position = vec![0; old_len];
        let mut kept = 0;
        for (index, is_used) in used.iter().enumerate() {
            if *is_used {
                position[index] = kept;
                kept += 1;
            }
        }

        let mut status = Status::Ready;
        for (child, source) in next.iter().zip(&sources) {
            if let Some(source) = source {
                let slot = position[*source];
                let displayed = self.applier.child_at(parent, slot)? == Some(mounted[slot].host());
                let hint = match child.key() {
                    Some(key) if !displayed => self.applier.find_keyed(parent, key)?.unwrap_or(slot),
                    _ => slot,
                };
                status = status.merge(self.patch(&mut mounted[slot], child, parent, hint, scope)?);
            }
        }

        let mut created = Vec::new();
        for (child, source) in next.iter().zip(&sources) {
            if source.is_none() {
                match self.create(child, parent, scope) {
                    Ok((child, child_status)) => {
                        created.push(child);
                        status = status.merge(child_status);
                    }
                    Err(err) => {
                        for child in created {
                            self.discard(child);
                        }
                        return Err(err);
                    }
                }
            }
        }

        let mut previous: Vec<Option<Mounted>> = mounted.drain(..).map(Some).collect();
        let mut created = created.into_iter();
        let mut shown = Vec::with_capacity(next.len());
        for source in &sources {
            let (child, index) = match source {
                Some(source) => (previous[position[*source]].take(), Some(position[*source])),
                None => (created.next(), None),
            };
            if let Some(child) = child {
                mounted.push(child);
                shown.push(index);
            }
        }

        self.order_children(parent, mounted, &shown, kept)?;
        Ok(status)
    }

    /// Moves or inserts display children so they follow `mounted`.
    ///
    /// `shown[i]` is where `mounted[i]` sits among the `kept` displayed
    /// children, `None` for children not attached yet. Walking from the end,
    /// every child that is placed leaves the unplaced ones at the front in
    /// their old order, so positions follow from counting placed children
    /// without asking the host.
    fn order_children(
        &mut self,
        parent: NodeId,
        mounted: &[Mounted],
        shown: &[Option<usize>],
        kept: usize,
    ) -> Result<(), NodeError> {
        let mut placed = PlacedCounter::new(kept);
        let mut target = kept;
        for (child, shown) in mounted.iter().zip(shown).rev() {
            match *shown {
                Some(original) => {
                    let current = original - placed.before(original);
                    target -= 1;
                    if current != target {
                        self.applier.move_child(parent, current, target)?;
                    }
                    placed.mark(original);
                }
                None => self.applier.insert_child(parent, target, child.host())?,
            }
        }
        Ok(())
    }
}

/// Fenwick tree counting placed children by their old display position.
struct PlacedCounter {
    tree: Vec<usize>,
}

impl PlacedCounter {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
        }
    }

    fn mark(&mut self, index: usize) {
        let mut i = index + 1;
        while i < self.tree.len() {
            self.tree[i] += 1;
            i += i & i.wrapping_neg();
        }
    }

    /// Placed children with an old position below `index`.
    fn before(&self, index: usize) -> usize {
        let mut i = index;
        let mut count = 0;
        while i > 0 {
            count += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        count
    }
}

fn split_render(render: Render) -> (VNode, Status) {
    let (output, status) = match render {
        Render::Ready(output) => (output, Status::Ready),
        Render::Pending(output) => (output, Status::Pending),
    };
    (output.unwrap_or_else(|| VNode::text("")), status)
}

/// `onClick` style props holding a handler bind the `click` listener.
fn listener<'p>(name: &str, value: &'p PropValue) -> Option<(String, &'p EventHandler)> {
    let event = name.strip_prefix("on").filter(|event| !event.is_empty())?;
    let handler = value.as_handler()?;
    Some((event.to_ascii_lowercase(), handler))
}

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod tests;
