//! Suspension: resources that may not be ready yet, and the boundary that
//! shows a fallback while anything beneath it is pending.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::RenderError;
use crate::vnode::{Component, Props, Render, RenderResult, VNode};

pub(crate) const FALLBACK_PROP: &str = "fallback";

/// Tag of the detached node a boundary keeps suspended content under.
pub(crate) const SUSPENDED_HOLDER_TAG: &str = "trellis-suspended";

enum ResourceState<T> {
    Pending,
    Ready(T),
    Failed(String),
}

/// A value produced elsewhere and delivered later.
///
/// Resolving a resource does not schedule anything by itself; the code that
/// resolves it pairs the call with a state update (or the host re-renders).
pub struct Resource<T> {
    state: Rc<RefCell<ResourceState<T>>>,
}

impl<T: Clone> Resource<T> {
    pub fn pending() -> Self {
        Self {
            state: Rc::new(RefCell::new(ResourceState::Pending)),
        }
    }

    pub fn ready(value: T) -> Self {
        Self {
            state: Rc::new(RefCell::new(ResourceState::Ready(value))),
        }
    }

    pub fn resolve(&self, value: T) {
        *self.state.borrow_mut() = ResourceState::Ready(value);
    }

    pub fn fail(&self, message: impl Into<String>) {
        *self.state.borrow_mut() = ResourceState::Failed(message.into());
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), ResourceState::Pending)
    }

    /// `Ok(None)` while pending; a render function answers that with
    /// [`Render::Pending`].
    pub fn read(&self) -> Result<Option<T>, RenderError> {
        match &*self.state.borrow() {
            ResourceState::Pending => Ok(None),
            ResourceState::Ready(value) => Ok(Some(value.clone())),
            ResourceState::Failed(message) => Err(RenderError::failed(message.clone())),
        }
    }
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> PartialEq for Resource<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<T: fmt::Debug> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.state.borrow() {
            ResourceState::Pending => f.write_str("Resource(pending)"),
            ResourceState::Ready(value) => write!(f, "Resource({value:?})"),
            ResourceState::Failed(message) => write!(f, "Resource(failed: {message})"),
        }
    }
}

/// Boundary component. Renders its first child, or the node in its
/// `fallback` prop while that child's subtree reports pending. The pending
/// subtree stays mounted off-screen, hooks included, and is rendered again
/// whenever the boundary is.
#[allow(non_upper_case_globals)]
pub const Suspense: Component = Component::boundary("Suspense", render_suspense);

fn render_suspense(_props: &Props, children: &[VNode]) -> RenderResult {
    if children.len() > 1 {
        log::warn!(
            "Suspense renders only its first child; {} more ignored",
            children.len() - 1
        );
    }
    Ok(Render::Ready(children.first().cloned()))
}

/// `Suspense` node wrapping `child` with `fallback`.
pub fn suspense(fallback: VNode, child: VNode) -> VNode {
    VNode::component(
        Suspense,
        Props::new().with(FALLBACK_PROP, fallback),
        vec![child],
    )
}
