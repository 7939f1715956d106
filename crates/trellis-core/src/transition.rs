use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::RuntimeHandle;

/// Urgency tag carried by a render request. Requests are tagged, never
/// reordered: a batch renders its queue in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    Immediate,
    Normal,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionId(pub(crate) usize);

/// A low-priority update in flight.
pub struct Transition {
    id: TransitionId,
    priority: Priority,
    callback: Option<Box<dyn FnOnce()>>,
}

impl Transition {
    pub(crate) fn new(id: TransitionId, priority: Priority, callback: Box<dyn FnOnce()>) -> Self {
        Self {
            id,
            priority,
            callback: Some(callback),
        }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub(crate) fn take_callback(&mut self) -> Option<Box<dyn FnOnce()>> {
        self.callback.take()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("started", &self.callback.is_none())
            .finish()
    }
}

/// Starter returned by `use_transition`.
#[derive(Clone)]
pub struct StartTransition {
    pending: Rc<Cell<bool>>,
    runtime: RuntimeHandle,
}

impl StartTransition {
    pub(crate) fn new(pending: Rc<Cell<bool>>, runtime: RuntimeHandle) -> Self {
        Self { pending, runtime }
    }

    /// Runs `callback` now; state updates it makes are tagged
    /// [`Priority::Normal`].
    pub fn start(&self, callback: impl FnOnce() + 'static) {
        self.start_with(Priority::Normal, callback);
    }

    pub fn start_with(&self, priority: Priority, callback: impl FnOnce() + 'static) {
        self.pending.set(true);
        self.runtime.run_transition(priority, Box::new(callback));
        self.pending.set(false);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }
}

impl fmt::Debug for StartTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartTransition")
            .field("pending", &self.pending.get())
            .finish()
    }
}
