use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;

use crate::config::RootConfig;
use crate::instance::{Instance, InstanceId};
use crate::platform::RuntimeScheduler;
use crate::transition::{Priority, Transition, TransitionId};

static NEXT_TRANSITION_ID: AtomicUsize = AtomicUsize::new(1);

fn next_transition_id() -> TransitionId {
    TransitionId(NEXT_TRANSITION_ID.fetch_add(1, Ordering::Relaxed))
}

struct QueuedRender {
    instance: Weak<Instance>,
    priority: Priority,
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    config: RootConfig,
    render_queue: RefCell<IndexMap<InstanceId, QueuedRender>>,
    effect_queue: RefCell<IndexMap<InstanceId, Weak<Instance>>>,
    batch_open: Cell<bool>,
    in_batch: Cell<bool>,
    transitions: RefCell<IndexMap<TransitionId, Transition>>,
    current_transition: Cell<Option<TransitionId>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>, config: RootConfig) -> Self {
        Self {
            scheduler,
            config,
            render_queue: RefCell::new(IndexMap::new()),
            effect_queue: RefCell::new(IndexMap::new()),
            batch_open: Cell::new(false),
            in_batch: Cell::new(false),
            transitions: RefCell::new(IndexMap::new()),
            current_transition: Cell::new(None),
        }
    }

    fn open_batch(&self) {
        if !self.batch_open.replace(true) {
            log::debug!("opening render batch");
            self.scheduler.schedule_batch(self.config.idle_timeout);
        }
    }

    fn schedule_render(&self, instance: &Rc<Instance>) {
        if !instance.is_mounted() {
            log::trace!(
                "dropping render of unmounted instance {} ({})",
                instance.id(),
                instance.name()
            );
            return;
        }
        instance.mark_dirty();
        let priority = self.current_priority();
        {
            let mut queue = self.render_queue.borrow_mut();
            queue
                .entry(instance.id())
                .and_modify(|queued| queued.priority = queued.priority.min(priority))
                .or_insert_with(|| QueuedRender {
                    instance: Rc::downgrade(instance),
                    priority,
                });
        }
        if priority != Priority::Immediate {
            log::debug!(
                "render of {} tagged {:?} by transition {:?}",
                instance.name(),
                priority,
                self.current_transition.get()
            );
        }
        self.open_batch();
    }

    fn take_batch(&self) -> Vec<Rc<Instance>> {
        self.in_batch.set(true);
        let queued: Vec<QueuedRender> = self
            .render_queue
            .borrow_mut()
            .drain(..)
            .map(|(_, queued)| queued)
            .collect();
        queued
            .into_iter()
            .filter_map(|queued| queued.instance.upgrade())
            .filter(|instance| instance.is_mounted())
            .collect()
    }

    fn finish_batch(&self) {
        self.in_batch.set(false);
        self.batch_open.set(false);
        if !self.render_queue.borrow().is_empty() {
            self.open_batch();
        }
    }

    fn current_priority(&self) -> Priority {
        match self.current_transition.get() {
            Some(id) => self
                .transitions
                .borrow()
                .get(&id)
                .map_or(Priority::Immediate, Transition::priority),
            None => Priority::Immediate,
        }
    }

    fn run_transition(&self, priority: Priority, callback: Box<dyn FnOnce()>) {
        let id = next_transition_id();
        self.transitions
            .borrow_mut()
            .insert(id, Transition::new(id, priority, callback));
        let previous = self.current_transition.replace(Some(id));
        let callback = self
            .transitions
            .borrow_mut()
            .get_mut(&id)
            .and_then(Transition::take_callback);
        if let Some(callback) = callback {
            callback();
        }
        self.transitions.borrow_mut().shift_remove(&id);
        let restored = previous.filter(|id| self.transitions.borrow().contains_key(id));
        self.current_transition.set(restored);
    }
}

/// Scheduling state of one root: render queue, effect queue, batch flag and
/// the set of transitions in flight.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_config(scheduler, RootConfig::default())
    }

    pub fn with_config(scheduler: Arc<dyn RuntimeScheduler>, config: RootConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler, config)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &RootConfig {
        &self.inner.config
    }

    /// Whether a batch has been requested from the host and not yet run.
    pub fn is_batch_open(&self) -> bool {
        self.inner.batch_open.get()
    }

    pub fn has_pending_renders(&self) -> bool {
        !self.inner.render_queue.borrow().is_empty()
    }

    pub fn has_pending_effects(&self) -> bool {
        !self.inner.effect_queue.borrow().is_empty()
    }

    pub fn pending_render_count(&self) -> usize {
        self.inner.render_queue.borrow().len()
    }

    pub fn is_transition_pending(&self) -> bool {
        !self.inner.transitions.borrow().is_empty()
    }

    pub(crate) fn take_batch(&self) -> Vec<Rc<Instance>> {
        self.inner.take_batch()
    }

    pub(crate) fn finish_batch(&self) {
        self.inner.finish_batch();
    }

    /// Puts instances a failed batch did not reach back in the queue.
    pub(crate) fn requeue(&self, instances: impl IntoIterator<Item = Rc<Instance>>) {
        for instance in instances {
            self.inner.schedule_render(&instance);
        }
    }

    pub(crate) fn take_effects(&self) -> Vec<Rc<Instance>> {
        let queued: Vec<Weak<Instance>> = self
            .inner
            .effect_queue
            .borrow_mut()
            .drain(..)
            .map(|(_, instance)| instance)
            .collect();
        queued.into_iter().filter_map(|weak| weak.upgrade()).collect()
    }
}

#[derive(Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_batch(&self, _timeout: Duration) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler {
    requests: AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_batch(&self, _timeout: Duration) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Weak handle held by instances, setters and transition starters.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn is_transition_pending(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| !inner.transitions.borrow().is_empty())
    }

    pub fn is_rendering_batch(&self) -> bool {
        self.0.upgrade().is_some_and(|inner| inner.in_batch.get())
    }

    pub(crate) fn hook_order_diagnostics(&self) -> bool {
        self.0
            .upgrade()
            .is_some_and(|inner| inner.config.hook_order_diagnostics)
    }

    pub(crate) fn schedule_render(&self, instance: &Rc<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule_render(instance);
        }
    }

    pub(crate) fn enqueue_effects(&self, instance: &Rc<Instance>) {
        if let Some(inner) = self.0.upgrade() {
            inner
                .effect_queue
                .borrow_mut()
                .entry(instance.id())
                .or_insert_with(|| Rc::downgrade(instance));
        }
    }

    /// Removes an unmounted instance from both queues.
    pub(crate) fn forget(&self, id: InstanceId) {
        if let Some(inner) = self.0.upgrade() {
            inner.render_queue.borrow_mut().shift_remove(&id);
            inner.effect_queue.borrow_mut().shift_remove(&id);
        }
    }

    pub(crate) fn run_transition(&self, priority: Priority, callback: Box<dyn FnOnce()>) {
        match self.0.upgrade() {
            Some(inner) => inner.run_transition(priority, callback),
            None => callback(),
        }
    }
}
