//! Hooks: per-instance state addressed by call order.
//!
//! A render pushes a frame for its instance onto a thread-local stack; every
//! hook call claims the next slot index of the innermost frame. Calling a hook
//! with no frame on the stack is a [`HookError::OutsideRender`].

use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::HookError;
use crate::inspect::SlotInfo;
use crate::instance::{EffectCleanup, HookState, Instance, PendingEffect};
use crate::suspense::Resource;
use crate::transition::StartTransition;
use crate::vnode::Callback;

struct RenderFrame {
    instance: Rc<Instance>,
    cursor: usize,
}

thread_local! {
    static RENDER_STACK: RefCell<Vec<RenderFrame>> = const { RefCell::new(Vec::new()) };
}

/// Keeps an instance installed as the current hook frame; popping happens on
/// drop so an early return or a panic in the render function restores the
/// previous frame.
pub(crate) struct FrameGuard {
    depth: usize,
}

impl FrameGuard {
    pub(crate) fn enter(instance: Rc<Instance>) -> Self {
        let depth = RENDER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(RenderFrame {
                instance,
                cursor: 0,
            });
            stack.len()
        });
        Self { depth }
    }

    pub(crate) fn slots_used(&self) -> usize {
        RENDER_STACK.with(|stack| {
            stack
                .borrow()
                .get(self.depth - 1)
                .map_or(0, |frame| frame.cursor)
        })
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        RENDER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "render frames popped out of order");
            stack.truncate(self.depth - 1);
        });
    }
}

fn claim_slot(hook: &'static str) -> Result<(Rc<Instance>, usize), HookError> {
    RENDER_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let frame = stack.last_mut().ok_or(HookError::OutsideRender { hook })?;
        let index = frame.cursor;
        frame.cursor += 1;
        Ok((Rc::clone(&frame.instance), index))
    })
}

/// Whether a component render function is running on this thread.
pub fn is_rendering() -> bool {
    RENDER_STACK.with(|stack| !stack.borrow().is_empty())
}

/// Name of the component whose render function is running, if any.
pub fn current_component() -> Option<&'static str> {
    RENDER_STACK.with(|stack| stack.borrow().last().map(|frame| frame.instance.name()))
}

// ============================================================================
// Slot states
// ============================================================================

struct StateSlot<T> {
    cell: Rc<RefCell<T>>,
}

impl<T: 'static> HookState for StateSlot<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn info(&self) -> SlotInfo {
        SlotInfo::State {
            type_name: type_name::<T>(),
        }
    }
}

struct EffectSlot<D> {
    deps: Option<D>,
    pending: Option<Box<dyn FnOnce() -> EffectCleanup>>,
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl<D> EffectSlot<D> {
    fn empty() -> Self {
        Self {
            deps: None,
            pending: None,
            cleanup: None,
        }
    }
}

impl<D: 'static> HookState for EffectSlot<D> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn info(&self) -> SlotInfo {
        SlotInfo::Effect {
            pending: self.pending.is_some(),
            has_cleanup: self.cleanup.is_some(),
        }
    }

    fn take_effect(&mut self) -> Option<PendingEffect> {
        let effect = self.pending.take()?;
        Some(PendingEffect {
            cleanup: self.cleanup.take(),
            effect,
        })
    }

    fn take_cleanup(&mut self) -> Option<Box<dyn FnOnce()>> {
        self.pending = None;
        self.cleanup.take()
    }

    fn store_cleanup(&mut self, cleanup: Option<Box<dyn FnOnce()>>) {
        self.cleanup = cleanup;
    }
}

struct MemoSlot<D, T> {
    deps: D,
    value: T,
}

impl<D: 'static, T: 'static> HookState for MemoSlot<D, T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn info(&self) -> SlotInfo {
        SlotInfo::Memo {
            type_name: type_name::<T>(),
        }
    }
}

struct TransitionSlot {
    pending: Rc<Cell<bool>>,
}

impl HookState for TransitionSlot {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn info(&self) -> SlotInfo {
        SlotInfo::Transition {
            pending: self.pending.get(),
        }
    }
}

struct DeferredSlot<T> {
    value: T,
}

impl<T: 'static> HookState for DeferredSlot<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn info(&self) -> SlotInfo {
        SlotInfo::Deferred {
            type_name: type_name::<T>(),
        }
    }
}

struct ResourceSlot<T> {
    resource: Resource<T>,
}

impl<T: Clone + 'static> HookState for ResourceSlot<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn info(&self) -> SlotInfo {
        SlotInfo::Resource {
            type_name: type_name::<T>(),
            pending: self.resource.is_pending(),
        }
    }
}

// ============================================================================
// State
// ============================================================================

/// Setter returned by [`use_state`]. Holds only a weak link to its instance,
/// so a setter kept past unmount is inert.
pub struct SetState<T> {
    cell: Rc<RefCell<T>>,
    owner: Weak<Instance>,
}

impl<T: PartialEq + 'static> SetState<T> {
    /// Stores `value` and schedules a re-render, unless it equals the current
    /// value.
    pub fn set(&self, value: T) {
        let changed = {
            let mut current = self.cell.borrow_mut();
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        };
        if changed {
            if let Some(owner) = self.owner.upgrade() {
                owner.request_render();
            }
        }
    }

    /// Computes the next value from the latest one, including updates made
    /// earlier in the same batch.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.cell.borrow());
        self.set(next);
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.cell.borrow().clone()
    }
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            owner: self.owner.clone(),
        }
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T: fmt::Debug> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetState").field(&self.cell.borrow()).finish()
    }
}

/// Returns the slot's current value and its setter. `init` runs on first
/// render only.
pub fn use_state<T>(init: impl FnOnce() -> T) -> Result<(T, SetState<T>), HookError>
where
    T: Clone + PartialEq + 'static,
{
    let (instance, index) = claim_slot("use_state")?;
    let cell = instance.hook(index, "use_state", |slot: Option<StateSlot<T>>| {
        let slot = slot.unwrap_or_else(|| StateSlot {
            cell: Rc::new(RefCell::new(init())),
        });
        let cell = Rc::clone(&slot.cell);
        (slot, cell)
    });
    let value = cell.borrow().clone();
    Ok((
        value,
        SetState {
            cell,
            owner: Rc::downgrade(&instance),
        },
    ))
}

// ============================================================================
// Effects
// ============================================================================

/// Queues `effect` to run after the render is committed, when `deps` differs
/// from the previous render's. `()` deps run the effect once after mount.
///
/// The cleanup the effect returns runs before the next run and on unmount.
pub fn use_effect<D, F, C>(deps: D, effect: F) -> Result<(), HookError>
where
    D: PartialEq + 'static,
    F: FnOnce() -> C + 'static,
    C: Into<EffectCleanup>,
{
    let (instance, index) = claim_slot("use_effect")?;
    queue_effect(&instance, index, "use_effect", Some(deps), effect);
    Ok(())
}

/// Queues `effect` after every render.
pub fn use_effect_each<F, C>(effect: F) -> Result<(), HookError>
where
    F: FnOnce() -> C + 'static,
    C: Into<EffectCleanup>,
{
    let (instance, index) = claim_slot("use_effect_each")?;
    queue_effect::<(), _, _>(&instance, index, "use_effect_each", None, effect);
    Ok(())
}

fn queue_effect<D, F, C>(instance: &Rc<Instance>, index: usize, hook: &'static str, deps: Option<D>, effect: F)
where
    D: PartialEq + 'static,
    F: FnOnce() -> C + 'static,
    C: Into<EffectCleanup>,
{
    let queued = instance.hook(index, hook, |slot: Option<EffectSlot<D>>| {
        let mut slot = slot.unwrap_or_else(EffectSlot::empty);
        let changed = match (&deps, &slot.deps) {
            (Some(next), Some(previous)) => next != previous,
            _ => true,
        };
        if changed {
            slot.deps = deps;
            slot.pending = Some(Box::new(move || effect().into()));
        }
        (slot, changed)
    });
    if queued {
        instance.runtime().enqueue_effects(instance);
    }
}

// ============================================================================
// Memoization
// ============================================================================

/// Returns the cached value, recomputing it when `deps` changes.
pub fn use_memo<D, T>(deps: D, factory: impl FnOnce() -> T) -> Result<T, HookError>
where
    D: PartialEq + 'static,
    T: Clone + 'static,
{
    let (instance, index) = claim_slot("use_memo")?;
    Ok(memo(&instance, index, "use_memo", deps, factory))
}

/// Returns a callback whose identity is stable until `deps` changes.
pub fn use_callback<D, A>(deps: D, func: impl Fn(&A) + 'static) -> Result<Callback<A>, HookError>
where
    D: PartialEq + 'static,
    A: 'static,
{
    let (instance, index) = claim_slot("use_callback")?;
    Ok(memo(&instance, index, "use_callback", deps, || Callback::new(func)))
}

fn memo<D, T>(instance: &Instance, index: usize, hook: &'static str, deps: D, factory: impl FnOnce() -> T) -> T
where
    D: PartialEq + 'static,
    T: Clone + 'static,
{
    instance.hook(index, hook, |slot: Option<MemoSlot<D, T>>| match slot {
        Some(slot) if slot.deps == deps => {
            let value = slot.value.clone();
            (slot, value)
        }
        _ => {
            let value = factory();
            (
                MemoSlot {
                    deps,
                    value: value.clone(),
                },
                value,
            )
        }
    })
}

// ============================================================================
// Transitions
// ============================================================================

/// Returns whether a transition started by this slot is running, and the
/// starter.
pub fn use_transition() -> Result<(bool, StartTransition), HookError> {
    let (instance, index) = claim_slot("use_transition")?;
    let pending = instance.hook(index, "use_transition", |slot: Option<TransitionSlot>| {
        let slot = slot.unwrap_or_else(|| TransitionSlot {
            pending: Rc::new(Cell::new(false)),
        });
        let pending = Rc::clone(&slot.pending);
        (slot, pending)
    });
    Ok((
        pending.get(),
        StartTransition::new(pending, instance.runtime().clone()),
    ))
}

/// Returns `value` and, when it changed since the last render, schedules a
/// follow-up render so consumers see it settle.
pub fn use_deferred_value<T>(value: T) -> Result<T, HookError>
where
    T: Clone + PartialEq + 'static,
{
    let (instance, index) = claim_slot("use_deferred_value")?;
    let (current, follow_up) = instance.hook(index, "use_deferred_value", |slot: Option<DeferredSlot<T>>| {
        match slot {
            Some(mut slot) => {
                let changed = slot.value != value;
                if changed {
                    slot.value = value;
                }
                let current = slot.value.clone();
                (slot, (current, changed))
            }
            None => (DeferredSlot { value: value.clone() }, (value, false)),
        }
    });
    if follow_up {
        log::trace!("{}: deferred value changed, scheduling follow-up render", instance.name());
        instance.request_render();
    }
    Ok(current)
}

// ============================================================================
// Resources
// ============================================================================

/// Returns the resource created by `factory` on first render.
pub fn use_resource<T>(factory: impl FnOnce() -> Resource<T>) -> Result<Resource<T>, HookError>
where
    T: Clone + 'static,
{
    let (instance, index) = claim_slot("use_resource")?;
    Ok(instance.hook(index, "use_resource", |slot: Option<ResourceSlot<T>>| {
        let slot = slot.unwrap_or_else(|| ResourceSlot { resource: factory() });
        let resource = slot.resource.clone();
        (slot, resource)
    }))
}
