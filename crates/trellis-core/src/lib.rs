#![doc = r"Reconciliation core for Trellis: virtual nodes, hooks, the diff engine and the render scheduler."]

extern crate self as trellis_core;

pub mod applier;
pub mod collections;
pub mod config;
pub mod error;
pub mod hooks;
pub mod inspect;
pub mod platform;
pub mod runtime;
pub mod suspense;
pub mod transition;
pub mod vnode;

mod instance;
mod reconcile;
mod root;

pub use applier::{Applier, MemoryApplier, Mutation};
pub use config::RootConfig;
pub use error::{HookError, NodeError, RenderError};
pub use hooks::{
    current_component, is_rendering, use_callback, use_deferred_value, use_effect, use_effect_each,
    use_memo, use_resource, use_state, use_transition, SetState,
};
pub use inspect::{InstanceSnapshot, SlotInfo};
pub use instance::EffectCleanup;
pub use platform::{Clock, RuntimeScheduler};
pub use reconcile::Status;
pub use root::Root;
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use suspense::{suspense, Resource, Suspense};
pub use transition::{Priority, StartTransition, Transition, TransitionId};
pub use vnode::{
    create_node, Arg, Callback, Child, Component, ComponentNode, ElementNode, Event, EventHandler,
    IntoArg, IntoChild, Key, NodeKind, PropValue, Props, Render, RenderFn, RenderResult, VNode,
};

#[cfg(test)]
pub use runtime::TestScheduler;

/// Identifier of a node in the host display tree.
pub type NodeId = usize;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
