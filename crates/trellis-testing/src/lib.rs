//! Testing utilities and harness for Trellis

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use trellis_core::{
        h, props, suspense, use_callback, use_deferred_value, use_effect, use_effect_each,
        use_memo, use_resource, use_state, use_transition, EffectCleanup, Event, Mutation,
        Props, Render, RenderError, RenderResult, Resource, SetState, Status, VNode,
    };
}
