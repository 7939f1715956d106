use thiserror::Error;

use crate::NodeId;

/// Failure reported by a display-tree adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("node {id} missing")]
    Missing { id: NodeId },
    #[error("node {id} is a text node and cannot hold {what}")]
    NotAnElement { id: NodeId, what: &'static str },
    #[error("node {id} is not a text node")]
    NotText { id: NodeId },
    #[error("index {index} out of bounds for node {parent} with {len} children")]
    IndexOutOfBounds {
        parent: NodeId,
        index: usize,
        len: usize,
    },
    #[error("node {child} is not a child of node {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Misuse of the hook API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// A hook was called while no component render function was running.
    #[error("{hook}: called outside a component render")]
    OutsideRender { hook: &'static str },
}

/// Error surfaced by `Root::render` and `Root::flush`.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("component {component} failed: {message}")]
    Component {
        component: &'static str,
        message: String,
    },
    #[error("{message}")]
    Failed { message: String },
    #[error("updates still pending after {passes} flush passes")]
    Unsettled { passes: usize },
}

impl RenderError {
    /// Error a render function returns for its own failures.
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Failed {
            message: message.into(),
        }
    }

    pub(crate) fn in_component(self, component: &'static str) -> Self {
        match self {
            RenderError::Failed { message } => RenderError::Component { component, message },
            other => other,
        }
    }
}
