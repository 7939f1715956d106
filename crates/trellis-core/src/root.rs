use std::sync::Arc;

use crate::applier::Applier;
use crate::config::RootConfig;
use crate::error::RenderError;
use crate::inspect::{self, InstanceSnapshot};
use crate::platform::RuntimeScheduler;
use crate::reconcile::{Mounted, Reconciler, Scope, Status};
use crate::runtime::{DefaultScheduler, Runtime, RuntimeHandle};
use crate::vnode::VNode;
use crate::NodeId;

/// A tree of components rendered into one container node of a display tree.
pub struct Root<A: Applier> {
    applier: A,
    runtime: Runtime,
    container: NodeId,
    tree: Option<Mounted>,
}

impl<A: Applier> Root<A> {
    pub fn new(applier: A, container: NodeId) -> Self {
        Self::with_config(applier, container, RootConfig::default())
    }

    pub fn with_config(applier: A, container: NodeId, config: RootConfig) -> Self {
        Self::with_scheduler(applier, container, Arc::new(DefaultScheduler), config)
    }

    /// Root whose batch requests go to `scheduler`.
    pub fn with_scheduler(
        applier: A,
        container: NodeId,
        scheduler: Arc<dyn RuntimeScheduler>,
        config: RootConfig,
    ) -> Self {
        Self {
            applier,
            runtime: Runtime::with_config(scheduler, config),
            container,
            tree: None,
        }
    }

    /// Reconciles `node` against the previous tree at index 0 of the
    /// container, then runs the effects the pass queued.
    pub fn render(&mut self, node: impl Into<Option<VNode>>) -> Result<Status, RenderError> {
        let node = node.into();
        let status = {
            let mut reconciler = Reconciler::new(&mut self.applier, self.runtime.handle());
            reconciler.diff(&mut self.tree, node.as_ref(), self.container, 0, &Scope::default())?
        };
        self.flush_effects();
        Ok(status)
    }

    /// Runs one batch: re-renders every queued instance that is still mounted
    /// and dirty, closes the batch and runs the queued effects. Updates made
    /// during the batch wait for the next one.
    pub fn flush(&mut self) -> Result<Status, RenderError> {
        let batch = self.runtime.take_batch();
        if !batch.is_empty() {
            log::debug!("flushing render batch of {} instance(s)", batch.len());
        }
        let mut status = Status::Ready;
        let mut queued = batch.into_iter();
        while let Some(instance) = queued.next() {
            if !instance.is_mounted() || !instance.is_dirty() {
                continue;
            }
            let result = Reconciler::new(&mut self.applier, self.runtime.handle()).rerender(&instance);
            match result {
                Ok(rendered) => status = status.merge(rendered),
                Err(err) => {
                    self.runtime.requeue(queued);
                    self.runtime.finish_batch();
                    return Err(err);
                }
            }
        }
        self.runtime.finish_batch();
        self.flush_effects();
        Ok(status)
    }

    /// Flushes until no render is queued.
    pub fn settle(&mut self) -> Result<Status, RenderError> {
        let passes = self.runtime.config().max_flush_passes;
        let mut status = Status::Ready;
        for _ in 0..passes {
            if !self.has_pending_work() {
                return Ok(status);
            }
            status = self.flush()?;
        }
        if self.has_pending_work() {
            log::warn!("root did not settle after {passes} flush passes");
            return Err(RenderError::Unsettled { passes });
        }
        Ok(status)
    }

    /// Removes the whole tree, running every effect cleanup.
    pub fn unmount(&mut self) -> Result<(), RenderError> {
        self.render(None).map(|_| ())
    }

    pub fn has_pending_work(&self) -> bool {
        self.runtime.has_pending_renders() || self.runtime.has_pending_effects()
    }

    /// Whether a batch has been requested from the host and not yet run.
    pub fn is_batch_requested(&self) -> bool {
        self.runtime.is_batch_open()
    }

    /// Snapshot of the top-level component instances.
    pub fn inspect(&self) -> Vec<InstanceSnapshot> {
        let mut out = Vec::new();
        if let Some(tree) = self.tree.as_ref() {
            inspect::collect(tree, &mut out);
        }
        out
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    pub fn applier_mut(&mut self) -> &mut A {
        &mut self.applier
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    fn flush_effects(&mut self) {
        for instance in self.runtime.take_effects() {
            if instance.is_mounted() {
                instance.run_effects();
            }
        }
    }
}

impl<A: Applier> Drop for Root<A> {
    fn drop(&mut self) {
        if let Some(tree) = self.tree.take() {
            tree.unmount();
        }
    }
}
