use trellis_core::{
    InstanceSnapshot, MemoryApplier, Mutation, NodeError, NodeId, RenderError, Root, RootConfig,
    Status, VNode,
};

/// Headless harness for exercising component trees in tests.
///
/// `TestRoot` owns a [`Root`] over an in-memory display tree and exposes
/// helpers for rendering, driving scheduled batches to completion and
/// asserting on the produced markup and mutation log without a real host.
pub struct TestRoot {
    root: Root<MemoryApplier>,
}

impl TestRoot {
    /// Create a new harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RootConfig::default())
    }

    pub fn with_config(config: RootConfig) -> Self {
        let mut applier = MemoryApplier::new();
        let container = applier.create_root("root");
        Self {
            root: Root::with_config(applier, container, config),
        }
    }

    /// Render `node` (or clear the tree with `None`) and run the effects the
    /// pass queued.
    pub fn render(&mut self, node: impl Into<Option<VNode>>) -> Result<Status, RenderError> {
        self.root.render(node)
    }

    /// Run one scheduled batch.
    pub fn flush(&mut self) -> Result<Status, RenderError> {
        self.root.flush()
    }

    /// Drive scheduled batches until no render or effect is left.
    pub fn settle(&mut self) -> Result<Status, RenderError> {
        self.root.settle()
    }

    pub fn unmount(&mut self) -> Result<(), RenderError> {
        self.root.unmount()
    }

    pub fn has_pending_work(&self) -> bool {
        self.root.has_pending_work()
    }

    /// Serialized display tree under the container.
    pub fn markup(&self) -> String {
        self.root
            .applier()
            .markup(self.root.container())
            .unwrap_or_default()
    }

    /// Indented dump of the display tree, handy in assertion messages.
    pub fn dump(&self) -> String {
        self.root.applier().dump_tree(Some(self.root.container()))
    }

    pub fn mutations(&self) -> &[Mutation] {
        self.root.applier().mutations()
    }

    /// Drain the mutation log recorded since the last call.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        self.root.applier_mut().take_mutations()
    }

    pub fn clear_mutations(&mut self) {
        self.root.applier_mut().clear_mutations();
    }

    /// First node under the container whose `id` attribute equals `id`.
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute("id", id)
    }

    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.root
            .applier()
            .find_by_attribute(self.root.container(), name, value)
    }

    /// Deliver `event` to the listeners bound on `node`. Updates the handlers
    /// make are only queued; call [`flush`](Self::flush) or
    /// [`settle`](Self::settle) to render them.
    pub fn dispatch(&self, node: NodeId, event: &str) -> Result<usize, NodeError> {
        self.root.applier().dispatch(node, event)
    }

    pub fn inspect(&self) -> Vec<InstanceSnapshot> {
        self.root.inspect()
    }

    /// Children of the first display node under the container.
    pub fn top_children(&self) -> Vec<NodeId> {
        let applier = self.root.applier();
        applier
            .children(self.root.container())
            .ok()
            .and_then(|children| children.first().copied())
            .and_then(|top| applier.children(top).ok())
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    pub fn container(&self) -> NodeId {
        self.root.container()
    }

    pub fn applier(&self) -> &MemoryApplier {
        self.root.applier()
    }

    pub fn applier_mut(&mut self) -> &mut MemoryApplier {
        self.root.applier_mut()
    }

    /// Gain access to the raw root for advanced scenarios.
    pub fn root(&mut self) -> &mut Root<MemoryApplier> {
        &mut self.root
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRoot`.
pub fn run_test_root<R>(f: impl FnOnce(&mut TestRoot) -> R) -> R {
    init_logging();
    let mut root = TestRoot::new();
    f(&mut root)
}

/// Routes `log` output through `env_logger` in test-capture mode. Safe to call
/// from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Mutations that change content (attributes, listeners or text) rather than
/// tree structure.
pub fn content_updates(mutations: &[Mutation]) -> Vec<&Mutation> {
    mutations
        .iter()
        .filter(|mutation| mutation.is_content_update())
        .collect()
}
