use std::time::Duration;

/// Tunables for one [`Root`](crate::Root).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootConfig {
    /// Upper bound the host may wait for an idle tick before running a batch.
    pub idle_timeout: Duration,
    /// Passes `Root::settle` runs before giving up on a render loop.
    pub max_flush_passes: usize,
    /// Warn when an instance changes its hook count between renders.
    pub hook_order_diagnostics: bool,
}

impl RootConfig {
    pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes.max(1);
        self
    }

    pub fn hook_order_diagnostics(mut self, enabled: bool) -> Self {
        self.hook_order_diagnostics = enabled;
        self
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Self::DEFAULT_IDLE_TIMEOUT,
            max_flush_passes: 64,
            hook_order_diagnostics: true,
        }
    }
}
