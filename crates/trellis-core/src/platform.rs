//! Platform abstraction traits for the render runtime.
//!
//! The runtime never decides on its own when a batch runs. It asks the host,
//! through [`RuntimeScheduler`], to run a deferred callback on its idle or async
//! tick; the host answers by calling `Root::flush`.

use std::time::Duration;

/// Requests deferred batch processing from the host platform.
///
/// Implementations must be safe to share across threads even though the
/// runtime itself is single threaded, so a host event loop on another thread
/// can be woken.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run a render batch on its next idle tick, and no
    /// later than `timeout` from now if the host stays busy.
    fn schedule_batch(&self, timeout: Duration);
}

/// Provides timing information for idle deadlines.
pub trait Clock: Send + Sync {
    /// Instant type produced by this clock implementation.
    type Instant: Copy + Send + Sync;

    /// Returns the current instant.
    fn now(&self) -> Self::Instant;

    /// Returns the number of milliseconds elapsed since `since`.
    fn elapsed_millis(&self, since: Self::Instant) -> u64;
}
