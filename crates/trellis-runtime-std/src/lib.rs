//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform abstraction
//! traits defined in `trellis-core`. A host event loop builds its roots through
//! [`StdRuntime::root`], then calls [`StdRuntime::pump`] on every tick: the
//! pending batch runs when the host reports itself idle, or once the idle
//! timeout has passed while it stays busy.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use trellis_core::{Applier, Clock, NodeId, Root, RootConfig, RuntimeScheduler, Status};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records batch requests with an idle deadline.
pub struct StdScheduler {
    batch_requested: AtomicBool,
    deadline: Mutex<Option<Instant>>,
    batch_waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            batch_requested: AtomicBool::new(false),
            deadline: Mutex::new(None),
            batch_waker: RwLock::new(None),
        }
    }

    pub fn is_batch_requested(&self) -> bool {
        self.batch_requested.load(Ordering::SeqCst)
    }

    /// Returns whether a batch has been requested since the last call.
    pub fn take_batch_request(&self) -> bool {
        let requested = self.batch_requested.swap(false, Ordering::SeqCst);
        if requested {
            *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
        requested
    }

    /// Whether the requested batch should run now: on an idle tick, or after
    /// the timeout fallback expired.
    pub fn batch_due(&self, host_idle: bool) -> bool {
        if !self.is_batch_requested() {
            return false;
        }
        if host_idle {
            return true;
        }
        self.deadline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Registers a waker invoked whenever a new batch is requested.
    pub fn set_batch_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self
            .batch_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered batch waker.
    pub fn clear_batch_waker(&self) {
        *self
            .batch_waker
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .batch_waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("batch_requested", &self.is_batch_requested())
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_batch(&self, timeout: Duration) {
        {
            let mut deadline = self.deadline.lock().unwrap_or_else(PoisonError::into_inner);
            if deadline.is_none() {
                *deadline = Some(Instant::now() + timeout);
            }
        }
        self.batch_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Clock implementation backed by [`std::time`].
#[derive(Debug, Default, Clone)]
pub struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn elapsed_millis(&self, since: Self::Instant) -> u64 {
        since.elapsed().as_millis() as u64
    }
}

impl StdClock {
    /// Returns the elapsed time as a [`Duration`] for convenience.
    pub fn elapsed(&self, since: Instant) -> Duration {
        since.elapsed()
    }
}

/// Convenience container bundling the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Arc<StdClock>,
    config: RootConfig,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_config(RootConfig::default())
    }

    pub fn with_config(config: RootConfig) -> Self {
        Self {
            scheduler: Arc::new(StdScheduler::default()),
            clock: Arc::new(StdClock),
            config,
        }
    }

    /// Builds a root whose batch requests go to this runtime's scheduler.
    pub fn root<A: Applier>(&self, applier: A, container: NodeId) -> Root<A> {
        Root::with_scheduler(
            applier,
            container,
            Arc::clone(&self.scheduler) as Arc<dyn RuntimeScheduler>,
            self.config.clone(),
        )
    }

    /// Runs the requested batch if it is due. Returns whether a batch ran.
    ///
    /// A failed flush is logged and swallowed so the host loop keeps going;
    /// the instances the batch did not reach stay queued.
    pub fn pump<A: Applier>(&self, root: &mut Root<A>, host_idle: bool) -> bool {
        if !self.scheduler.batch_due(host_idle) || !self.scheduler.take_batch_request() {
            return false;
        }
        let started = self.clock.now();
        match root.flush() {
            Ok(Status::Pending) => {
                log::debug!("batch finished with suspended content outside any boundary");
            }
            Ok(Status::Ready) => {}
            Err(err) => log::error!("render batch failed: {err}"),
        }
        log::trace!("batch took {} ms", self.clock.elapsed_millis(started));
        true
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns the clock implementation.
    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    /// Returns whether a batch was requested since the last poll.
    pub fn take_batch_request(&self) -> bool {
        self.scheduler.take_batch_request()
    }

    /// Registers a waker to be called when a root requests a batch.
    pub fn set_batch_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_batch_waker(waker);
    }

    /// Clears any previously registered batch waker.
    pub fn clear_batch_waker(&self) {
        self.scheduler.clear_batch_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
