//! # Uninterruptible Sections
//!
//! Store writes must not be cut short by an interrupt. Every store operation
//! runs inside a `CriticalSection`; an interrupt raised while any section is
//! open is latched and delivered once the last section closes.
//!
//! The latch does not install OS signal handlers itself. The binary forwards
//! its interrupt (Ctrl-C) to `InterruptLatch::raise`, and registers the
//! handler that should run when the interrupt is actually delivered.

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type Handler = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Default)]
struct LatchState {
    /// Number of open critical sections.
    depth: usize,
    /// An interrupt arrived while `depth > 0`.
    pending: bool,
    /// Total interrupts delivered.
    delivered: u64,
}

/// Defers interrupts while critical sections are open.
#[derive(Default)]
pub struct InterruptLatch {
    state: Mutex<LatchState>,
    handler: RwLock<Option<Handler>>,
}

impl fmt::Debug for InterruptLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InterruptLatch")
            .field("depth", &state.depth)
            .field("pending", &state.pending)
            .field("delivered", &state.delivered)
            .finish_non_exhaustive()
    }
}

impl InterruptLatch {
    /// Create a latch with no handler.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the function run when an interrupt is delivered.
    ///
    /// Replaces any previous handler. A latched interrupt is delivered on the
    /// thread that closes the last open section, after the store and instance
    /// locks guarded by that section are released, so the handler may write
    /// to the store. It must not call `set_handler`.
    pub fn set_handler(&self, handler: impl Fn() + Send + Sync + 'static) {
        *self.handler.write() = Some(Box::new(handler));
    }

    /// Raise an interrupt.
    ///
    /// Delivered immediately when no section is open, otherwise latched.
    pub fn raise(&self) {
        {
            let mut state = self.state.lock();
            if state.depth > 0 {
                state.pending = true;
                debug!("interrupt received inside a critical section, delaying delivery");
                return;
            }
            state.delivered += 1;
        }
        self.deliver();
    }

    /// Open a critical section. The section closes when the guard drops.
    #[must_use = "the section closes as soon as the guard is dropped"]
    pub fn enter(&self) -> CriticalSection<'_> {
        self.state.lock().depth += 1;
        CriticalSection { latch: self }
    }

    /// Check whether an interrupt is waiting for the sections to close.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Number of open critical sections.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.lock().depth
    }

    /// Number of interrupts delivered so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.state.lock().delivered
    }

    fn leave(&self) {
        let redeliver = {
            let mut state = self.state.lock();
            state.depth = state.depth.saturating_sub(1);
            let redeliver = state.depth == 0 && state.pending;
            if redeliver {
                state.pending = false;
                state.delivered += 1;
            }
            redeliver
        };
        if redeliver {
            debug!("re-delivering interrupt latched during critical section");
            self.deliver();
        }
    }

    fn deliver(&self) {
        if let Some(handler) = self.handler.read().as_ref() {
            handler();
        }
    }
}

/// Guard for an open critical section.
#[derive(Debug)]
pub struct CriticalSection<'a> {
    latch: &'a InterruptLatch,
}

impl Drop for CriticalSection<'_> {
    fn drop(&mut self) {
        self.latch.leave();
    }
}

// =============================================================================
// TESTS
// =============================================================================
