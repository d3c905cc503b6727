//! Write-Ready Gate
//!
//! A one-way latch: readers wait on it until the first successful write, after
//! which it stays open forever. On shutdown it is forced open so that no
//! reader is left blocked.
//!
//! # Waiting without losing a wakeup
//!
//! A reader checks the latch, then registers itself as a waiter. A writer may
//! open the latch between those two steps; if the reader registered after the
//! writer had already drained the waiting list, it would sleep forever.
//!
//! To avoid this, registration happens under the gate lock and the latch is
//! checked again after the lock is taken:
//!
//! ```ignore
//! if gate.is_open() {
//!     return Ok(());
//! }
//!
//! let lock = gate.get_lock();
//! // `wait_async` re-checks the latch under `lock`, registers the waiter,
//! // and releases the lock before the returned future is awaited
//! gate.wait_async("reader", lock).await;
//! ```
//!
//! Every clone of a `WriteReadyGate` refers to the same latch.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::DeviceError;
use crate::interrupt::Interrupt;

/// Position of the latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// No write has happened yet, readers block
    Closed,
    /// Opened by a write
    Signaled,
    /// Forced open on shutdown
    Released,
}

/// A reader parked on the gate
struct WaitingReader {
    sender: tokio::sync::oneshot::Sender<LatchState>,
    debug_hint: String,
}

impl std::fmt::Debug for WaitingReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitingReader")
            .field("debug_hint", &self.debug_hint)
            .finish_non_exhaustive()
    }
}

pub struct GateState {
    latch: LatchState,
    waiting_readers: Vec<WaitingReader>,
}

impl GateState {
    fn new() -> Self {
        Self {
            latch: LatchState::Closed,
            waiting_readers: Vec::new(),
        }
    }
}

/// Thread-safe write-ready latch
#[derive(Clone)]
pub struct WriteReadyGate {
    inner: Arc<Mutex<GateState>>,
    debug_hint: Arc<str>,
}

impl WriteReadyGate {
    #[must_use]
    pub fn new(debug_hint: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GateState::new())),
            debug_hint: Arc::from(debug_hint),
        }
    }

    /// Get the lock for atomic check + register
    pub fn get_lock(&self) -> parking_lot::MutexGuard<'_, GateState> {
        self.inner.lock()
    }

    #[must_use]
    pub fn state(&self) -> LatchState {
        self.inner.lock().latch
    }

    /// True once the gate has been signaled or released
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() != LatchState::Closed
    }

    /// Whether both handles refer to the same latch
    #[must_use]
    pub fn same_latch(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Open the gate after a write
    ///
    /// Only the first call has an effect; later calls find the latch open and
    /// return. A gate that was already force-released stays `Released`.
    pub fn signal(&self) {
        self.open_with(LatchState::Signaled);
    }

    /// Force the gate open on shutdown, releasing every waiting reader
    pub fn force_release(&self) {
        self.open_with(LatchState::Released);
    }

    /// Register a waiter and return a future that resolves when the gate opens
    ///
    /// Precondition: `lock` was obtained from `get_lock()` on this gate.
    /// Post-condition: the lock is released before this method returns.
    ///
    /// See the module documentation for the lock acquisition pattern.
    pub fn wait_async(
        &self,
        debug_hint: &str,
        mut lock: parking_lot::MutexGuard<'_, GateState>,
    ) -> impl std::future::Future<Output = ()> + Send {
        let (tx, rx) = tokio::sync::oneshot::channel();

        if lock.latch == LatchState::Closed {
            // Interrupted readers leave their sender behind
            lock.waiting_readers.retain(|w| !w.sender.is_closed());
            lock.waiting_readers.push(WaitingReader {
                sender: tx,
                debug_hint: debug_hint.to_string(),
            });
        } else {
            // Resolve immediately; the value is ignored
            let _ = tx.send(lock.latch);
        }
        drop(lock);

        // The sender side is only dropped without sending if the whole gate is
        // dropped while readers wait, which cannot happen while a device holds it
        async move {
            let _ = rx.await;
        }
    }

    /// Block until the gate opens, or fail if `interrupt` fires first
    ///
    /// An open gate wins over a pending interrupt.
    ///
    /// # Errors
    /// `Interrupted` if the interrupt is raised while the gate is closed.
    pub async fn wait(&self, interrupt: &Interrupt) -> Result<(), DeviceError> {
        if self.is_open() {
            return Ok(());
        }

        let opened = self.wait_async("reader", self.get_lock());
        tokio::select! {
            biased;
            () = opened => Ok(()),
            () = interrupt.raised() => {
                log::debug!("gate '{}': wait interrupted", self.debug_hint);
                Err(DeviceError::Interrupted)
            }
        }
    }

    fn open_with(&self, target: LatchState) {
        let mut state = self.inner.lock();

        if state.latch != LatchState::Closed {
            if target == LatchState::Released && state.latch == LatchState::Signaled {
                log::debug!(
                    "gate '{}': release requested, already signaled",
                    self.debug_hint
                );
            }
            return;
        }
        state.latch = target;
        let readers = std::mem::take(&mut state.waiting_readers);
        drop(state);

        log::debug!(
            "gate '{}': {:?}, waking {} reader(s)",
            self.debug_hint,
            target,
            readers.len()
        );

        for reader in readers {
            if reader.sender.send(target).is_err() {
                log::debug!(
                    "gate '{}': reader gone before wakeup (hint: {})",
                    self.debug_hint,
                    reader.debug_hint
                );
            }
        }
    }
}

impl std::fmt::Debug for WriteReadyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        write!(
            f,
            "WriteReadyGate(hint={}, latch={:?}, waiting={})",
            self.debug_hint,
            state.latch,
            state.waiting_readers.len()
        )
    }
}
