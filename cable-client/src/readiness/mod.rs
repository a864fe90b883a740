//! Readiness barrier
//!
//! A one-shot countdown gate over asynchronous sub-tasks. Each sub-task takes a
//! slot with [`ReadinessBarrier::wait`] and releases it through the returned
//! [`Proceed`] guard. When the last outstanding slot is released the barrier
//! moves from `Waiting` to `Ready`, runs every queued callback and wakes
//! [`ReadinessBarrier::ready`] waiters. It never returns to `Waiting`; build a
//! new barrier (a new client) to get a fresh gate.
//!
//! Slots may nest: a sub-task can take further slots before releasing its own.

use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::metrics;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Barrier state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    Waiting,
    Ready,
}

type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    pending: usize,
    state: BarrierState,
    queue: Vec<ReadyCallback>,
}

/// Counted, one-shot synchronization gate
#[derive(Clone)]
pub struct ReadinessBarrier {
    inner: Arc<Mutex<Inner>>,
    ready_tx: Arc<watch::Sender<BarrierState>>,
}

impl ReadinessBarrier {
    /// Create a barrier in the `Waiting` state with no slots taken
    pub fn new() -> Self {
        let (ready_tx, _) = watch::channel(BarrierState::Waiting);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: 0,
                state: BarrierState::Waiting,
                queue: Vec::new(),
            })),
            ready_tx: Arc::new(ready_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a slot. The barrier cannot open until the returned guard is released.
    pub fn wait(&self, label: impl Into<String>) -> Proceed {
        let label = label.into();
        let mut inner = self.lock();
        inner.pending += 1;
        debug!(pending = inner.pending, label = %label, "wait");
        Proceed {
            barrier: self.clone(),
            label,
            released: false,
        }
    }

    /// Run `callback` once the barrier is ready; immediately if it already is.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.lock();
        match inner.state {
            BarrierState::Waiting => inner.queue.push(Box::new(callback)),
            BarrierState::Ready => {
                drop(inner);
                callback();
            }
        }
    }

    /// Resolve once the barrier is ready
    pub async fn ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| *state == BarrierState::Ready).await;
    }

    pub fn state(&self) -> BarrierState {
        self.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == BarrierState::Ready
    }

    /// Number of slots not yet released
    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    fn release(&self, label: &str) {
        let flushed = {
            let mut inner = self.lock();
            debug_assert!(inner.pending > 0, "proceed without matching wait: {}", label);
            inner.pending = inner.pending.saturating_sub(1);
            debug!(pending = inner.pending, label = %label, "proceed");

            if inner.pending == 0 && inner.state == BarrierState::Waiting {
                inner.state = BarrierState::Ready;
                Some(mem::take(&mut inner.queue))
            } else {
                None
            }
        };

        if let Some(callbacks) = flushed {
            info!(queued = callbacks.len(), "Readiness barrier open");
            for callback in callbacks {
                callback();
            }
            metrics::record_counter(metrics::READINESS_READY, 1);
            self.ready_tx.send_replace(BarrierState::Ready);
        }
    }
}

impl Default for ReadinessBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadinessBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ReadinessBarrier")
            .field("state", &inner.state)
            .field("pending", &inner.pending)
            .field("queued", &inner.queue.len())
            .finish()
    }
}

/// A taken barrier slot. Consumed by [`Proceed::proceed`]; dropping it also
/// releases the slot, so an early return on an error path cannot wedge the gate.
#[must_use = "dropping a Proceed releases its slot immediately"]
pub struct Proceed {
    barrier: ReadinessBarrier,
    label: String,
    released: bool,
}

impl Proceed {
    /// Release the slot
    pub fn proceed(mut self) {
        self.released = true;
        self.barrier.release(&self.label);
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for Proceed {
    fn drop(&mut self) {
        if !self.released {
            trace!(label = %self.label, "slot released on drop");
            self.released = true;
            self.barrier.release(&self.label);
        }
    }
}

impl fmt::Debug for Proceed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proceed").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_completes_within;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let make = move || {
            let c = c.clone();
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (count, make)
    }

    #[test]
    fn test_opens_after_last_proceed() {
        let barrier = ReadinessBarrier::new();
        let (count, make) = counter();
        barrier.on_ready(make());

        let a = barrier.wait("a");
        let b = barrier.wait("b");
        let c = barrier.wait("c");
        assert_eq!(barrier.pending(), 3);

        b.proceed();
        c.proceed();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(barrier.state(), BarrierState::Waiting);

        a.proceed();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(barrier.is_ready());
    }

    #[test]
    fn test_callbacks_after_ready_run_immediately() {
        let barrier = ReadinessBarrier::new();
        barrier.wait("only").proceed();

        let (count, make) = counter();
        barrier.on_ready(make());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        barrier.on_ready(make());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_never_rearms() {
        let barrier = ReadinessBarrier::new();
        let (count, make) = counter();
        barrier.on_ready(make());
        barrier.wait("first").proceed();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let late = barrier.wait("late");
        assert!(barrier.is_ready());
        late.proceed();
        assert!(barrier.is_ready());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nested_fan_out_converges_into_parent() {
        let barrier = ReadinessBarrier::new();
        let (count, make) = counter();
        barrier.on_ready(make());

        let join = barrier.wait("join channel");
        let topic = barrier.wait("fetch topic");
        let members = barrier.wait("fetch members");
        topic.proceed();
        join.proceed();
        assert!(!barrier.is_ready());
        members.proceed();
        assert!(barrier.is_ready());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_guard_releases_slot() {
        let barrier = ReadinessBarrier::new();
        {
            let _slot = barrier.wait("failing step");
        }
        assert!(barrier.is_ready());
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn test_callback_may_register_more_callbacks() {
        let barrier = ReadinessBarrier::new();
        let (count, make) = counter();
        let inner_barrier = barrier.clone();
        let inner = make();
        barrier.on_ready(move || inner_barrier.on_ready(inner));

        barrier.wait("x").proceed();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ready_resolves_with_concurrent_tasks() {
        let barrier = ReadinessBarrier::new();
        let (count, make) = counter();
        barrier.on_ready(make());

        let mut handles = Vec::new();
        for i in 0..8u64 {
            let slot = barrier.wait(format!("task {}", i));
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(8 - i)).await;
                slot.proceed();
            }));
        }

        assert_completes_within(Duration::from_secs(2), barrier.ready()).await;
        for handle in handles {
            handle.await.unwrap();
        }
        barrier.on_ready(make());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ready_after_open_returns_immediately() {
        let barrier = ReadinessBarrier::new();
        barrier.wait("done").proceed();
        assert_completes_within(Duration::from_millis(100), barrier.ready()).await;
    }
}
