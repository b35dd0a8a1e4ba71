//! Priority event bus — single-worker background dispatcher
//!
//! Producers enqueue from any thread in any state; one worker task pops
//! the lowest-priority event and dispatches it synchronously to every
//! subscriber of that kind, so subscriber callbacks never overlap. The
//! worker blocks on a `Notify` when the queue is empty — dispatch latency
//! is bounded by arrival, not a poll interval.
//!
//! There is no per-event timeout: a subscriber that blocks indefinitely
//! stalls all subsequent dispatch. Events still queued when the bus stops
//! are dropped without delivery.

use super::event::{Event, EventKind, QueuedEvent};
use dashmap::DashMap;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Error a subscriber handler may return; logged by the bus, never propagated.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

type EventHandler = Arc<dyn Fn(&Event) -> Result<(), SubscriberError> + Send + Sync>;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// The priority event bus.
///
/// Cloning shares the same queue, subscribers, and counters.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    queue: Mutex<BinaryHeap<QueuedEvent>>,
    notify: Notify,
    subscribers: DashMap<EventKind, Vec<EventHandler>>,
    counts: DashMap<EventKind, u64>,
    seq: AtomicU64,
    state: AtomicU8,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    ///
    /// Handlers run on the worker task. A returned `Err` is logged and
    /// never propagates or blocks delivery to remaining subscribers.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    /// Enqueue an event for background dispatch.
    ///
    /// Legal from any state and thread; only enqueues. The per-kind
    /// counter is bumped here, at enqueue, so metrics are deterministic
    /// even before the worker drains the queue.
    pub fn queue_event(&self, event: Event) {
        *self.inner.counts.entry(event.kind.clone()).or_insert(0) += 1;

        let priority = event.effective_priority();
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        self.inner
            .queue
            .lock()
            .expect("event queue lock poisoned")
            .push(QueuedEvent {
                event,
                priority,
                seq,
            });
        self.inner.notify.notify_one();
    }

    /// Spawn the background worker. No-op unless the bus is Idle.
    pub fn start(&self) {
        if self
            .inner
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            loop {
                if inner.state.load(Ordering::SeqCst) != RUNNING {
                    break;
                }
                let next = inner
                    .queue
                    .lock()
                    .expect("event queue lock poisoned")
                    .pop();
                match next {
                    Some(queued) => inner.dispatch(&queued.event),
                    // notify_one stores a permit, so an enqueue racing
                    // this await is not lost.
                    None => inner.notify.notified().await,
                }
            }
        });
        *self
            .inner
            .worker
            .lock()
            .expect("worker handle lock poisoned") = Some(handle);
    }

    /// Signal termination and wait for the worker to exit.
    ///
    /// An in-flight dispatch completes; events still queued are dropped
    /// without delivery.
    pub async fn stop(&self) {
        self.inner.state.store(STOPPED, Ordering::SeqCst);
        self.inner.notify.notify_one();

        let handle = self
            .inner
            .worker
            .lock()
            .expect("worker handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let dropped = {
            let mut queue = self.inner.queue.lock().expect("event queue lock poisoned");
            let n = queue.len();
            queue.clear();
            n
        };
        if dropped > 0 {
            debug!(dropped, "bus stopped with undelivered events");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Events enqueued but not yet dispatched.
    pub fn queued_len(&self) -> usize {
        self.inner
            .queue
            .lock()
            .expect("event queue lock poisoned")
            .len()
    }

    /// Lifetime count of events of one kind, as of enqueue. Never resets.
    pub fn count(&self, kind: &EventKind) -> u64 {
        self.inner.counts.get(kind).map(|c| *c).unwrap_or(0)
    }

    /// Snapshot of all per-kind counters.
    pub fn counts(&self) -> HashMap<EventKind, u64> {
        self.inner
            .counts
            .iter()
            .map(|r| (r.key().clone(), *r.value()))
            .collect()
    }
}

impl BusInner {
    fn dispatch(&self, event: &Event) {
        // Clone the handler list out of the map so a handler that
        // subscribes does not deadlock against the shard lock.
        let handlers: Vec<EventHandler> = match self.subscribers.get(&event.kind) {
            Some(handlers) => handlers.clone(),
            None => return,
        };

        for handler in &handlers {
            if let Err(error) = handler(event) {
                warn!(kind = %event.kind, %error, "subscriber handler failed");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("running", &self.is_running())
            .field("queued", &self.queued_len())
            .finish()
    }
}
