//! Callback target for one asynchronous invocation.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::object::ManagementObject;
use crate::types::{CallId, StatusCode};

/// One object handed to the item callback.
#[derive(Debug)]
pub struct Delivery<'a> {
    /// Zero-based number of the batch this object arrived in.
    pub batch: usize,
    /// Position inside that batch.
    pub index: usize,
    /// Position across the whole invocation.
    pub sequence: usize,
    pub object: &'a ManagementObject,
}

/// User-supplied item callback.
pub type BatchCallback = Box<dyn FnMut(&Delivery<'_>) + Send>;

/// Final status of an invocation, as delivered by the service.
#[derive(Debug, Clone)]
pub struct Completion {
    pub status: StatusCode,
    /// Extended error information, if the service supplied any.
    pub error_object: Option<ManagementObject>,
    pub batches: usize,
    pub delivered: usize,
}

/// Why a wait ended without a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitAbort {
    TimedOut,
    Cancelled,
}

/// Everything a batch delivery touches. Held for the whole batch, so
/// batches are serialized and the completion waits for the one in flight.
struct Deliveries {
    callback: Option<BatchCallback>,
    batches: usize,
    delivered: usize,
}

/// Reference-counted target for asynchronous results.
///
/// The service may call [`CallbackSink::deliver_batch`] and
/// [`CallbackSink::deliver_completion`] from threads it owns. Batches run
/// the item callback under a delivery lock, and the completion takes that
/// lock before it is recorded, so no batch can interleave with or follow
/// the completion. The waiter only ever takes the completion lock, so a
/// slow callback cannot hold it past its deadline.
pub struct CallbackSink {
    call_id: CallId,
    deliveries: Mutex<Deliveries>,
    completion: Mutex<Option<Completion>>,
    completed: Condvar,
    /// The caller stopped listening; deliveries are refused from now on.
    closed: AtomicBool,
}

impl CallbackSink {
    pub fn new(call_id: CallId, callback: BatchCallback) -> Arc<Self> {
        Arc::new(Self {
            call_id,
            deliveries: Mutex::new(Deliveries {
                callback: Some(callback),
                batches: 0,
                delivered: 0,
            }),
            completion: Mutex::new(None),
            completed: Condvar::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    fn refusing(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.completion.lock().is_some()
    }

    /// Forward one batch to the item callback.
    ///
    /// Returns `CALL_CANCELLED` (without touching the callback) once the
    /// invocation has completed or the caller has stopped waiting. A close
    /// during a batch stops it before the next item.
    pub fn deliver_batch(&self, items: &[ManagementObject]) -> StatusCode {
        let mut guard = self.deliveries.lock();
        if self.refusing() {
            tracing::warn!(call_id = %self.call_id, items = items.len(), "batch refused after completion");
            return StatusCode::CALL_CANCELLED;
        }

        let deliveries = &mut *guard;
        let batch = deliveries.batches;
        let mut forwarded = 0;
        if let Some(callback) = deliveries.callback.as_mut() {
            for (index, object) in items.iter().enumerate() {
                if self.closed.load(Ordering::Acquire) {
                    break;
                }
                callback(&Delivery {
                    batch,
                    index,
                    sequence: deliveries.delivered + index,
                    object,
                });
                forwarded += 1;
            }
        }
        deliveries.batches += 1;
        deliveries.delivered += forwarded;

        tracing::trace!(call_id = %self.call_id, batch, items = forwarded, "batch delivered");
        StatusCode::OK
    }

    /// Record the final status and wake the waiting caller.
    ///
    /// Waits for a batch in flight to finish. Only the first completion
    /// counts; later ones return `UNEXPECTED`.
    pub fn deliver_completion(
        &self,
        status: StatusCode,
        error_object: Option<ManagementObject>,
    ) -> StatusCode {
        let mut deliveries = self.deliveries.lock();
        let mut completion = self.completion.lock();
        if completion.is_some() {
            tracing::warn!(call_id = %self.call_id, %status, "duplicate completion ignored");
            return StatusCode::UNEXPECTED;
        }

        *completion = Some(Completion {
            status,
            error_object,
            batches: deliveries.batches,
            delivered: deliveries.delivered,
        });
        // No batch may reach the callback after this point.
        deliveries.callback = None;
        self.completed.notify_all();

        tracing::debug!(
            call_id = %self.call_id,
            %status,
            batches = deliveries.batches,
            delivered = deliveries.delivered,
            "completion delivered"
        );
        StatusCode::OK
    }

    pub fn is_complete(&self) -> bool {
        self.completion.lock().is_some()
    }

    /// Stop accepting batches. The item callback is dropped now if no batch
    /// is running, otherwise when that batch returns or the completion lands.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(mut deliveries) = self.deliveries.try_lock() {
            deliveries.callback = None;
        }
    }

    /// Block until the completion arrives.
    ///
    /// `timeout` of `None` waits without bound. When a cancellation token is
    /// given, the wait wakes every `poll` to check it.
    pub fn wait(
        &self,
        timeout: Option<Duration>,
        cancel: Option<&CancellationToken>,
        poll: Duration,
    ) -> std::result::Result<Completion, WaitAbort> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut completion = self.completion.lock();
        loop {
            if let Some(completion) = completion.as_ref() {
                return Ok(completion.clone());
            }
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(WaitAbort::Cancelled);
            }

            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) if now >= deadline => return Err(WaitAbort::TimedOut),
                Some(deadline) => Some(deadline - now),
                None => None,
            };
            let slice = match (remaining, cancel.is_some()) {
                (Some(remaining), true) => Some(remaining.min(poll)),
                (Some(remaining), false) => Some(remaining),
                (None, true) => Some(poll),
                (None, false) => None,
            };

            match slice {
                Some(slice) => {
                    self.completed.wait_for(&mut completion, slice);
                }
                None => self.completed.wait(&mut completion),
            }
        }
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink")
            .field("call_id", &self.call_id)
            .field("complete", &self.is_complete())
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
