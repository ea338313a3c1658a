//! The deferred-invocation record handed from the admission controller to
//! the dispatcher (spec.md §3 "WorkItem").

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;

use axum::response::Response;
use tokio::sync::oneshot;

/// The terminal state of a queued request's completion signal.
///
/// Modelled as the value sent over a [`oneshot::Sender`] rather than a
/// hand-rolled tagged-state cell: a oneshot channel already gives
/// at-most-once resolution, and racing the receiver against a deadline
/// with `tokio::select!` gives the deadline race for free (spec.md §9
/// Design Notes explicitly allows "whichever is idiomatic"). `timed_out`
/// never needs to be a variant here — once the admission controller stops
/// polling the receiver, any later `send` from the dispatcher silently
/// fails, which is exactly the "tolerate dequeuing an already-resolved
/// item" behaviour spec.md §4.6 requires.
pub(crate) enum Resolution {
    Done(Response),
    /// The handler panicked. Carries the panic payload so the waiting
    /// admission-controller task can `resume_unwind` it and surface the
    /// failure to the host pipeline exactly as it would have if `next` had
    /// panicked on the direct-execute path (spec.md §7: "propagated
    /// unchanged").
    Failed(Box<dyn Any + Send>),
}

/// An opaque deferred invocation: the downstream handler future, the
/// one-shot completion signal, and the time it entered the queue.
pub(crate) struct WorkItem {
    pub(crate) handler: Pin<Box<dyn Future<Output = Response> + Send>>,
    pub(crate) completion: oneshot::Sender<Resolution>,
    pub(crate) enqueued_at: Instant,
}
