//! Background task draining the wait queue (spec.md §4.6).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::permit::PermitPool;
use crate::queue::WaitQueue;
use crate::workitem::{Resolution, WorkItem};

/// The single long-lived task that pulls [`WorkItem`]s off the queue and
/// launches each one under a permit, on its own fresh task so a slow
/// handler can never stall the dequeue loop (spec.md §4.6, §9).
pub(crate) struct Dispatcher {
    handle: JoinHandle<()>,
}

impl Dispatcher {
    pub(crate) fn start(
        queue: Arc<WaitQueue<WorkItem>>,
        pool: Arc<PermitPool>,
        enable_logs: bool,
    ) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                match queue.dequeue().await {
                    None => break,
                    Some(item) => {
                        let pool = pool.clone();
                        tokio::spawn(run_item(item, pool, enable_logs));
                    }
                }
            }
        });

        Self { handle }
    }

    /// Joins the dispatcher loop (it exits once [`WaitQueue::close`] has
    /// drained the queue).
    pub(crate) async fn shutdown(self) {
        let _ = self.handle.await;
    }
}

/// Runs one queued request to completion. The dispatcher MUST tolerate a
/// `completion` receiver that's already been dropped by a timed-out
/// controller (spec.md §4.6): the work still executes under a permit to
/// preserve concurrency accounting, and the dropped `send` is simply
/// ignored.
async fn run_item(item: WorkItem, pool: Arc<PermitPool>, enable_logs: bool) {
    let WorkItem { handler, completion, enqueued_at } = item;
    let wait_time = enqueued_at.elapsed();

    let permit = match pool.acquire().await {
        Ok(p) => p,
        Err(_) => {
            // Pool closed mid-shutdown: unblock the waiting controller (if
            // still listening) rather than hanging it forever.
            let _ = completion.send(Resolution::Failed(Box::new("permit pool closed")));
            return;
        }
    };

    if enable_logs {
        debug!(wait_ms = wait_time.as_millis() as u64, "dispatching queued request");
    }

    let outcome = AssertUnwindSafe(handler).catch_unwind().await;
    drop(permit);

    match outcome {
        Ok(response) => {
            let _ = completion.send(Resolution::Done(response));
        }
        Err(panic) => {
            if enable_logs {
                warn!("queued handler panicked");
            }
            let _ = completion.send(Resolution::Failed(panic));
        }
    }
}
