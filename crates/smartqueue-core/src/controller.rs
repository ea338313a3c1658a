//! Per-request admission decision logic (spec.md §4.5).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;

use crate::dispatcher::Dispatcher;
use crate::error::{reject_response, timeout_response, Error};
use crate::options::{is_exempt_path, Options};
use crate::permit::PermitPool;
use crate::probes::{MemoryDetail, Probes, RealProbes};
use crate::queue::WaitQueue;
use crate::workitem::{Resolution, WorkItem};

pub(crate) const STATUS_HEADER: HeaderName = HeaderName::from_static("x-smartqueue-status");
const POSITION_HEADER: HeaderName = HeaderName::from_static("x-smartqueue-position");

/// Coordinates the probes, permit pool, wait queue, and dispatcher behind a
/// single `handle(request, next)` entry point (spec.md §2, §6).
///
/// Cheap to clone: internally everything is behind `Arc`, matching the
/// teacher's `SharedState` pattern (`rpglot-web/src/state.rs`) of handing
/// the same state to every request task.
pub struct AdmissionController {
    options: Options,
    probes: Arc<dyn Probes>,
    pool: Arc<PermitPool>,
    queue: Arc<WaitQueue<WorkItem>>,
    dispatcher: Dispatcher,
}

impl AdmissionController {
    /// Builds a controller with live `/proc`-backed probes.
    pub fn new(options: Options) -> Result<Arc<Self>, Error> {
        options.validate()?;
        let probes = Arc::new(RealProbes::start(options.proc_path.clone(), options.enable_logs));
        Self::with_probes(options, probes)
    }

    /// Builds a controller against injected probes — this is the seam
    /// spec.md §8's end-to-end scenarios need ("probes stubbable to exact
    /// values").
    pub fn with_probes(options: Options, probes: Arc<dyn Probes>) -> Result<Arc<Self>, Error> {
        options.validate()?;
        let pool = Arc::new(PermitPool::new(options.max_concurrent_requests));
        let queue = Arc::new(WaitQueue::new(options.max_queue_size));
        let dispatcher = Dispatcher::start(queue.clone(), pool.clone(), options.enable_logs);

        Ok(Arc::new(Self { options, probes, pool, queue, dispatcher }))
    }

    /// The `axum::middleware::from_fn_with_state` entry point (spec.md §6).
    /// Callers who build their stack with plain `tower::Layer`/`Service`
    /// instead should use [`crate::AdmissionLayer`], which drives the same
    /// [`AdmissionController::admit`] decision logic.
    pub async fn handle(&self, req: Request, next: Next) -> Response {
        let path = req.uri().path().to_owned();
        let downstream = Box::pin(next.run(req)) as Pin<Box<dyn Future<Output = Response> + Send>>;
        self.admit(&path, downstream).await
    }

    /// The decision protocol of spec.md §4.5, generalised over "however the
    /// caller invokes the rest of the pipeline" — an `axum::middleware::Next`
    /// (via [`Self::handle`]) or a wrapped `tower::Service::call` (via
    /// [`crate::AdmissionService`]) both reduce to a boxed downstream future.
    pub(crate) async fn admit(
        &self,
        path: &str,
        downstream: Pin<Box<dyn Future<Output = Response> + Send>>,
    ) -> Response {
        if is_exempt_path(path) {
            return downstream.await;
        }

        let cpu = self.probes.cpu_percent();
        let reason = if cpu >= self.options.cpu_threshold {
            Some("cpu")
        } else if self.options.use_memory_monitoring
            && self.probes.mem_percent() >= self.options.memory_threshold
        {
            Some("memory")
        } else {
            None
        };

        let Some(reason) = reason else {
            return self.run_direct(downstream).await;
        };

        self.run_queued(downstream, reason).await
    }

    async fn run_direct(&self, downstream: Pin<Box<dyn Future<Output = Response> + Send>>) -> Response {
        // `acquire` is cancel-safe: if the client disconnects while we're
        // waiting for a permit, this future is simply dropped and the
        // downstream handler is never invoked (spec.md §5).
        let Ok(permit) = self.pool.acquire().await else {
            return reject_response(&self.options);
        };
        let response = downstream.await;
        drop(permit);
        response
    }

    async fn run_queued(
        &self,
        downstream: Pin<Box<dyn Future<Output = Response> + Send>>,
        reason: &'static str,
    ) -> Response {
        let size = self.queue.current_size();
        if size >= self.options.max_queue_size {
            if self.options.enable_logs {
                tracing::warn!(reason, size, "admission: rejecting, queue full");
            }
            return reject_response(&self.options);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let item = WorkItem {
            handler: downstream,
            completion: tx,
            enqueued_at: Instant::now(),
        };

        let position = size + 1;
        if self.options.enable_logs {
            info!(reason, position, "admission: enqueuing request");
        }

        if self.queue.enqueue(item).await.is_err() {
            // Queue closed under us (shutdown race).
            return reject_response(&self.options);
        }

        tokio::select! {
            biased;
            resolution = rx => match resolution {
                Ok(Resolution::Done(mut response)) => {
                    response
                        .headers_mut()
                        .insert(STATUS_HEADER, HeaderValue::from_static("Queued"));
                    if let Ok(value) = HeaderValue::from_str(&position.to_string()) {
                        response.headers_mut().insert(POSITION_HEADER, value);
                    }
                    response
                }
                Ok(Resolution::Failed(panic)) => std::panic::resume_unwind(panic),
                Err(_) => timeout_response(),
            },
            _ = tokio::time::sleep(self.options.max_wait) => {
                if self.options.enable_logs {
                    tracing::warn!(reason, position, "admission: queue wait timed out");
                }
                timeout_response()
            }
        }
    }

    /// Current wait-queue depth (spec.md §6 diagnostic interface).
    pub fn queue_len(&self) -> usize {
        self.queue.current_size()
    }

    /// Requests currently executing downstream (direct + dispatched).
    pub fn in_flight(&self) -> usize {
        self.pool.in_flight()
    }

    pub fn cpu_percent(&self) -> u8 {
        self.probes.cpu_percent()
    }

    pub fn mem_detail(&self) -> MemoryDetail {
        self.probes.mem_detail()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Closes the queue, waits briefly for the dispatcher to drain, then
    /// returns (spec.md §5 "Shutdown"). Takes `self` by value via `Arc`
    /// so it can only be called once all other handles have been dropped.
    pub async fn shutdown(self: Arc<Self>) {
        self.queue.close().await;
        self.pool.close();
        match Arc::try_unwrap(self) {
            Ok(inner) => {
                let _ = tokio::time::timeout(
                    std::time::Duration::from_secs(5),
                    inner.dispatcher.shutdown(),
                )
                .await;
            }
            Err(_) => {
                // Other clones are still alive; the dispatcher will drain
                // and exit on its own once the queue is empty.
            }
        }
    }
}

/// Convenience entry point for `axum::middleware::from_fn_with_state`.
pub async fn middleware(
    State(controller): State<Arc<AdmissionController>>,
    req: Request,
    next: Next,
) -> Response {
    controller.handle(req, next).await
}
