//! `tower::Layer`/`Service` adapter for callers that assemble their stack
//! with `tower::ServiceBuilder`/`Router::layer` directly instead of
//! `axum::middleware::from_fn_with_state` (see [`crate::middleware`] for
//! that entry point). Grounded on `rpglot-web/src/auth.rs`'s
//! `SsoLayer`/`SsoService` pair: a cloneable layer holding shared config
//! behind an `Arc`, producing a service that boxes its future.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::Response;

use crate::controller::AdmissionController;

#[derive(Clone)]
pub struct AdmissionLayer {
    controller: Arc<AdmissionController>,
}

impl AdmissionLayer {
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }
}

impl<S> tower::Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdmissionService {
            inner,
            controller: self.controller.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AdmissionService<S> {
    inner: S,
    controller: Arc<AdmissionController>,
}

impl<S> tower::Service<Request> for AdmissionService<S>
where
    S: tower::Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let controller = self.controller.clone();
        let mut inner = self.inner.clone();
        let path = req.uri().path().to_owned();

        Box::pin(async move {
            let downstream = Box::pin(async move {
                match inner.call(req).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }) as Pin<Box<dyn Future<Output = Response> + Send>>;

            Ok(controller.admit(&path, downstream).await)
        })
    }
}
