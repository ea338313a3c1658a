//! Demo server wiring the admission-control middleware in front of a
//! deliberately slow downstream handler, so the queueing/rejection/timeout
//! behaviour can be exercised by hand.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use smartqueue_core::{AdmissionController, Options};
use tracing::info;

#[derive(Parser)]
#[command(name = "smartqueue-demo", about = "SmartQueue admission-control demo server")]
struct Args {
    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:8080", env = "SMARTQUEUE_LISTEN")]
    listen: String,

    /// CPU percent at/above which new requests start queueing.
    #[arg(long, default_value_t = 80, env = "SMARTQUEUE_CPU_THRESHOLD")]
    cpu_threshold: u8,

    /// Memory percent at/above which new requests start queueing.
    #[arg(long, default_value_t = 90, env = "SMARTQUEUE_MEMORY_THRESHOLD")]
    memory_threshold: u8,

    /// Disable memory-pressure admission checks.
    #[arg(long, env = "SMARTQUEUE_NO_MEMORY")]
    disable_memory: bool,

    /// Maximum number of requests waiting in the queue.
    #[arg(long, default_value_t = 100, env = "SMARTQUEUE_MAX_QUEUE")]
    max_queue_size: usize,

    /// Maximum number of requests executing downstream concurrently.
    #[arg(long, default_value_t = 100, env = "SMARTQUEUE_MAX_CONCURRENT")]
    max_concurrent_requests: usize,

    /// Seconds a queued request will wait before being timed out.
    #[arg(long, default_value_t = 30, env = "SMARTQUEUE_MAX_WAIT_SECS")]
    max_wait_secs: u64,

    /// Artificial downstream latency in milliseconds, to make queueing
    /// visible without real CPU/memory pressure.
    #[arg(long, default_value_t = 0, env = "SMARTQUEUE_DEMO_LATENCY_MS")]
    demo_latency_ms: u64,

    /// Run as a load-generating client against a running instance instead
    /// of serving requests.
    #[arg(long)]
    stress: bool,

    /// Target URL for `--stress` (defaults to `http://<listen>/work`).
    #[arg(long)]
    stress_target: Option<String>,

    /// Total requests to send in `--stress` mode.
    #[arg(long, default_value_t = 200)]
    stress_requests: usize,

    /// Number of concurrent workers in `--stress` mode.
    #[arg(long, default_value_t = 20)]
    stress_concurrency: usize,
}

#[derive(Clone)]
struct DemoState {
    latency: Duration,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smartqueue_demo=info,smartqueue_core=info".parse().unwrap()),
        )
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args));
}

async fn async_main(args: Args) {
    if args.stress {
        return run_stress(args).await;
    }

    let options = Options::default()
        .with_cpu_threshold(args.cpu_threshold)
        .with_memory_threshold(args.memory_threshold)
        .with_use_memory_monitoring(!args.disable_memory)
        .with_max_queue_size(args.max_queue_size)
        .with_max_concurrent_requests(args.max_concurrent_requests)
        .with_max_wait(Duration::from_secs(args.max_wait_secs));

    let controller = AdmissionController::new(options).unwrap_or_else(|e| {
        eprintln!("invalid configuration: {e}");
        std::process::exit(1);
    });

    let demo_state = DemoState {
        latency: Duration::from_millis(args.demo_latency_ms),
    };

    let app = Router::new()
        .route("/work", get(handle_work))
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .with_state((demo_state, controller.clone()))
        .layer(axum::middleware::from_fn_with_state(
            controller.clone(),
            smartqueue_core::middleware,
        ));

    let addr: SocketAddr = args.listen.parse().expect("invalid listen address");
    info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    let shutdown_controller = controller.clone();
    let server = axum::serve(listener, app.into_make_service());
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    shutdown_controller.shutdown().await;
}

/// Fires `--stress-requests` GETs at `--stress-target` across
/// `--stress-concurrency` workers and reports a status-code breakdown —
/// enough to see admission working (a mix of 200s, 503s, and queued 200s)
/// without needing a separate load-testing tool.
async fn run_stress(args: Args) {
    let target = args.stress_target.clone().unwrap_or_else(|| {
        let addr = args.listen.replace("0.0.0.0", "127.0.0.1");
        format!("http://{addr}/work")
    });

    info!(target, requests = args.stress_requests, concurrency = args.stress_concurrency, "starting stress run");

    let client = reqwest::Client::new();
    let ok = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let rejected = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let other = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let failed = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let semaphore = Arc::new(tokio::sync::Semaphore::new(args.stress_concurrency));
    let mut handles = Vec::with_capacity(args.stress_requests);
    for _ in 0..args.stress_requests {
        let client = client.clone();
        let target = target.clone();
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore closed");
        let (ok, rejected, other, failed) =
            (ok.clone(), rejected.clone(), other.clone(), failed.clone());
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            match client.get(&target).send().await {
                Ok(resp) if resp.status().is_success() => {
                    ok.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
                Ok(resp) if resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE => {
                    rejected.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
                Ok(_) => {
                    other.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
                Err(_) => {
                    failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                }
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    info!(
        ok = ok.load(std::sync::atomic::Ordering::Relaxed),
        rejected_or_timed_out = rejected.load(std::sync::atomic::Ordering::Relaxed),
        other = other.load(std::sync::atomic::Ordering::Relaxed),
        connection_failed = failed.load(std::sync::atomic::Ordering::Relaxed),
        "stress run complete"
    );
}

async fn handle_work(State((state, _controller)): State<(DemoState, Arc<AdmissionController>)>) -> &'static str {
    if !state.latency.is_zero() {
        tokio::time::sleep(state.latency).await;
    }
    "ok"
}

async fn handle_health() -> &'static str {
    "ok"
}

async fn handle_status(
    State((_state, controller)): State<(DemoState, Arc<AdmissionController>)>,
) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "queue_len": controller.queue_len(),
        "in_flight": controller.in_flight(),
        "cpu_percent": controller.cpu_percent(),
        "mem_detail": format!("{:?}", controller.mem_detail()),
    }))
}
