//! Relay metrics: per-method RPC metrics, relay outcomes and the Prometheus exporter.

mod transport;
pub use transport::{TraceLayer, TraceTransport};

use crate::orchestrator::RelayStage;
use futures_util::future::BoxFuture;
use jsonrpsee::{
    MethodResponse,
    server::middleware::rpc::RpcServiceT,
    types::{
        Request,
        error::{INVALID_PARAMS_CODE, METHOD_NOT_FOUND_CODE},
    },
};
use metrics::{Counter, Histogram, counter, histogram};
use metrics_derive::Metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{
    net::SocketAddr,
    sync::Mutex,
    time::{Duration, Instant},
};

/// A [`jsonrpsee`] RPC middleware that records call counts and latency per `relay_` method.
///
/// Calls are labelled `ok`, `rejected` (invalid params, i.e. client errors) or `failed`.
#[derive(Debug, Clone)]
pub struct RpcMetricsService<S> {
    service: S,
}

impl<S> RpcMetricsService<S> {
    /// Create a new RPC middleware that records metrics for RPC methods.
    pub fn new(inner: S) -> Self {
        Self { service: inner }
    }
}

impl<'a, S> RpcServiceT<'a> for RpcMetricsService<S>
where
    S: RpcServiceT<'a> + Send + Sync + Clone + 'static,
{
    type Future = BoxFuture<'a, MethodResponse>;

    fn call(&self, req: Request<'a>) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let method = req.method_name().to_string();

            let timer = Instant::now();
            let rp = service.call(req).await;
            let elapsed = timer.elapsed();

            // only record metrics for methods that exist
            let code = rp.as_error_code();
            if code != Some(METHOD_NOT_FOUND_CODE) {
                counter!(
                    "rpc.call.count",
                    "method" => method.clone(),
                    "outcome" => call_outcome(code)
                )
                .increment(1);

                histogram!(
                    "rpc.call.latency",
                    "method" => method
                )
                .record(elapsed.as_millis() as f64);
            }

            rp
        })
    }
}

/// Classifies a JSON-RPC response by its error code.
fn call_outcome(code: Option<i32>) -> &'static str {
    match code {
        None => "ok",
        Some(INVALID_PARAMS_CODE) => "rejected",
        Some(_) => "failed",
    }
}

/// Outcome metrics of relay requests.
#[derive(Metrics, Clone)]
#[metrics(scope = "relay")]
pub struct RelayMetrics {
    /// Relays submitted to the chain.
    submitted: Counter,
    /// Relays with nothing left to submit.
    skipped: Counter,
    /// Calls executed through the multisend.
    planned_calls: Counter,
    /// Time taken to plan and submit a relay.
    duration: Histogram,
}

impl RelayMetrics {
    /// Records a submitted relay with `calls` multisend calls.
    pub fn record_submitted(&self, calls: usize, elapsed: Duration) {
        self.submitted.increment(1);
        self.planned_calls.increment(calls as u64);
        self.duration.record(elapsed.as_millis() as f64);
    }

    /// Records a relay that had nothing to submit.
    pub fn record_skipped(&self) {
        self.skipped.increment(1);
    }

    /// Records a relay that failed during `stage`.
    pub fn record_failed(&self, stage: RelayStage, retryable: bool) {
        counter!(
            "relay.failed",
            "stage" => stage.as_str(),
            "retryable" => retryable.to_string()
        )
        .increment(1);
    }
}

/// Installs the global Prometheus recorder and serves `/metrics` on `metrics_addr`.
///
/// Repeated calls return the handle of the first installed recorder. The recorder performs
/// upkeep every 5 seconds.
///
/// # Panics
///
/// This will panic if the Prometheus recorder could not be set as the global metrics recorder.
pub async fn setup_exporter(metrics_addr: impl Into<SocketAddr>) -> PrometheusHandle {
    static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

    let mut lock = HANDLE.lock().unwrap();
    if let Some(handle) = &*lock {
        return handle.clone();
    }

    let addr: SocketAddr = metrics_addr.into();
    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(addr)
        .upkeep_timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build metrics recorder");

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder).expect("could not set metrics recorder");
    tokio::spawn(exporter);

    tracing::info!(%addr, "Serving Prometheus metrics");

    *lock = Some(handle.clone());

    handle
}
