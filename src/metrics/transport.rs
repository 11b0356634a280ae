use alloy::{
    primitives::ChainId,
    rpc::json_rpc::{RequestPacket, ResponsePacket},
    transports::{TransportError, TransportFut},
};
use futures_util::FutureExt;
use tower::{Layer, Service};
use tracing::{Instrument, Level, field, span};

/// A layer that wraps chain RPC requests in spans tagged with the chain id and method.
///
/// See: <https://opentelemetry.io/docs/specs/semconv/rpc/json-rpc/>
#[derive(Debug, Clone)]
pub struct TraceLayer {
    chain_id: ChainId,
}

impl TraceLayer {
    /// Creates a new `TraceLayer` with the given `chain_id`.
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id }
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceTransport<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceTransport { inner, chain_id: self.chain_id }
    }
}

/// A trace-instrumented transport.
#[derive(Debug, Clone)]
pub struct TraceTransport<S> {
    inner: S,
    chain_id: ChainId,
}

impl<S> Service<RequestPacket> for TraceTransport<S>
where
    S: Service<RequestPacket, Future = TransportFut<'static>, Error = TransportError>
        + Send
        + 'static
        + Clone,
{
    type Response = ResponsePacket;
    type Error = TransportError;
    type Future = TransportFut<'static>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: RequestPacket) -> Self::Future {
        let span = span!(
            Level::DEBUG,
            "chain_rpc",
            rpc.method = field::Empty,
            rpc.jsonrpc.request_id = field::Empty,
            eth.chain_id = self.chain_id,
        );

        // batches are only tagged with the chain id
        if let RequestPacket::Single(ref req) = request {
            span.record("rpc.method", req.method());
            span.record("rpc.jsonrpc.request_id", req.id().to_string());
        }

        self.inner.call(request).instrument(span).boxed()
    }
}
