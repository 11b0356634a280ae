//! REST transport.
//!
//! Serves the relay on `/` next to the JSON-RPC server:
//!
//! - `POST /` with a [`RelayRequest`] body answers `201 {"txHash": ..}` once submitted,
//!   `200 {"txHash": null}` if there was nothing to submit, `400 {"error": ..}` for bad requests
//!   and `500 {"error": ..}` for chain or signing failures.
//! - `GET /` lists the supported chains.
//!
//! JSON-RPC requests posted to `/` are passed through to the RPC server, as are requests to any
//! other path. Bodies above the configured size limit are answered with `413`.

use crate::{
    chains::ChainConnector,
    constants::{DEFAULT_MAX_REQUEST_BODY_SIZE, SERVICE_DESCRIPTION},
    error::{RelayError, ValidationError},
    orchestrator::Orchestrator,
    types::{ErrorResponse, RelayInfo, RelayRequest, RelayResponse},
};
use alloy::primitives::bytes::Bytes;
use futures_util::{FutureExt, TryFutureExt};
use http::{HeaderValue, Method, StatusCode, header};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use jsonrpsee::server::{HttpBody, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::{future::Future, pin::Pin, sync::Arc};
use tower::{Layer, Service};
use tower_http::BoxError;
use tracing::debug;

/// Layer adding the REST routes in front of the RPC server.
#[derive(Debug)]
pub struct RestLayer<C> {
    orchestrator: Arc<Orchestrator<C>>,
    max_body_size: usize,
}

impl<C> RestLayer<C> {
    /// Creates a layer serving `orchestrator`.
    pub fn new(orchestrator: Arc<Orchestrator<C>>) -> Self {
        Self { orchestrator, max_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE as usize }
    }

    /// Caps the size of buffered request bodies, answering `413` above it.
    ///
    /// Should match the RPC server's `max_request_body_size`.
    pub fn with_max_body_size(mut self, max_body_size: u32) -> Self {
        self.max_body_size = max_body_size as usize;
        self
    }
}

impl<C> Clone for RestLayer<C> {
    fn clone(&self) -> Self {
        Self { orchestrator: self.orchestrator.clone(), max_body_size: self.max_body_size }
    }
}

impl<S, C> Layer<S> for RestLayer<C> {
    type Service = RestService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        RestService {
            inner,
            orchestrator: self.orchestrator.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

/// A Tower service answering the REST routes and forwarding everything else.
#[must_use]
#[derive(Debug)]
pub struct RestService<S, C> {
    inner: S,
    orchestrator: Arc<Orchestrator<C>>,
    max_body_size: usize,
}

impl<S: Clone, C> Clone for RestService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            orchestrator: self.orchestrator.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

impl<S, B, C> Service<HttpRequest<B>> for RestService<S, C>
where
    S: Service<HttpRequest, Response = HttpResponse> + Clone + Send + 'static,
    S::Error: Into<BoxError> + 'static,
    S::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
    C: ChainConnector + 'static,
{
    type Response = HttpResponse;
    type Error = BoxError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    #[inline]
    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: HttpRequest<B>) -> Self::Future {
        if req.uri().path() != "/" {
            return self.inner.call(req.map(HttpBody::new)).map_err(Into::into).boxed();
        }

        match *req.method() {
            Method::GET => {
                let info = RelayInfo {
                    description: SERVICE_DESCRIPTION.to_string(),
                    supported_chains: self.orchestrator.registry().chain_ids(),
                };
                futures_util::future::ready(Ok(json_response(StatusCode::OK, &info))).boxed()
            }
            Method::POST => {
                // the ready inner service is taken, leaving a fresh clone in its place
                let clone = self.inner.clone();
                let inner = std::mem::replace(&mut self.inner, clone);
                let orchestrator = self.orchestrator.clone();
                let max_body_size = self.max_body_size;
                async move {
                    let (parts, body) = req.into_parts();
                    let body = match Limited::new(body, max_body_size).collect().await {
                        Ok(body) => body.to_bytes(),
                        Err(err) if err.is::<LengthLimitError>() => {
                            debug!(max_body_size, "Rejected oversized request body");
                            return Ok(json_response(
                                StatusCode::PAYLOAD_TOO_LARGE,
                                &ErrorResponse {
                                    error: format!("request body exceeds {max_body_size} bytes"),
                                },
                            ));
                        }
                        Err(err) => {
                            let err = ValidationError::InvalidRequest(err.to_string());
                            return Ok(error_response(&err.into()));
                        }
                    };

                    let value = match serde_json::from_slice::<serde_json::Value>(&body) {
                        Ok(value) => value,
                        Err(err) => return Ok(invalid_request(err)),
                    };
                    if is_json_rpc(&value) {
                        let req = HttpRequest::from_parts(parts, HttpBody::new(Full::new(body)));
                        return forward(inner, req).await;
                    }

                    Ok(relay(&orchestrator, value).await)
                }
                .boxed()
            }
            _ => self.inner.call(req.map(HttpBody::new)).map_err(Into::into).boxed(),
        }
    }
}

async fn forward<S>(mut inner: S, req: HttpRequest) -> Result<HttpResponse, BoxError>
where
    S: Service<HttpRequest, Response = HttpResponse>,
    S::Error: Into<BoxError>,
{
    inner.call(req).await.map_err(Into::into)
}

/// Handles a REST relay request body.
async fn relay<C: ChainConnector>(
    orchestrator: &Orchestrator<C>,
    body: serde_json::Value,
) -> HttpResponse {
    let request = match RelayRequest::deserialize(body) {
        Ok(request) => request,
        Err(err) => return invalid_request(err),
    };

    match orchestrator.relay(request).await {
        Ok(outcome) => {
            let status =
                if outcome.tx_hash.is_some() { StatusCode::CREATED } else { StatusCode::OK };
            json_response(status, &RelayResponse::from(outcome))
        }
        Err(err) => error_response(&err),
    }
}

/// Whether `body` is a JSON-RPC request or batch rather than a relay request.
fn is_json_rpc(body: &serde_json::Value) -> bool {
    match body {
        serde_json::Value::Array(_) => true,
        serde_json::Value::Object(map) => map.contains_key("jsonrpc"),
        _ => false,
    }
}

fn invalid_request(err: serde_json::Error) -> HttpResponse {
    debug!(%err, "Rejected malformed relay request");
    error_response(&ValidationError::InvalidRequest(err.to_string()).into())
}

fn error_response(err: &RelayError) -> HttpResponse {
    json_response(err.status_code(), &ErrorResponse { error: err.to_string() })
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    let (status, body) = match serde_json::to_string(body) {
        Ok(body) => (status, body),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!(r#"{{"error":"{err}"}}"#)),
    };

    let mut response = HttpResponse::new(HttpBody::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
