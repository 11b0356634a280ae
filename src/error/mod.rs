//! Relay error types.
use alloy::{
    primitives::{Bytes, ChainId},
    transports::{RpcError, TransportErrorKind},
};
use core::fmt;
use http::StatusCode;
use jsonrpsee::core::RpcResult;
use thiserror::Error;

mod auth;
pub use auth::AuthError;

mod signing;
pub use signing::SigningError;

mod validation;
pub use validation::ValidationError;

/// The overarching error type returned by the relay orchestrator.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The chain is not supported.
    ///
    /// There is no chain configuration registered for this chain id, so the request can not
    /// succeed until the caller changes it.
    #[error("chain not supported, no chain configuration found for chain id {0}")]
    UnsupportedChain(ChainId),
    /// The request or one of the meta transactions derived from it is malformed.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Errors related to 7702 authorizations.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The signing capability declined to sign the transaction.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// An error occurred during ABI encoding/decoding.
    #[error(transparent)]
    AbiError(#[from] alloy::sol_types::Error),
    /// An error occurred talking to RPC.
    #[error(transparent)]
    RpcError(#[from] RpcError<TransportErrorKind>),
    /// An internal error occurred.
    #[error(transparent)]
    InternalError(#[from] eyre::Error),
}

impl RelayError {
    /// Whether re-invoking the whole relay call may succeed.
    ///
    /// Only node and network failures qualify. Client errors need a different request, and
    /// signing failures are surfaced to the caller as is.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RpcError(_))
    }

    /// Whether the error was caused by the request rather than by the relay or the chain.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::UnsupportedChain(_) | Self::Validation(_) | Self::Auth(_))
    }

    /// The HTTP status the REST transport answers with for this error.
    pub const fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<RelayError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Validation(inner) => inner.into(),
            RelayError::Auth(inner) => inner.into(),
            RelayError::Signing(inner) => inner.into(),
            RelayError::UnsupportedChain(_) => invalid_params(err.to_string()),
            RelayError::AbiError(_) | RelayError::RpcError(_) | RelayError::InternalError(_) => {
                internal_rpc(err.to_string())
            }
        }
    }
}

/// A helper trait to provide an RPC error code.
pub trait ToRpcResult<Ok, Err>: Sized {
    /// Converts result to [`RpcResult`] by converting error variant to
    /// [`jsonrpsee_types::error::ErrorObject`]
    fn to_rpc_result(self) -> RpcResult<Ok>
    where
        Err: fmt::Display;
}

macro_rules! impl_error_helpers {
    ($err:ty) => {
        impl<Ok> ToRpcResult<Ok, $err> for Result<Ok, $err> {
            fn to_rpc_result(self) -> RpcResult<Ok> {
                self.map_err(|err| err.into())
            }
        }

        impl From<$err> for String {
            fn from(err: $err) -> Self {
                err.to_string()
            }
        }
    };
}

impl_error_helpers!(RelayError);
impl_error_helpers!(AuthError);
impl_error_helpers!(SigningError);
impl_error_helpers!(ValidationError);

/// Constructs an invalid params JSON‑RPC error.
fn invalid_params(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INVALID_PARAMS_CODE, msg, None)
}

/// Constructs an internal JSON‑RPC error.
fn internal_rpc(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INTERNAL_ERROR_CODE, msg, None)
}

/// Constructs a JSON‑RPC error with `code`, `message` and optional `data`.
fn rpc_err(
    code: i32,
    msg: impl Into<String>,
    data: Option<Bytes>,
) -> jsonrpsee::types::error::ErrorObject<'static> {
    jsonrpsee::types::error::ErrorObject::owned(code, msg.into(), data)
}
