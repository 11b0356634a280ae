use super::internal_rpc;
use thiserror::Error;

/// Errors raised by the signing capability.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The wallet declined to sign the transaction request, e.g. because it was incomplete.
    #[error("signer declined transaction: {0}")]
    Rejected(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<SigningError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: SigningError) -> Self {
        internal_rpc(err.to_string())
    }
}
