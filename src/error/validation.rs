use super::invalid_params;
use alloy::primitives::U256;
use thiserror::Error;

/// Errors raised while validating relay requests and meta transactions.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The request body could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Neither the request nor its first authorization item names a chain.
    #[error("missing chain id, provide `chainId` or at least one authorization item")]
    MissingChainId,
    /// The chain id does not fit into 64 bits.
    #[error("invalid chain id {0}")]
    InvalidChainId(U256),
    /// An operation byte other than call (0) or delegate call (1).
    #[error("invalid multisend operation {0}")]
    InvalidOperation(u8),
    /// A delegate call was handed to the call-only multisend.
    #[error("delegate call not allowed in call-only multisend (transaction {index})")]
    DelegateCallNotAllowed {
        /// Position of the offending meta transaction.
        index: usize,
    },
    /// A packed multisend payload ended in the middle of a transaction.
    #[error("truncated multisend payload at byte offset {offset}")]
    TruncatedMultiSend {
        /// Offset of the transaction that could not be read.
        offset: usize,
    },
}

impl From<ValidationError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: ValidationError) -> Self {
        invalid_params(err.to_string())
    }
}
