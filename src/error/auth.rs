use super::invalid_params;
use alloy::primitives::{Address, ChainId, U256};
use thiserror::Error;

/// Errors related to 7702 authorizations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authorization item was signed for another chain.
    ///
    /// Items must either target the request's chain or be chain agnostic (chain id 0).
    #[error("invalid auth item chain id, expected {expected} or 0, got {got}")]
    ChainMismatch {
        /// The chain the request targets.
        expected: ChainId,
        /// The chain id in the authorization item.
        got: U256,
    },
    /// The provided EIP-7702 auth item has an invalid nonce.
    #[error("invalid auth item nonce, expected {expected}, got {got}")]
    InvalidNonce {
        /// The nonce expected.
        expected: u64,
        /// The nonce in the authorization item.
        got: u64,
    },
    /// The authorization delegates to another address than the derived Safe proxy.
    #[error("invalid auth item address, expected proxy {expected}, got {got}")]
    DelegateMismatch {
        /// The derived proxy address.
        expected: Address,
        /// The address in the authorization item.
        got: Address,
    },
    /// The account is already delegated to the authorized address.
    #[error("account {account} is already delegated to {delegate}")]
    AlreadyDelegated {
        /// The delegating account.
        account: Address,
        /// The current delegation target.
        delegate: Address,
    },
}

impl From<AuthError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: AuthError) -> Self {
        invalid_params(err.to_string())
    }
}
