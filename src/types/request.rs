//! Relay request and response types.

use crate::error::ValidationError;
use alloy::{
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, Bytes, ChainId, TxHash, U256},
};
use serde::{Deserialize, Serialize};

/// A signed EIP-7702 authorization as sent by wallets.
///
/// Quantities are accepted as JSON numbers or hex strings. The delegate address is read from
/// `contractAddress`, or from `address` as newer wallet libraries name it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationItem {
    /// The chain the authorization is valid on, 0 for any chain.
    #[serde(with = "crate::serde::quantity")]
    pub chain_id: U256,
    /// The address the account delegates to.
    #[serde(alias = "address")]
    pub contract_address: Address,
    /// The account nonce the authorization is bound to.
    #[serde(with = "crate::serde::quantity")]
    pub nonce: u64,
    /// Signature parity.
    #[serde(with = "crate::serde::quantity")]
    pub y_parity: u8,
    /// Signature `r` value.
    #[serde(with = "crate::serde::quantity")]
    pub r: U256,
    /// Signature `s` value.
    #[serde(with = "crate::serde::quantity")]
    pub s: U256,
}

impl AuthorizationItem {
    /// Converts the item into an alloy [`SignedAuthorization`].
    ///
    /// The signature is not recovered here; invalid signatures are skipped by the chain.
    pub fn to_signed(&self) -> SignedAuthorization {
        SignedAuthorization::new_unchecked(
            Authorization {
                chain_id: self.chain_id,
                address: self.contract_address,
                nonce: self.nonce,
            },
            self.y_parity,
            self.r,
            self.s,
        )
    }
}

impl From<SignedAuthorization> for AuthorizationItem {
    fn from(auth: SignedAuthorization) -> Self {
        Self {
            chain_id: auth.chain_id,
            contract_address: auth.address,
            nonce: auth.nonce,
            y_parity: auth.y_parity(),
            r: auth.r(),
            s: auth.s(),
        }
    }
}

/// A request to relay an EIP-7702 delegation, optionally initializing the account as a Safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// The delegating account.
    pub from: Address,
    /// Safe setup calldata used both as proxy initializer and to initialize the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_data: Option<Bytes>,
    /// The authorizations to include in the relayed transaction.
    #[serde(default)]
    pub authorization_list: Vec<AuthorizationItem>,
    /// The target chain.
    ///
    /// Defaults to the chain id of the first authorization item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<ChainId>,
    /// Overrides the chain's configured proxy salt nonce.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt_nonce: Option<U256>,
}

impl RelayRequest {
    /// Creates a request for `from` carrying `authorization_list`.
    pub fn new(from: Address, authorization_list: Vec<AuthorizationItem>) -> Self {
        Self { from, init_data: None, authorization_list, chain_id: None, salt_nonce: None }
    }

    /// Sets the initializer data.
    pub fn with_init_data(mut self, init_data: Bytes) -> Self {
        self.init_data = Some(init_data);
        self
    }

    /// Sets the target chain explicitly.
    pub fn with_chain_id(mut self, chain_id: ChainId) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    /// Sets the proxy salt nonce.
    pub fn with_salt_nonce(mut self, salt_nonce: U256) -> Self {
        self.salt_nonce = Some(salt_nonce);
        self
    }

    /// The chain this request targets.
    ///
    /// This is the explicit `chainId`, or the chain id of the first authorization item.
    pub fn chain_id(&self) -> Result<ChainId, ValidationError> {
        if let Some(chain_id) = self.chain_id {
            return Ok(chain_id);
        }
        let auth = self.authorization_list.first().ok_or(ValidationError::MissingChainId)?;
        ChainId::try_from(auth.chain_id).map_err(|_| ValidationError::InvalidChainId(auth.chain_id))
    }

    /// The address the first authorization item delegates to, if any.
    pub fn delegate(&self) -> Option<Address> {
        self.authorization_list.first().map(|auth| auth.contract_address)
    }

    /// The authorization list as alloy [`SignedAuthorization`]s.
    pub fn signed_authorizations(&self) -> Vec<SignedAuthorization> {
        self.authorization_list.iter().map(AuthorizationItem::to_signed).collect()
    }
}

/// Response to a relay request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// Hash of the submitted transaction.
    ///
    /// `None` if there was nothing left to submit.
    pub tx_hash: Option<TxHash>,
}

/// Error body of the REST transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human readable error message.
    pub error: String,
}

/// Informational response listing the chains the relay serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayInfo {
    /// Service description.
    pub description: String,
    /// Supported chain ids.
    pub supported_chains: Vec<ChainId>,
}
