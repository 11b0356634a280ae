//! Read-only chain state queries used to plan a relay.

use crate::{error::RelayError, types::ISafeProxyFactory};
use alloy::{
    eips::eip7702::constants::{EIP7702_CLEARED_DELEGATION, EIP7702_DELEGATION_DESIGNATOR},
    primitives::{Address, B256, Bytes, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use async_trait::async_trait;
use tracing::{instrument, trace};

/// Queries the chain state a relay decision depends on.
///
/// Results are never cached, every call reflects the latest block. Transport failures surface
/// as [`RelayError::RpcError`] and are never reported as missing code or an empty slot.
#[async_trait]
pub trait StateInspector: Send + Sync {
    /// Whether `address` has non-empty code.
    async fn has_code(&self, address: Address) -> Result<bool, RelayError> {
        Ok(!self.code_at(address).await?.is_empty())
    }

    /// The code deployed at `address`.
    async fn code_at(&self, address: Address) -> Result<Bytes, RelayError>;

    /// The raw 32-byte value of storage `slot` of `address`.
    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256, RelayError>;

    /// The transaction count (nonce) of `address`.
    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError>;

    /// The creation code of the proxies deployed by `factory`.
    async fn proxy_creation_code(&self, factory: Address) -> Result<Bytes, RelayError>;
}

/// [`StateInspector`] backed by an alloy [`Provider`].
#[derive(Debug, Clone)]
pub struct RpcInspector<P> {
    provider: P,
}

impl<P> RpcInspector<P> {
    /// Creates an inspector querying through `provider`.
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P> StateInspector for RpcInspector<P>
where
    P: Provider + Send + Sync,
{
    #[instrument(skip(self))]
    async fn code_at(&self, address: Address) -> Result<Bytes, RelayError> {
        let code = self.provider.get_code_at(address).await?;
        trace!(len = code.len(), "Fetched code");
        Ok(code)
    }

    #[instrument(skip(self))]
    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256, RelayError> {
        Ok(self.provider.get_storage_at(address, slot).await?.into())
    }

    #[instrument(skip(self))]
    async fn transaction_count(&self, address: Address) -> Result<u64, RelayError> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    #[instrument(skip(self))]
    async fn proxy_creation_code(&self, factory: Address) -> Result<Bytes, RelayError> {
        let output = self
            .provider
            .call(
                TransactionRequest::default()
                    .to(factory)
                    .input(ISafeProxyFactory::proxyCreationCodeCall {}.abi_encode().into()),
            )
            .await?;
        Ok(ISafeProxyFactory::proxyCreationCodeCall::abi_decode_returns(&output)?)
    }
}

/// The address an EIP-7702 delegation designator in `code` points to.
///
/// Returns `None` for regular contract code, empty code and cleared delegations.
pub fn delegation_target(code: &[u8]) -> Option<Address> {
    if code.len() != EIP7702_DELEGATION_DESIGNATOR.len() + 20
        || !code.starts_with(&EIP7702_DELEGATION_DESIGNATOR)
        || code == EIP7702_CLEARED_DELEGATION
    {
        return None;
    }
    Some(Address::from_slice(&code[EIP7702_DELEGATION_DESIGNATOR.len()..]))
}
