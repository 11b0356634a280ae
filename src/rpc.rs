//! # Relay RPC
//!
//! Implementation of the `relay_` namespace.
//!
//! - `relay_sendAuthorization` relays an [EIP-7702][eip-7702] delegation to a Safe, deploying
//!   and initializing the Safe proxy where needed.
//! - `relay_supportedChains` lists the chains the relay serves.
//! - `relay_health` reports liveness.
//!
//! [eip-7702]: https://eips.ethereum.org/EIPS/eip-7702

use crate::{
    chains::ChainConnector,
    error::ToRpcResult,
    orchestrator::Orchestrator,
    types::{RelayRequest, RelayResponse},
};
use alloy::primitives::ChainId;
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};
use std::sync::Arc;

/// `relay_` RPC namespace.
#[rpc(server, client, namespace = "relay")]
pub trait RelayApi {
    /// Checks the health of the relay.
    #[method(name = "health", aliases = ["health"])]
    async fn health(&self) -> RpcResult<String>;

    /// Lists the chain ids the relay serves.
    #[method(name = "supportedChains")]
    async fn supported_chains(&self) -> RpcResult<Vec<ChainId>>;

    /// Relays a delegation, deploying and initializing the Safe proxy if required.
    ///
    /// Returns as soon as the transaction was submitted.
    #[method(name = "sendAuthorization")]
    async fn send_authorization(&self, request: RelayRequest) -> RpcResult<RelayResponse>;
}

/// Implementation of the `relay_` namespace.
#[derive(Debug)]
pub struct Relay<C> {
    inner: Arc<Orchestrator<C>>,
}

impl<C> Clone for Relay<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C: ChainConnector> Relay<C> {
    /// Create a new relay module.
    pub fn new(orchestrator: Arc<Orchestrator<C>>) -> Self {
        Self { inner: orchestrator }
    }
}

#[async_trait]
impl<C> RelayApiServer for Relay<C>
where
    C: ChainConnector + 'static,
{
    async fn health(&self) -> RpcResult<String> {
        Ok("rpc ok".into())
    }

    async fn supported_chains(&self) -> RpcResult<Vec<ChainId>> {
        Ok(self.inner.registry().chain_ids())
    }

    async fn send_authorization(&self, request: RelayRequest) -> RpcResult<RelayResponse> {
        self.inner.relay(request).await.map(Into::into).to_rpc_result()
    }
}
