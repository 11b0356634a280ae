//! Chain registry and RPC clients.

use crate::{
    broadcast::{Broadcaster, WalletBroadcaster},
    config::ChainConfig,
    error::RelayError,
    inspector::{RpcInspector, StateInspector},
    metrics::TraceLayer,
    signers::DynSigner,
};
use alloy::{
    primitives::{Address, ChainId, map::HashMap},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::ClientBuilder,
    transports::layers::RetryBackoffLayer,
};
use alloy_chains::Chain;
use std::sync::Arc;
use tracing::debug;

/// [`RetryBackoffLayer`] used for chain providers.
///
/// We are allowing max 10 retries with a backoff of 800ms. The CU/s is set to max value to avoid
/// any throttling.
const RETRY_LAYER: RetryBackoffLayer = RetryBackoffLayer::new(10, 800, u64::MAX);

/// Read-only lookup of chain configurations by chain id.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Arc<HashMap<ChainId, ChainConfig>>,
}

impl ChainRegistry {
    /// Creates a registry from the configured chains.
    pub fn new(chains: impl IntoIterator<Item = (Chain, ChainConfig)>) -> Self {
        Self { chains: Arc::new(chains.into_iter().map(|(chain, cfg)| (chain.id(), cfg)).collect()) }
    }

    /// The configuration of `chain_id`.
    pub fn get(&self, chain_id: ChainId) -> Result<&ChainConfig, RelayError> {
        self.chains.get(&chain_id).ok_or(RelayError::UnsupportedChain(chain_id))
    }

    /// The configured chain ids in ascending order.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids = self.chains.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    /// Iterates over the configured chains.
    pub fn iter(&self) -> impl Iterator<Item = (ChainId, &ChainConfig)> {
        self.chains.iter().map(|(id, cfg)| (*id, cfg))
    }
}

/// Provides the chain clients of the configured chains.
pub trait ChainConnector: Send + Sync {
    /// State inspector of a chain.
    type Inspector: StateInspector;
    /// Transaction broadcaster of a chain.
    type Broadcaster: Broadcaster;

    /// The state inspector of `chain_id`.
    fn inspector(
        &self,
        chain_id: ChainId,
        config: &ChainConfig,
    ) -> Result<Self::Inspector, RelayError>;

    /// The broadcaster of `chain_id`.
    fn broadcaster(
        &self,
        chain_id: ChainId,
        config: &ChainConfig,
    ) -> Result<Self::Broadcaster, RelayError>;
}

/// [`ChainConnector`] backed by one wallet-enabled provider per chain.
///
/// Providers are shared between requests, so the wallet's nonce manager sequences all
/// transactions of the relayer key.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    providers: Arc<HashMap<ChainId, DynProvider>>,
    signer: Address,
}

impl RpcConnector {
    /// Connects to every chain in `registry`, signing with `signer`.
    pub async fn connect(registry: &ChainRegistry, signer: &DynSigner) -> eyre::Result<Self> {
        let providers = futures_util::future::try_join_all(registry.iter().map(
            |(chain_id, config)| async move {
                debug!(chain_id, endpoint = %config.endpoint, "Connecting to chain");
                let client = ClientBuilder::default()
                    .layer(TraceLayer::new(chain_id))
                    .layer(RETRY_LAYER.clone())
                    .connect(config.endpoint.as_str())
                    .await?;
                let provider =
                    ProviderBuilder::new().wallet(signer.wallet()).connect_client(client).erased();
                eyre::Ok((chain_id, provider))
            },
        ))
        .await?;

        Ok(Self { providers: Arc::new(providers.into_iter().collect()), signer: signer.address() })
    }

    fn provider(&self, chain_id: ChainId) -> Result<&DynProvider, RelayError> {
        self.providers.get(&chain_id).ok_or(RelayError::UnsupportedChain(chain_id))
    }
}

impl ChainConnector for RpcConnector {
    type Inspector = RpcInspector<DynProvider>;
    type Broadcaster = WalletBroadcaster<DynProvider>;

    fn inspector(&self, chain_id: ChainId, _: &ChainConfig) -> Result<Self::Inspector, RelayError> {
        Ok(RpcInspector::new(self.provider(chain_id)?.clone()))
    }

    fn broadcaster(
        &self,
        chain_id: ChainId,
        _: &ChainConfig,
    ) -> Result<Self::Broadcaster, RelayError> {
        Ok(WalletBroadcaster::new(self.provider(chain_id)?.clone(), self.signer))
    }
}
