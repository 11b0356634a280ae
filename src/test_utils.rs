//! Test doubles for the chain facing traits.

use crate::{
    broadcast::Broadcaster,
    chains::{ChainConnector, ChainRegistry},
    config::{ChainAddresses, ChainConfig, RelayPolicy},
    constants::INITIALIZER_SLOT,
    error::RelayError,
    inspector::StateInspector,
    orchestrator::Orchestrator,
    proxy::ProxyDeployment,
    types::{AuthorizationItem, RelayRequest},
};
use alloy::{
    primitives::{Address, B256, Bytes, ChainId, TxHash, U256, address, b256, bytes},
    rpc::types::TransactionRequest,
    transports::TransportErrorKind,
};
use alloy_chains::Chain;
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

pub(crate) const CHAIN_ID: ChainId = 11155111;
pub(crate) const ACCOUNT: Address = address!("0xcfaa26ad40bfc7e3b1642e1888620fc402b95dab");
pub(crate) const INIT_DATA: Bytes = bytes!("0xb63e800d0000");
pub(crate) const TX_HASH: TxHash =
    b256!("0x8b7e0d5c3b1e4f2a9c6d0e8f7a5b3c1d2e4f6a8b0c2d4e6f8a0b2c4d6e8f0a1b");

pub(crate) fn addresses() -> ChainAddresses {
    ChainAddresses {
        proxy_factory: address!("0x4e1dcf7ad4e460cfd30791ccc4f9c8a4f820ec67"),
        safe_singleton: address!("0x29fcb43b46531bca003ddc8fcb67ffe91900c762"),
        fallback_handler: address!("0xfd0732dc9e303f09fcef3a7388ad10a83459ec99"),
        module_setup: address!("0x2dd68b007b46fbe91b9a7c3eda5a7a1063cb5b47"),
        multi_send: address!("0x38869bf66a61cf6bdb996a6ae40d5853fd43b526"),
        multi_send_call_only: address!("0x9641d764fc13c8b624c04430c7356c1c7c8102e2"),
    }
}

pub(crate) fn chain_config() -> ChainConfig {
    ChainConfig::new("http://localhost:8545".parse().unwrap(), addresses())
        .with_proxy_creation_code(bytes!("0x608060405234801561001057600080fd5b50"))
}

pub(crate) fn deployment() -> ProxyDeployment {
    ProxyDeployment {
        factory: addresses().proxy_factory,
        singleton: addresses().safe_singleton,
        initializer: INIT_DATA,
        salt_nonce: U256::ZERO,
        creation_code: bytes!("0x608060405234801561001057600080fd5b50"),
    }
}

pub(crate) fn authorization(chain_id: u64, delegate: Address, nonce: u64) -> AuthorizationItem {
    AuthorizationItem {
        chain_id: U256::from(chain_id),
        contract_address: delegate,
        nonce,
        y_parity: 1,
        r: U256::from(1),
        s: U256::from(2),
    }
}

pub(crate) fn request() -> RelayRequest {
    RelayRequest::new(ACCOUNT, vec![authorization(CHAIN_ID, deployment().address(), 0)])
        .with_init_data(INIT_DATA)
}

#[derive(Debug, Default)]
pub(crate) struct ChainState {
    pub(crate) code: HashMap<Address, Bytes>,
    pub(crate) storage: HashMap<Address, B256>,
    pub(crate) nonce: u64,
    pub(crate) creation_code: Option<Bytes>,
    pub(crate) fail: bool,
    pub(crate) calls: Vec<&'static str>,
    pub(crate) sent: Vec<TransactionRequest>,
    pub(crate) connections: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockChain(pub(crate) Arc<Mutex<ChainState>>);

impl MockChain {
    pub(crate) fn with(f: impl FnOnce(&mut ChainState)) -> Self {
        let chain = Self::default();
        f(&mut chain.0.lock().unwrap());
        chain
    }

    fn record(&self, call: &'static str) -> Result<(), RelayError> {
        let mut state = self.0.lock().unwrap();
        state.calls.push(call);
        if state.fail {
            return Err(TransportErrorKind::custom_str("connection refused").into());
        }
        Ok(())
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().calls.clone()
    }

    pub(crate) fn sent(&self) -> Vec<TransactionRequest> {
        self.0.lock().unwrap().sent.clone()
    }

    pub(crate) fn deploy(&self, address: Address) {
        self.0.lock().unwrap().code.insert(address, bytes!("0x6080604052"));
    }

    pub(crate) fn initialize(&self, address: Address) {
        self.0.lock().unwrap().storage.insert(address, B256::repeat_byte(1));
    }
}

#[async_trait]
impl StateInspector for MockChain {
    async fn code_at(&self, address: Address) -> Result<Bytes, RelayError> {
        self.record("code_at")?;
        Ok(self.0.lock().unwrap().code.get(&address).cloned().unwrap_or_default())
    }

    async fn storage_at(&self, address: Address, slot: U256) -> Result<B256, RelayError> {
        assert_eq!(slot, INITIALIZER_SLOT);
        self.record("storage_at")?;
        Ok(self.0.lock().unwrap().storage.get(&address).copied().unwrap_or_default())
    }

    async fn transaction_count(&self, _: Address) -> Result<u64, RelayError> {
        self.record("transaction_count")?;
        Ok(self.0.lock().unwrap().nonce)
    }

    async fn proxy_creation_code(&self, _: Address) -> Result<Bytes, RelayError> {
        self.record("proxy_creation_code")?;
        Ok(self.0.lock().unwrap().creation_code.clone().unwrap_or_default())
    }
}

#[async_trait]
impl Broadcaster for MockChain {
    fn address(&self) -> Address {
        Address::repeat_byte(0x77)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, RelayError> {
        self.record("send_transaction")?;
        self.0.lock().unwrap().sent.push(tx);
        Ok(TX_HASH)
    }
}

impl ChainConnector for MockChain {
    type Inspector = Self;
    type Broadcaster = Self;

    fn inspector(&self, _: ChainId, _: &ChainConfig) -> Result<Self, RelayError> {
        self.0.lock().unwrap().connections += 1;
        Ok(self.clone())
    }

    fn broadcaster(&self, _: ChainId, _: &ChainConfig) -> Result<Self, RelayError> {
        self.0.lock().unwrap().connections += 1;
        Ok(self.clone())
    }
}

pub(crate) fn orchestrator(chain: &MockChain, policy: RelayPolicy) -> Orchestrator<MockChain> {
    orchestrator_with(chain, chain_config(), policy)
}

/// Orchestrator serving [`CHAIN_ID`] with the given chain configuration.
pub(crate) fn orchestrator_with(
    chain: &MockChain,
    config: ChainConfig,
    policy: RelayPolicy,
) -> Orchestrator<MockChain> {
    Orchestrator::new(ChainRegistry::new([(Chain::from(CHAIN_ID), config)]), chain.clone(), policy)
}
