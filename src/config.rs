//! Relay configuration.
use crate::constants::{
    DEFAULT_MAX_REQUEST_BODY_SIZE, DEFAULT_METRICS_PORT, DEFAULT_PORT,
    DEFAULT_RPC_DEFAULT_MAX_CONNECTIONS, DEFAULT_TX_GAS,
};
use alloy::primitives::{Address, Bytes, U256, map::HashMap};
use alloy_chains::Chain;
use eyre::{Context, ensure};
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
};
use tracing::warn;
use url::Url;

/// Relay configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Chain configurations.
    #[serde(with = "crate::serde::chain_map")]
    pub chains: HashMap<Chain, ChainConfig>,
    /// Relay policy.
    #[serde(default)]
    pub policy: RelayPolicy,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
}

impl RelayConfig {
    /// Sets the IP address to serve the RPC on.
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.server.address = address;
        self
    }

    /// Sets the port to serve the RPC on.
    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Sets the port to serve the metrics on.
    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.server.metrics_port = port;
        self
    }

    /// Sets the maximum number of concurrent connections the relay can handle.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.server.max_connections = max_connections;
        self
    }

    /// Adds or replaces the configuration of a single chain.
    pub fn with_chain(mut self, chain: Chain, config: ChainConfig) -> Self {
        self.chains.insert(chain, config);
        self
    }

    /// Sets the delegation policy.
    pub fn with_delegation_policy(mut self, delegation: Option<DelegationPolicy>) -> Self {
        if let Some(delegation) = delegation {
            self.policy.delegation = delegation;
        }
        self
    }

    /// Requires the first authorization to delegate to the derived proxy.
    pub fn with_verify_delegate(mut self, verify_delegate: bool) -> Self {
        self.policy.verify_delegate |= verify_delegate;
        self
    }

    /// Requires the first authorization nonce to match the account nonce.
    pub fn with_verify_authorization_nonce(mut self, verify: bool) -> Self {
        self.policy.verify_authorization_nonce |= verify;
        self
    }

    /// Sets the key used to sign relayed transactions.
    ///
    /// Either a hex private key or an AWS KMS key id.
    pub fn with_relayer_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key {
            self.secrets.relayer_key = key;
        }
        self
    }

    /// Load from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;
        let config = serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to a YAML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Checks that every chain configuration is usable.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.chains.is_empty() {
            warn!("No chains configured, every relay request will be rejected");
        }

        for (chain, config) in &self.chains {
            config.validate().wrap_err_with(|| format!("invalid configuration for chain {chain}"))?;
        }

        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve the metrics on.
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the relay can handle.
    pub max_connections: u32,
    /// The maximum size of a request body in bytes.
    #[serde(default = "default_max_request_body_size")]
    pub max_request_body_size: u32,
}

const fn default_max_request_body_size() -> u32 {
    DEFAULT_MAX_REQUEST_BODY_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            max_connections: DEFAULT_RPC_DEFAULT_MAX_CONNECTIONS,
            max_request_body_size: DEFAULT_MAX_REQUEST_BODY_SIZE,
        }
    }
}

/// Addresses of the Safe contracts deployed on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAddresses {
    /// `SafeProxyFactory`.
    pub proxy_factory: Address,
    /// The Safe singleton proxies forward to.
    pub safe_singleton: Address,
    /// Default fallback handler.
    pub fallback_handler: Address,
    /// Module setup helper.
    pub module_setup: Address,
    /// `MultiSend`.
    pub multi_send: Address,
    /// `MultiSendCallOnly`, the only multisend the relay submits to.
    pub multi_send_call_only: Address,
}

impl ChainAddresses {
    fn validate(&self) -> eyre::Result<()> {
        for (name, address) in [
            ("proxy_factory", self.proxy_factory),
            ("safe_singleton", self.safe_singleton),
            ("fallback_handler", self.fallback_handler),
            ("module_setup", self.module_setup),
            ("multi_send", self.multi_send),
            ("multi_send_call_only", self.multi_send_call_only),
        ] {
            ensure!(!address.is_zero(), "{name} must not be the zero address");
        }
        ensure!(
            self.multi_send != self.multi_send_call_only,
            "multi_send and multi_send_call_only must be distinct contracts"
        );
        Ok(())
    }
}

/// Chain configuration for individual chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// The RPC endpoint of the chain.
    pub endpoint: Url,
    /// The Safe contracts on this chain.
    pub addresses: ChainAddresses,
    /// Salt nonce used when deriving and deploying proxies.
    ///
    /// Requests may override it.
    #[serde(default)]
    pub proxy_salt: U256,
    /// Recipient of transactions that only carry the authorization list.
    #[serde(default)]
    pub authorization_sink: Address,
    /// Gas limit of relayed transactions.
    ///
    /// `None` estimates the gas limit for every transaction.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: Option<u64>,
    /// Creation code of the factory proxies.
    ///
    /// Fetched from the factory for every deployment if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_creation_code: Option<Bytes>,
}

impl ChainConfig {
    /// Creates a chain configuration with default policy values.
    pub fn new(endpoint: Url, addresses: ChainAddresses) -> Self {
        Self {
            endpoint,
            addresses,
            proxy_salt: U256::ZERO,
            authorization_sink: Address::ZERO,
            gas_limit: default_gas_limit(),
            proxy_creation_code: None,
        }
    }

    /// Sets the proxy creation code.
    pub fn with_proxy_creation_code(mut self, code: Bytes) -> Self {
        self.proxy_creation_code = Some(code);
        self
    }

    /// Sets the gas limit, `None` to estimate.
    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the proxy salt nonce.
    pub fn with_proxy_salt(mut self, salt: U256) -> Self {
        self.proxy_salt = salt;
        self
    }

    /// Sets the recipient of authorization-only transactions.
    pub fn with_authorization_sink(mut self, sink: Address) -> Self {
        self.authorization_sink = sink;
        self
    }

    fn validate(&self) -> eyre::Result<()> {
        self.addresses.validate()?;
        ensure!(self.gas_limit != Some(0), "gas_limit must be positive, use null to estimate");
        if let Some(code) = &self.proxy_creation_code {
            ensure!(!code.is_empty(), "proxy_creation_code must not be empty");
        }
        Ok(())
    }
}

const fn default_gas_limit() -> Option<u64> {
    Some(DEFAULT_TX_GAS)
}

/// What to do when an account is already delegated to the requested target.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DelegationPolicy {
    /// Submit the authorization again.
    #[default]
    Resubmit,
    /// Drop the authorization list, sending only what else is still required.
    Skip,
    /// Reject the request.
    Reject,
}

/// Request policy of the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPolicy {
    /// Handling of accounts already delegated to the requested target.
    #[serde(default)]
    pub delegation: DelegationPolicy,
    /// Reject requests whose first authorization does not delegate to the derived proxy.
    #[serde(default)]
    pub verify_delegate: bool,
    /// Reject requests whose first authorization nonce is not the account nonce.
    #[serde(default)]
    pub verify_authorization_nonce: bool,
}

/// Secrets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// The private key or AWS KMS key id signing relayed transactions.
    #[serde(default)]
    pub relayer_key: String,
}
