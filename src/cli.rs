//! # Relay CLI
use crate::{
    config::{DelegationPolicy, RelayConfig},
    constants::{DEFAULT_METRICS_PORT, DEFAULT_PORT, DEFAULT_RPC_DEFAULT_MAX_CONNECTIONS},
    spawn::try_spawn_with_args,
};
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

/// The Safe relayer upgrades EOAs to Safe accounts through EIP-7702 delegations.
#[derive(Debug, Parser)]
#[command(author, about = "Safe EIP-7702 relay", long_about = None)]
pub struct Args {
    /// The configuration file.
    ///
    /// If missing, a default one will be used and stored in the working directory under
    /// `relay.yaml`.
    #[arg(long, value_name = "CONFIG", env = "RELAY_CONFIG", default_value = "relay.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub address: IpAddr,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
    /// The maximum number of concurrent connections the relay can handle.
    #[arg(long = "max-connections", value_name = "NUM", default_value_t = DEFAULT_RPC_DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,
    /// The private key or AWS KMS key id to sign relayed transactions with.
    #[arg(long = "relayer-key", value_name = "KEY", env = "RELAY_SK")]
    pub relayer_key: Option<String>,
    /// How to handle accounts already delegated to the requested target.
    #[arg(long = "delegation-policy", value_name = "POLICY")]
    pub delegation_policy: Option<DelegationPolicy>,
    /// Reject requests whose first authorization does not delegate to the derived Safe proxy.
    #[arg(long = "verify-delegate", default_value_t = false)]
    pub verify_delegate: bool,
    /// Reject requests whose first authorization nonce is not the account nonce.
    #[arg(long = "verify-authorization-nonce", default_value_t = false)]
    pub verify_authorization_nonce: bool,
}

impl Args {
    /// Run the relayer service.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        try_spawn_with_args(self, &config_path).await?.server.stopped().await;

        Ok(())
    }

    /// Merges [`Args`] values into an existing [`RelayConfig`] instance.
    pub fn merge_relay_config(self, config: RelayConfig) -> RelayConfig {
        config
            .with_address(self.address)
            .with_port(self.port)
            .with_metrics_port(self.metrics_port)
            .with_max_connections(self.max_connections)
            .with_relayer_key(self.relayer_key)
            .with_delegation_policy(self.delegation_policy)
            .with_verify_delegate(self.verify_delegate)
            .with_verify_authorization_nonce(self.verify_authorization_nonce)
    }
}
