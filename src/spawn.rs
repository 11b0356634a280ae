//! Relay spawn utilities.
use crate::{
    chains::{ChainRegistry, RpcConnector},
    cli::Args,
    config::RelayConfig,
    http::RestLayer,
    metrics::{self, RpcMetricsService},
    orchestrator::Orchestrator,
    rpc::{Relay, RelayApiServer},
    signers::DynSigner,
};
use eyre::ensure;
use http::header;
use itertools::Itertools;
use jsonrpsee::server::{
    RpcServiceBuilder, Server, ServerHandle, middleware::http::ProxyGetRequestLayer,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower::ServiceBuilder;
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;

/// Context returned once relay is launched.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// Configured chains.
    pub chains: ChainRegistry,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

impl RelayHandle {
    /// Returns the url to the http server
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Attempts to spawn the relay service using CLI arguments and a configuration file.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<RelayHandle> {
    let config = if !config_path.as_ref().exists() {
        let config = args.merge_relay_config(RelayConfig::default());
        config.save_to_file(&config_path)?;
        config
    } else {
        // File exists: load and override with CLI values.
        args.merge_relay_config(RelayConfig::load_from_file(&config_path)?)
    };

    try_spawn(config).await
}

/// Spawns the relay service using the provided [`RelayConfig`].
pub async fn try_spawn(config: RelayConfig) -> eyre::Result<RelayHandle> {
    config.validate()?;
    ensure!(!config.secrets.relayer_key.is_empty(), "missing relayer key");

    // construct signer
    let signer = DynSigner::load(&config.secrets.relayer_key, None).await?;

    // setup metrics exporter
    let metrics =
        metrics::setup_exporter((config.server.address, config.server.metrics_port)).await;

    // construct chain clients
    let chains = ChainRegistry::new(config.chains.clone());
    let connector = RpcConnector::connect(&chains, &signer).await?;

    // construct rpc module
    let orchestrator = Arc::new(Orchestrator::new(chains.clone(), connector, config.policy));
    let rpc = Relay::new(orchestrator.clone()).into_rpc();

    // http layers
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);

    // start server
    let server = Server::builder()
        .http_only()
        .max_connections(config.server.max_connections)
        .max_request_body_size(config.server.max_request_body_size)
        .set_http_middleware(
            ServiceBuilder::new()
                .layer(cors)
                .layer(ProxyGetRequestLayer::new("/health", "health")?)
                .layer(
                    RestLayer::new(orchestrator)
                        .with_max_body_size(config.server.max_request_body_size),
                ),
        )
        .set_rpc_middleware(RpcServiceBuilder::new().layer_fn(RpcMetricsService::new))
        .build((config.server.address, config.server.port))
        .await?;
    let addr = server.local_addr()?;
    info!(%addr, "Started relay service");
    info!("Relayer: {}", signer.address());
    info!("Supported chains: {}", chains.chain_ids().iter().join(", "));
    info!(policy = ?config.policy, "Relay policy");

    Ok(RelayHandle { local_addr: addr, server: server.start(rpc), chains, metrics })
}
