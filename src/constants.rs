//! Relay constants.

use alloy::primitives::U256;

/// Gas limit of relayed transactions unless configured otherwise per chain.
pub const DEFAULT_TX_GAS: u64 = 1_000_000;

/// Storage slot a Safe writes its singleton address to during setup.
///
/// A zero value means the account was never initialized.
pub const INITIALIZER_SLOT: U256 = U256::ZERO;

/// Description returned by the informational endpoint.
pub const SERVICE_DESCRIPTION: &str = "Relayer for Safe EIP-7702";

/// Default port of the relay server.
pub const DEFAULT_PORT: u16 = 9119;

/// Default port of the Prometheus exporter.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Default maximum number of concurrent connections.
pub const DEFAULT_RPC_DEFAULT_MAX_CONNECTIONS: u32 = 1_000;

/// Default maximum size of a request body in bytes, shared by the REST and JSON-RPC routes.
pub const DEFAULT_MAX_REQUEST_BODY_SIZE: u32 = 10 * 1024 * 1024;
