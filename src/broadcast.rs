//! Transaction submission.

use crate::error::{RelayError, SigningError};
use alloy::{
    primitives::{Address, TxHash},
    providers::Provider,
    rpc::types::TransactionRequest,
    transports::RpcError,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Signs and submits relay transactions.
///
/// Implementations submit exactly one transaction per call and return as soon as the node
/// accepted it, without waiting for inclusion.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// The address transactions are sent from.
    fn address(&self) -> Address;

    /// Signs and submits `tx`, returning its hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, RelayError>;
}

/// [`Broadcaster`] submitting through a wallet-enabled alloy [`Provider`].
///
/// Nonce, fee and chain id filling is left to the provider's fillers.
#[derive(Debug, Clone)]
pub struct WalletBroadcaster<P> {
    provider: P,
    signer: Address,
}

impl<P> WalletBroadcaster<P> {
    /// Creates a broadcaster sending from `signer` through `provider`.
    pub const fn new(provider: P, signer: Address) -> Self {
        Self { provider, signer }
    }
}

#[async_trait]
impl<P> Broadcaster for WalletBroadcaster<P>
where
    P: Provider + Send + Sync,
{
    fn address(&self) -> Address {
        self.signer
    }

    #[instrument(skip_all, fields(signer = %self.signer))]
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, RelayError> {
        let pending =
            self.provider.send_transaction(tx.from(self.signer)).await.map_err(|err| {
                match err {
                    // the wallet filler reports signing failures as local usage errors
                    RpcError::LocalUsageError(err) => SigningError::Rejected(err).into(),
                    err => RelayError::from(err),
                }
            })?;

        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "Submitted transaction");
        Ok(tx_hash)
    }
}
