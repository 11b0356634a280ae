//! Relayer key abstraction.
//!
//! The relayer key is either a local private key or an AWS KMS key.
use alloy::{
    network::{EthereumWallet, FullSigner, TxSigner},
    primitives::{Address, Signature},
    signers::{aws::AwsSigner, local::PrivateKeySigner},
};
use aws_config::BehaviorVersion;
use std::{fmt, ops::Deref, str::FromStr, sync::Arc};
use tracing::debug;

/// Abstraction over local and AWS signers.
#[derive(Clone)]
pub struct DynSigner(pub Arc<dyn FullSigner<Signature> + Send + Sync>);

impl fmt::Debug for DynSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DynSigner").field(&self.address()).finish()
    }
}

impl DynSigner {
    /// Loads `key` as a private key, falling back to an AWS KMS key id.
    pub async fn load(key: &str, chain_id: Option<u64>) -> eyre::Result<Self> {
        if let Ok(signer) = Self::from_signing_key(key) {
            return Ok(signer);
        }
        debug!("Relayer key is not a private key, loading it from AWS KMS");
        Self::from_kms(key, chain_id).await
    }

    /// Load a private key.
    pub fn from_signing_key(key: &str) -> eyre::Result<Self> {
        Ok(Self(Arc::new(PrivateKeySigner::from_str(key)?)))
    }

    /// Load a signer from AWS KMS.
    pub async fn from_kms(key_id: &str, chain_id: Option<u64>) -> eyre::Result<Self> {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_kms::Client::new(&config);
        Ok(Self(Arc::new(AwsSigner::new(client, key_id.to_string(), chain_id).await?)))
    }

    /// Returns the signer's Ethereum Address.
    pub fn address(&self) -> Address {
        TxSigner::address(&self.0)
    }

    /// A wallet signing transactions with this signer.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::new(self.0.clone())
    }
}

impl Deref for DynSigner {
    type Target = dyn FullSigner<Signature> + Send + Sync;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}
