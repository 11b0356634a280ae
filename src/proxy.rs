//! Deterministic Safe proxy addresses.
//!
//! The proxy factory deploys proxies with `CREATE2`, so their address is known before they
//! exist. The account owner signs an authorization delegating to that address, which makes the
//! derivation here security relevant: a mismatch with the factory binds the signature to an
//! address that will never hold the proxy.

use crate::types::ISafeProxyFactory;
use alloy::{
    primitives::{Address, B256, Bytes, Keccak256, U256, keccak256},
    sol_types::SolCall,
};

/// Everything needed to deploy a Safe proxy through the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// The proxy factory.
    pub factory: Address,
    /// The Safe singleton the proxy forwards to.
    pub singleton: Address,
    /// The Safe setup calldata.
    pub initializer: Bytes,
    /// The salt nonce mixed into the `CREATE2` salt.
    pub salt_nonce: U256,
    /// The creation code of the factory's proxies.
    pub creation_code: Bytes,
}

impl ProxyDeployment {
    /// The `CREATE2` salt: `keccak256(keccak256(initializer) ++ saltNonce)`.
    pub fn salt(&self) -> B256 {
        let mut hasher = Keccak256::new();
        hasher.update(keccak256(&self.initializer));
        hasher.update(self.salt_nonce.to_be_bytes::<32>());
        hasher.finalize()
    }

    /// Hash of the init code: `creationCode ++ keccak256(initializer) ++ uint256(singleton)`.
    pub fn init_code_hash(&self) -> B256 {
        let mut hasher = Keccak256::new();
        hasher.update(&self.creation_code);
        hasher.update(keccak256(&self.initializer));
        hasher.update(self.singleton.into_word());
        hasher.finalize()
    }

    /// The address the proxy is deployed to.
    pub fn address(&self) -> Address {
        self.factory.create2(self.salt(), self.init_code_hash())
    }

    /// Calldata deploying the proxy through `createProxyWithNonce`.
    pub fn create_call(&self) -> Bytes {
        ISafeProxyFactory::createProxyWithNonceCall {
            singleton: self.singleton,
            initializer: self.initializer.clone(),
            saltNonce: self.salt_nonce,
        }
        .abi_encode()
        .into()
    }
}

/// Computes the address of the Safe proxy `factory` deploys for `singleton` and `initializer`.
pub fn derive_proxy_address(
    factory: Address,
    singleton: Address,
    initializer: &[u8],
    salt_nonce: U256,
    creation_code: &[u8],
) -> Address {
    ProxyDeployment {
        factory,
        singleton,
        initializer: Bytes::copy_from_slice(initializer),
        salt_nonce,
        creation_code: Bytes::copy_from_slice(creation_code),
    }
    .address()
}
