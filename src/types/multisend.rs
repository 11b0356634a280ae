//! Packed meta transaction encoding consumed by the Safe `MultiSend` contracts.
//!
//! Each transaction is encoded as
//!
//! ```text
//! operation (1 byte) | to (20 bytes) | value (32 bytes) | data length (32 bytes) | data
//! ```
//!
//! and the encoded transactions are concatenated without delimiters. The contract walks the blob
//! using the embedded data lengths.

use super::IMultiSend;
use crate::error::ValidationError;
use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};

/// Length of the fixed-size prefix of an encoded meta transaction.
const HEADER_LEN: usize = 1 + 20 + 32 + 32;

/// The kind of call the multisend contract performs for a meta transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Operation {
    /// A regular call.
    #[default]
    Call = 0,
    /// A delegate call, executing the target's code in the multisend caller's context.
    DelegateCall = 1,
}

impl TryFrom<u8> for Operation {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::DelegateCall),
            other => Err(ValidationError::InvalidOperation(other)),
        }
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        operation as Self
    }
}

/// A single call executed by a multisend contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTransaction {
    /// The call target.
    pub to: Address,
    /// Amount of native value to send to the target.
    pub value: U256,
    /// The calldata bytes.
    pub data: Bytes,
    /// Whether to call or delegate call the target.
    #[serde(default)]
    pub operation: Operation,
}

impl MetaTransaction {
    /// A zero-value [`Operation::Call`] to `to` with `data`.
    pub fn call(to: Address, data: Bytes) -> Self {
        Self { to, value: U256::ZERO, data, operation: Operation::Call }
    }

    /// Number of bytes this transaction occupies in the packed encoding.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.data.len()
    }

    /// Appends the packed encoding of this transaction to `out`.
    pub fn encode_packed_to(&self, out: &mut Vec<u8>) {
        out.push(self.operation.into());
        out.extend_from_slice(self.to.as_slice());
        out.extend_from_slice(&self.value.to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(self.data.len()).to_be_bytes::<32>());
        out.extend_from_slice(&self.data);
    }
}

/// Encodes `txs` into the packed multisend format.
///
/// An empty slice encodes to empty bytes.
pub fn encode(txs: &[MetaTransaction]) -> Bytes {
    let mut out = Vec::with_capacity(txs.iter().map(MetaTransaction::encoded_len).sum());
    for tx in txs {
        tx.encode_packed_to(&mut out);
    }
    out.into()
}

/// Encodes `txs` for `MultiSendCallOnly`, which reverts on delegate calls.
pub fn encode_call_only(txs: &[MetaTransaction]) -> Result<Bytes, ValidationError> {
    if let Some(index) = txs.iter().position(|tx| tx.operation == Operation::DelegateCall) {
        return Err(ValidationError::DelegateCallNotAllowed { index });
    }
    Ok(encode(txs))
}

/// Builds the `multiSend(bytes)` calldata for a call-only multisend contract.
pub fn multi_send_call_only(txs: &[MetaTransaction]) -> Result<Bytes, ValidationError> {
    Ok(IMultiSend::multiSendCall { transactions: encode_call_only(txs)? }.abi_encode().into())
}

/// Decodes a packed multisend payload back into its meta transactions.
pub fn decode(blob: &[u8]) -> Result<Vec<MetaTransaction>, ValidationError> {
    let mut txs = Vec::new();
    let mut offset = 0;

    while offset < blob.len() {
        let rest = &blob[offset..];
        if rest.len() < HEADER_LEN {
            return Err(ValidationError::TruncatedMultiSend { offset });
        }

        let operation = Operation::try_from(rest[0])?;
        let to = Address::from_slice(&rest[1..21]);
        let value = U256::from_be_slice(&rest[21..53]);
        let data_len = usize::try_from(U256::from_be_slice(&rest[53..HEADER_LEN]))
            .ok()
            .filter(|len| *len <= rest.len() - HEADER_LEN)
            .ok_or(ValidationError::TruncatedMultiSend { offset })?;
        let data = Bytes::copy_from_slice(&rest[HEADER_LEN..HEADER_LEN + data_len]);

        txs.push(MetaTransaction { to, value, data, operation });
        offset += HEADER_LEN + data_len;
    }

    Ok(txs)
}
