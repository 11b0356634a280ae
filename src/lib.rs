//! # Safe Relay
//!
//! Library for a relay that upgrades EOAs to Safe accounts through EIP-7702 delegations.

#![recursion_limit = "256"]

pub mod broadcast;
pub mod chains;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod http;
pub mod inspector;
pub mod metrics;
pub mod orchestrator;
pub mod proxy;
pub mod rpc;
pub mod serde;
pub mod signers;
pub mod spawn;
pub mod types;

#[cfg(test)]
mod test_utils;
