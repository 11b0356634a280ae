//! Serde helpers.

pub mod chain_map;
pub mod quantity;
