//! Relay types.

mod contracts;
pub use contracts::*;

pub mod multisend;
pub use multisend::{MetaTransaction, Operation};

mod plan;
pub use plan::*;

mod request;
pub use request::*;
