//! # Safe Relay
//!
//! A relay service that upgrades EOAs to Safe accounts through EIP-7702 delegations.
#![recursion_limit = "256"]
use clap::Parser;
use relay::cli::Args;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    // Enable backtraces unless a RUST_BACKTRACE value has already been explicitly provided.
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        // SAFETY: nothing reads the environment concurrently during startup.
        unsafe { std::env::set_var("RUST_BACKTRACE", "1") };
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy())
        .init();

    let args = Args::parse();
    if let Err(err) = args.run().await {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}
