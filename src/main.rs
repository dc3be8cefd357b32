//! multiconn: a multi-connection TCP client
//!
//! Opens several concurrent connections to one server endpoint, sends a
//! fixed sequence of messages over each, and closes each connection once
//! all expected reply bytes have arrived.
//!
//! Features:
//! - Single-threaded readiness-based event loop (epoll/kqueue via mio)
//! - Per-connection byte accounting and partial-write handling
//! - Configuration via CLI arguments or TOML file

mod client;
mod config;

use bytes::Bytes;
use client::Client;
use config::Config;
use std::net::ToSocketAddrs;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let addr = format!("{}:{}", config.host, config.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("could not resolve {}:{}", config.host, config.port))?;

    info!(
        host = %config.host,
        port = config.port,
        connections = config.connections,
        chunk_size = config.chunk_size,
        "Starting multiconn client"
    );

    let messages: Vec<Bytes> = config
        .messages
        .iter()
        .map(|m| Bytes::copy_from_slice(m.as_bytes()))
        .collect();

    let mut client = Client::new(messages, config.chunk_size)?;
    client.start_connections(addr, config.connections)?;
    client.run()?;

    info!("all connections closed");
    Ok(())
}
