use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sealpost_crypto::KeyPair;
use sealpost_protocol::Initiator;
use tracing::info;

mod config;
mod network;

use config::ClientConfig;

#[derive(Parser)]
#[command(name = "sealpost-client", about = "SealPost secure messaging initiator")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Server address (host:port), overrides config
    #[arg(short, long)]
    address: Option<String>,

    /// PEM file with CA certificate(s) to trust, overrides config
    #[arg(long)]
    ca_cert: Option<String>,

    /// Skip TLS certificate validation (self-signed servers)
    #[arg(long)]
    accept_invalid_certs: bool,

    /// RSA modulus size for the protocol key, overrides config
    #[arg(long)]
    rsa_bits: Option<usize>,

    /// Round-trip timeout in seconds, overrides config
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Payload to send, overrides config
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealpost_client=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {}", config_path))?;
        toml::from_str(&content)?
    } else {
        ClientConfig::default()
    };

    // CLI overrides
    if let Some(address) = args.address {
        config.address = address;
    }
    if args.ca_cert.is_some() {
        config.ca_cert = args.ca_cert;
    }
    if args.accept_invalid_certs {
        config.accept_invalid_certs = true;
    }
    if let Some(bits) = args.rsa_bits {
        config.rsa_bits = bits;
    }
    if let Some(secs) = args.timeout_secs {
        config.timeout_secs = secs;
    }
    if let Some(message) = args.message {
        config.message = message;
    }

    let bits = config.rsa_bits;
    let keys = tokio::task::spawn_blocking(move || KeyPair::generate(bits))
        .await
        .context("key generation task failed")?
        .context("failed to generate client key pair")?;
    info!(bits = keys.bits(), fingerprint = %keys.fingerprint(), "client key pair ready");

    let mut transport = network::connect(&config).await?;
    let mut session = Initiator::new(Arc::new(keys));

    session
        .handshake(&mut transport)
        .await
        .context("key exchange failed")?;

    info!(bytes = config.message.len(), "sending sealed payload");
    let reply = session
        .exchange(&mut transport, config.message.as_bytes())
        .await
        .context("data exchange failed")?;

    println!("{}", String::from_utf8_lossy(&reply));
    Ok(())
}
