use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use sealpost_crypto::KeyPair;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info};

mod config;
mod handler;
mod state;
mod tcp;

use config::ServerConfig;
use state::ServerState;

#[derive(Parser)]
#[command(name = "sealpost-server", about = "SealPost secure messaging responder")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Path to TLS certificate file (PEM), overrides config
    #[arg(long)]
    cert: Option<String>,

    /// Path to TLS private key file (PEM), overrides config
    #[arg(long)]
    key: Option<String>,

    /// TCP port, overrides config
    #[arg(long)]
    port: Option<u16>,

    /// Bind address (IP), overrides config
    #[arg(long)]
    host: Option<String>,

    /// RSA modulus size for the protocol key, overrides config
    #[arg(long)]
    rsa_bits: Option<usize>,

    /// Fixed reply for every payload (default: echo), overrides config
    #[arg(long)]
    reply: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install the ring crypto provider for rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealpost_server=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config file: {}", config_path))?;
        toml::from_str(&content)?
    } else {
        ServerConfig::default()
    };

    // CLI overrides
    if let Some(cert) = args.cert {
        config.cert_path = cert;
    }
    if let Some(key) = args.key {
        config.key_path = key;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(bits) = args.rsa_bits {
        config.rsa_bits = bits;
    }
    if args.reply.is_some() {
        config.reply = args.reply;
    }

    info!("SealPost server starting");
    info!(
        host = %config.host,
        port = config.port,
        rsa_bits = config.rsa_bits,
        max_sessions = config.max_sessions,
        request_timeout_secs = config.request_timeout_secs,
        data_rate_per_sec = config.data_rate_per_sec,
        echo = config.reply.is_none(),
    );

    let certs = load_certs(&config.cert_path)?;
    let key = load_key(&config.key_path)?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS configuration")?;

    let tls_acceptor = TlsAcceptor::from(Arc::new(tls_config));

    // Key generation takes seconds at 4096 bits
    let bits = config.rsa_bits;
    let keys = tokio::task::spawn_blocking(move || KeyPair::generate(bits))
        .await
        .context("key generation task failed")?
        .context("failed to generate server key pair")?;
    info!(bits = keys.bits(), fingerprint = %keys.fingerprint(), "server key pair ready");

    let state = Arc::new(ServerState::new(
        &config,
        Arc::new(keys),
        handler::from_config(&config),
    ));

    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port))
        .await
        .with_context(|| format!("failed to bind TCP on {}:{}", config.host, config.port))?;

    info!("server ready, accepting connections on {}:{}", config.host, config.port);

    loop {
        let (tcp_stream, peer_addr) = match listener.accept().await {
            Ok(result) => result,
            Err(e) => {
                error!("TCP accept error: {}", e);
                continue;
            }
        };

        let tls_acceptor = tls_acceptor.clone();
        let state = state.clone();

        tokio::spawn(async move {
            match tls_acceptor.accept(tcp_stream).await {
                Ok(tls_stream) => {
                    tcp::handle_connection(tls_stream, peer_addr.to_string(), state).await;
                }
                Err(e) => {
                    error!(peer = %peer_addr, "TLS handshake failed: {}", e);
                }
            }
        });
    }
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let cert_data = fs::read(path).with_context(|| format!("failed to read cert: {}", path))?;
    let mut reader = std::io::BufReader::new(cert_data.as_slice());
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse certificates")?;

    if certs.is_empty() {
        anyhow::bail!("no certificates found in {}", path);
    }

    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let key_data = fs::read(path).with_context(|| format!("failed to read key: {}", path))?;
    let mut reader = std::io::BufReader::new(key_data.as_slice());

    rustls_pemfile::private_key(&mut reader)
        .context("failed to parse private key")?
        .ok_or_else(|| anyhow!("no private key found in {}", path))
}
