use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use sealpost_protocol::StreamTransport;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{info, warn};

use crate::config::ClientConfig;

pub type TlsTransport = StreamTransport<TlsStream<TcpStream>>;

/// Open a TLS connection to the configured server and wrap it in a
/// request/response transport.
pub async fn connect(config: &ClientConfig) -> Result<TlsTransport> {
    let (host, port) = parse_address(&config.address)?;

    let tcp_stream = TcpStream::connect((&*host, port))
        .await
        .with_context(|| format!("could not connect to {}", config.address))?;

    info!("TCP connected to {}", config.address);

    let connector = TlsConnector::from(Arc::new(tls_config(config)?));
    let server_name = server_name(&host)?;

    let tls_stream = connector
        .connect(server_name, tcp_stream)
        .await
        .context("TLS handshake failed")?;

    info!("TLS handshake complete");

    Ok(StreamTransport::new(tls_stream, config.timeout()))
}

/// Build the rustls client configuration for the configured trust mode.
pub fn tls_config(config: &ClientConfig) -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .context("unsupported TLS protocol versions")?;

    let tls_config = if config.accept_invalid_certs {
        warn!("TLS certificate validation disabled");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert { provider }))
            .with_no_client_auth()
    } else {
        let roots = match &config.ca_cert {
            Some(path) => load_roots(path)?,
            None => {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                roots
            }
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(tls_config)
}

fn load_roots(path: &str) -> Result<RootCertStore> {
    let pem = fs::read(path).with_context(|| format!("failed to read CA cert: {}", path))?;
    let mut reader = std::io::BufReader::new(pem.as_slice());
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse CA certificates")?;

    if certs.is_empty() {
        bail!("no certificates found in {}", path);
    }

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        bail!("no usable CA certificates in {} ({} rejected)", path, ignored);
    }
    Ok(roots)
}

fn server_name(host: &str) -> Result<ServerName<'static>> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        Ok(ServerName::IpAddress(ip.into()))
    } else {
        ServerName::try_from(host.to_string())
            .map_err(|e| anyhow!("invalid server name '{}': {}", host, e))
    }
}

pub fn parse_address(address: &str) -> Result<(String, u16)> {
    let (host, port_str) = if address.starts_with('[') {
        // IPv6: [::1]:10443
        let bracket_end = address
            .find("]:")
            .ok_or_else(|| anyhow!("invalid IPv6 address format, expected [host]:port"))?;
        (address[1..bracket_end].to_string(), &address[bracket_end + 2..])
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) => (host.to_string(), port),
            None => bail!("invalid address format, expected host:port"),
        }
    };
    let port: u16 = port_str
        .parse()
        .map_err(|_| anyhow!("invalid port number: {}", port_str))?;
    if host.is_empty() {
        bail!("host cannot be empty");
    }
    Ok((host, port))
}

/// Accepts any server certificate. Handshake signatures are still checked,
/// so the peer must hold the key for the certificate it presents.
#[derive(Debug)]
struct AcceptAnyCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        warn!(server = ?server_name, "accepting unverified server certificate");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
