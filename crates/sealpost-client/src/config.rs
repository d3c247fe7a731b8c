use std::time::Duration;

use serde::Deserialize;

/// Client configuration, loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Server address as `host:port` or `[v6]:port`.
    #[serde(default = "default_address")]
    pub address: String,

    /// RSA modulus size for the client's protocol key pair.
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,

    /// PEM file with the CA certificate(s) to trust instead of web PKI roots.
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// Skip TLS certificate validation (self-signed local servers).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Bound on every request/response round trip.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Payload sealed and sent after the handshake.
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_address() -> String {
    "localhost:10443".into()
}

fn default_rsa_bits() -> usize {
    3072
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_message() -> String {
    "El token secreto es 123456".into()
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            rsa_bits: default_rsa_bits(),
            ca_cert: None,
            accept_invalid_certs: false,
            timeout_secs: default_timeout_secs(),
            message: default_message(),
        }
    }
}
