use std::time::Duration;

use serde::Deserialize;

/// Server configuration, loaded from a TOML file.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind on (default "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port for TLS connections.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to TLS certificate file (PEM).
    #[serde(default = "default_cert_path")]
    pub cert_path: String,

    /// Path to TLS private key file (PEM).
    #[serde(default = "default_key_path")]
    pub key_path: String,

    /// RSA modulus size for the server's protocol key pair.
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,

    /// Maximum concurrent sessions.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u32,

    /// Idle time allowed between two requests on one connection.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sustained `data` requests per second allowed per session.
    #[serde(default = "default_data_rate_per_sec")]
    pub data_rate_per_sec: f64,

    /// Fixed reply sealed back for every payload. Echo when unset.
    #[serde(default)]
    pub reply: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    10443
}

fn default_cert_path() -> String {
    "certs/server.crt".into()
}

fn default_key_path() -> String {
    "certs/server.key".into()
}

fn default_rsa_bits() -> usize {
    4096
}

fn default_max_sessions() -> u32 {
    64
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_data_rate_per_sec() -> f64 {
    5.0
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cert_path: default_cert_path(),
            key_path: default_key_path(),
            rsa_bits: default_rsa_bits(),
            max_sessions: default_max_sessions(),
            request_timeout_secs: default_request_timeout_secs(),
            data_rate_per_sec: default_data_rate_per_sec(),
            reply: None,
        }
    }
}
