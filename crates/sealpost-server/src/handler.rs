//! Payload handlers the server can be configured with.

use std::sync::Arc;

use sealpost_protocol::PayloadHandler;
use tracing::info;

use crate::config::ServerConfig;

/// Seals the client's payload straight back.
pub struct Echo;

impl PayloadHandler for Echo {
    fn handle(&self, plaintext: &[u8]) -> Vec<u8> {
        plaintext.to_vec()
    }
}

/// Logs the client's payload and answers with a fixed reply.
pub struct StaticReply {
    reply: Vec<u8>,
}

impl StaticReply {
    pub fn new(reply: impl Into<Vec<u8>>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl PayloadHandler for StaticReply {
    fn handle(&self, plaintext: &[u8]) -> Vec<u8> {
        info!(
            payload = %String::from_utf8_lossy(plaintext),
            "client payload received"
        );
        self.reply.clone()
    }
}

pub fn from_config(config: &ServerConfig) -> Arc<dyn PayloadHandler> {
    match &config.reply {
        Some(reply) => Arc::new(StaticReply::new(reply.as_bytes())),
        None => Arc::new(Echo),
    }
}
