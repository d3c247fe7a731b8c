//! Per-party session state machines.
//!
//! Both sides move `Handshaking -> Ready` once the peer's public key is bound.
//! The initiator additionally has a terminal `Failed` state: a handshake that
//! fails is not retried on the same session.
//!
//! Data exchanges in `Ready` are mutually independent. No sequence numbers
//! are tracked and no session keys are rotated.

use std::sync::Arc;

use sealpost_crypto::keys::fingerprint;
use sealpost_crypto::{export_public_key, import_public_key, KeyPair, PeerBinding, PublicKey};
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::Message;
use crate::messages::{Request, Response};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the peer's public key.
    Handshaking,
    /// Peer key bound; data may flow.
    Ready,
    /// The handshake failed. Terminal.
    Failed,
}

/// Application hook that turns an opened request payload into the reply
/// payload sealed back to the client.
pub trait PayloadHandler: Send + Sync {
    fn handle(&self, plaintext: &[u8]) -> Vec<u8>;
}

impl<F> PayloadHandler for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn handle(&self, plaintext: &[u8]) -> Vec<u8> {
        self(plaintext)
    }
}

// ── Responder ──────────────────────────────────────────────────────────

/// Server side of one session. Owns its binding exclusively, so concurrent
/// sessions never see each other's peer keys.
///
/// [`Responder::respond`] is synchronous and CPU-bound (RSA); async callers
/// should run it on a blocking thread.
pub struct Responder {
    binding: PeerBinding,
    handler: Arc<dyn PayloadHandler>,
}

impl Responder {
    pub fn new(local: Arc<KeyPair>, handler: Arc<dyn PayloadHandler>) -> Self {
        Self {
            binding: PeerBinding::new(local),
            handler,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.binding.is_bound() {
            SessionState::Ready
        } else {
            SessionState::Handshaking
        }
    }

    pub fn binding(&self) -> &PeerBinding {
        &self.binding
    }

    /// Answer one request. Failures become `ERROR` responses and leave the
    /// session state unchanged.
    pub fn respond(&mut self, request: &Message) -> Message {
        match self.handle(request) {
            Ok(response) => response.to_message(),
            Err(err) => {
                warn!(error = %err, "rejecting request");
                Response::rejecting(request, &err).to_message()
            }
        }
    }

    fn handle(&mut self, request: &Message) -> ProtocolResult<Response> {
        match Request::from_message(request)? {
            Request::Exchange { public_key } => {
                let key = import_public_key(&public_key)?;
                let peer = fingerprint(&key);
                self.binding.bind(key);
                info!(peer = %peer, "peer key bound");
                Ok(Response::Exchange {
                    public_key: export_public_key(self.binding.local())?,
                })
            }
            Request::Data(envelope) => {
                if !self.binding.is_bound() {
                    return Err(ProtocolError::HandshakeIncomplete);
                }
                let plaintext = self.binding.open(&envelope)?;
                debug!(bytes = plaintext.len(), "request payload verified");
                let reply = self.handler.handle(&plaintext);
                Ok(Response::Data(self.binding.seal(&reply)?))
            }
        }
    }
}

// ── Initiator ──────────────────────────────────────────────────────────

/// Client side of one session.
pub struct Initiator {
    binding: PeerBinding,
    state: SessionState,
}

impl Initiator {
    pub fn new(local: Arc<KeyPair>) -> Self {
        Self {
            binding: PeerBinding::new(local),
            state: SessionState::Handshaking,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn binding(&self) -> &PeerBinding {
        &self.binding
    }

    /// Exchange public keys with the responder.
    ///
    /// Any failure (transport, `ERROR` status, missing or malformed key) moves
    /// the session to [`SessionState::Failed`].
    pub async fn handshake<T>(&mut self, transport: &mut T) -> ProtocolResult<()>
    where
        T: Transport + ?Sized,
    {
        if self.state == SessionState::Failed {
            return Err(ProtocolError::SessionFailed(
                "handshake already failed on this session".into(),
            ));
        }

        match self.request_peer_key(transport).await {
            Ok(key) => {
                let peer = fingerprint(&key);
                self.binding.bind(key);
                self.state = SessionState::Ready;
                info!(peer = %peer, "handshake complete");
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                warn!(error = %err, "handshake failed");
                Err(err)
            }
        }
    }

    async fn request_peer_key<T>(&self, transport: &mut T) -> ProtocolResult<PublicKey>
    where
        T: Transport + ?Sized,
    {
        let request = Request::Exchange {
            public_key: export_public_key(self.binding.local())?,
        };
        let response = transport.send(request.to_message()).await?;
        match Response::from_message(&response)? {
            Response::Exchange { public_key } => Ok(import_public_key(&public_key)?),
            Response::Error { message, .. } => Err(ProtocolError::Remote(message)),
            Response::Data(_) => Err(ProtocolError::InvalidCommand(
                "expected xchg response, got data".into(),
            )),
        }
    }

    /// Seal `plaintext` for the responder, send it, and open the sealed reply.
    ///
    /// Sealing and opening run on blocking threads.
    pub async fn exchange<T>(&mut self, transport: &mut T, plaintext: &[u8]) -> ProtocolResult<Vec<u8>>
    where
        T: Transport + ?Sized,
    {
        match self.state {
            SessionState::Ready => {}
            SessionState::Handshaking => return Err(ProtocolError::HandshakeIncomplete),
            SessionState::Failed => {
                return Err(ProtocolError::SessionFailed(
                    "cannot exchange data after a failed handshake".into(),
                ))
            }
        }

        let binding = self.binding.clone();
        let payload = plaintext.to_vec();
        let envelope = tokio::task::spawn_blocking(move || binding.seal(&payload)).await??;

        let response = transport.send(Request::Data(envelope).to_message()).await?;
        match Response::from_message(&response)? {
            Response::Data(envelope) => {
                let binding = self.binding.clone();
                let reply = tokio::task::spawn_blocking(move || binding.open(&envelope)).await??;
                debug!(bytes = reply.len(), "reply payload verified");
                Ok(reply)
            }
            Response::Error { message, .. } => Err(ProtocolError::Remote(message)),
            Response::Exchange { .. } => Err(ProtocolError::InvalidCommand(
                "expected data response, got xchg".into(),
            )),
        }
    }
}
