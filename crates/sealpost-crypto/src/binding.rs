//! A party's own key pair plus the remote party's public key.

use std::sync::Arc;

use tracing::debug;

use crate::envelope::{self, Envelope};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{fingerprint, KeyPair, PublicKey};

/// Key material one side of a conversation needs to seal and open envelopes.
///
/// The remote key is populated by the handshake. Binding again replaces it;
/// the protocol never re-keys on its own.
#[derive(Debug, Clone)]
pub struct PeerBinding {
    local: Arc<KeyPair>,
    remote: Option<PublicKey>,
}

impl PeerBinding {
    pub fn new(local: Arc<KeyPair>) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    pub fn local(&self) -> &Arc<KeyPair> {
        &self.local
    }

    /// The bound peer key, if the handshake has completed.
    pub fn remote(&self) -> Option<&PublicKey> {
        self.remote.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.remote.is_some()
    }

    /// Record the peer's public key, overwriting any previous binding.
    pub fn bind(&mut self, remote: PublicKey) {
        if let Some(previous) = &self.remote {
            debug!(
                previous = %fingerprint(previous),
                next = %fingerprint(&remote),
                "replacing bound peer key"
            );
        }
        self.remote = Some(remote);
    }

    /// Seal `plaintext` for the bound peer, signed with our private key.
    pub fn seal(&self, plaintext: &[u8]) -> CryptoResult<Envelope> {
        let remote = self.remote.as_ref().ok_or(CryptoError::PeerNotBound)?;
        envelope::seal(plaintext, remote, self.local.private_key())
    }

    /// Open an envelope sent by the bound peer.
    pub fn open(&self, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
        let remote = self.remote.as_ref().ok_or(CryptoError::PeerNotBound)?;
        envelope::open(envelope, self.local.private_key(), remote)
    }
}
