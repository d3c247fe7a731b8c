//! SealPost protocol layer: wire messages, framing, session state machines
//! and the transport seam.
//!
//! This crate provides:
//! - The untyped wire [`Message`] (field name → bytes, JSON + base64)
//! - Typed [`Request`]/[`Response`] variants with an explicit boundary to it
//! - Length-prefixed framing for stream transports
//! - [`Initiator`] and [`Responder`] session state machines
//! - The [`Transport`] trait and a generic stream implementation

pub mod codec;
pub mod error;
pub mod message;
pub mod messages;
pub mod session;
pub mod transport;

pub use codec::{decode_message, encode_frame, try_decode_frame, MAX_MSG_SIZE};
pub use error::{ProtocolError, ProtocolResult, TransportError};
pub use message::Message;
pub use messages::{Command, Request, Response, Status};
pub use session::{Initiator, PayloadHandler, Responder, SessionState};
pub use transport::{read_message, write_message, StreamTransport, Transport};
