//! Typed protocol messages and their mapping to the wire [`Message`].

use sealpost_crypto::Envelope;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{fields, Message};

/// Human-readable error for a request with an unknown or missing `cmd`.
pub const INVALID_COMMAND: &str = "invalid command";

/// Semantic type of a message, carried in `cmd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Public key exchange.
    Exchange,
    /// Sealed payload exchange.
    Data,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Exchange => "xchg",
            Command::Data => "data",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(cmd: &str) -> ProtocolResult<Self> {
        match cmd.trim().to_ascii_lowercase().as_str() {
            "xchg" => Ok(Command::Exchange),
            "data" => Ok(Command::Data),
            other => Err(ProtocolError::InvalidCommand(other.to_string())),
        }
    }
}

/// Response status, carried in `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
        }
    }

    pub fn parse(status: &str) -> ProtocolResult<Self> {
        if status.eq_ignore_ascii_case("ok") {
            Ok(Status::Ok)
        } else if status.eq_ignore_ascii_case("error") {
            Ok(Status::Error)
        } else {
            Err(ProtocolError::InvalidStatus(status.to_string()))
        }
    }
}

/// Requests sent by the initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Offer our PKCS#1 public key.
    Exchange { public_key: Vec<u8> },
    /// A payload sealed for the responder.
    Data(Envelope),
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::Exchange { .. } => Command::Exchange,
            Request::Data(_) => Command::Data,
        }
    }

    pub fn to_message(&self) -> Message {
        let msg = Message::new().with(fields::CMD, self.command().as_str());
        match self {
            Request::Exchange { public_key } => {
                msg.with(fields::CLIENT_PUBLIC_KEY, public_key.clone())
            }
            Request::Data(envelope) => with_envelope(msg, envelope),
        }
    }

    pub fn from_message(msg: &Message) -> ProtocolResult<Self> {
        let cmd = msg.command().ok_or(ProtocolError::MissingField(fields::CMD))?;
        match Command::parse(&cmd)? {
            Command::Exchange => Ok(Request::Exchange {
                public_key: msg.require(fields::CLIENT_PUBLIC_KEY)?.to_vec(),
            }),
            Command::Data => Ok(Request::Data(read_envelope(msg)?)),
        }
    }
}

/// Responses sent by the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Our PKCS#1 public key, completing the handshake.
    Exchange { public_key: Vec<u8> },
    /// A payload sealed for the initiator.
    Data(Envelope),
    /// The request was rejected. State on the responder is unchanged.
    Error {
        /// `cmd` of the offending request, if it had one.
        command: Option<String>,
        message: String,
        /// JSON echo of the offending request.
        request: Option<Vec<u8>>,
    },
}

impl Response {
    /// Error response for a request that failed with `err`.
    ///
    /// Command errors echo the request back; other failures only name the
    /// error.
    pub fn rejecting(request: &Message, err: &ProtocolError) -> Self {
        let command = request.get_str(fields::CMD);
        match err {
            ProtocolError::InvalidCommand(_) | ProtocolError::MissingField(fields::CMD) => {
                Response::Error {
                    command,
                    message: INVALID_COMMAND.to_string(),
                    request: request.to_json().ok(),
                }
            }
            other => Response::Error {
                command,
                message: other.to_string(),
                request: None,
            },
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Response::Error { .. } => Status::Error,
            _ => Status::Ok,
        }
    }

    pub fn to_message(&self) -> Message {
        let msg = Message::new().with(fields::STATUS, self.status().as_str());
        match self {
            Response::Exchange { public_key } => msg
                .with(fields::CMD, Command::Exchange.as_str())
                .with(fields::SERVER_PUBLIC_KEY, public_key.clone()),
            Response::Data(envelope) => {
                with_envelope(msg.with(fields::CMD, Command::Data.as_str()), envelope)
            }
            Response::Error {
                command,
                message,
                request,
            } => {
                let mut msg = msg.with(fields::ERROR, message.as_str());
                if let Some(cmd) = command {
                    msg.insert(fields::CMD, cmd.as_str());
                }
                if let Some(echo) = request {
                    msg.insert(fields::REQUEST, echo.clone());
                }
                msg
            }
        }
    }

    pub fn from_message(msg: &Message) -> ProtocolResult<Self> {
        let status = msg
            .get_str(fields::STATUS)
            .ok_or(ProtocolError::MissingField(fields::STATUS))?;

        if Status::parse(&status)? == Status::Error {
            return Ok(Response::Error {
                command: msg.get_str(fields::CMD),
                message: msg.get_str(fields::ERROR).unwrap_or_default(),
                request: msg.get(fields::REQUEST).map(<[u8]>::to_vec),
            });
        }

        let cmd = msg.command().ok_or(ProtocolError::MissingField(fields::CMD))?;
        match Command::parse(&cmd)? {
            Command::Exchange => Ok(Response::Exchange {
                public_key: msg.require(fields::SERVER_PUBLIC_KEY)?.to_vec(),
            }),
            Command::Data => Ok(Response::Data(read_envelope(msg)?)),
        }
    }
}

fn with_envelope(msg: Message, envelope: &Envelope) -> Message {
    msg.with(fields::KEY, envelope.wrapped_key.clone())
        .with(fields::DATA, envelope.ciphertext.clone())
        .with(fields::SIGNATURE, envelope.signature.clone())
        .with(fields::DIGEST, envelope.digest.clone())
}

fn read_envelope(msg: &Message) -> ProtocolResult<Envelope> {
    Ok(Envelope {
        wrapped_key: msg.require(fields::KEY)?.to_vec(),
        ciphertext: msg.require(fields::DATA)?.to_vec(),
        signature: msg.require(fields::SIGNATURE)?.to_vec(),
        digest: msg.require(fields::DIGEST)?.to_vec(),
    })
}
