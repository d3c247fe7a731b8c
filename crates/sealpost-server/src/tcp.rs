use std::sync::Arc;

use bytes::BytesMut;
use sealpost_crypto::keys::fingerprint;
use sealpost_protocol::message::fields;
use sealpost_protocol::{read_message, write_message, Command, Message, Responder, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, info_span, warn, Instrument};

use crate::state::{ServerState, SessionId};

pub const SERVER_FULL: &str = "server full";
pub const RATE_LIMITED: &str = "rate limit exceeded";

/// Handle a single client connection (already TLS-wrapped in production).
pub async fn handle_connection<S>(mut stream: S, peer_addr: String, state: Arc<ServerState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let Some(session_id) = state.open_session(&peer_addr) else {
        warn!(peer = %peer_addr, max = state.max_sessions, "rejecting connection: server full");
        let refusal = Response::Error {
            command: None,
            message: SERVER_FULL.into(),
            request: None,
        };
        let _ = write_message(&mut stream, &refusal.to_message()).await;
        return;
    };

    let span = info_span!("session", session_id, peer = %peer_addr);
    serve(&mut stream, session_id, &state).instrument(span).await;

    if let Some(info) = state.close_session(session_id) {
        info!(
            session_id,
            peer = %peer_addr,
            requests = info.requests,
            client_key = info.peer_fingerprint.as_deref().unwrap_or("-"),
            duration = ?info.connected_at.elapsed(),
            "session closed"
        );
    }
}

/// Request loop for one session. Returns when the client disconnects, goes
/// idle past the request timeout, or the stream fails.
async fn serve<S>(stream: &mut S, session_id: SessionId, state: &Arc<ServerState>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    info!(active = state.session_count(), "session opened");

    let mut responder = Responder::new(state.keys.clone(), state.handler.clone());
    let mut data_rate = state.data_rate_limiter();
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let request = match tokio::time::timeout(
            state.request_timeout,
            read_message(stream, &mut buf),
        )
        .await
        {
            Ok(Ok(Some(request))) => request,
            Ok(Ok(None)) => {
                info!("client disconnected (EOF)");
                break;
            }
            Ok(Err(e)) => {
                warn!("read failed: {}", e);
                break;
            }
            Err(_) => {
                info!(timeout = ?state.request_timeout, "client idle, closing");
                break;
            }
        };

        let response = if is_data(&request) && !data_rate.try_consume() {
            warn!("data request rate limited");
            rate_limited(&request)
        } else {
            // RSA work stays off the async workers
            let span = tracing::Span::current();
            let task = tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                let response = responder.respond(&request);
                (responder, response)
            });
            match task.await {
                Ok((returned, response)) => {
                    responder = returned;
                    response
                }
                Err(e) => {
                    error!("responder task failed: {}", e);
                    break;
                }
            }
        };

        state.record_request(
            session_id,
            responder.binding().remote().map(fingerprint),
        );

        if let Err(e) = write_message(stream, &response).await {
            warn!("write failed: {}", e);
            break;
        }
    }
}

fn is_data(request: &Message) -> bool {
    request.command().as_deref() == Some(Command::Data.as_str())
}

fn rate_limited(request: &Message) -> Message {
    Response::Error {
        command: request.get_str(fields::CMD),
        message: RATE_LIMITED.into(),
        request: None,
    }
    .to_message()
}
