//! The viewer discovery session: one connection, a handshake, then the
//! stream catalog. Strictly sequential, one request in flight at a time;
//! the first failure of any kind ends the session.

use std::time::Duration;

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use shoal_proto::{ClientMessage, Envelope};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Everything that can end a discovery session early, one variant per
/// failing phase.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },
    #[error("failed to send {what}: {reason}")]
    SendFailed { what: &'static str, reason: String },
    #[error("failed to receive {what}: {reason}")]
    RecvFailed { what: &'static str, reason: String },
    #[error("failed to decode {what}: {reason}")]
    DecodeFailed { what: &'static str, reason: String },
}

/// How a completed session ended.
#[derive(Debug)]
pub enum DiscoveryOutcome {
    /// Handshake acknowledged and a catalog received. Descriptors stay raw
    /// JSON: their shape belongs to the endpoint, not this client.
    Streams(Vec<Value>),
    /// The endpoint answered the handshake with something other than
    /// `handshakeResponse`. No stream list request was sent.
    Declined { response: Envelope },
}

/// Run one discovery session against `url` (the beacon base URL; `/ws` is
/// appended), announcing `node_type` in the handshake. Each network step is
/// bounded by `deadline`.
pub async fn discover(
    url: &str,
    node_type: &str,
    deadline: Duration,
) -> Result<DiscoveryOutcome, DiscoveryError> {
    let ws_url = format!("{}/ws", url.trim_end_matches('/'));
    debug!(url = %ws_url, node_type = %node_type, "starting discovery session");

    let (ws_stream, _) = match timeout(deadline, connect_async(&ws_url)).await {
        Ok(Ok(connected)) => connected,
        Ok(Err(err)) => {
            return Err(DiscoveryError::ConnectFailed {
                url: ws_url,
                reason: err.to_string(),
            })
        }
        Err(_) => {
            return Err(DiscoveryError::ConnectFailed {
                url: ws_url,
                reason: "connection timed out".to_string(),
            })
        }
    };
    let (mut write, mut read) = ws_stream.split();

    let handshake = ClientMessage::Handshake {
        node_type: node_type.to_string(),
    };
    send_message(&mut write, "handshake", &handshake).await?;

    let reply = recv_envelope(&mut read, "handshake response", deadline).await?;
    if reply.kind != "handshakeResponse" {
        debug!(kind = %reply.kind, "handshake not acknowledged");
        let _ = write.send(Message::Close(None)).await;
        return Ok(DiscoveryOutcome::Declined { response: reply });
    }

    send_message(
        &mut write,
        "stream list request",
        &ClientMessage::RequestStreamList {},
    )
    .await?;

    // The catalog reply's `type` literal is the endpoint's to choose; only
    // `data.streams` is required.
    let catalog = recv_envelope(&mut read, "stream list", deadline).await?;
    let streams = catalog
        .data
        .get("streams")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| DiscoveryError::DecodeFailed {
            what: "stream list",
            reason: format!("missing data.streams array in \"{}\" reply", catalog.kind),
        })?;

    let _ = write.send(Message::Close(None)).await;
    Ok(DiscoveryOutcome::Streams(streams))
}

async fn send_message(
    write: &mut WsWriter,
    what: &'static str,
    message: &ClientMessage,
) -> Result<(), DiscoveryError> {
    let text = message
        .to_text()
        .map_err(|err| DiscoveryError::SendFailed {
            what,
            reason: err.to_string(),
        })?;
    write
        .send(Message::Text(text.into()))
        .await
        .map_err(|err| DiscoveryError::SendFailed {
            what,
            reason: err.to_string(),
        })
}

/// Read frames until a text envelope arrives; control frames are skipped.
async fn recv_envelope(
    read: &mut WsReader,
    what: &'static str,
    deadline: Duration,
) -> Result<Envelope, DiscoveryError> {
    loop {
        let frame = timeout(deadline, read.next())
            .await
            .map_err(|_| DiscoveryError::RecvFailed {
                what,
                reason: "timed out".to_string(),
            })?
            .ok_or_else(|| DiscoveryError::RecvFailed {
                what,
                reason: "connection closed".to_string(),
            })?
            .map_err(|err| DiscoveryError::RecvFailed {
                what,
                reason: err.to_string(),
            })?;

        match frame {
            Message::Text(text) => {
                return Envelope::parse(&text).map_err(|err| DiscoveryError::DecodeFailed {
                    what,
                    reason: err.to_string(),
                })
            }
            Message::Close(_) => {
                return Err(DiscoveryError::RecvFailed {
                    what,
                    reason: "connection closed".to_string(),
                })
            }
            _ => continue,
        }
    }
}
