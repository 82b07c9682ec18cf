use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::{decode_known, Decoded};

/// Requests a client may send to the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Opening exchange; associates the connection with a role such as
    /// `"viewer"` or `"streamer"` for the rest of its lifetime.
    Handshake { node_type: String },
    /// Ask for the current stream catalog. Empty payload.
    RequestStreamList {},
    /// Publish a stream into the catalog.
    CreateStream {
        title: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        quality: Option<String>,
    },
    /// Withdraw a previously published stream.
    StopStream { stream_id: String },
    /// Liveness probe. Empty payload.
    Ping {},
}

impl ClientMessage {
    /// `type` literals this enum understands, matching the serde rename of
    /// each variant.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "handshake",
        "requestStreamList",
        "createStream",
        "stopStream",
        "ping",
    ];

    pub fn decode(text: &str) -> Result<Decoded<Self>, serde_json::Error> {
        decode_known(text, Self::KNOWN_TYPES)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Responses and pushes the discovery endpoint sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    HandshakeResponse {
        success: bool,
        client_id: String,
        node_id: String,
        message: String,
    },
    /// Current catalog, insertion-ordered. Sent in reply to
    /// `requestStreamList` and pushed to every handshaken connection when the
    /// catalog changes.
    StreamList { streams: Vec<StreamDescriptor> },
    CreateStreamResponse {
        success: bool,
        stream_id: String,
        title: String,
        message: String,
    },
    StopStreamResponse {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stream_id: Option<String>,
        message: String,
    },
    /// Reply to `ping`; unix milliseconds.
    Pong { timestamp: i64 },
    Error { message: String },
}

impl ServerMessage {
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "handshakeResponse",
        "streamList",
        "createStreamResponse",
        "stopStreamResponse",
        "pong",
        "error",
    ];

    pub fn decode(text: &str) -> Result<Decoded<Self>, serde_json::Error> {
        decode_known(text, Self::KNOWN_TYPES)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One catalog entry. `creator` is the client id recorded at registration;
/// `viewers` stays zero until playback sessions exist to count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub stream_id: String,
    pub title: String,
    pub creator: String,
    pub quality: String,
    pub viewers: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
