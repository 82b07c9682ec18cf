use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The raw `{type, data}` wrapper used for every message on a discovery
/// connection. Extra top-level keys are tolerated on decode; both `type` and
/// `data` must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl Envelope {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Result of decoding an inbound frame against a known message set.
#[derive(Debug, Clone)]
pub enum Decoded<T> {
    /// The frame carried one of the message kinds the peer understands.
    Known(T),
    /// Valid envelope, unrecognized `type`. Kept whole for logging and for
    /// error replies that name the rejected kind.
    Unknown(Envelope),
}

/// Decode `text` as a typed message when its `type` literal is in `known`,
/// falling back to the raw envelope otherwise. A frame whose `type` is known
/// but whose `data` does not fit the typed shape is a decode error, not an
/// unknown message.
pub(crate) fn decode_known<T: DeserializeOwned>(
    text: &str,
    known: &[&str],
) -> Result<Decoded<T>, serde_json::Error> {
    let envelope = Envelope::parse(text)?;
    if known.contains(&envelope.kind.as_str()) {
        serde_json::from_str::<T>(text).map(Decoded::Known)
    } else {
        Ok(Decoded::Unknown(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_round_trip_preserves_structure() {
        let envelope = Envelope::new(
            "streamList",
            json!({
                "streams": [
                    {"stream_id": "a", "title": "first"},
                    {"stream_id": "b", "title": "second"},
                ],
                "nested": {"k": [1, 2, 3]},
            }),
        );

        let text = envelope.to_text().unwrap();
        let reparsed = Envelope::parse(&text).unwrap();
        assert_eq!(reparsed, envelope);

        // Array order survives the trip.
        let streams = reparsed.data["streams"].as_array().unwrap();
        assert_eq!(streams[0]["title"], "first");
        assert_eq!(streams[1]["title"], "second");
    }

    #[test]
    fn envelope_requires_type_and_data() {
        assert!(Envelope::parse(r#"{"type":"ping"}"#).is_err());
        assert!(Envelope::parse(r#"{"data":{}}"#).is_err());
        assert!(Envelope::parse(r#"{"type":"ping","data":{}}"#).is_ok());
    }

    #[test]
    fn envelope_tolerates_extra_keys() {
        let parsed =
            Envelope::parse(r#"{"type":"ping","data":{},"trace_id":"abc"}"#).unwrap();
        assert_eq!(parsed.kind, "ping");
    }
}
