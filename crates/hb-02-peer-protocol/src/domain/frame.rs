//! # Wire Frames
//!
//! Every frame is a JSON object holding exactly one of `capability`,
//! `request`, `response` or `announce`, plus an optional integer `nonce`.
//! The payload key is the discriminant. Decoding goes through
//! `serde_json::Value` so map keys such as protocol ids parse as integers.

use super::capability::Capability;
use super::errors::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{Hostname, RequestKind, SearchResult};

/// Payload key names, as they appear on the wire.
pub mod payload_kind {
    pub const CAPABILITY: &str = "capability";
    pub const REQUEST: &str = "request";
    pub const RESPONSE: &str = "response";
    pub const ANNOUNCE: &str = "announce";
}

const PAYLOAD_KEYS: [&str; 4] = [
    payload_kind::CAPABILITY,
    payload_kind::REQUEST,
    payload_kind::RESPONSE,
    payload_kind::ANNOUNCE,
];
const NONCE_KEY: &str = "nonce";

/// One decoded wire message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
}

/// The four message kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Capability(Capability),
    Request(RequestMessage),
    /// Result records, decoded later against the kind of the matching request.
    Response(Vec<serde_json::Value>),
    Announce(AnnounceMessage),
}

impl Payload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::Capability(_) => payload_kind::CAPABILITY,
            Payload::Request(_) => payload_kind::REQUEST,
            Payload::Response(_) => payload_kind::RESPONSE,
            Payload::Announce(_) => payload_kind::ANNOUNCE,
        }
    }
}

/// A search query sent to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMessage {
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub query: String,
}

/// Advertisement of a newly connected peer's dial-able hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceMessage {
    pub hostname: Hostname,
}

impl Frame {
    pub fn capability(capability: Capability) -> Self {
        Self {
            payload: Payload::Capability(capability),
            nonce: None,
        }
    }

    pub fn request(nonce: u64, kind: RequestKind, query: impl Into<String>) -> Self {
        Self {
            payload: Payload::Request(RequestMessage {
                kind,
                query: query.into(),
            }),
            nonce: Some(nonce),
        }
    }

    pub fn response(nonce: u64, results: &[SearchResult]) -> Result<Self, ProtocolError> {
        let values = results
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Self {
            payload: Payload::Response(values),
            nonce: Some(nonce),
        })
    }

    pub fn announce(hostname: Hostname) -> Self {
        Self {
            payload: Payload::Announce(AnnounceMessage { hostname }),
            nonce: None,
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Decode a frame, rejecting anything but exactly one payload key.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let malformed = |e: serde_json::Error| ProtocolError::MalformedFrame(e.to_string());
        let Value::Object(mut object) = serde_json::from_str::<Value>(text).map_err(malformed)? else {
            return Err(ProtocolError::MalformedFrame("frame is not an object".to_string()));
        };

        let nonce = match object.remove(NONCE_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value::<u64>(value).map_err(malformed)?),
        };

        let present: Vec<&'static str> = PAYLOAD_KEYS
            .into_iter()
            .filter(|key| object.contains_key(*key))
            .collect();
        let key = match present.as_slice() {
            [key] => *key,
            [] => {
                return Err(ProtocolError::MalformedFrame("no payload key".to_string()));
            }
            [first, second, ..] => {
                return Err(ProtocolError::MalformedFrame(format!(
                    "more than one payload key: {first}, {second}"
                )));
            }
        };

        let mut tagged = Map::new();
        if let Some((key, value)) = object.remove_entry(key) {
            tagged.insert(key, value);
        }
        let payload = serde_json::from_value(Value::Object(tagged)).map_err(malformed)?;
        Ok(Self { payload, nonce })
    }

    /// Nonce of a request or response frame.
    pub fn required_nonce(&self) -> Result<u64, ProtocolError> {
        self.nonce
            .ok_or(ProtocolError::MissingNonce(self.payload.kind_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::metadata::fixtures::track;

    #[test]
    fn test_request_wire_shape() {
        let frame = Frame::request(7, RequestKind::Track, "Blue");
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "request": { "type": "track", "query": "Blue" }, "nonce": 7 })
        );
    }

    #[test]
    fn test_announce_has_no_nonce() {
        let frame = Frame::announce(Hostname::parse("ws://10.0.0.2:3000").unwrap());
        let value: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(value, json!({ "announce": { "hostname": "ws://10.0.0.2:3000" } }));
    }

    #[test]
    fn test_decode_dispatches_on_key() {
        let frame = Frame::decode(r#"{"response":[{"id":"1"}],"nonce":3}"#).unwrap();
        assert_eq!(frame.nonce, Some(3));
        assert!(matches!(frame.payload, Payload::Response(ref v) if v.len() == 1));

        let frame = Frame::decode(
            r#"{"capability":{"userAgent":"x","protocolVersions":{"1":1},"plugins":[]}}"#,
        )
        .unwrap();
        assert_eq!(frame.payload.kind_name(), "capability");
        assert_eq!(frame.nonce, None);
    }

    #[test]
    fn test_each_payload_survives_the_wire() {
        let hostname = Hostname::parse("ws://10.0.0.2:3000").unwrap();
        let frames = [
            Frame::capability(Capability::local(vec!["itunes".to_string()])),
            Frame::request(0, RequestKind::Artist, "Blue"),
            Frame::response(4, &[track("itunes", "1", "Song")]).unwrap(),
            Frame::announce(hostname),
        ];
        for frame in frames {
            assert_eq!(Frame::decode(&frame.encode().unwrap()).unwrap(), frame);
        }
    }

    #[test]
    fn test_capability_protocol_ids_parse_from_string_keys() {
        let frame = Frame::decode(
            r#"{"capability":{"userAgent":"x","protocolVersions":{"1":1,"4":2},"plugins":["p"]}}"#,
        )
        .unwrap();
        let Payload::Capability(capability) = frame.payload else {
            panic!("expected capability, got {}", frame.payload.kind_name());
        };
        assert!(capability.supports_protocol(1, 1));
        assert!(capability.supports_protocol(4, 2));
        assert!(!capability.supports_protocol(2, 1));
    }

    #[test]
    fn test_decode_rejects_more_than_one_payload() {
        let result = Frame::decode(
            r#"{"request":{"type":"track","query":"x"},"announce":{"hostname":"ws://a:1"},"nonce":1}"#,
        );
        assert!(matches!(result, Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed() {
        assert!(Frame::decode(r#"{"hello":{}}"#).is_err());
        assert!(Frame::decode("not json").is_err());
        assert!(Frame::decode("[1, 2]").is_err());
        assert!(Frame::decode(r#"{"announce":{"hostname":"ws://a:1"},"nonce":"x"}"#).is_err());
        assert!(Frame::decode(r#"{"request":{"type":"song","query":"x"},"nonce":1}"#).is_err());
    }

    #[test]
    fn test_announce_requires_ws_scheme() {
        assert!(Frame::decode(r#"{"announce":{"hostname":"http://10.0.0.2:3000"}}"#).is_err());
    }

    #[test]
    fn test_required_nonce() {
        let frame = Frame::decode(r#"{"request":{"type":"album","query":"x"}}"#).unwrap();
        assert_eq!(
            frame.required_nonce(),
            Err(ProtocolError::MissingNonce("request"))
        );
    }
}
