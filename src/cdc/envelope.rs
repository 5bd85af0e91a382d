// CDC Envelope Decoding

use crate::error::DecodeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// Generic document carried in `before`/`after` and `source`.
pub type Document = Map<String, Value>;

/// Top-level message received from the broker.
///
/// Both halves are kept as raw JSON; the payload is parsed on demand.
#[derive(Debug, Deserialize)]
pub struct ChangeEnvelope {
    /// Connector schema description (unused)
    #[serde(default)]
    pub schema: Option<Box<RawValue>>,
    /// Raw change payload
    pub payload: Box<RawValue>,
}

impl ChangeEnvelope {
    /// Parses the outer envelope from message bytes.
    ///
    /// Only a JSON object is an envelope; serde would otherwise accept an
    /// array in field order.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        match first_token(bytes) {
            Some(b'[') => Err(DecodeError::EnvelopeNotObject("array")),
            _ => serde_json::from_slice(bytes).map_err(DecodeError::Envelope),
        }
    }

    /// Parses the payload half of the envelope
    pub fn payload(&self) -> Result<ChangePayload, DecodeError> {
        let raw = self.payload.get();
        match first_token(raw.as_bytes()) {
            Some(b'{') => serde_json::from_str(raw).map_err(DecodeError::Payload),
            Some(b'[') => Err(DecodeError::PayloadNotObject("array")),
            Some(b'"') => Err(DecodeError::PayloadNotObject("string")),
            Some(b'n') => Err(DecodeError::PayloadNotObject("null")),
            Some(b't') | Some(b'f') => Err(DecodeError::PayloadNotObject("boolean")),
            _ => Err(DecodeError::PayloadNotObject("number")),
        }
    }
}

fn first_token(json: &[u8]) -> Option<u8> {
    json.iter().copied().find(|b| !b.is_ascii_whitespace())
}

/// Reads a nullable string, mapping `null` to the empty string
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parsed change event payload
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePayload {
    /// Row image before the change, kept raw until canonicalization
    #[serde(default)]
    pub before: Option<Box<RawValue>>,
    /// Row image after the change, kept raw until canonicalization
    #[serde(default)]
    pub after: Option<Box<RawValue>>,
    /// Connector source block (`db`, `table`, `file`, `pos`, ...)
    #[serde(default)]
    pub source: Option<Document>,
    /// Operation code; absent or null reads as empty
    #[serde(default, deserialize_with = "null_as_empty")]
    pub op: String,
    /// Event time in epoch milliseconds
    #[serde(default)]
    pub ts_ms: Option<i64>,
    /// Transaction block, when the connector emits one
    #[serde(default)]
    pub transaction: Option<Document>,
}

impl ChangePayload {
    /// Gets the operation
    pub fn operation(&self) -> Operation {
        Operation::from_code(&self.op)
    }

    /// Gets a field of the source block
    pub fn source_field(&self, key: &str) -> Option<&Value> {
        self.source.as_ref().and_then(|s| s.get(key))
    }

    /// Gets a string field of the source block
    pub fn source_str(&self, key: &str) -> Option<&str> {
        self.source_field(key).and_then(Value::as_str)
    }

    /// Gets the transaction id, if the transaction block carries a string id
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction
            .as_ref()
            .and_then(|t| t.get("id"))
            .and_then(Value::as_str)
    }
}

/// Canonical operation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Row inserted (`c`)
    Create,
    /// Row updated (`u`)
    Update,
    /// Row deleted (`d`)
    Delete,
    /// Snapshot read (`r`)
    Read,
    /// Unknown code, passed through unchanged
    Other(String),
}

impl Operation {
    /// Maps a connector operation code
    pub fn from_code(code: &str) -> Self {
        match code {
            "c" => Operation::Create,
            "u" => Operation::Update,
            "d" => Operation::Delete,
            "r" => Operation::Read,
            other => Operation::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Read => "read",
            Operation::Other(code) => code,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Decodes raw message bytes into a change payload
pub fn decode(bytes: &[u8]) -> Result<ChangePayload, DecodeError> {
    ChangeEnvelope::from_slice(bytes)?.payload()
}
