//! Wire framing.
//!
//! Every message in either direction is a JSON array whose first element names
//! the message type and whose optional second element carries the payload:
//!
//! ```text
//! client -> server   ["request", {"id": 1, "method": "simulateTransaction", "params": {...}}]
//! client -> server   ["pong"]
//! server -> client   ["ping"]
//! server -> client   ["response", {"id": 1, "result": {...}}]
//! server -> client   ["event", {...}]
//! ```

use serde::ser::SerializeSeq as _;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::WsError;

pub const PING: &str = "ping";
pub const PONG: &str = "pong";
pub const REQUEST: &str = "request";
pub const RESPONSE: &str = "response";
pub const EVENT: &str = "event";

/// Request id reserved for fire-and-forget sends.
pub const NOTIFICATION_ID: u64 = 0;

/// Outbound application call.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    #[must_use]
    pub fn new<M: Into<String>>(id: u64, method: M, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// A request the server is not expected to answer.
    #[must_use]
    pub fn notification<M: Into<String>>(method: M, params: Value) -> Self {
        Self::new(NOTIFICATION_ID, method, params)
    }

    #[must_use]
    pub const fn expects_response(&self) -> bool {
        self.id != NOTIFICATION_ID
    }
}

/// Frames the client writes to the socket.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundFrame {
    Pong,
    Request(RpcRequest),
}

impl OutboundFrame {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Pong => PONG,
            Self::Request(_) => REQUEST,
        }
    }

    pub fn encode(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(WsError::MessageParse)
    }
}

impl Serialize for OutboundFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Pong => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(PONG)?;
                seq.end()
            }
            Self::Request(request) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(REQUEST)?;
                seq.serialize_element(request)?;
                seq.end()
            }
        }
    }
}

/// A decoded inbound frame: its type tag and payload (`Null` when absent).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct InboundFrame {
    pub kind: String,
    pub payload: Value,
}

impl InboundFrame {
    /// Decode `[type, payload?, ...]`. Elements past the payload are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, WsError> {
        let value: Value = serde_json::from_slice(bytes).map_err(WsError::MessageParse)?;

        let elements = match value {
            Value::Array(elements) => elements,
            other => {
                return Err(WsError::InvalidMessage(format!(
                    "expected a JSON array frame, got {other}"
                )));
            }
        };

        let mut elements = elements.into_iter();
        let kind = match elements.next() {
            Some(Value::String(kind)) => kind,
            Some(other) => {
                return Err(WsError::InvalidMessage(format!(
                    "frame type must be a string, got {other}"
                )));
            }
            None => return Err(WsError::InvalidMessage("empty frame".to_owned())),
        };

        Ok(Self {
            kind,
            payload: elements.next().unwrap_or(Value::Null),
        })
    }

    #[must_use]
    pub fn is_ping(&self) -> bool {
        self.kind == PING
    }
}

/// Parsed `response` payload.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct RpcResponse {
    pub id: u64,
    /// `Ok(result)` or `Err(error)`, both exactly as sent by the server.
    pub outcome: Result<Value, Value>,
}

impl RpcResponse {
    /// Accepts `{id, result}` or `{id, error}`; `error` wins when both are present.
    pub fn parse(payload: Value) -> Result<Self, WsError> {
        let mut fields = match payload {
            Value::Object(fields) => fields,
            other => {
                return Err(WsError::InvalidMessage(format!(
                    "response payload must be an object, got {other}"
                )));
            }
        };

        let id = Self::read_id(&fields)?;

        let outcome = if let Some(error) = fields.remove("error") {
            Err(error)
        } else if let Some(result) = fields.remove("result") {
            Ok(result)
        } else {
            return Err(WsError::InvalidMessage(format!(
                "response {id} carries neither result nor error"
            )));
        };

        Ok(Self { id, outcome })
    }

    fn read_id(fields: &Map<String, Value>) -> Result<u64, WsError> {
        fields
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| WsError::InvalidMessage("response without a numeric id".to_owned()))
    }
}
