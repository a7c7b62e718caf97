use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::request_id::RequestId;

const JSONRPC_VERSION: &str = "2.0";

/// `error.{code,message,data}` carried by an Error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorDetail {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorDetail {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// One JSON-RPC 2.0 message. The presence/absence of `method`, `id`,
/// `result`, and `error` determines which variant a payload decodes to, not
/// a discriminator field.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    Request {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: RequestId,
        result: Value,
    },
    Error {
        id: RequestId,
        error: JsonRpcErrorDetail,
    },
}

impl JsonRpcMessage {
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        JsonRpcMessage::Request {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        JsonRpcMessage::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        JsonRpcMessage::Response { id, result }
    }

    pub fn error(id: RequestId, error: JsonRpcErrorDetail) -> Self {
        JsonRpcMessage::Error { id, error }
    }

    /// The request id this message correlates to, if any (absent for notifications).
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request { id, .. }
            | JsonRpcMessage::Response { id, .. }
            | JsonRpcMessage::Error { id, .. } => Some(id),
            JsonRpcMessage::Notification { .. } => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Request { method, .. } | JsonRpcMessage::Notification { method, .. } => {
                Some(method)
            }
            JsonRpcMessage::Response { .. } | JsonRpcMessage::Error { .. } => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request { .. })
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, JsonRpcMessage::Notification { .. })
    }

    pub fn is_terminal_for(&self, id: &RequestId) -> bool {
        matches!(
            self,
            JsonRpcMessage::Response { id: this, .. } | JsonRpcMessage::Error { id: this, .. }
            if this == id
        )
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("missing or invalid jsonrpc version field")]
    BadVersion,
    #[error("message has neither a method nor a result/error: cannot classify")]
    Unclassifiable,
    #[error("response carries neither result nor error")]
    EmptyResponse,
    #[error("error response is missing its `error` object")]
    MissingError,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Serialize for JsonRpcMessage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JsonRpcMessage::Request { id, method, params } => {
                let mut map = serializer.serialize_map(Some(4))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
                map.end()
            }
            JsonRpcMessage::Notification { method, params } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("method", method)?;
                if let Some(params) = params {
                    map.serialize_entry("params", params)?;
                }
                map.end()
            }
            JsonRpcMessage::Response { id, result } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("result", result)?;
                map.end()
            }
            JsonRpcMessage::Error { id, error } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("jsonrpc", JSONRPC_VERSION)?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("error", error)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // `result: Option<Value>` can't tell "key absent" from "key present
        // with value null" apart, and the wire distinguishes them (a
        // `result: null` success response is not the same as a malformed
        // response with neither `result` nor `error`). Deserialize into a
        // generic object first and check key presence before extracting.
        let value = Value::deserialize(deserializer)?;
        let mut object = match value {
            Value::Object(map) => map,
            _ => return Err(DeError::custom(CodecError::Unclassifiable)),
        };

        let jsonrpc = object.remove("jsonrpc");
        if jsonrpc.as_ref().and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(DeError::custom(CodecError::BadVersion));
        }

        let id = match object.remove("id") {
            Some(id_value) => Some(serde_json::from_value::<RequestId>(id_value).map_err(DeError::custom)?),
            None => None,
        };
        let method = match object.remove("method") {
            Some(Value::String(method)) => Some(method),
            Some(_) | None => None,
        };
        let params = object.remove("params");
        let has_result = object.contains_key("result");
        let result = object.remove("result");
        let error = match object.remove("error") {
            Some(error_value) => Some(serde_json::from_value::<JsonRpcErrorDetail>(error_value).map_err(DeError::custom)?),
            None => None,
        };

        match (method, id, error) {
            (Some(method), Some(id), _) => Ok(JsonRpcMessage::Request { id, method, params }),
            (Some(method), None, _) => Ok(JsonRpcMessage::Notification { method, params }),
            (None, Some(id), Some(error)) => Ok(JsonRpcMessage::Error { id, error }),
            (None, Some(id), None) if has_result => Ok(JsonRpcMessage::Response {
                id,
                result: result.unwrap_or(Value::Null),
            }),
            (None, Some(_), None) => Err(DeError::custom(CodecError::EmptyResponse)),
            (None, None, _) => Err(DeError::custom(CodecError::Unclassifiable)),
        }
    }
}

/// Parses one line/frame of wire bytes into a typed message.
pub fn decode(bytes: &[u8]) -> Result<JsonRpcMessage, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Serializes a message to its compact wire form.
pub fn encode(message: &JsonRpcMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}
