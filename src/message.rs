
use std::sync::Arc;

use derive_ex::derive_ex;
use ordered_float::OrderedFloat;
use parse_display::Display;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::{Error, Result};

/// Correlation id carried by a request and echoed back by its response.
///
/// Outgoing ids are always strings, but servers may legally answer with any
/// JSON-RPC id form, so decoding accepts numbers as well.
#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[derive_ex(Eq, PartialEq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    #[display("{0}")]
    Number(i64),
    #[display("{0}")]
    Float(#[eq(key = OrderedFloat($))] f64),
    #[display("{0}")]
    String(String),
}

impl RequestId {
    pub(crate) fn from_seq(seq: u64) -> Self {
        RequestId::String(seq.to_string())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_string())
    }
}

/// Call arguments: positional (`Array`) or named (`Map`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Array(Vec<Value>),
    Map(Map<String, Value>),
}

impl Params {
    /// Converts caller-supplied arguments to wire params.
    ///
    /// JSON-RPC only permits structured params. `null` means "no params";
    /// anything serializing to another scalar is rejected before it reaches
    /// the transport.
    pub(crate) fn from_serialize<T>(params: Option<&T>) -> Result<Option<Self>>
    where
        T: Serialize + ?Sized,
    {
        let Some(params) = params else {
            return Ok(None);
        };
        let value = serde_json::to_value(params).map_err(|e| Error::Serialize(Arc::new(e)))?;
        match value {
            Value::Null => Ok(None),
            Value::Array(items) => Ok(Some(Params::Array(items))),
            Value::Object(members) => Ok(Some(Params::Map(members))),
            _ => Err(Error::ParamsNotStructured),
        }
    }
}

/// Single JSON-RPC 2.0 envelope as it appears on the wire.
#[derive(Debug, Serialize, Deserialize)]
pub struct RawMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(
        default,
        deserialize_with = "some_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

/// Keeps `"result": null` (a legal success) distinguishable from an absent
/// result member.
fn some_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Default for RawMessage {
    fn default() -> Self {
        RawMessage {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: None,
            params: None,
            result: None,
            error: None,
        }
    }
}

impl RawMessage {
    pub fn request(id: RequestId, method: &str, params: Option<Params>) -> Self {
        Self {
            id: Some(id),
            method: Some(method.to_string()),
            params,
            ..Self::default()
        }
    }

    pub fn notification(method: &str, params: Option<Params>) -> Self {
        Self {
            method: Some(method.to_string()),
            params,
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialize(Arc::new(e)))
    }

    pub(crate) fn try_into_response(self) -> Result<Response> {
        if self.jsonrpc != "2.0" {
            return Err(Error::Version(self.jsonrpc));
        }
        match (self.id, self.result, self.error) {
            (Some(id), Some(result), None) => Ok(Response {
                id,
                outcome: Outcome::Success(result),
            }),
            (Some(id), None, Some(error)) => Ok(Response {
                id,
                outcome: Outcome::Error(error),
            }),
            _ => Err(Error::MessageStructure),
        }
    }
}

pub(crate) fn decode_response(text: &str) -> Result<Response> {
    let message: RawMessage =
        serde_json::from_str(text).map_err(|e| Error::Decode(Arc::new(e)))?;
    message.try_into_response()
}

/// Outcome of a call, exactly one of result or error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Error(ErrorObject),
}

/// Decoded response to a single call.
///
/// An error outcome is delivered the same way a success is; nothing is
/// raised on the caller's control path.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: RequestId,
    pub outcome: Outcome,
}

impl Response {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn error(&self) -> Option<&ErrorObject> {
        match &self.outcome {
            Outcome::Error(error) => Some(error),
            Outcome::Success(_) => None,
        }
    }

    /// Deserializes the success payload, turning an error outcome into
    /// [`Error::ErrorObject`].
    pub fn result<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        match &self.outcome {
            Outcome::Success(value) => {
                T::deserialize(value).map_err(|e| Error::ResultParse(Arc::new(e)))
            }
            Outcome::Error(error) => Err(Error::ErrorObject(error.clone())),
        }
    }
}

/// Error member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[display("{code} {message}")]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const SERVER_ERROR_START: i64 = -32000;
    pub const SERVER_ERROR_END: i64 = -32099;
}
