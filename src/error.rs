use std::sync::Arc;

use super::{ErrorObject, RequestId};

/// Failures surfaced by client operations.
///
/// Only the outbound path raises: send and serialization failures reach the
/// caller that issued the operation. Inbound anomalies (malformed text,
/// unmatched ids) have no caller context and are logged by the dispatch loop
/// instead. A response that carries a JSON-RPC error object is not a failure
/// at all: it is delivered as an ordinary outcome, and only the explicit
/// [`Response::result`](crate::Response::result) conversion turns it into
/// [`Error::ErrorObject`].
///
/// Shared causes are wrapped in [`Arc`] so one teardown error can be
/// delivered to every in-flight call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("call failed: {0}")]
    ErrorObject(ErrorObject),
    #[error("transport i/o failed: {0}")]
    Io(Arc<std::io::Error>),
    #[error("cannot serialize message: {0}")]
    Serialize(Arc<serde_json::Error>),
    #[error("params must serialize to an array or an object")]
    ParamsNotStructured,
    #[error("inbound text is not valid json: {0}")]
    Decode(Arc<serde_json::Error>),
    #[error("unsupported protocol version {0:?}")]
    Version(String),
    #[error("message is not a response")]
    MessageStructure,
    #[error("request id {0} is already in flight")]
    DuplicateRequestId(RequestId),
    #[error("cannot parse result: {0}")]
    ResultParse(Arc<serde_json::Error>),
    #[error("call timed out")]
    Timeout,
    #[error("connection closed")]
    Shutdown,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
