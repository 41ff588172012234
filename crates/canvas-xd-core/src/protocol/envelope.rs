//! Request/response envelopes (JSON).
//!
//! Wire shapes, kept compatible with existing host pages:
//! - request:  `{ "seq": 7, "body": { "type": "ctx" | "ajax", "accessToken": ..., ... } }`
//! - response: `{ "seq": 7, "status": 200, "payload": ... }`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, XdError};

/// Correlation id linking a request envelope to its response.
pub type Sequence = u32;

/// Status carried by the session-expiry sentinel.
pub const STATUS_UNAUTHORIZED: u16 = 401;

/// Error code carried by the session-expiry sentinel.
pub const INVALID_SESSION_ID: &str = "INVALID_SESSION_ID";

/// Outbound envelope (canvas -> host).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub seq: Sequence,
    pub body: RequestBody,
}

impl RequestEnvelope {
    pub fn new(seq: Sequence, body: RequestBody) -> Self {
        Self { seq, body }
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| XdError::Internal(format!("request encode failed: {e}")))
    }

    pub fn from_value(v: &Value) -> Result<Self> {
        Self::deserialize(v)
            .map_err(|e| XdError::BadRequest(format!("invalid request envelope: {e}")))
    }
}

/// Request body, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestBody {
    /// Context query for the current user/organization.
    Ctx {
        #[serde(rename = "accessToken", default)]
        access_token: Option<String>,
    },
    /// HTTP call proxied by the host page.
    Ajax {
        #[serde(rename = "accessToken", default)]
        access_token: Option<String>,
        url: String,
        config: ProxyConfig,
    },
}

impl RequestBody {
    /// Wire tag (`ctx` / `ajax`).
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Ctx { .. } => "ctx",
            RequestBody::Ajax { .. } => "ajax",
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        match self {
            RequestBody::Ctx { access_token } | RequestBody::Ajax { access_token, .. } => {
                access_token.as_deref()
            }
        }
    }
}

/// Serializable part of a proxied HTTP call. Callbacks never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub method: String,
    #[serde(rename = "async")]
    pub is_async: bool,
    pub content_type: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Inbound envelope (host -> canvas).
///
/// Every field is optional on decode: the host is another origin and a
/// response without a usable `seq` is simply unmatched, not fatal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<Sequence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default)]
    pub payload: Value,
}

impl ResponseEnvelope {
    pub fn new(seq: Sequence, status: u16, payload: Value) -> Self {
        Self {
            seq: Some(seq),
            status: Some(status),
            payload,
        }
    }

    /// The 401 response a host sends when the access token is no longer valid.
    pub fn invalid_session(seq: Sequence) -> Self {
        Self::new(
            seq,
            STATUS_UNAUTHORIZED,
            serde_json::json!([{
                "errorCode": INVALID_SESSION_ID,
                "message": "Session expired or invalid",
            }]),
        )
    }

    pub fn from_value(v: &Value) -> Result<Self> {
        Self::deserialize(v)
            .map_err(|e| XdError::BadRequest(format!("invalid response envelope: {e}")))
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| XdError::Internal(format!("response encode failed: {e}")))
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

/// Detect the session-expiry sentinel on raw inbound data.
///
/// Works on the undecoded value so a response with a missing or malformed
/// `seq` still invalidates the session.
pub fn is_session_expired(data: &Value) -> bool {
    let unauthorized = data
        .get("status")
        .and_then(Value::as_f64)
        .is_some_and(|s| s == f64::from(STATUS_UNAUTHORIZED));
    if !unauthorized {
        return false;
    }
    data.get("payload")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|first| first.get("errorCode"))
        .and_then(Value::as_str)
        == Some(INVALID_SESSION_ID)
}
