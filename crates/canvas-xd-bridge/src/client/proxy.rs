//! Proxied HTTP call settings and their merge over defaults.

use std::collections::BTreeMap;

use serde_json::Value;

use canvas_xd_core::protocol::envelope::{ProxyConfig, ResponseEnvelope};

use crate::config::ProxyDefaults;
use crate::correlation::ResponseHandler;

pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_ACCEPT: &str = "Accept";

/// Serializable request options. Unset fields take the defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProxyRequest {
    /// Token for this call; falls back to the session token.
    pub token: Option<String>,
    pub method: Option<String>,
    pub is_async: Option<bool>,
    pub content_type: Option<String>,
    /// Merged key by key over the default headers.
    pub headers: BTreeMap<String, String>,
    pub data: Option<Value>,
}

impl ProxyRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn blocking(mut self) -> Self {
        self.is_async = Some(false);
        self
    }
}

/// Callback-style settings: request options plus the handlers, which stay
/// on this side of the transport.
#[derive(Default)]
pub struct ProxySettings {
    pub request: ProxyRequest,
    pub success: Option<ResponseHandler>,
    pub failure: Option<ResponseHandler>,
}

impl ProxySettings {
    pub fn new(request: ProxyRequest) -> Self {
        Self {
            request,
            success: None,
            failure: None,
        }
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ResponseEnvelope) + Send + 'static,
    {
        self.success = Some(Box::new(f));
        self
    }

    /// Receives non-2xx responses instead of the success handler.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ResponseEnvelope) + Send + 'static,
    {
        self.failure = Some(Box::new(f));
        self
    }
}

/// Merge `req` over the defaults. `token` is the effective access token.
pub fn merge_config(
    defaults: &ProxyDefaults,
    token: Option<&str>,
    req: &ProxyRequest,
) -> ProxyConfig {
    let mut headers = BTreeMap::new();
    if let Some(t) = token {
        headers.insert(
            HEADER_AUTHORIZATION.to_string(),
            format!("{} {}", defaults.authorization_scheme, t),
        );
    }
    headers.insert(HEADER_ACCEPT.to_string(), defaults.accept.clone());
    for (k, v) in &req.headers {
        headers.insert(k.clone(), v.clone());
    }

    ProxyConfig {
        method: req.method.clone().unwrap_or_else(|| "GET".into()),
        is_async: req.is_async.unwrap_or(true),
        content_type: req
            .content_type
            .clone()
            .unwrap_or_else(|| defaults.content_type.clone()),
        headers,
        data: req.data.clone(),
    }
}

/// Route non-2xx responses to `failure` when one was supplied.
pub(crate) fn compose_handlers(
    success: ResponseHandler,
    failure: Option<ResponseHandler>,
) -> ResponseHandler {
    match failure {
        None => success,
        Some(failure) => Box::new(move |resp: ResponseEnvelope| {
            if resp.is_success() {
                success(resp)
            } else {
                failure(resp)
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn defaults_fill_unset_fields() {
        let cfg = merge_config(&ProxyDefaults::default(), Some("tok"), &ProxyRequest::new());
        assert_eq!(cfg.method, "GET");
        assert!(cfg.is_async);
        assert_eq!(cfg.content_type, "application/json");
        assert_eq!(cfg.headers["Authorization"], "OAuth tok");
        assert_eq!(cfg.headers["Accept"], "application/json");
        assert_eq!(cfg.data, None);
    }

    #[test]
    fn caller_headers_merge_by_key() {
        let req = ProxyRequest::new()
            .method("PATCH")
            .header("Accept", "text/csv")
            .header("X-Trace", "1");
        let cfg = merge_config(&ProxyDefaults::default(), Some("tok"), &req);
        assert_eq!(cfg.method, "PATCH");
        assert_eq!(cfg.headers["Accept"], "text/csv");
        assert_eq!(cfg.headers["X-Trace"], "1");
        assert_eq!(cfg.headers["Authorization"], "OAuth tok");
    }

    #[test]
    fn no_token_means_no_authorization_header() {
        let cfg = merge_config(&ProxyDefaults::default(), None, &ProxyRequest::new());
        assert!(!cfg.headers.contains_key("Authorization"));
    }

    #[test]
    fn serialized_config_has_only_wire_fields() {
        let req = ProxyRequest::new().data(json!({"q": 1}));
        let cfg = merge_config(&ProxyDefaults::default(), Some("t"), &req);
        let v = serde_json::to_value(cfg).unwrap();
        let mut keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["async", "contentType", "data", "headers", "method"]);
    }

    #[test]
    fn failure_handler_gets_non_2xx() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (s, f) = (Arc::clone(&seen), Arc::clone(&seen));
        let h = compose_handlers(
            Box::new(move |_| s.lock().unwrap().push("success")),
            Some(Box::new(move |_| f.lock().unwrap().push("failure"))),
        );
        h(ResponseEnvelope::new(1, 500, Value::Null));
        assert_eq!(*seen.lock().unwrap(), vec!["failure"]);
    }
}
