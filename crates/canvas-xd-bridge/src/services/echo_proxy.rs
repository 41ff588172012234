use async_trait::async_trait;
use serde_json::json;

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::envelope::{RequestBody, RequestEnvelope, ResponseEnvelope};

use crate::dispatch::RequestService;

use super::{is_valid, ValidTokens};

/// Stand-in for the host's HTTP proxy: answers `ajax` by echoing the call
/// back instead of performing it. Useful to prove routing end to end.
pub struct EchoProxyService {
    tokens: ValidTokens,
}

impl EchoProxyService {
    pub fn new(tokens: ValidTokens) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl RequestService for EchoProxyService {
    fn kind(&self) -> &'static str {
        "ajax"
    }

    async fn handle(&self, req: RequestEnvelope) -> Result<ResponseEnvelope> {
        let RequestBody::Ajax {
            access_token,
            url,
            config,
        } = &req.body
        else {
            return Err(XdError::BadRequest("ajax service got a non-ajax body".into()));
        };
        if !is_valid(&self.tokens, access_token.as_deref()) {
            return Ok(ResponseEnvelope::invalid_session(req.seq));
        }
        Ok(ResponseEnvelope::new(
            req.seq,
            200,
            json!({
                "url": url,
                "method": config.method,
                "headers": config.headers,
                "data": config.data,
            }),
        ))
    }
}
