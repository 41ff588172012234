use async_trait::async_trait;
use serde_json::Value;

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::envelope::{RequestBody, RequestEnvelope, ResponseEnvelope};

use crate::dispatch::RequestService;

use super::{is_valid, ValidTokens};

/// Answers `ctx` with the configured context document.
pub struct ContextService {
    tokens: ValidTokens,
    context: Value,
}

impl ContextService {
    pub fn new(tokens: ValidTokens, context: Value) -> Self {
        Self { tokens, context }
    }
}

#[async_trait]
impl RequestService for ContextService {
    fn kind(&self) -> &'static str {
        "ctx"
    }

    async fn handle(&self, req: RequestEnvelope) -> Result<ResponseEnvelope> {
        let RequestBody::Ctx { access_token } = &req.body else {
            return Err(XdError::BadRequest("ctx service got a non-ctx body".into()));
        };
        if !is_valid(&self.tokens, access_token.as_deref()) {
            return Ok(ResponseEnvelope::invalid_session(req.seq));
        }
        Ok(ResponseEnvelope::new(req.seq, 200, self.context.clone()))
    }
}
