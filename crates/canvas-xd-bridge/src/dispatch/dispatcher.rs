use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::envelope::{RequestEnvelope, ResponseEnvelope};

/// Answers one kind of request body (`ctx`, `ajax`, ...).
#[async_trait]
pub trait RequestService: Send + Sync {
    fn kind(&self) -> &'static str;
    async fn handle(&self, req: RequestEnvelope) -> Result<ResponseEnvelope>;
}

/// Registry and dispatcher for host services.
#[derive(Default)]
pub struct ServiceDispatcher {
    services: DashMap<&'static str, Arc<dyn RequestService>>,
}

impl ServiceDispatcher {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register `svc`, replacing any service of the same kind.
    pub fn register(&self, svc: Arc<dyn RequestService>) {
        self.services.insert(svc.kind(), svc);
    }

    pub fn registered_kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.services.iter().map(|e| *e.key()).collect();
        kinds.sort_unstable();
        kinds
    }

    pub async fn dispatch(&self, req: RequestEnvelope) -> Result<ResponseEnvelope> {
        let kind = req.body.kind();
        let handler = self
            .services
            .get(kind)
            .ok_or_else(|| XdError::BadRequest(format!("unknown request type: {kind}")))?
            .value()
            .clone();
        handler.handle(req).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use canvas_xd_core::protocol::envelope::RequestBody;
    use serde_json::json;

    struct Fixed;

    #[async_trait]
    impl RequestService for Fixed {
        fn kind(&self) -> &'static str {
            "ctx"
        }

        async fn handle(&self, req: RequestEnvelope) -> Result<ResponseEnvelope> {
            Ok(ResponseEnvelope::new(req.seq, 200, json!({"ok": true})))
        }
    }

    #[tokio::test]
    async fn routes_by_body_type() {
        let d = ServiceDispatcher::new();
        d.register(Arc::new(Fixed));
        assert_eq!(d.registered_kinds(), vec!["ctx"]);

        let resp = d
            .dispatch(RequestEnvelope::new(4, RequestBody::Ctx { access_token: None }))
            .await
            .unwrap();
        assert_eq!(resp.seq, Some(4));

        let err = d
            .dispatch(RequestEnvelope::new(
                5,
                RequestBody::Ajax {
                    access_token: None,
                    url: "https://x".into(),
                    config: serde_json::from_value(json!({
                        "method": "GET", "async": true, "contentType": "application/json"
                    }))
                    .unwrap(),
                },
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, XdError::BadRequest(_)));
    }
}
