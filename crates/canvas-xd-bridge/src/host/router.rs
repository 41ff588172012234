use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::{json, Value};

use canvas_xd_core::error::XdError;
use canvas_xd_core::protocol::envelope::{RequestEnvelope, ResponseEnvelope, Sequence};
use canvas_xd_core::protocol::origin::ExpectedOrigin;

use crate::dispatch::ServiceDispatcher;
use crate::obs::BridgeMetrics;
use crate::transport::{InboundEvent, MessageChannel, Subscription, TargetWindow};

struct RouterInner {
    channel: MessageChannel,
    services: Arc<ServiceDispatcher>,
    canvas_origin: String,
    reply_to: TargetWindow,
    subscription: Mutex<Option<Subscription>>,
    metrics: Arc<BridgeMetrics>,
}

/// Routes canvas requests to services and posts the responses back.
#[derive(Clone)]
pub struct HostRouter {
    inner: Arc<RouterInner>,
}

/// Error response in the host's `[{errorCode, message}]` shape.
pub fn error_response(seq: Sequence, err: &XdError) -> ResponseEnvelope {
    let status = match err {
        XdError::BadRequest(_) | XdError::IllegalArgument(_) | XdError::InvalidOrigin(_) => 400,
        _ => 500,
    };
    ResponseEnvelope::new(
        seq,
        status,
        json!([{ "errorCode": err.code().as_str(), "message": err.to_string() }]),
    )
}

impl HostRouter {
    /// `reply_to` addresses the canvas frame when an event carries no source.
    pub fn new(
        channel: MessageChannel,
        services: Arc<ServiceDispatcher>,
        canvas_origin: impl Into<String>,
        reply_to: TargetWindow,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                channel,
                services,
                canvas_origin: canvas_origin.into(),
                reply_to,
                subscription: Mutex::new(None),
                metrics,
            }),
        }
    }

    /// Start answering. Requests are served on the ambient tokio runtime.
    pub fn start(&self) {
        let weak = Arc::downgrade(&self.inner);
        let sub = self.inner.channel.listen(
            move |ev| {
                if let Some(inner) = weak.upgrade() {
                    RouterInner::on_request(&inner, ev);
                }
            },
            ExpectedOrigin::exact(self.inner.canvas_origin.clone()),
        );
        if let Ok(mut slot) = self.inner.subscription.lock() {
            *slot = Some(sub);
        }
    }

    pub fn stop(&self) -> bool {
        let sub = match self.inner.subscription.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        sub.map(Subscription::release).unwrap_or(false)
    }

    pub fn services(&self) -> &ServiceDispatcher {
        &self.inner.services
    }
}

impl RouterInner {
    fn on_request(this: &Arc<Self>, ev: InboundEvent) {
        let Some(data) = ev.data else {
            return;
        };
        let Some(seq) = data
            .get("seq")
            .and_then(Value::as_u64)
            .and_then(|s| Sequence::try_from(s).ok())
        else {
            // Nothing to correlate a reply with.
            tracing::debug!(origin = %ev.origin, "request without usable seq dropped");
            this.metrics.host_requests.inc(&[("kind", "invalid"), ("status", "dropped")]);
            return;
        };
        let reply_to = ev.source.unwrap_or_else(|| this.reply_to.clone());

        let req = match RequestEnvelope::from_value(&data) {
            Ok(req) => req,
            Err(e) => {
                tracing::debug!(seq, error = %e, "undecodable request");
                this.reply(seq, "invalid", error_response(seq, &e), &reply_to);
                return;
            }
        };

        let rt = match tokio::runtime::Handle::try_current() {
            Ok(rt) => rt,
            Err(_) => {
                tracing::warn!(seq, "no async runtime; request cannot be served");
                this.reply(
                    seq,
                    req.body.kind(),
                    error_response(seq, &XdError::Internal("host runtime unavailable".into())),
                    &reply_to,
                );
                return;
            }
        };

        let inner = Arc::clone(this);
        rt.spawn(async move {
            let kind = req.body.kind();
            let started = Instant::now();
            let resp = match inner.services.dispatch(req).await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(seq, kind, error = %e, "service failed");
                    error_response(seq, &e)
                }
            };
            inner
                .metrics
                .host_service_duration
                .observe(&[("kind", kind)], started.elapsed());
            inner.reply(seq, kind, resp, &reply_to);
        });
    }

    fn reply(&self, seq: Sequence, kind: &str, mut resp: ResponseEnvelope, to: &TargetWindow) {
        let status = resp.status.map(|s| s.to_string()).unwrap_or_default();
        self.metrics
            .host_requests
            .inc(&[("kind", kind), ("status", status.as_str())]);

        // Services may not rewrite the correlation id.
        resp.seq = Some(seq);
        let value = match resp.to_value() {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(seq, error = %e, "response encode failed");
                return;
            }
        };
        tracing::debug!(seq, kind, %status, "response posted");
        self.channel.send(value, Some(&self.canvas_origin), Some(to));
    }
}
