use std::sync::{Arc, Mutex};

use serde_json::Value;

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::envelope::{
    is_session_expired, RequestBody, RequestEnvelope, ResponseEnvelope, Sequence,
};
use canvas_xd_core::protocol::origin::ExpectedOrigin;

use crate::config::{ProxyDefaults, SequenceSection};
use crate::context::ParentLocator;
use crate::correlation::{CorrelationRegistry, ResponseHandler, Ticket};
use crate::obs::BridgeMetrics;
use crate::session::SessionStore;
use crate::transport::{MessageChannel, Subscription, TargetWindow};

use super::call::{self, ResponseFuture};
use super::proxy::{compose_handlers, merge_config, ProxyRequest, ProxySettings};

/// Construction parameters for a `RequestDispatcher`.
pub struct DispatcherOptions {
    pub parent: ParentLocator,
    /// Who may answer. Never a wildcard.
    pub expected: ExpectedOrigin,
    pub sequence: SequenceSection,
    pub proxy: ProxyDefaults,
}

struct DispatcherInner {
    channel: MessageChannel,
    registry: Arc<CorrelationRegistry>,
    session: Arc<dyn SessionStore>,
    parent: ParentLocator,
    expected: ExpectedOrigin,
    proxy: ProxyDefaults,
    subscription: Mutex<Option<Subscription>>,
    metrics: Arc<BridgeMetrics>,
}

/// Canvas-side request API over one message channel.
#[derive(Clone)]
pub struct RequestDispatcher {
    inner: Arc<DispatcherInner>,
}

impl RequestDispatcher {
    pub fn new(
        channel: MessageChannel,
        session: Arc<dyn SessionStore>,
        opts: DispatcherOptions,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        let registry = Arc::new(CorrelationRegistry::new(
            opts.sequence.ceiling,
            opts.sequence.on_collision,
            Arc::clone(&metrics),
        ));
        Self {
            inner: Arc::new(DispatcherInner {
                channel,
                registry,
                session,
                parent: opts.parent,
                expected: opts.expected,
                proxy: opts.proxy,
                subscription: Mutex::new(None),
                metrics,
            }),
        }
    }

    /// Install this dispatcher's inbound listener (replacing any other
    /// listener on the channel).
    pub fn attach(&self) {
        let weak = Arc::downgrade(&self.inner);
        let sub = self.inner.channel.listen(
            move |ev| {
                let (Some(inner), Some(data)) = (weak.upgrade(), ev.data) else {
                    return;
                };
                inner.on_inbound_envelope(&data);
            },
            self.inner.expected.clone(),
        );
        if let Ok(mut slot) = self.inner.subscription.lock() {
            *slot = Some(sub);
        }
    }

    /// Remove the listener. Responses to calls still in flight will never be
    /// delivered. Returns false if nothing was attached.
    pub fn detach(&self) -> bool {
        let sub = match self.inner.subscription.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        sub.map(Subscription::release).unwrap_or(false)
    }

    pub fn is_attached(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .map(|s| s.as_ref().is_some_and(Subscription::is_active))
            .unwrap_or(false)
    }

    /// Ask the host for the current user/organization context.
    /// `token` defaults to the session's current token.
    pub fn request_context<F>(&self, handler: F, token: Option<String>) -> Result<Sequence>
    where
        F: FnOnce(ResponseEnvelope) + Send + 'static,
    {
        let body = self.inner.context_body(token);
        self.inner.post(body, Box::new(handler)).map(|t| t.seq)
    }

    /// Have the host perform an HTTP call on the canvas app's behalf.
    ///
    /// Fails with `IllegalArgument` before anything is sent when `url` is
    /// missing/empty or `settings.success` is not set.
    pub fn request_proxy_call(
        &self,
        url: Option<&str>,
        settings: ProxySettings,
    ) -> Result<Sequence> {
        let url = match url {
            Some(u) if !u.is_empty() => u,
            _ => return Err(XdError::IllegalArgument("url required")),
        };
        let Some(success) = settings.success else {
            return Err(XdError::IllegalArgument("setting.success missing."));
        };
        let body = self.inner.proxy_body(url, &settings.request);
        let handler = compose_handlers(success, settings.failure);
        self.inner.post(body, handler).map(|t| t.seq)
    }

    /// Future-style `request_context`.
    pub fn context(&self, token: Option<String>) -> Result<ResponseFuture> {
        let body = self.inner.context_body(token);
        self.post_for_future(body)
    }

    /// Future-style `request_proxy_call`.
    pub fn proxy_call(&self, url: &str, request: ProxyRequest) -> Result<ResponseFuture> {
        if url.is_empty() {
            return Err(XdError::IllegalArgument("url required"));
        }
        let body = self.inner.proxy_body(url, &request);
        self.post_for_future(body)
    }

    fn post_for_future(&self, body: RequestBody) -> Result<ResponseFuture> {
        let (handler, rx) = call::channel();
        let ticket = self.inner.post(body, handler)?;
        Ok(ResponseFuture::new(ticket, rx, Arc::downgrade(&self.inner.registry)))
    }

    /// Entry point for every admitted inbound message.
    pub fn on_inbound_envelope(&self, data: &Value) {
        self.inner.on_inbound_envelope(data);
    }

    /// Pre-resolution hook run on every inbound message, matched or not.
    /// Returns true when the session was invalidated.
    pub fn on_every_inbound_envelope(&self, data: &Value) -> bool {
        self.inner.on_every_inbound_envelope(data)
    }

    pub fn set_token(&self, token: Option<String>) {
        self.inner.session.set_token(token);
    }

    pub fn token(&self) -> Option<String> {
        self.inner.session.token()
    }

    pub fn pending_calls(&self) -> usize {
        self.inner.registry.pending()
    }

    pub fn parent(&self) -> &ParentLocator {
        &self.inner.parent
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.inner.metrics
    }
}

impl DispatcherInner {
    /// An explicit non-empty token wins; otherwise the session's.
    fn effective_token(&self, explicit: Option<String>) -> Option<String> {
        explicit
            .filter(|t| !t.is_empty())
            .or_else(|| self.session.token())
    }

    fn context_body(&self, token: Option<String>) -> RequestBody {
        RequestBody::Ctx {
            access_token: self.effective_token(token),
        }
    }

    fn proxy_body(&self, url: &str, request: &ProxyRequest) -> RequestBody {
        let token = self.effective_token(request.token.clone());
        let config = merge_config(&self.proxy, token.as_deref(), request);
        RequestBody::Ajax {
            access_token: token,
            url: url.to_string(),
            config,
        }
    }

    fn post(&self, body: RequestBody, handler: ResponseHandler) -> Result<Ticket> {
        let kind = body.kind();
        let ticket = self.registry.allocate(handler)?;
        let value = match RequestEnvelope::new(ticket.seq, body).to_value() {
            Ok(v) => v,
            Err(e) => {
                self.registry.evict(ticket);
                return Err(e);
            }
        };

        self.channel
            .send(value, self.parent.url(), Some(&TargetWindow::Parent));
        self.metrics.requests_sent.inc(&[("kind", kind)]);
        tracing::debug!(seq = ticket.seq, kind, "request posted");
        Ok(ticket)
    }

    fn on_every_inbound_envelope(&self, data: &Value) -> bool {
        if !is_session_expired(data) {
            return false;
        }
        tracing::warn!("host reported an invalid session; logging out");
        self.metrics.session_invalidations.inc(&[]);
        self.session.invalidate_session();
        true
    }

    fn on_inbound_envelope(&self, data: &Value) {
        self.on_every_inbound_envelope(data);

        let resp = match ResponseEnvelope::from_value(data) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "undecodable response dropped");
                self.metrics.responses_orphaned.inc(&[("reason", "malformed")]);
                return;
            }
        };
        let Some(seq) = resp.seq else {
            self.metrics.responses_orphaned.inc(&[("reason", "no_seq")]);
            return;
        };

        if self.registry.resolve(seq, resp) {
            self.metrics.responses_resolved.inc(&[]);
        } else {
            // Normal after fast app switches: the caller is gone.
            tracing::debug!(seq, "response without pending call dropped");
            self.metrics.responses_orphaned.inc(&[("reason", "unmatched")]);
        }
    }
}
