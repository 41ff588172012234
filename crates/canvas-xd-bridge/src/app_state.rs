//! Wiring for both ends of the bridge.
//!
//! `CanvasState` is what an embedded app builds on init; `HostState` is the
//! host page's responder. Construction errors are returned, never panicked.

use std::sync::Arc;

use canvas_xd_core::error::{Result, XdError};

use crate::client::{DispatcherOptions, RequestDispatcher};
use crate::config::{ClientSection, HostSection};
use crate::context::ParentLocator;
use crate::dispatch::ServiceDispatcher;
use crate::host::HostRouter;
use crate::obs::BridgeMetrics;
use crate::policy::{compile_origin_rules, expected_origin};
use crate::services::{valid_tokens, ContextService, EchoProxyService};
use crate::session::SessionContext;
use crate::transport::{FramePair, MessageChannel, TargetWindow, Transport};

/// Canvas-side runtime: session plus an attached dispatcher.
#[derive(Clone)]
pub struct CanvasState {
    session: Arc<SessionContext>,
    dispatcher: RequestDispatcher,
    metrics: Arc<BridgeMetrics>,
}

impl CanvasState {
    /// `fragment` is the frame's location fragment, which may carry the
    /// parent URL when config does not.
    pub fn new(
        cfg: &ClientSection,
        transport: Arc<dyn Transport>,
        fragment: Option<&str>,
    ) -> Result<Self> {
        cfg.validate()?;
        let rules = compile_origin_rules(&cfg.allowed_origins)?;
        let parent = ParentLocator::resolve(cfg.parent_url.as_deref(), fragment);
        if parent.url().is_none() {
            tracing::warn!("parent url unknown; requests go out with the wildcard target origin");
        }

        let expected = expected_origin(parent.origin(), rules).ok_or_else(|| {
            XdError::BadRequest(
                "no trusted origin: set client.parent_url, pass it in the frame fragment, \
                 or configure client.allowed_origins"
                    .into(),
            )
        })?;

        let metrics = Arc::new(BridgeMetrics::default());
        let session = Arc::new(SessionContext::new(cfg.initial_token.clone()));
        let channel = MessageChannel::new(transport, Arc::clone(&metrics));
        let dispatcher = RequestDispatcher::new(
            channel,
            session.clone(),
            DispatcherOptions {
                parent,
                expected,
                sequence: cfg.sequence.clone(),
                proxy: cfg.proxy.clone(),
            },
            Arc::clone(&metrics),
        );
        dispatcher.attach();

        tracing::info!(
            parent = dispatcher.parent().url().unwrap_or("*"),
            ceiling = cfg.sequence.ceiling,
            "canvas bridge ready"
        );

        Ok(Self {
            session,
            dispatcher,
            metrics,
        })
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }
}

/// Host-side runtime with the built-in services registered.
#[derive(Clone)]
pub struct HostState {
    router: HostRouter,
    metrics: Arc<BridgeMetrics>,
}

impl HostState {
    pub fn new(cfg: &HostSection, transport: Arc<dyn Transport>) -> Result<Self> {
        cfg.validate()?;
        let metrics = Arc::new(BridgeMetrics::default());

        let tokens = valid_tokens(cfg.valid_tokens.iter().cloned());
        let services = Arc::new(ServiceDispatcher::new());
        services.register(Arc::new(ContextService::new(tokens.clone(), cfg.context.clone())));
        services.register(Arc::new(EchoProxyService::new(tokens)));

        let router = HostRouter::new(
            MessageChannel::new(transport, Arc::clone(&metrics)),
            services,
            cfg.canvas_origin.clone(),
            TargetWindow::Frame(FramePair::CANVAS_FRAME.into()),
            Arc::clone(&metrics),
        );
        router.start();
        tracing::info!(
            canvas_origin = %cfg.canvas_origin,
            services = ?router.services().registered_kinds(),
            "host responder ready"
        );

        Ok(Self { router, metrics })
    }

    pub fn router(&self) -> &HostRouter {
        &self.router
    }

    pub fn metrics(&self) -> &BridgeMetrics {
        &self.metrics
    }
}
