//! canvas-xd demo.
//!
//! Wires a host page and a canvas frame over the in-memory window pair,
//! issues a context request and a proxied call, logs what comes back.
//!
//! Usage: `canvas-xd-bridge [config.yaml]` (default `canvas-xd.yaml`).

use std::time::Duration;

use futures_util::future::join;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use canvas_xd_bridge::app_state::{CanvasState, HostState};
use canvas_xd_bridge::client::ProxyRequest;
use canvas_xd_bridge::config;
use canvas_xd_bridge::transport::FramePair;

const CALL_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "canvas-xd.yaml".into());
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(%path, error = %e, "config load failed");
            std::process::exit(2);
        }
    };
    let Some(host_cfg) = cfg.host.as_ref() else {
        tracing::error!(%path, "demo needs a host section");
        std::process::exit(2);
    };

    // The canvas learns its parent from the fragment unless config pins it.
    let host_origin = "https://host.example.com";
    let pair = FramePair::new(host_origin, &host_cfg.canvas_origin);
    let fragment = "#https%3A%2F%2Fhost.example.com%2Fcanvas%2Fpage";

    let host = match HostState::new(host_cfg, pair.host.clone()) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!(error = %e, "host setup failed");
            std::process::exit(1);
        }
    };
    let canvas = match CanvasState::new(&cfg.client, pair.canvas.clone(), Some(fragment)) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "canvas setup failed");
            std::process::exit(1);
        }
    };

    let _host_loop = pair.host.spawn_event_loop();
    let _canvas_loop = pair.canvas.spawn_event_loop();

    let dispatcher = canvas.dispatcher();
    let req = ProxyRequest::new()
        .method("POST")
        .data(json!({"q": "SELECT Id FROM Account"}));
    let calls = (
        dispatcher.context(None),
        dispatcher.proxy_call("https://host.example.com/services/data/query", req),
    );
    let (ctx, proxy) = match calls {
        (Ok(ctx), Ok(proxy)) => (ctx, proxy),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "request rejected");
            std::process::exit(1);
        }
    };

    // Both are in flight at once; the host may answer in either order.
    let (ctx, proxy) = join(
        tokio::time::timeout(CALL_TIMEOUT, ctx),
        tokio::time::timeout(CALL_TIMEOUT, proxy),
    )
    .await;
    for (what, outcome) in [("context", ctx), ("proxy call", proxy)] {
        match outcome {
            Ok(Ok(resp)) => {
                tracing::info!(what, status = ?resp.status, payload = %resp.payload, "response")
            }
            Ok(Err(e)) => tracing::warn!(what, error = %e, "call failed"),
            Err(_) => tracing::warn!(what, "call timed out"),
        }
    }

    tracing::info!(logged_in = canvas.session().is_logged_in(), "session");
    print!("{}{}", canvas.metrics().render(), host.metrics().render());
}
