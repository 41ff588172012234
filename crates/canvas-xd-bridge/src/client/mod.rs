//! Canvas-side request API.
//!
//! `RequestDispatcher` turns the fire-and-forget channel into correlated
//! request/response calls: callback style (`request_context`,
//! `request_proxy_call`) and future style (`context`, `proxy_call`).

pub mod call;
pub mod dispatcher;
pub mod proxy;

pub use call::ResponseFuture;
pub use dispatcher::{DispatcherOptions, RequestDispatcher};
pub use proxy::{ProxyRequest, ProxySettings};
