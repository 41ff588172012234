//! Host-side service registry.
//!
//! Request bodies are routed by their `type` tag to a registered
//! `RequestService`.

pub mod dispatcher;

pub use dispatcher::{RequestService, ServiceDispatcher};
