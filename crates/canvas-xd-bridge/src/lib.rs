//! canvas-xd bridge runtime.
//!
//! Wires config, the origin-gated message channel, the correlation registry,
//! the canvas-side request dispatcher, session state and the host-side
//! responder. Consumed by the demo binary (`main.rs`) and integration tests.

pub mod app_state;
pub mod client;
pub mod config;
pub mod context;
pub mod correlation;
pub mod dispatch;
pub mod host;
pub mod obs;
pub mod policy;
pub mod services;
pub mod session;
pub mod transport;
