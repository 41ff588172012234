//! Policy layer (origin allowlists).
//!
//! Compiles the configured trusted origins into a matcher the message
//! channel consults for every inbound event.

pub mod allowlist;

pub use allowlist::{compile_origin_rules, expected_origin, is_origin_allowed, OriginRule};
