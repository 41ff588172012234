//! Protocol modules (envelopes + origins).
//!
//! - Envelopes: `{seq, body}` requests and `{seq, status, payload}` responses,
//!   serialized as JSON values to stay wire-compatible with the host page.
//! - Origins: send-side target-origin derivation and the receive-side gate.
//!
//! Decoding is panic-free: inbound data from another frame is untrusted and
//! malformed input is reported as `XdError`.

pub mod envelope;
pub mod origin;

pub use envelope::{ProxyConfig, RequestBody, RequestEnvelope, ResponseEnvelope, Sequence};
pub use origin::{ExpectedOrigin, GateVerdict, OriginGate, TargetOrigin};
