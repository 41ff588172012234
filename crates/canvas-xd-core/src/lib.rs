//! canvas-xd core: transport-agnostic wire contracts for the canvas messaging bridge.
//!
//! This crate defines the request/response envelopes exchanged between a
//! sandboxed canvas frame and its host page, the target-origin derivation
//! used on the send side, and the origin gate applied on the receive side.
//! It carries no runtime or transport dependencies so the same contracts can
//! back the canvas client, the host responder, and test tooling.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed inbound data surfaces as `XdError`/`Result`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, XdError};
