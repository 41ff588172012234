//! Host-page responder.
//!
//! The counterpart to `client`: listens on the host window for request
//! envelopes from the canvas frame and answers each on its own task.

pub mod router;

pub use router::{error_response, HostRouter};
