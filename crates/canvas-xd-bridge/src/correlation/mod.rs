//! Request correlation (sequence numbers -> pending response handlers).

pub mod registry;

pub use registry::{CorrelationRegistry, ResponseHandler, Ticket};
