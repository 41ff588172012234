//! Transport layer (cross-document messaging).
//!
//! `Transport` is the boundary to the window-messaging primitive: post a
//! structured payload with a target-origin restriction, and register
//! listeners that receive `{data, origin}` events. `MessageChannel` wraps it
//! with origin gating and a single replaceable listener; `memory` provides an
//! in-process host/canvas frame pair.

pub mod channel;
pub mod memory;

use std::sync::Arc;

use serde_json::Value;

use canvas_xd_core::protocol::origin::TargetOrigin;

pub use channel::{MessageChannel, Subscription};
pub use memory::{FramePair, MemoryWindow};

/// Window a message is posted to, relative to the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum TargetWindow {
    /// The embedding page.
    #[default]
    Parent,
    /// A named child frame.
    Frame(String),
}

/// One inbound message event.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Structured payload; `None` for events that carry nothing.
    pub data: Option<Value>,
    /// Origin reported for the sending window.
    pub origin: String,
    /// Sender, relative to the receiving window (where replies go).
    pub source: Option<TargetWindow>,
}

/// Handle for a listener registered on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Raw inbound callback.
pub type Listener = Arc<dyn Fn(InboundEvent) + Send + Sync>;

/// The cross-document post/receive primitive.
pub trait Transport: Send + Sync {
    /// Whether the host environment supports cross-document messaging at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Fire-and-forget post. Delivery failures are never reported.
    fn post(&self, target: &TargetWindow, payload: Value, target_origin: &TargetOrigin);

    fn add_listener(&self, listener: Listener) -> ListenerId;

    /// Remove a listener; unknown ids are ignored.
    fn remove_listener(&self, id: ListenerId);
}
