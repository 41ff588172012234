//! canvas-xd: correlated request/response calls between an embedded canvas
//! app and its host page over cross-document messaging.
//!
//! `core` holds the wire contracts, `bridge` the runtime. Most apps only need
//! the `prelude`.

pub mod core {
    pub use canvas_xd_core::*;
}

pub mod bridge {
    pub use canvas_xd_bridge::*;
}

pub mod prelude {
    pub use canvas_xd_bridge::app_state::{CanvasState, HostState};
    pub use canvas_xd_bridge::client::{
        ProxyRequest, ProxySettings, RequestDispatcher, ResponseFuture,
    };
    pub use canvas_xd_bridge::config::{
        load_from_file, load_from_str, BridgeConfig, CollisionPolicy,
    };
    pub use canvas_xd_bridge::session::{SessionContext, SessionStore};
    pub use canvas_xd_bridge::transport::{FramePair, MessageChannel, Transport};
    pub use canvas_xd_core::protocol::{RequestBody, ResponseEnvelope, Sequence};
    pub use canvas_xd_core::{Result, XdError};
}
