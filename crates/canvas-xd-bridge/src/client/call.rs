//! Future-style calls with cancellation.
//!
//! The wire protocol has no cancel message. Cancelling (or dropping) a
//! `ResponseFuture` evicts its handler locally, so a late response is then
//! dropped as unmatched.

use std::future::Future;
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::envelope::{ResponseEnvelope, Sequence};

use crate::correlation::{CorrelationRegistry, ResponseHandler, Ticket};

/// Handler/receiver pair backing one future-style call.
pub(crate) fn channel() -> (ResponseHandler, oneshot::Receiver<ResponseEnvelope>) {
    let (tx, rx) = oneshot::channel();
    let handler: ResponseHandler = Box::new(move |resp| {
        let _ = tx.send(resp);
    });
    (handler, rx)
}

/// Resolves with the matching response.
///
/// Fails with `Abandoned` if the handler was displaced (sequence reuse) or
/// the dispatcher went away before a response arrived.
#[must_use = "dropping a ResponseFuture abandons the call"]
pub struct ResponseFuture {
    ticket: Ticket,
    rx: oneshot::Receiver<ResponseEnvelope>,
    registry: Weak<CorrelationRegistry>,
    done: bool,
}

impl ResponseFuture {
    pub(crate) fn new(
        ticket: Ticket,
        rx: oneshot::Receiver<ResponseEnvelope>,
        registry: Weak<CorrelationRegistry>,
    ) -> Self {
        Self {
            ticket,
            rx,
            registry,
            done: false,
        }
    }

    pub fn seq(&self) -> Sequence {
        self.ticket.seq
    }

    /// Stop waiting. Returns true if the handler was still pending.
    pub fn cancel(mut self) -> bool {
        self.done = true;
        self.evict()
    }

    fn evict(&self) -> bool {
        match self.registry.upgrade() {
            Some(r) => r.evict(self.ticket),
            None => false,
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<ResponseEnvelope>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.done {
            return Poll::Ready(Err(XdError::Cancelled));
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(resp)) => {
                self.done = true;
                Poll::Ready(Ok(resp))
            }
            Poll::Ready(Err(_)) => {
                self.done = true;
                Poll::Ready(Err(XdError::Abandoned))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ResponseFuture {
    fn drop(&mut self) {
        if !self.done && self.evict() {
            tracing::debug!(seq = self.ticket.seq, "pending call dropped; handler evicted");
        }
    }
}
