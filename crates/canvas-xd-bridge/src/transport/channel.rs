//! Origin-gated message channel over a `Transport`.
//!
//! At most one inbound listener is installed at a time. `listen` returns a
//! `Subscription`; installing a new listener swaps out the previous one, and
//! releasing a stale handle never touches the newer listener.

use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;

use canvas_xd_core::protocol::origin::{ExpectedOrigin, GateVerdict, OriginGate, TargetOrigin};

use crate::obs::BridgeMetrics;

use super::{InboundEvent, Listener, ListenerId, TargetWindow, Transport};

struct ChannelInner {
    transport: Arc<dyn Transport>,
    available: bool,
    current: Mutex<Option<ListenerId>>,
    metrics: Arc<BridgeMetrics>,
}

impl ChannelInner {
    fn release(&self, id: ListenerId) -> bool {
        let Ok(mut cur) = self.current.lock() else {
            return false;
        };
        if *cur != Some(id) {
            return false;
        }
        *cur = None;
        self.transport.remove_listener(id);
        true
    }
}

/// Single-pipe cross-document channel.
#[derive(Clone)]
pub struct MessageChannel {
    inner: Arc<ChannelInner>,
}

impl MessageChannel {
    /// Wrap a transport. Availability is probed once, here.
    pub fn new(transport: Arc<dyn Transport>, metrics: Arc<BridgeMetrics>) -> Self {
        let available = transport.is_available();
        if !available {
            tracing::warn!("cross-document messaging unavailable; channel is inert");
        }
        Self {
            inner: Arc::new(ChannelInner {
                transport,
                available,
                current: Mutex::new(None),
                metrics,
            }),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.available
    }

    /// Post `payload` to `target` (default: parent), restricted to the origin
    /// of `target_url` (wildcard when absent). Never blocks, never fails.
    pub fn send(&self, payload: Value, target_url: Option<&str>, target: Option<&TargetWindow>) {
        if !self.inner.available {
            return;
        }
        let target_origin = match TargetOrigin::derive(target_url) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "cannot derive target origin; message dropped");
                self.inner.metrics.transport_drops.inc(&[("reason", "bad_target_url")]);
                return;
            }
        };
        let target = target.cloned().unwrap_or_default();
        self.inner.transport.post(&target, payload, &target_origin);
    }

    /// Install the inbound listener, replacing any previous one. Events whose
    /// origin fails `expected` never reach `on_message`.
    pub fn listen<F>(&self, on_message: F, expected: ExpectedOrigin) -> Subscription
    where
        F: Fn(InboundEvent) + Send + Sync + 'static,
    {
        if !self.inner.available {
            return Subscription::inert();
        }
        let gate = OriginGate::new(expected);
        let metrics = Arc::clone(&self.inner.metrics);
        let listener: Listener = Arc::new(move |ev: InboundEvent| {
            match gate.check(&ev.origin, ev.data.as_ref()) {
                GateVerdict::Admit => on_message(ev),
                GateVerdict::Reject => {
                    tracing::debug!(
                        origin = %ev.origin,
                        "inbound message from untrusted origin dropped"
                    );
                    metrics.origin_rejections.inc(&[]);
                }
                GateVerdict::Empty => {}
            }
        });

        // Swap under the lock so concurrent callers never leave two installed.
        let Ok(mut cur) = self.inner.current.lock() else {
            return Subscription::inert();
        };
        let id = self.inner.transport.add_listener(listener);
        if let Some(old) = cur.replace(id) {
            self.inner.transport.remove_listener(old);
        }
        drop(cur);

        Subscription {
            id: Some(id),
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Remove the current listener, if any. Idempotent.
    pub fn stop_listening(&self) {
        let Ok(mut cur) = self.inner.current.lock() else {
            return;
        };
        if let Some(id) = cur.take() {
            self.inner.transport.remove_listener(id);
        }
    }

    pub fn is_listening(&self) -> bool {
        self.inner.current.lock().map(|c| c.is_some()).unwrap_or(false)
    }
}

/// The installed listener. Dropping it removes the listener unless a newer
/// one has already replaced it.
#[must_use = "dropping a Subscription removes the listener"]
pub struct Subscription {
    id: Option<ListenerId>,
    channel: Weak<ChannelInner>,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            id: None,
            channel: Weak::new(),
        }
    }

    /// Whether this handle still owns the channel's listener.
    pub fn is_active(&self) -> bool {
        let (Some(id), Some(ch)) = (self.id, self.channel.upgrade()) else {
            return false;
        };
        ch.current.lock().map(|c| *c == Some(id)).unwrap_or(false)
    }

    /// Remove the listener now. Returns false if it was already replaced or removed.
    pub fn release(mut self) -> bool {
        self.release_inner()
    }

    fn release_inner(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        match self.channel.upgrade() {
            Some(ch) => ch.release(id),
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::transport::{FramePair, MemoryWindow};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOST: &str = "https://host.example";
    const CANVAS: &str = "https://canvas.example";

    fn counting(hits: &Arc<AtomicUsize>) -> impl Fn(InboundEvent) + Send + Sync + 'static {
        let hits = Arc::clone(hits);
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn listen_replaces_previous_listener() {
        let pair = FramePair::new(HOST, CANVAS);
        let ch = MessageChannel::new(pair.canvas.clone(), Arc::default());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let old = ch.listen(counting(&first), ExpectedOrigin::exact(HOST));
        let new = ch.listen(counting(&second), ExpectedOrigin::exact(HOST));
        assert_eq!(pair.canvas.listener_count(), 1);
        assert!(!old.is_active());
        assert!(new.is_active());

        pair.canvas.inject(InboundEvent {
            data: Some(json!({"seq": 1})),
            origin: HOST.into(),
            source: None,
        });
        pair.settle();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // Releasing the stale handle must not remove the live listener.
        assert!(!old.release());
        assert_eq!(pair.canvas.listener_count(), 1);
        drop(new);
        assert_eq!(pair.canvas.listener_count(), 0);
    }

    #[test]
    fn concurrent_listen_leaves_one_listener() {
        let pair = FramePair::new(HOST, CANVAS);
        let ch = MessageChannel::new(pair.canvas.clone(), Arc::default());
        let hits = Arc::new(AtomicUsize::new(0));

        let subs: Vec<Subscription> = std::thread::scope(|s| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let ch = ch.clone();
                    let hits = Arc::clone(&hits);
                    s.spawn(move || {
                        (0..2_000)
                            .map(|_| ch.listen(counting(&hits), ExpectedOrigin::exact(HOST)))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });

        assert_eq!(pair.canvas.listener_count(), 1);
        assert_eq!(subs.iter().filter(|s| s.is_active()).count(), 1);

        pair.canvas.inject(InboundEvent {
            data: Some(json!({"seq": 1})),
            origin: HOST.into(),
            source: None,
        });
        pair.settle();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(subs);
        assert_eq!(pair.canvas.listener_count(), 0);
        assert!(!ch.is_listening());
    }

    #[test]
    fn stop_listening_is_idempotent() {
        let pair = FramePair::new(HOST, CANVAS);
        let ch = MessageChannel::new(pair.canvas.clone(), Arc::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = ch.listen(counting(&hits), ExpectedOrigin::exact(HOST));

        ch.stop_listening();
        ch.stop_listening();
        assert!(!ch.is_listening());
        assert!(!sub.is_active());
        assert_eq!(pair.canvas.listener_count(), 0);
    }

    #[test]
    fn gate_filters_before_callback() {
        let pair = FramePair::new(HOST, CANVAS);
        let metrics = Arc::new(BridgeMetrics::default());
        let ch = MessageChannel::new(pair.canvas.clone(), Arc::clone(&metrics));
        let hits = Arc::new(AtomicUsize::new(0));
        let _sub = ch.listen(counting(&hits), ExpectedOrigin::exact(HOST));

        for (origin, data) in [
            ("https://evil.example", Some(json!({"seq": 1}))),
            (HOST, None),
            (HOST, Some(json!({"seq": 2}))),
        ] {
            pair.canvas.inject(InboundEvent {
                data,
                origin: origin.into(),
                source: None,
            });
        }
        pair.settle();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.origin_rejections.get(&[]), 1);
    }

    #[test]
    fn send_restricts_to_target_origin() {
        let pair = FramePair::new(HOST, CANVAS);
        let ch = MessageChannel::new(pair.canvas.clone(), Arc::default());

        ch.send(json!({"seq": 1}), Some("https://other.example/page"), None);
        assert_eq!(pair.host.queued(), 0);
        ch.send(json!({"seq": 2}), Some("https://host.example/canvas/page?x=1"), None);
        ch.send(json!({"seq": 3}), None, None);
        assert_eq!(pair.host.queued(), 2);
    }

    #[test]
    fn unavailable_transport_is_inert() {
        let window = MemoryWindow::unavailable("canvas", CANVAS);
        let ch = MessageChannel::new(window.clone(), Arc::default());
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = ch.listen(counting(&hits), ExpectedOrigin::exact(HOST));

        assert!(!ch.is_available());
        assert!(!sub.is_active());
        assert_eq!(window.listener_count(), 0);
        ch.send(json!({"seq": 1}), None, None);
    }
}
