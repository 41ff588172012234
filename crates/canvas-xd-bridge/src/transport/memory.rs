//! In-process window pair (host page + embedded canvas frame).
//!
//! Each window owns an inbox. `post` enqueues into the target window's inbox
//! (subject to the target-origin restriction) and returns immediately; events
//! are delivered to listeners later, either by `dispatch_pending` (one event
//! loop turn, deterministic) or by the task started with `spawn_event_loop`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use canvas_xd_core::protocol::origin::TargetOrigin;

use super::{InboundEvent, Listener, ListenerId, TargetWindow, Transport};

/// A simulated browsing context.
pub struct MemoryWindow {
    name: String,
    origin: String,
    available: bool,
    parent: Mutex<Weak<MemoryWindow>>,
    frames: DashMap<String, Weak<MemoryWindow>>,
    listeners: DashMap<ListenerId, Listener>,
    next_listener: AtomicU64,
    inbox: Mutex<VecDeque<InboundEvent>>,
    notify: Arc<Notify>,
}

impl MemoryWindow {
    pub fn new(name: impl Into<String>, origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(name.into(), origin.into(), true))
    }

    /// A window whose environment lacks cross-document messaging.
    pub fn unavailable(name: impl Into<String>, origin: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::build(name.into(), origin.into(), false))
    }

    fn build(name: String, origin: String, available: bool) -> Self {
        Self {
            name,
            origin,
            available,
            parent: Mutex::new(Weak::new()),
            frames: DashMap::new(),
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(1),
            inbox: Mutex::new(VecDeque::new()),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Embed `child` into `parent` as a named frame.
    pub fn embed(parent: &Arc<Self>, child: &Arc<Self>) {
        parent
            .frames
            .insert(child.name.clone(), Arc::downgrade(child));
        if let Ok(mut p) = child.parent.lock() {
            *p = Arc::downgrade(parent);
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn queued(&self) -> usize {
        self.inbox.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Enqueue an arbitrary event (as if some other window posted it).
    pub fn inject(&self, event: InboundEvent) {
        if let Ok(mut q) = self.inbox.lock() {
            q.push_back(event);
        }
        self.notify.notify_one();
    }

    /// Run one event-loop turn: deliver every queued event. Returns the count.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            // Pop under the lock, deliver outside it: listeners may post.
            let next = match self.inbox.lock() {
                Ok(mut q) => q.pop_front(),
                Err(_) => None,
            };
            let Some(event) = next else { break; };

            let snapshot: Vec<Listener> =
                self.listeners.iter().map(|l| Arc::clone(l.value())).collect();
            for l in snapshot {
                l(event.clone());
            }
            delivered += 1;
        }
        delivered
    }

    /// Deliver events as they arrive until the window is dropped.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let notify = Arc::clone(&self.notify);
        tokio::spawn(async move {
            loop {
                notify.notified().await;
                let Some(w) = weak.upgrade() else { break; };
                w.dispatch_pending();
            }
        })
    }

    fn resolve(&self, target: &TargetWindow) -> Option<Arc<MemoryWindow>> {
        match target {
            TargetWindow::Parent => self.parent.lock().ok()?.upgrade(),
            TargetWindow::Frame(name) => self.frames.get(name)?.upgrade(),
        }
    }

    /// How `receiver` should address this window when replying.
    fn seen_from(&self, receiver: &MemoryWindow) -> TargetWindow {
        let is_parent = receiver
            .parent
            .lock()
            .ok()
            .and_then(|p| p.upgrade())
            .is_some_and(|p| std::ptr::eq(Arc::as_ptr(&p), self));
        if is_parent {
            TargetWindow::Parent
        } else {
            TargetWindow::Frame(self.name.clone())
        }
    }
}

impl Transport for MemoryWindow {
    fn is_available(&self) -> bool {
        self.available
    }

    fn post(&self, target: &TargetWindow, payload: Value, target_origin: &TargetOrigin) {
        let Some(dest) = self.resolve(target) else {
            tracing::trace!(from = %self.name, ?target, "post to missing window dropped");
            return;
        };
        if !target_origin.permits(&dest.origin) {
            // Browsers drop these without telling the sender.
            tracing::trace!(
                from = %self.name,
                %target_origin,
                to = %dest.origin,
                "target origin mismatch"
            );
            return;
        }
        dest.inject(InboundEvent {
            data: Some(payload),
            origin: self.origin.clone(),
            source: Some(self.seen_from(&dest)),
        });
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, listener);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

/// Host page with one embedded canvas frame.
pub struct FramePair {
    pub host: Arc<MemoryWindow>,
    pub canvas: Arc<MemoryWindow>,
}

impl FramePair {
    /// Name the host uses to address the canvas frame.
    pub const CANVAS_FRAME: &'static str = "canvas";

    pub fn new(host_origin: &str, canvas_origin: &str) -> Self {
        let host = MemoryWindow::new("host", host_origin);
        let canvas = MemoryWindow::new(Self::CANVAS_FRAME, canvas_origin);
        MemoryWindow::embed(&host, &canvas);
        Self { host, canvas }
    }

    /// Drain both inboxes until neither has anything left.
    pub fn settle(&self) -> usize {
        let mut total = 0;
        loop {
            let n = self.host.dispatch_pending() + self.canvas.dispatch_pending();
            if n == 0 {
                return total;
            }
            total += n;
        }
    }
}
