//! Bounded, wrapping correlation table.
//!
//! Sequence numbers run `1, 2, ..., ceiling + 1, 0, 1, ...`. The wrap bounds
//! memory held by calls that never get a response. What happens when the
//! next number is still bound to a live handler is decided by the
//! `CollisionPolicy`: `Overwrite` replaces it (the old call is treated as
//! abandoned), `SkipInUse` moves on to the next free number.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::envelope::{ResponseEnvelope, Sequence};

use crate::config::CollisionPolicy;
use crate::obs::BridgeMetrics;

/// Single-use response callback.
pub type ResponseHandler = Box<dyn FnOnce(ResponseEnvelope) + Send + 'static>;

/// Identifies one allocation. `seq` values recycle; `call_id` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub seq: Sequence,
    call_id: u64,
}

struct Slot {
    call_id: u64,
    handler: ResponseHandler,
}

struct RegistryState {
    counter: Sequence,
    next_call_id: u64,
    slots: HashMap<Sequence, Slot>,
}

pub struct CorrelationRegistry {
    ceiling: Sequence,
    policy: CollisionPolicy,
    state: Mutex<RegistryState>,
    metrics: Arc<BridgeMetrics>,
}

impl CorrelationRegistry {
    pub fn new(ceiling: Sequence, policy: CollisionPolicy, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            ceiling,
            policy,
            state: Mutex::new(RegistryState {
                counter: 0,
                next_call_id: 1,
                slots: HashMap::new(),
            }),
            metrics,
        }
    }

    /// Number of distinct sequence values before the counter repeats.
    pub fn range(&self) -> usize {
        (self.ceiling as usize + 2).min(Sequence::MAX as usize + 1)
    }

    fn step(&self, seq: Sequence) -> Sequence {
        match seq.checked_add(1) {
            Some(next) if seq <= self.ceiling => next,
            _ => 0,
        }
    }

    /// Assign the next sequence number and bind `handler` to it.
    pub fn allocate(&self, handler: ResponseHandler) -> Result<Ticket> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| XdError::Internal("correlation registry lock poisoned".into()))?;

        let seq = match self.policy {
            CollisionPolicy::Overwrite => self.step(st.counter),
            CollisionPolicy::SkipInUse => {
                let mut candidate = st.counter;
                let mut found = None;
                for _ in 0..self.range() {
                    candidate = self.step(candidate);
                    if !st.slots.contains_key(&candidate) {
                        found = Some(candidate);
                        break;
                    }
                }
                found.ok_or(XdError::RegistryFull(st.slots.len()))?
            }
        };

        let call_id = st.next_call_id;
        st.next_call_id += 1;
        st.counter = seq;
        let displaced = st.slots.insert(seq, Slot { call_id, handler });
        drop(st);

        if displaced.is_some() {
            tracing::warn!(
                seq,
                "sequence reused while a call was still pending; old call abandoned"
            );
            self.metrics.sequence_collisions.inc(&[]);
        }
        // The displaced handler is dropped here, outside the lock.
        drop(displaced);

        Ok(Ticket { seq, call_id })
    }

    /// Remove the handler for `seq` and invoke it. Returns false (and does
    /// nothing) when no handler is bound.
    pub fn resolve(&self, seq: Sequence, response: ResponseEnvelope) -> bool {
        let slot = match self.state.lock() {
            Ok(mut st) => st.slots.remove(&seq),
            Err(_) => None,
        };
        match slot {
            Some(slot) => {
                (slot.handler)(response);
                true
            }
            None => false,
        }
    }

    /// Remove the handler bound by `ticket`, if it is still that one.
    pub fn evict(&self, ticket: Ticket) -> bool {
        let Ok(mut st) = self.state.lock() else {
            return false;
        };
        let owned = st
            .slots
            .get(&ticket.seq)
            .is_some_and(|s| s.call_id == ticket.call_id);
        if owned {
            st.slots.remove(&ticket.seq);
        }
        owned
    }

    pub fn is_pending(&self, seq: Sequence) -> bool {
        self.state
            .lock()
            .map(|st| st.slots.contains_key(&seq))
            .unwrap_or(false)
    }

    /// Calls still awaiting a response.
    pub fn pending(&self) -> usize {
        self.state.lock().map(|st| st.slots.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry(ceiling: Sequence, policy: CollisionPolicy) -> CorrelationRegistry {
        CorrelationRegistry::new(ceiling, policy, Arc::default())
    }

    fn noop() -> ResponseHandler {
        Box::new(|_| {})
    }

    fn counting(hits: &Arc<AtomicUsize>) -> ResponseHandler {
        let hits = Arc::clone(hits);
        Box::new(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn response(seq: Sequence) -> ResponseEnvelope {
        ResponseEnvelope::new(seq, 200, Value::Null)
    }

    #[test]
    fn first_sequence_is_one_and_wraps_to_zero() {
        let r = registry(3, CollisionPolicy::Overwrite);
        let seqs: Vec<Sequence> = (0..7).map(|_| r.allocate(noop()).unwrap().seq).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 0, 1, 2]);
    }

    #[test]
    fn maximal_ceiling_wraps_instead_of_overflowing() {
        let r = registry(Sequence::MAX, CollisionPolicy::Overwrite);
        r.state.lock().unwrap().counter = Sequence::MAX - 1;
        assert_eq!(r.allocate(noop()).unwrap().seq, Sequence::MAX);
        assert_eq!(r.allocate(noop()).unwrap().seq, 0);
        assert_eq!(r.allocate(noop()).unwrap().seq, 1);
        assert_eq!(r.range(), Sequence::MAX as usize + 1);
    }

    #[test]
    fn allocations_below_ceiling_are_distinct() {
        let r = registry(100, CollisionPolicy::Overwrite);
        let seqs: HashSet<Sequence> = (0..99).map(|_| r.allocate(noop()).unwrap().seq).collect();
        assert_eq!(seqs.len(), 99);
        assert_eq!(r.pending(), 99);
    }

    #[test]
    fn resolve_is_at_most_once() {
        let r = registry(100, CollisionPolicy::Overwrite);
        let hits = Arc::new(AtomicUsize::new(0));
        let t = r.allocate(counting(&hits)).unwrap();

        assert!(r.resolve(t.seq, response(t.seq)));
        assert!(!r.resolve(t.seq, response(t.seq)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn unknown_sequence_is_a_silent_drop() {
        let r = registry(100, CollisionPolicy::Overwrite);
        assert!(!r.resolve(55, response(55)));
    }

    #[test]
    fn overwrite_replaces_abandoned_call() {
        let metrics = Arc::new(BridgeMetrics::default());
        let r = CorrelationRegistry::new(1, CollisionPolicy::Overwrite, Arc::clone(&metrics));
        let old = Arc::new(AtomicUsize::new(0));
        let new = Arc::new(AtomicUsize::new(0));

        let first = r.allocate(counting(&old)).unwrap();
        r.allocate(noop()).unwrap();
        r.allocate(noop()).unwrap();
        let reused = r.allocate(counting(&new)).unwrap();
        assert_eq!(first.seq, reused.seq);
        assert_eq!(metrics.sequence_collisions.get(&[]), 1);

        r.resolve(reused.seq, response(reused.seq));
        assert_eq!(old.load(Ordering::SeqCst), 0);
        assert_eq!(new.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn skip_in_use_never_returns_a_live_sequence() {
        let r = registry(2, CollisionPolicy::SkipInUse);
        let a = r.allocate(noop()).unwrap();
        let b = r.allocate(noop()).unwrap();
        let c = r.allocate(noop()).unwrap();
        assert_eq!((a.seq, b.seq, c.seq), (1, 2, 3));

        r.resolve(b.seq, response(b.seq));
        let d = r.allocate(noop()).unwrap();
        assert_eq!(d.seq, 0);
        let e = r.allocate(noop()).unwrap();
        assert_eq!(e.seq, 2, "1 is still pending, so 2 is next free");

        let err = r.allocate(noop()).unwrap_err();
        assert!(matches!(err, XdError::RegistryFull(4)));
        assert!(err.is_caller_misuse());
    }

    #[test]
    fn stale_ticket_cannot_evict_recycled_sequence() {
        let r = registry(0, CollisionPolicy::Overwrite);
        let first = r.allocate(noop()).unwrap();
        r.resolve(first.seq, response(first.seq));
        r.allocate(noop()).unwrap();
        let again = r.allocate(noop()).unwrap();
        assert_eq!(again.seq, first.seq);

        assert!(!r.evict(first));
        assert!(r.is_pending(again.seq));
        assert!(r.evict(again));
        assert!(!r.is_pending(again.seq));
    }
}
