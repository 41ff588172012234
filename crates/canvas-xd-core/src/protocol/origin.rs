//! Origins: send-side target derivation and receive-side gating.
//!
//! Send side: a message is posted with a target origin derived from the
//! peer's URL (`scheme://host[:port]`), or the wildcard when no URL is known.
//! Receive side: every inbound event is checked against an expected origin,
//! either an exact string or a predicate. There is no receive-side wildcard.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, XdError};

/// Wildcard target origin.
pub const WILDCARD: &str = "*";

/// Origin restriction applied when posting a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// `*`: deliver regardless of the receiver's origin.
    Any,
    /// Deliver only if the receiver's origin is byte-equal.
    Exact(String),
}

impl TargetOrigin {
    /// Derive from an optional URL. Absent or empty => wildcard.
    pub fn derive(url: Option<&str>) -> Result<Self> {
        match url {
            None => Ok(TargetOrigin::Any),
            Some(u) if u.is_empty() => Ok(TargetOrigin::Any),
            Some(u) => origin_of(u).map(TargetOrigin::Exact),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetOrigin::Any => WILDCARD,
            TargetOrigin::Exact(o) => o,
        }
    }

    /// Whether a window with `receiver_origin` may receive the message.
    pub fn permits(&self, receiver_origin: &str) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::Exact(o) => o == receiver_origin,
        }
    }
}

impl fmt::Display for TargetOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract `scheme://authority` from a URL, dropping path, query and fragment.
pub fn origin_of(url: &str) -> Result<String> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| XdError::InvalidOrigin(format!("missing scheme: {url}")))?;
    if scheme.is_empty() || scheme.contains(['/', '?', '#', ':']) {
        return Err(XdError::InvalidOrigin(format!("bad scheme: {url}")));
    }
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    if authority.is_empty() {
        return Err(XdError::InvalidOrigin(format!("missing host: {url}")));
    }
    Ok(format!("{scheme}://{authority}"))
}

/// Expected sender origin for inbound messages.
#[derive(Clone)]
pub enum ExpectedOrigin {
    /// Byte-equal match.
    Exact(String),
    /// Arbitrary check (allow-lists).
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ExpectedOrigin {
    pub fn exact(origin: impl Into<String>) -> Self {
        ExpectedOrigin::Exact(origin.into())
    }

    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        ExpectedOrigin::Predicate(Arc::new(f))
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        accepts(candidate, self)
    }
}

impl fmt::Debug for ExpectedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedOrigin::Exact(o) => f.debug_tuple("Exact").field(o).finish(),
            ExpectedOrigin::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// `accepts(candidate, expected)`: exact => byte-equal, predicate => its result.
pub fn accepts(candidate: &str, expected: &ExpectedOrigin) -> bool {
    match expected {
        ExpectedOrigin::Exact(o) => o == candidate,
        ExpectedOrigin::Predicate(f) => f(candidate),
    }
}

/// Outcome of gating one inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Admit,
    /// Origin mismatch: drop silently.
    Reject,
    /// No data on the event: nothing to gate, nothing to deliver.
    Empty,
}

/// Receive-side origin gate.
#[derive(Debug, Clone)]
pub struct OriginGate {
    expected: ExpectedOrigin,
}

impl OriginGate {
    pub fn new(expected: ExpectedOrigin) -> Self {
        Self { expected }
    }

    pub fn expected(&self) -> &ExpectedOrigin {
        &self.expected
    }

    pub fn accepts(&self, origin: &str) -> bool {
        accepts(origin, &self.expected)
    }

    /// Gate an event. Events without data skip the origin check entirely.
    pub fn check(&self, origin: &str, data: Option<&Value>) -> GateVerdict {
        match data {
            None | Some(Value::Null) => GateVerdict::Empty,
            Some(_) if self.accepts(origin) => GateVerdict::Admit,
            Some(_) => {
                tracing::trace!(%origin, "origin gate rejected event");
                GateVerdict::Reject
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn derive_strips_path_and_query() {
        let t = TargetOrigin::derive(Some("https://host:443/path?x=1")).unwrap();
        assert_eq!(t, TargetOrigin::Exact("https://host:443".into()));
    }

    #[test]
    fn derive_strips_query_without_path() {
        let t = TargetOrigin::derive(Some("https://host?x=1#frag")).unwrap();
        assert_eq!(t.as_str(), "https://host");
    }

    #[test]
    fn derive_absent_is_wildcard() {
        assert_eq!(TargetOrigin::derive(None).unwrap(), TargetOrigin::Any);
        assert_eq!(TargetOrigin::derive(Some("")).unwrap().as_str(), "*");
    }

    #[test]
    fn derive_rejects_garbage() {
        assert!(TargetOrigin::derive(Some("host/path")).is_err());
        assert!(TargetOrigin::derive(Some("https:///path")).is_err());
    }

    #[test]
    fn exact_gate_is_byte_equal() {
        let e = ExpectedOrigin::exact("https://a.example");
        assert!(accepts("https://a.example", &e));
        assert!(!accepts("https://a.example/", &e));
        assert!(!accepts("https://A.example", &e));
        assert!(!accepts("http://a.example", &e));
    }

    #[test]
    fn predicate_gate_mirrors_predicate() {
        let e = ExpectedOrigin::predicate(|o| o.ends_with(".example"));
        for o in ["https://a.example", "https://b.other", ""] {
            assert_eq!(accepts(o, &e), o.ends_with(".example"));
        }
    }

    #[test]
    fn empty_event_skips_gate() {
        let gate = OriginGate::new(ExpectedOrigin::exact("https://a.example"));
        assert_eq!(gate.check("https://evil.example", None), GateVerdict::Empty);
        let data = json!({"seq": 1});
        assert_eq!(gate.check("https://a.example", Some(&data)), GateVerdict::Admit);
        assert_eq!(gate.check("https://evil.example", Some(&data)), GateVerdict::Reject);
    }
}
