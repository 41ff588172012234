//! Host page discovery.
//!
//! The host passes its own URL to the canvas frame in the location fragment
//! (percent-encoded). If it does not, the canvas still works, but posts go
//! out with the wildcard target origin and only the configured allowlist is
//! trusted for inbound traffic.

use canvas_xd_core::protocol::origin::origin_of;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentLocator {
    url: Option<String>,
}

impl ParentLocator {
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse `#https%3A%2F%2Fhost%2Fpage` style fragments.
    pub fn from_fragment(fragment: &str) -> Self {
        let raw = fragment.strip_prefix('#').unwrap_or(fragment);
        if raw.is_empty() {
            return Self::none();
        }
        // Same strictness as decodeURIComponent on the UTF-8 side.
        let decoded = match urlencoding::decode(raw) {
            Ok(d) => d.into_owned(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "frame fragment does not decode to utf-8; parent unknown"
                );
                return Self::none();
            }
        };
        if !decoded.starts_with("http") {
            return Self::none();
        }
        if let Err(e) = origin_of(&decoded) {
            tracing::warn!(error = %e, "frame fragment does not carry a usable parent url");
            return Self::none();
        }
        Self { url: Some(decoded) }
    }

    /// Configured URL wins; otherwise fall back to the fragment.
    pub fn resolve(configured: Option<&str>, fragment: Option<&str>) -> Self {
        if let Some(url) = configured {
            return Self {
                url: Some(url.to_string()),
            };
        }
        fragment.map(Self::from_fragment).unwrap_or_default()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// `scheme://host[:port]` of the parent, when known.
    pub fn origin(&self) -> Option<String> {
        self.url.as_deref().and_then(|u| origin_of(u).ok())
    }
}
