//! Origin allowlist compilation and matching.
//!
//! Entries are either an exact origin (`https://host[:port]`) or a subdomain
//! wildcard (`https://*.example.com`). A bare `*` is refused: the receive side
//! never accepts every origin.

use canvas_xd_core::error::{Result, XdError};
use canvas_xd_core::protocol::origin::{origin_of, ExpectedOrigin, WILDCARD};

/// Compiled allowlist rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRule {
    Exact(String),
    /// `scheme` + `.suffix`; matches strict subdomains only.
    Subdomain { scheme: String, suffix: String },
}

pub fn compile_origin_rules(raw: &[String]) -> Result<Vec<OriginRule>> {
    let mut out = Vec::with_capacity(raw.len());
    for s in raw {
        if s == WILDCARD {
            return Err(XdError::BadRequest(
                "allowed_origins must not contain a bare wildcard".into(),
            ));
        }
        // format: "scheme://host[:port]" or "scheme://*.domain[:port]"
        let (scheme, host) = s.split_once("://").ok_or_else(|| {
            XdError::BadRequest(format!(
                "invalid allowed_origins entry: {s} (expected scheme://host)"
            ))
        })?;

        if let Some(domain) = host.strip_prefix("*.") {
            if domain.is_empty() || domain.contains(['*', '/', '?', '#']) {
                return Err(XdError::BadRequest(format!(
                    "invalid wildcard in allowed_origins entry: {s}"
                )));
            }
            out.push(OriginRule::Subdomain {
                scheme: scheme.to_string(),
                suffix: format!(".{domain}"),
            });
            continue;
        }

        let origin = origin_of(s)
            .map_err(|e| XdError::BadRequest(format!("invalid allowed_origins entry: {e}")))?;
        if &origin != s || host.contains('*') {
            return Err(XdError::BadRequest(format!(
                "allowed_origins entry must be a bare origin: {s}"
            )));
        }
        out.push(OriginRule::Exact(origin));
    }
    Ok(out)
}

pub fn is_origin_allowed(rules: &[OriginRule], origin: &str) -> bool {
    rules.iter().any(|r| match r {
        OriginRule::Exact(o) => o == origin,
        OriginRule::Subdomain { scheme, suffix } => {
            let Some((s, host)) = origin.split_once("://") else {
                return false;
            };
            s == scheme && host.len() > suffix.len() && host.ends_with(suffix.as_str())
        }
    })
}

/// Build the receive-side expectation: the parent origin (if known) plus the
/// allowlist. `None` when nothing is trusted.
pub fn expected_origin(
    parent_origin: Option<String>,
    rules: Vec<OriginRule>,
) -> Option<ExpectedOrigin> {
    match (parent_origin, rules.is_empty()) {
        (None, true) => None,
        (Some(parent), true) => Some(ExpectedOrigin::exact(parent)),
        (parent, false) => Some(ExpectedOrigin::predicate(move |candidate| {
            parent.as_deref() == Some(candidate) || is_origin_allowed(&rules, candidate)
        })),
    }
}
