//! Built-in host services.

pub mod context;
pub mod echo_proxy;

use std::sync::Arc;

use dashmap::DashSet;

pub use context::ContextService;
pub use echo_proxy::EchoProxyService;

/// Access tokens the host currently honours. Shared between services so
/// revoking a token expires it everywhere.
pub type ValidTokens = Arc<DashSet<String>>;

pub fn valid_tokens<I>(tokens: I) -> ValidTokens
where
    I: IntoIterator<Item = String>,
{
    Arc::new(tokens.into_iter().collect())
}

pub(crate) fn is_valid(tokens: &ValidTokens, token: Option<&str>) -> bool {
    token.is_some_and(|t| tokens.contains(t))
}
