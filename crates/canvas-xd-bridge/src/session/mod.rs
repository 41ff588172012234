//! Session/token state owned by the canvas side.
//!
//! Lifecycle: created on init (optionally with a restored token), mutated by
//! explicit `set_token` calls, cleared on logout. Session invalidation is a
//! logout triggered by the dispatcher when the host reports an expired token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

/// Token store the dispatcher talks to.
pub trait SessionStore: Send + Sync {
    /// Current access token, if logged in.
    fn token(&self) -> Option<String>;

    /// Replace the token (`None` clears it).
    fn set_token(&self, token: Option<String>);

    /// Drop the session and return to the unauthenticated state.
    fn invalidate_session(&self);
}

type LogoutHook = Box<dyn Fn() + Send + Sync>;

/// In-process session context.
pub struct SessionContext {
    token: RwLock<Option<String>>,
    invalidations: AtomicU64,
    on_logout: Mutex<Vec<LogoutHook>>,
}

impl SessionContext {
    pub fn new(initial_token: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial_token),
            invalidations: AtomicU64::new(0),
            on_logout: Mutex::new(Vec::new()),
        }
    }

    /// Run `hook` after every logout (e.g. navigate back to the app's home).
    pub fn on_logout<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.on_logout.lock() {
            hooks.push(Box::new(hook));
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    /// Clear the token and run logout hooks.
    pub fn logout(&self) {
        self.set_token(None);
        if let Ok(hooks) = self.on_logout.lock() {
            for hook in hooks.iter() {
                hook();
            }
        }
    }

    /// How many times the session was invalidated by the host.
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SessionStore for SessionContext {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|g| g.clone())
    }

    fn set_token(&self, token: Option<String>) {
        if let Ok(mut g) = self.token.write() {
            *g = token;
        }
    }

    fn invalidate_session(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
        self.logout();
    }
}
