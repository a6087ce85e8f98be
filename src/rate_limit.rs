//! Fixed-window rate limiting keyed by (client identity, action).
//!
//! A counter created at time T expires at T+window; burst at the window
//! boundary is a documented tradeoff of the fixed-window scheme. Counters
//! live in one shared store behind a mutex, so increments are atomic and
//! never undercount.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateBudget;

struct Window {
    count: u32,
    expires_at: Instant,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<Mutex<HashMap<(String, String), Window>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// True if the counter for (identifier, action) has reached `limit`
    /// within the current window.
    pub fn is_limited(&self, identifier: &str, action: &str, limit: u32) -> bool {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let key = (identifier.to_string(), action.to_string());

        match store.get(&key) {
            Some(window) if window.expires_at > Instant::now() => window.count >= limit,
            Some(_) => {
                store.remove(&key);
                false
            }
            None => false,
        }
    }

    /// Increment the counter, creating it with the given TTL if absent or
    /// expired. Called on every outcome, success or failure, so failed key
    /// guesses still burn budget.
    pub fn increment(&self, identifier: &str, action: &str, window_secs: u64) {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let key = (identifier.to_string(), action.to_string());
        let now = Instant::now();

        match store.get_mut(&key) {
            Some(window) if window.expires_at > now => {
                window.count += 1;
            }
            _ => {
                store.insert(
                    key,
                    Window {
                        count: 1,
                        expires_at: now + Duration::from_secs(window_secs),
                    },
                );
            }
        }
    }

    /// Attempts left in the current window.
    pub fn remaining(&self, identifier: &str, action: &str, limit: u32) -> u32 {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let key = (identifier.to_string(), action.to_string());

        match store.get(&key) {
            Some(window) if window.expires_at > Instant::now() => {
                limit.saturating_sub(window.count)
            }
            _ => limit,
        }
    }

    /// Drop expired windows. Called from the background sweep so the store
    /// does not grow unbounded between bursts.
    pub fn purge_expired(&self) -> usize {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = store.len();
        store.retain(|_, window| window.expires_at > now);
        before - store.len()
    }

    /// Gate an action under a budget: rejects when limited, then counts this
    /// attempt. The increment-then-handle order bounds guess attempts even
    /// when the request goes on to fail.
    pub fn check(&self, identifier: &str, action: &str, budget: RateBudget) -> bool {
        if self.is_limited(identifier, action, budget.limit) {
            return false;
        }
        self.increment(identifier, action, budget.window_secs);
        true
    }
}
