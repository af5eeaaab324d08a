//! Sliding-window request rate limiting, independent of any specific
//! transport identity — callers supply their own `client_id`.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_after: Duration,
}

#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call attempt for `client_id` and reports whether it's
    /// allowed under `limit` calls per `window`. Prunes timestamps outside
    /// the window before counting, so `limit`/`window` can vary per call
    /// without stale state from a previous configuration leaking through.
    pub fn check(&self, client_id: &str, limit: u32, window: Duration) -> Decision {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let entry = windows.entry(client_id.to_string()).or_default();

        while let Some(&oldest) = entry.front() {
            if now.duration_since(oldest) >= window {
                entry.pop_front();
            } else {
                break;
            }
        }

        let count = entry.len() as u32;
        let reset_after = entry
            .front()
            .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(Duration::ZERO);

        if count >= limit {
            return Decision {
                allowed: false,
                remaining: 0,
                reset_after,
            };
        }

        entry.push_back(now);
        Decision {
            allowed: true,
            remaining: limit - count - 1,
            reset_after,
        }
    }
}
