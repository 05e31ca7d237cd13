//! Fixed-window request limiter keyed by client address and path.

use crate::config::RateLimitOptions;
use crate::error::ApiError;
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Window {
    started: Instant,
    count: u32,
}

struct Windows {
    by_key: HashMap<(String, String), Window>,
    last_sweep: Instant,
}

pub struct RateLimiter {
    window: Duration,
    max: u32,
    windows: Mutex<Windows>,
}

/// First `x-forwarded-for` entry, else `x-real-ip`, else "unknown".
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

impl RateLimiter {
    pub fn new(options: &RateLimitOptions) -> Self {
        RateLimiter {
            window: options.window,
            max: options.max,
            windows: Mutex::new(Windows {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn check(&self, client: &str, path: &str) -> Result<(), ApiError> {
        self.check_at(client, path, Instant::now())
    }

    fn check_at(&self, client: &str, path: &str, now: Instant) -> Result<(), ApiError> {
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Expired windows are dropped at most once per window length.
        if now.saturating_duration_since(windows.last_sweep) >= self.window {
            let window = self.window;
            windows
                .by_key
                .retain(|_, w| now.saturating_duration_since(w.started) < window);
            windows.last_sweep = now;
        }
        let entry = windows
            .by_key
            .entry((client.to_string(), path.to_string()))
            .or_insert(Window { started: now, count: 0 });
        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max {
            let remaining = self.window.saturating_sub(now.saturating_duration_since(entry.started));
            return Err(ApiError::too_many_requests(remaining.as_secs().max(1)));
        }
        entry.count += 1;
        Ok(())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .by_key
            .len()
    }
}
