// Sliding-log request admission control

use crate::core::errors::AttendanceError;
use crate::core::models::RatePolicy;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Per-key sliding log. A rejected request leaves no trace in the window;
/// only admitted requests count toward the limit.
#[derive(Default)]
pub struct RateLimiter {
    windows: RwLock<HashMap<String, Arc<Mutex<VecDeque<DateTime<Utc>>>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn admit(&self, key: &str, policy: RatePolicy) -> Result<(), AttendanceError> {
        self.admit_at(key, policy, Utc::now()).await
    }

    /// Prune, check, append under the per-key lock so concurrent checks on
    /// one key cannot over-admit.
    pub async fn admit_at(
        &self,
        key: &str,
        policy: RatePolicy,
        now: DateTime<Utc>,
    ) -> Result<(), AttendanceError> {
        let cell = self.window_cell(key).await;
        let mut window = cell.lock().await;

        // Only entries strictly older than the trailing window leave it; an
        // entry exactly `window` old still counts.
        let horizon = now - Duration::seconds(policy.window_secs as i64);
        while window.front().is_some_and(|t| *t < horizon) {
            window.pop_front();
        }

        if window.len() >= policy.max_requests as usize {
            // Seconds until the oldest admitted request ages out.
            let retry_after_secs = window
                .front()
                .map(|oldest| (*oldest - horizon).num_seconds().max(1))
                .unwrap_or(1);
            return Err(AttendanceError::RateLimited { retry_after_secs });
        }

        window.push_back(now);
        Ok(())
    }

    async fn window_cell(&self, key: &str) -> Arc<Mutex<VecDeque<DateTime<Utc>>>> {
        if let Some(cell) = self.windows.read().await.get(key) {
            return Arc::clone(cell);
        }
        let mut windows = self.windows.write().await;
        Arc::clone(
            windows
                .entry(key.to_string())
                .or_insert_with(Default::default),
        )
    }
}
