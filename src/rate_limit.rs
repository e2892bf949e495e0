use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct HostRateLimiter {
    min_interval: Duration,
    last_request: HashMap<String, Instant>,
}

impl HostRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: HashMap::new(),
        }
    }

    /// Suspends until `host` may be contacted again, then records the request.
    pub async fn wait(&mut self, host: &str) {
        if let Some(last) = self.last_request.get(host) {
            let ready_at = *last + self.min_interval;
            if ready_at > Instant::now() {
                tracing::debug!(
                    host,
                    wait_ms = (ready_at - Instant::now()).as_millis() as u64,
                    "rate limit wait"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.last_request.insert(host.to_owned(), Instant::now());
    }

    /// Counts a request made outside the limiter, such as the story page fetch.
    pub fn record(&mut self, host: &str, at: Instant) {
        self.last_request
            .entry(host.to_owned())
            .and_modify(|last| *last = (*last).max(at))
            .or_insert(at);
    }
}
