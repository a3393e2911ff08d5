//! Spacing between outbound requests.

use std::time::{Duration, Instant};

use tracing::trace;

/// Minimum time between two requests to the service.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(250);

/// Keeps successive requests at least `min_interval` apart.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(MIN_REQUEST_INTERVAL)
    }
}

impl Throttle {
    #[must_use]
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Sleep until a request may be sent, then mark it as sent.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let pause = self.min_interval - elapsed;
                trace!(?pause, "throttling request");
                tokio::time::sleep(pause).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_not_delayed() {
        let mut throttle = Throttle::new(Duration::from_secs(10));
        let start = Instant::now();
        throttle.wait().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let interval = Duration::from_millis(40);
        let mut throttle = Throttle::new(interval);
        let start = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(start.elapsed() >= interval * 2);
    }

    #[tokio::test]
    async fn test_no_delay_after_idle() {
        let interval = Duration::from_millis(20);
        let mut throttle = Throttle::new(interval);
        throttle.wait().await;
        tokio::time::sleep(interval * 2).await;

        let before = Instant::now();
        throttle.wait().await;
        assert!(before.elapsed() < interval);
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(Throttle::default().min_interval, Duration::from_millis(250));
    }
}
