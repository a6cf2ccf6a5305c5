use crate::config::QueueConfig;
use chrono::Duration;

/// Bounded, linearly growing retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_secs: u64) -> Self {
        Self {
            max_retries,
            base_delay_secs,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay_secs)
    }

    /// Delay before retry number `retry` (1-based): `base * retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let secs = self.base_delay_secs.saturating_mul(u64::from(retry));
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
    }

    /// Delay for the next retry after `retries_done` retries, or `None` once
    /// the bound is reached.
    pub fn next_delay(&self, retries_done: u32) -> Option<Duration> {
        if retries_done >= self.max_retries {
            None
        } else {
            Some(self.delay_for(retries_done + 1))
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(0), Some(Duration::seconds(60)));
        assert_eq!(policy.next_delay(1), Some(Duration::seconds(120)));
        assert_eq!(policy.next_delay(2), Some(Duration::seconds(180)));
        assert_eq!(policy.next_delay(3), None);
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_zero_retries_never_schedules() {
        let policy = RetryPolicy::new(0, 60);
        assert_eq!(policy.next_delay(0), None);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = QueueConfig {
            max_retries: 5,
            retry_delay_secs: 10,
            ..QueueConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.delay_for(4), Duration::seconds(40));
        assert_eq!(policy.next_delay(4), Some(Duration::seconds(50)));
        assert_eq!(policy.next_delay(5), None);
    }
}
