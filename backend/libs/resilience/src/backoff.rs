/// Redelivery backoff with exponential growth and jitter
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RedeliveryBackoff {
    /// Delay after the first failed attempt
    pub base: Duration,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
    /// Upper bound before jitter
    pub max: Duration,
    /// Relative jitter, 0.2 = ±20%
    pub jitter: f64,
}

impl Default for RedeliveryBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(200),
            multiplier: 2.0,
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RedeliveryBackoff {
    /// Deterministic delay for the given attempt (1-based), without jitter
    pub fn nominal(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.base.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay to wait before handing a failed message back for redelivery
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal(attempt);
        if self.jitter <= 0.0 {
            return nominal;
        }

        let mut rng = rand::thread_rng();
        let factor = 1.0 + rng.gen_range(-self.jitter..self.jitter);
        Duration::from_millis((nominal.as_millis() as f64 * factor) as u64)
    }
}
