use rand::Rng;
use std::time::{Duration, Instant};

/// Keeps requests at or below a fixed rate per minute
#[derive(Debug)]
pub struct RequestThrottler {
    interval: Duration,
    last_request: Option<Instant>,
}

impl RequestThrottler {
    pub fn new(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self {
            interval: Duration::from_secs_f64(60.0 / rpm as f64),
            last_request: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// How long a request issued at `now` has to wait
    pub fn delay_at(&self, now: Instant) -> Duration {
        match self.last_request {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub async fn wait(&mut self) {
        let delay = self.delay_at(Instant::now());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.last_request = Some(Instant::now());
    }
}

/// Uniform pause in `[min, max]` plus up to one second of jitter either way, never below 100ms
pub fn adaptive_delay(min_secs: f64, max_secs: f64) -> Duration {
    let mut rng = rand::thread_rng();
    let base = if max_secs > min_secs {
        rng.gen_range(min_secs..=max_secs)
    } else {
        min_secs
    };
    let jitter = rng.gen_range(-1.0..=1.0);
    Duration::from_secs_f64((base + jitter).max(0.1))
}
