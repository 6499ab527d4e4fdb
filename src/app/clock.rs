use std::time::Instant;

/// Seconds elapsed since the previewer started.
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn seconds(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Fixed-interval gate. Each ticker keeps its own previous timestamp, so two
/// tickers sharing an interval may drift apart under scheduling jitter.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: f64,
    previous: f64,
}

impl Ticker {
    pub fn new(interval: f64, now: f64) -> Self {
        Self { interval, previous: now }
    }

    /// Returns true and restarts the interval once at least `interval` has passed.
    pub fn due(&mut self, now: f64) -> bool {
        if now - self.previous >= self.interval {
            self.previous = now;
            true
        } else {
            false
        }
    }
}
