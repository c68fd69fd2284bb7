use std::time::{Duration, Instant};

/// Lets a report through once strictly more than `interval` has passed
/// since the previous one (or since construction).
#[derive(Debug, Clone)]
pub struct ReportGate {
    interval: Duration,
    last: Instant,
}

impl ReportGate {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        ReportGate {
            interval,
            last: start,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
