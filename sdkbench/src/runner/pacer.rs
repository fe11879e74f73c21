use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Fixed-cadence schedule for one worker.
///
/// The next slot is always the previous slot plus `interval`, never "now + interval", so
/// response time does not stretch the schedule. A worker that overran its slot goes again
/// immediately and restarts the cadence from there: missed slots are not repaid with a burst
/// of back-to-back requests.
pub(crate) struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            next: start,
        }
    }

    /// Advance one slot and sleep until it, or until `deadline` if that comes first.
    ///
    /// A late or closed-loop worker does not sleep but still yields to the scheduler once.
    pub async fn wait(&mut self, deadline: Instant) {
        self.next += self.interval;

        let now = Instant::now();
        if self.next <= now {
            self.next = now;
            tokio::task::yield_now().await;
            return;
        }

        sleep_until(self.next.min(deadline)).await;
    }

    #[cfg(test)]
    pub fn next(&self) -> Instant {
        self.next
    }
}

impl std::fmt::Display for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", humantime::format_duration(self.interval))
    }
}
