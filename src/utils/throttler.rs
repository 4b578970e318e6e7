use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// Keeps a client under an API quota: at most `limit` calls per `window`, and never two calls
/// closer together than `min_interval`.
#[derive(Debug)]
pub struct Throttler {
    limit: usize,
    window: Duration,
    min_interval: Duration,

    history: VecDeque<Instant>,
}

impl Throttler {
    pub fn new(limit: usize, window: Duration, min_interval: Duration) -> Self {
        Throttler {
            limit: limit.max(1),
            window,
            min_interval,
            history: VecDeque::new(),
        }
    }

    /// Blocks until another call fits the budget, then records it.
    pub fn throttle(&mut self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        self.record(Instant::now());
    }

    fn wait_time(&mut self, now: Instant) -> Duration {
        while let Some(oldest) = self.history.front() {
            if now.duration_since(*oldest) >= self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }

        let mut wait = Duration::ZERO;

        if let Some(last) = self.history.back() {
            let since_last = now.duration_since(*last);
            if since_last < self.min_interval {
                wait = self.min_interval - since_last;
            }
        }

        if self.history.len() >= self.limit {
            // The call that has to expire before we are back under the limit
            let blocking = self.history[self.history.len() - self.limit];
            let expires_in = self.window.saturating_sub(now.duration_since(blocking));
            wait = wait.max(expires_in);
        }

        wait
    }

    fn record(&mut self, at: Instant) {
        self.history.push_back(at);
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
    }
}
