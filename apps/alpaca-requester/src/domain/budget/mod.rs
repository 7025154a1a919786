//! Request Budget
//!
//! [`RateBudget`] tracks request starts against a "N requests per window"
//! allowance. It keeps the start instant of every request still inside the
//! trailing window, so the allowance holds for any window position, not only
//! for aligned ones. The budget takes the clock as an argument and is fully
//! deterministic.
//!
//! [`RateGate`] wraps a budget for sharing between tasks. Checking and
//! taking a slot happen under one lock; waiting happens outside it with a
//! timed sleep.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Stand-in for "never" when a deadline would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + wait`, saturated to a far-future instant on overflow.
fn deadline(from: Instant, wait: Duration) -> Instant {
    from.checked_add(wait)
        .or_else(|| from.checked_add(FAR_FUTURE))
        .unwrap_or(from)
}

/// Per-window request allowance.
#[derive(Debug, Clone)]
pub struct RateBudget {
    limit: u32,
    window: Duration,
    starts: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl RateBudget {
    /// Allow `limit` request starts in any `window`.
    ///
    /// A zero limit is raised to one so the budget can always make progress.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            window,
            starts: VecDeque::with_capacity(limit as usize),
            blocked_until: None,
        }
    }

    /// Configured requests per window.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Configured window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Start of the current window: the oldest request start still counted.
    #[must_use]
    pub fn window_start(&self) -> Option<Instant> {
        self.starts.front().copied()
    }

    /// Requests started inside the window ending at `now`.
    pub fn count(&mut self, now: Instant) -> u32 {
        self.expire(now);
        self.starts.len() as u32
    }

    /// Requests that could start at `now` without waiting.
    pub fn remaining(&mut self, now: Instant) -> u32 {
        if self.blocked_at(now) {
            return 0;
        }
        self.limit - self.count(now)
    }

    /// Take a slot at `now`, or return how long to wait before asking again.
    ///
    /// The returned wait is always non-zero.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        if let Some(until) = self.blocked_until {
            if until > now {
                return Err(until - now);
            }
            self.blocked_until = None;
        }

        self.expire(now);

        if (self.starts.len() as u32) < self.limit {
            self.starts.push_back(now);
            return Ok(());
        }

        // Full: the oldest start leaves the window first.
        match self.starts.front() {
            Some(&oldest) => Err(deadline(oldest, self.window).saturating_duration_since(now)),
            None => Err(self.window),
        }
    }

    /// Grant nothing before `until`. Earlier deadlines never shorten a block.
    pub fn block_until(&mut self, until: Instant) {
        self.blocked_until = Some(match self.blocked_until {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    /// Grant nothing until the current window has passed.
    pub fn block_for_window(&mut self, now: Instant) {
        self.expire(now);
        let until = self
            .starts
            .front()
            .map_or_else(|| deadline(now, self.window), |&oldest| deadline(oldest, self.window));
        self.block_until(until);
    }

    fn blocked_at(&self, now: Instant) -> bool {
        self.blocked_until.is_some_and(|until| until > now)
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.starts.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.starts.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Point-in-time view of a gate's budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    /// Requests per window.
    pub limit: u32,
    /// Requests started in the current window.
    pub used: u32,
    /// Requests that could start immediately.
    pub remaining: u32,
}

/// Shared gate in front of every request attempt.
#[derive(Debug, Clone)]
pub struct RateGate {
    budget: Arc<Mutex<RateBudget>>,
}

impl RateGate {
    /// Gate allowing `limit` requests per `window`.
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            budget: Arc::new(Mutex::new(RateBudget::new(limit, window))),
        }
    }

    /// Wait until a slot is free and take it. Returns the time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            let wait = {
                let mut budget = self.budget.lock();
                match budget.try_acquire(Instant::now()) {
                    Ok(()) => return waited,
                    Err(wait) => wait,
                }
            };

            tracing::debug!(wait_ms = wait.as_millis(), "Request budget exhausted, waiting");
            tokio::time::sleep(wait).await;
            waited += wait;
        }
    }

    /// Block the gate until `until`.
    pub fn block_until(&self, until: Instant) {
        self.budget.lock().block_until(until);
    }

    /// Block the gate for `wait` from now.
    pub fn block_for(&self, wait: Duration) {
        self.block_until(deadline(Instant::now(), wait));
    }

    /// Block the gate until the current window has passed.
    pub fn block_for_window(&self) {
        self.budget.lock().block_for_window(Instant::now());
    }

    /// Current usage.
    #[must_use]
    pub fn snapshot(&self) -> BudgetSnapshot {
        let now = Instant::now();
        let mut budget = self.budget.lock();
        let used = budget.count(now);
        BudgetSnapshot {
            limit: budget.limit(),
            used,
            remaining: budget.remaining(now),
        }
    }
}
