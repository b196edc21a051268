//! Per-identity sliding-window upload limiter
//!
//! Process-local only. Each identity keeps the timestamps of its recent
//! uploads; entries older than the window are pruned on every access.
//!
//! The orchestrator uses [`RateLimiter::reserve`] rather than a separate
//! check-then-record pair, so two concurrent uploads for the same identity
//! cannot both pass the check and overshoot the limit. A reservation that is
//! dropped without [`Reservation::commit`] gives its slot back.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

pub const DEFAULT_MAX_UPLOADS: usize = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Monotonic time source, as an offset from an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wall clock for production use.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.now_ms.store(at.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.now_ms.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_uploads: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_uploads: DEFAULT_MAX_UPLOADS,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Time until the oldest counted upload leaves the window. Zero when allowed.
    pub retry_after: Duration,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, VecDeque<Duration>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("identities", &self.tracked_identities())
            .finish()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    // Timestamps are plain data; a panic mid-update cannot leave them unusable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Duration>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(history: &mut VecDeque<Duration>, now: Duration, window: Duration) {
        while history
            .front()
            .is_some_and(|&t| now.saturating_sub(t) >= window)
        {
            history.pop_front();
        }
    }

    fn decide(&self, history: &VecDeque<Duration>, now: Duration) -> RateLimitDecision {
        if history.len() < self.config.max_uploads {
            return RateLimitDecision {
                allowed: true,
                retry_after: Duration::ZERO,
            };
        }
        let oldest = history.front().copied().unwrap_or(now);
        RateLimitDecision {
            allowed: false,
            retry_after: (oldest + self.config.window).saturating_sub(now),
        }
    }

    /// Whether `identity` may upload now. Does not count anything.
    pub fn check(&self, identity: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut windows = self.lock();
        match windows.get_mut(identity) {
            Some(history) => {
                Self::prune(history, now, self.config.window);
                self.decide(history, now)
            }
            None => self.decide(&VecDeque::new(), now),
        }
    }

    /// Count one upload for `identity` at the current time.
    pub fn record_upload(&self, identity: &str) {
        let now = self.clock.now();
        let mut windows = self.lock();
        let history = windows.entry(identity.to_string()).or_default();
        Self::prune(history, now, self.config.window);
        history.push_back(now);
        while history.len() > self.config.max_uploads.max(1) {
            history.pop_front();
        }
    }

    /// Atomically check and claim a slot. On refusal returns the retry delay.
    pub fn reserve(&self, identity: &str) -> Result<Reservation<'_>, Duration> {
        let now = self.clock.now();
        let mut windows = self.lock();
        let history = windows.entry(identity.to_string()).or_default();
        Self::prune(history, now, self.config.window);

        let decision = self.decide(history, now);
        if !decision.allowed {
            debug!(identity, retry_after_ms = decision.retry_after.as_millis() as u64, "upload refused");
            return Err(decision.retry_after);
        }

        history.push_back(now);
        Ok(Reservation {
            limiter: self,
            identity: identity.to_string(),
            at: now,
            committed: false,
        })
    }

    fn release(&self, identity: &str, at: Duration) {
        let mut windows = self.lock();
        if let Some(history) = windows.get_mut(identity) {
            if let Some(pos) = history.iter().rposition(|&t| t == at) {
                history.remove(pos);
            }
            if history.is_empty() {
                windows.remove(identity);
            }
        }
    }

    /// Drop identities with no uploads left in the window.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let window = self.config.window;
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, history| {
            Self::prune(history, now, window);
            !history.is_empty()
        });
        before - windows.len()
    }

    pub fn tracked_identities(&self) -> usize {
        self.lock().len()
    }
}

/// A claimed upload slot. Released on drop unless committed.
#[must_use = "an uncommitted reservation is released when dropped"]
pub struct Reservation<'a> {
    limiter: &'a RateLimiter,
    identity: String,
    at: Duration,
    committed: bool,
}

impl Reservation<'_> {
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.limiter.release(&self.identity, self.at);
        }
    }
}
