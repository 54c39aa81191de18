//! Sliding-window rate limiting.
//!
//! A [`Cooldown`] belongs to one [`Action`](crate::Action) and keeps a
//! separate window per [`ActorKey`]. Each window is a fixed-capacity ring
//! buffer of admission timestamps guarded by its own mutex, so actors never
//! contend with each other and a check-and-insert on one window is atomic.
//!
//! ```rust,ignore
//! let cooldown = Cooldown::new(NonZeroUsize::new(3).unwrap(), Duration::from_secs(10));
//! cooldown.fire(actor)?; // admitted
//! ```

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use switchyard_core::{ActorKey, DispatchError, DispatchResult};

/// Permits left in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    /// Admissions still available right now.
    pub permits: usize,
    /// Time until the oldest admission leaves the window; zero unless exhausted.
    pub time_until_next: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Limit {
    permits: NonZeroUsize,
    interval: Duration,
}

/// A per-actor sliding-window limiter.
#[derive(Debug, Default)]
pub struct Cooldown {
    limit: Option<Limit>,
    windows: DashMap<ActorKey, Arc<Mutex<Window>>>,
}

impl Cooldown {
    /// A cooldown that admits everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Admits at most `permits` calls per actor within any `interval`.
    pub fn new(permits: NonZeroUsize, interval: Duration) -> Self {
        Self {
            limit: Some(Limit { permits, interval }),
            windows: DashMap::new(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.limit.is_none()
    }

    /// Total permits per window, `None` when unbounded.
    pub fn permits(&self) -> Option<usize> {
        self.limit.map(|limit| limit.permits.get())
    }

    /// Window length, `None` when unbounded.
    pub fn interval(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.interval)
    }

    /// Records one admission for `actor`, or fails with
    /// [`DispatchError::CooldownBreached`] when the window is full.
    pub fn fire(&self, actor: ActorKey) -> DispatchResult {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        let window = self.window(actor, limit);
        let mut window = window.lock();
        window
            .try_admit(Instant::now(), limit.interval)
            .map_err(|retry_after| DispatchError::CooldownBreached {
                permits: limit.permits.get(),
                interval: limit.interval,
                retry_after,
            })
    }

    /// Reports the permits left for `actor` without consuming one.
    pub fn remaining(&self, actor: ActorKey) -> Remaining {
        let Some(limit) = self.limit else {
            return Remaining {
                permits: usize::MAX,
                time_until_next: Duration::ZERO,
            };
        };
        let Some(window) = self.windows.get(&actor).map(|w| Arc::clone(w.value())) else {
            return Remaining {
                permits: limit.permits.get(),
                time_until_next: Duration::ZERO,
            };
        };
        let mut window = window.lock();
        window.remaining(Instant::now(), limit.interval)
    }

    /// Drops windows that no longer hold any admission. Returns how many were removed.
    pub fn purge_idle(&self) -> usize {
        let Some(limit) = self.limit else {
            return 0;
        };
        let now = Instant::now();
        let before = self.windows.len();
        // A window still referenced outside the map may be mid-admission.
        self.windows.retain(|_, window| {
            Arc::strong_count(window) > 1 || !window.lock().is_idle(now, limit.interval)
        });
        before.saturating_sub(self.windows.len())
    }

    fn window(&self, actor: ActorKey, limit: Limit) -> Arc<Mutex<Window>> {
        let entry = self
            .windows
            .entry(actor)
            .or_insert_with(|| Arc::new(Mutex::new(Window::new(limit.permits))));
        Arc::clone(entry.value())
    }
}

/// Ring buffer of admission timestamps, oldest at `tail`.
#[derive(Debug)]
struct Window {
    slots: Box<[Option<Instant>]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl Window {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: vec![None; capacity.get()].into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn oldest(&self) -> Option<Instant> {
        if self.count == 0 {
            None
        } else {
            self.slots[self.tail]
        }
    }

    fn evict(&mut self, now: Instant, interval: Duration) {
        while let Some(oldest) = self.oldest() {
            if now.saturating_duration_since(oldest) < interval {
                break;
            }
            self.slots[self.tail] = None;
            self.tail = (self.tail + 1) % self.capacity();
            self.count -= 1;
        }
    }

    fn retry_after(&self, now: Instant, interval: Duration) -> Duration {
        self.oldest()
            .map(|oldest| interval.saturating_sub(now.saturating_duration_since(oldest)))
            .unwrap_or(Duration::ZERO)
    }

    /// Admits at `now`, or returns the time until the next permit frees up.
    fn try_admit(&mut self, now: Instant, interval: Duration) -> Result<(), Duration> {
        self.evict(now, interval);
        if self.count == self.capacity() {
            return Err(self.retry_after(now, interval));
        }
        self.slots[self.head] = Some(now);
        self.head = (self.head + 1) % self.capacity();
        self.count += 1;
        Ok(())
    }

    fn remaining(&mut self, now: Instant, interval: Duration) -> Remaining {
        self.evict(now, interval);
        let permits = self.capacity() - self.count;
        let time_until_next = if permits == 0 {
            self.retry_after(now, interval)
        } else {
            Duration::ZERO
        };
        Remaining {
            permits,
            time_until_next,
        }
    }

    fn is_idle(&mut self, now: Instant, interval: Duration) -> bool {
        self.evict(now, interval);
        self.count == 0
    }
}
