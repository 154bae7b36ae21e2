//! Sliding-window request limiter.
//!
//! Keeps a log of every admitted request inside the trailing window, both
//! globally and per requester identity. Unlike a token bucket the log gives
//! exact enforcement: at any instant the window holds at most `max_total`
//! records, and at most `max_per_id` records for a single identity.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

/// One admitted request.
#[derive(Debug, Clone)]
struct Record<K> {
    id: K,
    /// Admission time, seconds since the Unix epoch.
    at: f64,
}

/// Mutable limiter state. Always accessed under the limiter's mutex.
#[derive(Debug)]
struct Window<K> {
    /// Admitted requests, ordered by `at` ascending.
    log: VecDeque<Record<K>>,
    /// Live record count per identity. Keys with a zero count are removed.
    per_id: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> Window<K> {
    fn new() -> Self {
        Self {
            log: VecDeque::new(),
            per_id: HashMap::new(),
        }
    }

    /// Drop every record at or before `cutoff`.
    fn purge(&mut self, cutoff: f64) {
        while let Some(front) = self.log.front() {
            if front.at > cutoff {
                break;
            }
            if let Some(record) = self.log.pop_front() {
                self.release(&record.id);
            }
        }
    }

    fn release(&mut self, id: &K) {
        if let Some(count) = self.per_id.get_mut(id) {
            *count -= 1;
            if *count == 0 {
                self.per_id.remove(id);
            }
        }
    }

    /// Insert keeping `log` sorted. Equal timestamps keep arrival order.
    fn record(&mut self, id: K, at: f64) {
        let pos = self.log.partition_point(|r| r.at <= at);
        *self.per_id.entry(id.clone()).or_insert(0) += 1;
        self.log.insert(pos, Record { id, at });
    }

    fn count_for(&self, id: &K) -> usize {
        self.per_id.get(id).copied().unwrap_or(0)
    }
}

/// A request limiter with a global and a per-identity budget over a
/// sliding time window.
///
/// The limiter is meant to be constructed once and shared (e.g. behind an
/// `Arc`) by every request handler. The whole purge-check-record sequence
/// runs under a single mutex, so two concurrent callers can never both take
/// the last free slot.
#[derive(Debug)]
pub struct RequestLimiter<K> {
    /// Maximum admitted requests in the window, all identities combined.
    max_total: usize,
    /// Maximum admitted requests in the window for one identity.
    /// Zero disables admission entirely.
    max_per_id: usize,
    /// Window width in seconds.
    window_secs: f64,
    state: Mutex<Window<K>>,
}

impl<K: Eq + Hash + Clone> RequestLimiter<K> {
    /// Create a new limiter.
    ///
    /// * `max_total` - Maximum admitted requests within the window.
    /// * `max_per_id` - Maximum admitted requests within the window per identity.
    /// * `window_secs` - Window duration in seconds.
    pub fn new(max_total: usize, max_per_id: usize, window_secs: u64) -> Self {
        Self {
            max_total,
            max_per_id,
            window_secs: window_secs as f64,
            state: Mutex::new(Window::new()),
        }
    }

    pub fn max_total(&self) -> usize {
        self.max_total
    }

    pub fn max_per_id(&self) -> usize {
        self.max_per_id
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Try to admit a request from `id` at the current wall-clock time.
    ///
    /// Returns `true` and records the request if admitted, `false` otherwise.
    pub fn admit(&self, id: K) -> bool {
        self.admit_at(id, now_secs())
    }

    /// Try to admit a request from `id` at `at` (seconds since the epoch).
    ///
    /// Records older than or exactly `window_secs` before `at` are purged
    /// first, whether or not the request is then admitted. A denied request
    /// leaves the counts untouched.
    ///
    /// Timestamps earlier than already-recorded ones are accepted and slotted
    /// into place. A non-finite `at` is always denied.
    pub fn admit_at(&self, id: K, at: f64) -> bool {
        if !at.is_finite() {
            debug!(at, "non-finite request time, denying");
            return false;
        }

        let mut window = self.lock();
        window.purge(at - self.window_secs);

        if window.log.len() >= self.max_total {
            debug!(total = window.log.len(), max = self.max_total, "global budget exhausted");
            return false;
        }
        if self.max_per_id == 0 {
            return false;
        }
        let used = window.count_for(&id);
        if used >= self.max_per_id {
            debug!(used, max = self.max_per_id, "per-id budget exhausted");
            return false;
        }

        window.record(id, at);
        true
    }

    /// Check whether `id` would be admitted at `at` without recording
    /// anything or purging the log.
    pub fn would_admit(&self, id: &K, at: f64) -> bool {
        if !at.is_finite() || self.max_per_id == 0 {
            return false;
        }

        let cutoff = at - self.window_secs;
        let window = self.lock();
        let live = window.log.iter().filter(|r| r.at > cutoff);
        let (total, mine) = live.fold((0usize, 0usize), |(total, mine), r| {
            (total + 1, mine + usize::from(r.id == *id))
        });

        total < self.max_total && mine < self.max_per_id
    }

    /// Number of records currently held (expired records are only dropped
    /// on the next admission attempt).
    pub fn len(&self) -> usize {
        self.lock().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records currently held for `id`.
    pub fn count_for(&self, id: &K) -> usize {
        self.lock().count_for(id)
    }

    fn lock(&self) -> MutexGuard<'_, Window<K>> {
        // Every mutation leaves the window consistent, so a panic in another
        // holder does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Current wall-clock time in seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
