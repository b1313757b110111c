//! In-memory TTL cache for keyword lookups.

use crate::model::VulnerabilityRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CAPACITY: usize = 500;

/// Source of "now" for cache expiry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner()) += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct CacheEntry {
    records: Vec<VulnerabilityRecord>,
    inserted_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
}

impl CacheState {
    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

/// Keyword results keyed by `"{keyword}:{results_per_page}"`.
///
/// When full, roughly the oldest tenth of the entries (by insertion order)
/// is dropped before the new entry goes in.
pub struct VulnCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl VulnCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, capacity: usize) -> Self {
        Self {
            clock,
            ttl,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn key(keyword: &str, results_per_page: usize) -> String {
        format!("{}:{}", keyword, results_per_page)
    }

    /// Returns a clone of the cached records if present and not expired.
    pub fn get(&self, key: &str) -> Option<Vec<VulnerabilityRecord>> {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let expired = match state.entries.get(key) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                return Some(entry.records.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, records: Vec<VulnerabilityRecord>) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        state.remove(&key);
        if state.entries.len() >= self.capacity {
            let evict = (self.capacity / 10).max(1);
            for _ in 0..evict {
                match state.order.pop_front() {
                    Some(oldest) => {
                        state.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        state.order.push_back(key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                records,
                inserted_at: now,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.clear();
        state.order.clear();
    }
}

impl Default for VulnCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}
