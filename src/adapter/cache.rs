//! Adapter-local existence cache.
//!
//! Bounded (oldest entry evicted first) and time-limited. Entries for a
//! table are dropped as soon as a statement touching that table runs, so a
//! freshly created element is never reported missing from a stale entry.

use crate::schema::ElementKind;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 1000;
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// What was probed: kind, owning table and (for children) element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: ElementKind,
    pub table: String,
    pub name: Option<String>,
}

impl CacheKey {
    pub fn table(table: &str) -> Self {
        Self {
            kind: ElementKind::Table,
            table: table.to_string(),
            name: None,
        }
    }

    pub fn child(kind: ElementKind, table: &str, name: &str) -> Self {
        Self {
            kind,
            table: table.to_string(),
            name: Some(name.to_string()),
        }
    }
}

#[derive(Default)]
struct Entries {
    values: HashMap<CacheKey, (bool, Instant)>,
    order: VecDeque<CacheKey>,
}

impl Entries {
    fn forget(&mut self, key: &CacheKey) {
        if self.values.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }
}

pub struct ExistenceCache {
    capacity: usize,
    ttl: Duration,
    entries: Mutex<Entries>,
}

impl Default for ExistenceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl ExistenceCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Cached result, if present and younger than the TTL.
    pub fn get(&self, key: &CacheKey) -> Option<bool> {
        let mut entries = self.entries.lock();
        match entries.values.get(key) {
            Some((exists, at)) if at.elapsed() < self.ttl => Some(*exists),
            Some(_) => {
                entries.forget(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, exists: bool) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        entries.forget(&key);
        while entries.order.len() >= self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.values.remove(&oldest);
                }
                None => break,
            }
        }
        entries.order.push_back(key.clone());
        entries.values.insert(key, (exists, Instant::now()));
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.lock().forget(key);
    }

    /// Drop every entry belonging to `table`, the table itself included.
    pub fn invalidate_table(&self, table: &str) {
        let mut entries = self.entries.lock();
        entries.values.retain(|k, _| k.table != table);
        entries.order.retain(|k| k.table != table);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.values.clear();
        entries.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
