//! Per-sender occurrence counts.
//!
//! One writer (the active walk) and any number of readers share a
//! [`SenderCounts`]. Every operation takes the lock exactly once, so a reader
//! sees each entry either before or after an increment, never in between.
//! Consecutive reads are not transactional with each other.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

/// A sender identity and how many messages it sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub sender: String,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct SenderCounts {
    inner: RwLock<HashMap<String, u64>>,
}

impl SenderCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the count for an already-normalized sender identity,
    /// creating it at 1 on first occurrence.
    pub fn record(&self, sender: &str) {
        let mut map = self.write();
        match map.get_mut(sender) {
            Some(count) => *count += 1,
            None => {
                map.insert(sender.to_string(), 1);
            }
        }
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.read().values().sum()
    }

    /// Number of distinct sender identities.
    pub fn distinct(&self) -> usize {
        self.read().len()
    }

    /// Up to `n` senders ordered by count descending. Equal counts are
    /// ordered alphabetically by sender so the output is reproducible.
    pub fn top_n(&self, n: usize) -> Vec<SenderCount> {
        let mut entries: Vec<SenderCount> = {
            let map = self.read();
            map.iter()
                .map(|(sender, &count)| SenderCount {
                    sender: sender.clone(),
                    count,
                })
                .collect()
        };
        entries.sort_unstable_by(|a, b| {
            b.count.cmp(&a.count).then_with(|| a.sender.cmp(&b.sender))
        });
        entries.truncate(n);
        entries
    }

    /// Drop every entry. Only called when a new epoch begins.
    pub fn reset(&self) {
        self.write().clear();
    }

    // Every critical section leaves the map consistent, so a poisoned lock
    // still guards valid data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, u64>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, u64>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
