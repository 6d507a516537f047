// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Deadline-ordered expiry queue and the bounded drain shared by all engines
//!
//! Every engine owns one `ExpiryQueue` holding exactly one registration per
//! live entry. A tick drains at most `MAX_EXPIRED_PER_TICK` expired keys,
//! re-registers each one a full interval later and asks to be polled again
//! soon if expired keys are still waiting.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Upper bound on expired entries handled per engine per tick
pub const MAX_EXPIRED_PER_TICK: usize = 32;

/// Next tick when expired entries were left undrained
pub const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Next tick when nothing expired is pending
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Set of keys, each registered at one absolute deadline
///
/// Keys sharing a deadline expire in insertion order.
#[derive(Debug)]
pub struct ExpiryQueue<K> {
    by_deadline: BTreeMap<(Instant, u64), K>,
    registrations: HashMap<K, (Instant, u64)>,
    next_seq: u64,
}

impl<K: Clone + Eq + Hash> ExpiryQueue<K> {
    pub fn new() -> Self {
        Self {
            by_deadline: BTreeMap::new(),
            registrations: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Register `key` at `deadline`, replacing any existing registration
    pub fn insert(&mut self, key: K, deadline: Instant) {
        let slot = (deadline, self.next_seq);
        self.next_seq += 1;
        if let Some(old) = self.registrations.insert(key.clone(), slot) {
            self.by_deadline.remove(&old);
        }
        self.by_deadline.insert(slot, key);
    }

    /// Cancel the registration of `key`; returns whether one existed
    pub fn remove(&mut self, key: &K) -> bool {
        match self.registrations.remove(key) {
            Some(slot) => {
                self.by_deadline.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Remove and return the earliest key whose deadline is at or before `now`
    pub fn pop_expired(&mut self, now: Instant) -> Option<K> {
        let (&slot, _) = self.by_deadline.first_key_value()?;
        if slot.0 > now {
            return None;
        }
        let key = self.by_deadline.remove(&slot)?;
        self.registrations.remove(&key);
        Some(key)
    }

    /// Whether any key is expired as of `now`
    pub fn has_expired(&self, now: Instant) -> bool {
        self.next_deadline().is_some_and(|deadline| deadline <= now)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.registrations.get(key).map(|(deadline, _)| *deadline)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.registrations.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl<K: Clone + Eq + Hash> Default for ExpiryQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one bounded drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    pub processed: usize,
    /// When the engine's tick should run again
    pub next_tick: Duration,
}

/// Pop up to `MAX_EXPIRED_PER_TICK` expired keys, run `on_expired` on each
/// and re-register it at `now + interval`.
///
/// The re-registration happens whatever `on_expired` did, so a failing
/// action never stops an entry from being serviced.
pub fn drain_expired<K, F>(
    queue: &mut ExpiryQueue<K>,
    now: Instant,
    interval: Duration,
    mut on_expired: F,
) -> Drained
where
    K: Clone + Eq + Hash,
    F: FnMut(&K),
{
    let mut processed = 0;
    while processed < MAX_EXPIRED_PER_TICK {
        let Some(key) = queue.pop_expired(now) else {
            break;
        };
        on_expired(&key);
        queue.insert(key, now + interval);
        processed += 1;
    }

    let next_tick = if queue.has_expired(now) {
        BUSY_POLL_INTERVAL
    } else {
        IDLE_POLL_INTERVAL
    };
    Drained {
        processed,
        next_tick,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_in_deadline_order() {
        let base = Instant::now();
        let mut queue = ExpiryQueue::new();
        queue.insert("c", base + Duration::from_millis(30));
        queue.insert("a", base + Duration::from_millis(10));
        queue.insert("b", base + Duration::from_millis(20));

        let now = base + Duration::from_millis(25);
        assert_eq!(queue.pop_expired(now), Some("a"));
        assert_eq!(queue.pop_expired(now), Some("b"));
        assert_eq!(queue.pop_expired(now), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_same_deadline_fifo() {
        let deadline = Instant::now();
        let mut queue = ExpiryQueue::new();
        for key in ["x", "y", "z"] {
            queue.insert(key, deadline);
        }
        assert_eq!(queue.pop_expired(deadline), Some("x"));
        assert_eq!(queue.pop_expired(deadline), Some("y"));
        assert_eq!(queue.pop_expired(deadline), Some("z"));
    }

    #[test]
    fn test_insert_replaces_registration() {
        let base = Instant::now();
        let mut queue = ExpiryQueue::new();
        queue.insert(1u32, base + Duration::from_millis(10));
        queue.insert(1u32, base + Duration::from_millis(50));

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.deadline(&1), Some(base + Duration::from_millis(50)));
        assert!(!queue.has_expired(base + Duration::from_millis(20)));
        assert_eq!(queue.pop_expired(base + Duration::from_millis(20)), None);
    }

    #[test]
    fn test_remove_cancels() {
        let base = Instant::now();
        let mut queue = ExpiryQueue::new();
        queue.insert(7u32, base);

        assert!(queue.remove(&7));
        assert!(!queue.remove(&7));
        assert!(queue.is_empty());
        assert!(!queue.contains(&7));
        assert_eq!(queue.pop_expired(base + Duration::from_secs(1)), None);
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_drain_is_bounded() {
        let base = Instant::now();
        let mut queue = ExpiryQueue::new();
        for i in 0..40u32 {
            queue.insert(i, base);
        }

        let now = base + Duration::from_millis(1);
        let interval = Duration::from_secs(10);
        let mut seen = Vec::new();
        let drained = drain_expired(&mut queue, now, interval, |k| seen.push(*k));

        assert_eq!(drained.processed, MAX_EXPIRED_PER_TICK);
        assert_eq!(drained.next_tick, BUSY_POLL_INTERVAL);
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
        assert_eq!(queue.len(), 40);

        let drained = drain_expired(&mut queue, now, interval, |k| seen.push(*k));
        assert_eq!(drained.processed, 8);
        assert_eq!(drained.next_tick, IDLE_POLL_INTERVAL);
        assert_eq!(queue.deadline(&39), Some(now + interval));
    }

    #[test]
    fn test_drain_idle_when_nothing_expired() {
        let base = Instant::now();
        let mut queue = ExpiryQueue::new();
        queue.insert("later", base + Duration::from_secs(5));

        let drained = drain_expired(&mut queue, base, Duration::from_secs(5), |_| {
            panic!("nothing should expire")
        });
        assert_eq!(drained.processed, 0);
        assert_eq!(drained.next_tick, IDLE_POLL_INTERVAL);
    }
}
