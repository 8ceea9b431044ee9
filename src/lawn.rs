//! The Lawn engine: TTL-bucketed FIFO queues.
//!
//! Workloads in practice concentrate on a handful of distinct TTL durations
//! (a session TTL, a cache TTL, and so on). Grouping timers by their TTL
//! duration turns each bucket into a FIFO queue in insertion order, which is
//! also expiration order, since every entry in a bucket shares the same TTL.
//! Insert is O(1) (hash the TTL, push to the bucket's tail); delete is O(1)
//! via the key index plus the bucket's intrusive handle; expiration scans
//! cost O(buckets + expired), independent of how many live entries remain.

use std::collections::HashMap;

use crate::clock::Clock;
use crate::error::TimerStoreError;
use crate::list::IntrusiveList;
use crate::store::{ExpiredEntry, TimerStore, NO_EXPIRATION};

/// Tunables for the Lawn engine.
#[derive(Debug, Clone, Copy)]
pub struct LawnConfig {
    /// Milliseconds by which an entry's expiration may be reported early by
    /// `pop_expired`. Default `0`.
    pub padding_ms: u64,
}

impl Default for LawnConfig {
    fn default() -> Self {
        Self { padding_ms: 0 }
    }
}

#[derive(Debug)]
struct LawnNode {
    key: Box<[u8]>,
    ttl_ms: u64,
    expires_ms: u64,
}

/// TTL-bucketed timer store. See the module docs for the rationale.
#[derive(Debug)]
pub struct Lawn {
    buckets: HashMap<u64, IntrusiveList<LawnNode>>,
    key_index: HashMap<Box<[u8]>, (u64, dlv_list::Index<LawnNode>)>,
    /// `0` means "stale, recompute on next `next_at`".
    next_expiration: u64,
    clock: Clock,
    config: LawnConfig,
}

impl Default for Lawn {
    fn default() -> Self {
        Self::new()
    }
}

impl Lawn {
    pub fn new() -> Self {
        Self::with_config(LawnConfig::default())
    }

    pub fn with_config(config: LawnConfig) -> Self {
        Self {
            buckets: HashMap::new(),
            key_index: HashMap::new(),
            next_expiration: 0,
            clock: Clock::new(),
            config,
        }
    }

    /// Convenience wrapper over [`TimerStore::pop_expired`] that reads this
    /// store's own clock, matching the C original's zero-argument
    /// `pop_expired(lawn)`.
    pub fn pop_expired_now(&mut self) -> Vec<ExpiredEntry> {
        let now = self.clock.now_ms();
        self.pop_expired(now)
    }

    fn remove_internal(&mut self, key: &[u8]) {
        if let Some((ttl_ms, index)) = self.key_index.remove(key) {
            let removed_expiration = if let Some(bucket) = self.buckets.get_mut(&ttl_ms) {
                let node = bucket.remove(index);
                if bucket.is_empty() {
                    self.buckets.remove(&ttl_ms);
                }
                node.map(|n| n.expires_ms)
            } else {
                log::warn!("lawn remove: bucket for ttl {ttl_ms} missing for indexed key");
                None
            };

            if let Some(expires_ms) = removed_expiration
                && self.next_expiration != 0
                && expires_ms <= self.next_expiration
            {
                self.next_expiration = 0;
            }
        }
    }
}

impl TimerStore for Lawn {
    fn add(&mut self, key: &[u8], ttl_ms: u64) -> Result<(), TimerStoreError> {
        if key.is_empty() {
            return Err(TimerStoreError::invalid_argument("key must not be empty"));
        }
        if ttl_ms == 0 {
            return Err(TimerStoreError::invalid_argument("ttl_ms must be > 0"));
        }

        self.remove_internal(key);

        self.key_index
            .try_reserve(1)
            .map_err(|e| TimerStoreError::resource_exhausted(e.to_string()))?;

        let expires_ms = self.clock.expire_ms(ttl_ms);
        let bucket = self.buckets.entry(ttl_ms).or_default();
        let node = LawnNode {
            key: key.into(),
            ttl_ms,
            expires_ms,
        };
        let boxed_key: Box<[u8]> = key.into();
        let index = bucket.push_back(node);
        self.key_index.insert(boxed_key, (ttl_ms, index));

        if self.next_expiration != 0 && expires_ms < self.next_expiration {
            self.next_expiration = expires_ms;
        }

        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), TimerStoreError> {
        // Idempotent by design: the Lawn collapses "absent" into `Ok`.
        self.remove_internal(key);
        Ok(())
    }

    fn pop_expired(&mut self, reference_time_ms: u64) -> Vec<ExpiredEntry> {
        let padded_now = reference_time_ms.saturating_add(self.config.padding_ms);

        if self.next_expiration != 0 && padded_now < self.next_expiration {
            return Vec::new();
        }

        let mut result = Vec::new();
        let mut candidate_next = 0u64;
        let mut emptied_ttls = Vec::new();

        for (&ttl_ms, bucket) in self.buckets.iter_mut() {
            while let Some(front) = bucket.front() {
                if front.expires_ms <= padded_now {
                    let node = bucket.pop_front().expect("front just confirmed present");
                    self.key_index.remove(node.key.as_ref());
                    result.push(ExpiredEntry {
                        key: node.key.into_vec(),
                        expires_ms: node.expires_ms,
                    });
                } else {
                    if candidate_next == 0 || front.expires_ms < candidate_next {
                        candidate_next = front.expires_ms;
                    }
                    break;
                }
            }
            if bucket.is_empty() {
                emptied_ttls.push(ttl_ms);
            }
        }

        for ttl_ms in emptied_ttls {
            self.buckets.remove(&ttl_ms);
        }

        self.next_expiration = candidate_next;
        result
    }

    fn next_at(&mut self) -> u64 {
        if self.next_expiration != 0 {
            return self.next_expiration;
        }

        let mut min_exp = None;
        for bucket in self.buckets.values() {
            if let Some(front) = bucket.front()
                && min_exp.is_none_or(|m| front.expires_ms < m)
            {
                min_exp = Some(front.expires_ms);
            }
        }

        match min_exp {
            Some(exp) => {
                self.next_expiration = exp;
                exp
            }
            None => NO_EXPIRATION,
        }
    }

    fn size(&self) -> usize {
        self.key_index.len()
    }
}
