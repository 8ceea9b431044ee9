//! The hierarchical timer wheel engine.
//!
//! Independent of TTL diversity: insertion cost and removal cost don't grow
//! with how many distinct TTLs are live, unlike the Lawn. A small fixed set
//! of levels (milliseconds, seconds, minutes, hours, plus a pinned overflow
//! level for anything beyond the wheel's horizon) each hold `num_slots` FIFO
//! queues of keys. An entry is placed in the finest level whose span covers
//! its remaining delay. As the cursor advances across a slot boundary in a
//! coarser level, that slot's members are re-evaluated against the new
//! cursor: truly expired ones are delivered, the rest are rescheduled into
//! whatever (possibly finer) slot now fits them. That reschedule is the
//! cascade.

use std::collections::HashMap;
use std::rc::Rc;

use dlv_list::Index;

use crate::error::TimerStoreError;
use crate::list::IntrusiveList;
use crate::store::{ExpiredEntry, TimerStore, NO_EXPIRATION};

type Key = Rc<[u8]>;

/// Tunables for the Wheel engine.
#[derive(Debug, Clone, Copy)]
pub struct WheelConfig {
    /// Milliseconds covered by one level-0 slot. Default `1`.
    pub resolution_ms: u64,
    /// Slot counts for the ms/sec/min/hour levels, finest first. Default
    /// `[20, 60, 60, 24]`. A fixed single-slot overflow level is always
    /// appended beyond these and is not separately configurable.
    pub level_slots: [u32; 4],
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            resolution_ms: 1,
            level_slots: [20, 60, 60, 24],
        }
    }
}

struct Level {
    num_slots: usize,
    slot_time_ms: u64,
    total_time_ms: u64,
    slots: Vec<IntrusiveList<Key>>,
}

impl Level {
    fn new(num_slots: usize, slot_time_ms: u64) -> Self {
        Self {
            num_slots,
            slot_time_ms,
            total_time_ms: slot_time_ms.saturating_mul(num_slots as u64),
            slots: (0..num_slots).map(|_| IntrusiveList::new()).collect(),
        }
    }
}

struct WheelEntry {
    expires_ms: u64,
    level: usize,
    slot: usize,
    handle: Index<Key>,
}

/// Hierarchical timer wheel. See the module docs for the rationale.
pub struct Wheel {
    levels: Vec<Level>,
    entries: HashMap<Key, WheelEntry>,
    current_time_ms: u64,
}

impl Default for Wheel {
    fn default() -> Self {
        Self::new()
    }
}

impl Wheel {
    pub fn new() -> Self {
        Self::with_config(WheelConfig::default())
    }

    /// # Panics
    ///
    /// Panics if `config` is invalid (`resolution_ms == 0` or any
    /// `level_slots` entry is `0`). Use [`WheelConfig`] validation at the
    /// call site if the configuration comes from an untrusted source; the
    /// canonical default is always valid.
    pub fn with_config(config: WheelConfig) -> Self {
        assert!(config.resolution_ms > 0, "resolution_ms must be > 0");
        assert!(
            config.level_slots.iter().all(|&n| n > 0),
            "every level_slots entry must be > 0"
        );

        let mut levels = Vec::with_capacity(5);
        let mut slot_time_ms = config.resolution_ms;
        for &num_slots in &config.level_slots {
            levels.push(Level::new(num_slots as usize, slot_time_ms));
            slot_time_ms = slot_time_ms.saturating_mul(num_slots as u64);
        }
        // Fixed single-slot overflow level: entries whose delay exceeds the
        // hour level's span are pinned here.
        levels.push(Level::new(1, slot_time_ms));

        Self {
            levels,
            entries: HashMap::new(),
            current_time_ms: 0,
        }
    }

    /// Advances the cursor to `new_time_ms` and returns every entry that
    /// expired at or before it. A call with `new_time_ms` not after the
    /// current cursor is a no-op.
    pub fn advance(&mut self, new_time_ms: u64) -> Vec<ExpiredEntry> {
        if new_time_ms <= self.current_time_ms {
            return Vec::new();
        }

        let old_time_ms = self.current_time_ms;
        self.current_time_ms = new_time_ms;
        let mut result = Vec::new();

        for i in 0..self.levels.len() {
            let slot_time_ms = self.levels[i].slot_time_ms;
            let num_slots = self.levels[i].num_slots;
            let prev_tick = old_time_ms / slot_time_ms;
            let current_tick = new_time_ms / slot_time_ms;

            if current_tick <= prev_tick {
                // A coarser level's tick count cannot have advanced if this
                // finer one hasn't.
                break;
            }

            let delta = current_tick - prev_tick;
            // Cap visited slots at one full sweep: a naive walk from the old
            // slot to the new one under-visits when the jump spans more than
            // one revolution of this level.
            let steps = std::cmp::min(delta + 1, num_slots as u64) as usize;
            let start = (prev_tick % num_slots as u64) as usize;

            for s in 0..steps {
                let slot_idx = (start + s) % num_slots;
                let members = self.levels[i].slots[slot_idx].drain_all();

                for key in members {
                    let expires_ms = match self.entries.get(&key) {
                        Some(entry) => entry.expires_ms,
                        None => {
                            log::warn!(
                                "timer wheel: key present in slot {slot_idx} of level {i} but absent from the key index"
                            );
                            continue;
                        }
                    };

                    if expires_ms <= new_time_ms {
                        self.entries.remove(&key);
                        result.push(ExpiredEntry {
                            key: key.to_vec(),
                            expires_ms,
                        });
                    } else {
                        let (new_level, new_slot) = self.find_index(expires_ms);
                        let handle =
                            self.levels[new_level].slots[new_slot].push_back(Rc::clone(&key));
                        if let Some(entry) = self.entries.get_mut(&key) {
                            entry.level = new_level;
                            entry.slot = new_slot;
                            entry.handle = handle;
                        }
                    }
                }
            }
        }

        result
    }

    /// Finds the `(level, slot)` an entry with this absolute `expires_ms`
    /// belongs in, relative to the current cursor.
    fn find_index(&self, expires_ms: u64) -> (usize, usize) {
        let delta = expires_ms.saturating_sub(self.current_time_ms);
        let overflow = self.levels.len() - 1;

        for (i, level) in self.levels.iter().enumerate().take(overflow) {
            if delta < level.total_time_ms {
                let slot = (expires_ms / level.slot_time_ms) % level.num_slots as u64;
                return (i, slot as usize);
            }
        }
        (overflow, 0)
    }

    fn unschedule(&mut self, entry: &WheelEntry) {
        self.levels[entry.level].slots[entry.slot].remove(entry.handle);
    }
}

impl TimerStore for Wheel {
    fn add(&mut self, key: &[u8], ttl_ms: u64) -> Result<(), TimerStoreError> {
        if key.is_empty() {
            return Err(TimerStoreError::invalid_argument("key must not be empty"));
        }
        if ttl_ms == 0 {
            return Err(TimerStoreError::invalid_argument("ttl_ms must be > 0"));
        }

        if let Some(entry) = self.entries.remove(key) {
            self.unschedule(&entry);
        }

        self.entries
            .try_reserve(1)
            .map_err(|e| TimerStoreError::resource_exhausted(e.to_string()))?;

        let expires_ms = self.current_time_ms.saturating_add(ttl_ms);
        let rc_key: Key = Rc::from(key);
        let (level, slot) = self.find_index(expires_ms);
        let handle = self.levels[level].slots[slot].push_back(Rc::clone(&rc_key));
        self.entries.insert(
            rc_key,
            WheelEntry {
                expires_ms,
                level,
                slot,
                handle,
            },
        );

        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), TimerStoreError> {
        match self.entries.remove(key) {
            Some(entry) => {
                self.unschedule(&entry);
                Ok(())
            }
            None => Err(TimerStoreError::not_found(key)),
        }
    }

    fn pop_expired(&mut self, reference_time_ms: u64) -> Vec<ExpiredEntry> {
        self.advance(reference_time_ms)
    }

    fn next_at(&mut self) -> u64 {
        self.entries
            .values()
            .map(|e| e.expires_ms)
            .min()
            .unwrap_or(NO_EXPIRATION)
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn find_index_picks_expected_level() {
        let wheel = Wheel::new();
        // level 0: ms level, 20 slots * 1ms = 20ms span.
        assert_eq!(wheel.find_index(0).0, 0);
        assert_eq!(wheel.find_index(19).0, 0);
        // level 1: seconds, total span 20 * 60 = 1200ms.
        assert_eq!(wheel.find_index(20).0, 1);
        assert_eq!(wheel.find_index(1199).0, 1);
        // level 2: minutes, total span 1200*60 = 72_000ms.
        assert_eq!(wheel.find_index(1200).0, 2);
        // level 3: hours, total span 72_000*24 = 1_728_000ms.
        assert_eq!(wheel.find_index(72_000).0, 3);
        // overflow level.
        assert_eq!(wheel.find_index(1_728_000).0, 4);
    }

    #[test]
    fn wheel_cascade_across_levels() {
        let mut wheel = Wheel::new();
        wheel.add(b"far", 25_000).unwrap(); // 25s, lands in the seconds level.

        assert!(wheel.advance(24_000).is_empty());
        let expired = wheel.advance(25_000);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].key, b"far");
    }

    #[test]
    fn replace_semantics_use_latest_ttl() {
        let mut wheel = Wheel::new();
        wheel.add(b"k", 500).unwrap();
        wheel.add(b"k", 100).unwrap();

        let expired = wheel.pop_expired(200);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].key, b"k");
        assert!(wheel.pop_expired(600).is_empty());
    }

    #[test]
    fn next_at_reports_sentinel_then_minimum() {
        let mut wheel = Wheel::new();
        assert_eq!(wheel.next_at(), NO_EXPIRATION);
        wheel.add(b"k", 1000).unwrap();
        assert_eq!(wheel.next_at(), 1000);
    }

    #[test]
    fn remove_absent_key_surfaces_not_found() {
        let mut wheel = Wheel::new();
        assert!(matches!(
            wheel.remove(b"never_inserted"),
            Err(TimerStoreError::NotFound { .. })
        ));
        assert_eq!(wheel.size(), 0);
        assert!(wheel.add(b"never_inserted", 100).is_ok());
    }

    #[test]
    fn removed_key_never_appears_in_pop_expired() {
        let mut wheel = Wheel::new();
        wheel.add(b"k", 100).unwrap();
        wheel.remove(b"k").unwrap();
        assert!(wheel.pop_expired(1000).is_empty());
    }

    #[test]
    fn add_rejects_zero_ttl_and_empty_key() {
        let mut wheel = Wheel::new();
        assert!(matches!(
            wheel.add(b"k", 0),
            Err(TimerStoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            wheel.add(b"", 100),
            Err(TimerStoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn advance_with_no_elapsed_time_is_a_noop() {
        let mut wheel = Wheel::new();
        wheel.add(b"k", 100).unwrap();
        assert!(wheel.advance(0).is_empty());
        assert_eq!(wheel.size(), 1);
    }

    /// Stress test mirroring the reference wheel's own large-scale advance
    /// test: schedule many entries across a wide spread of TTLs and confirm
    /// every one is eventually, and only once, delivered.
    #[test]
    fn large_scale_advance_delivers_every_entry_exactly_once() {
        let mut wheel = Wheel::new();
        let mut rng = rand::rng();
        let count = 20_000usize;

        for i in 0..count {
            let ttl_ms = rng.random_range(1..5_000);
            wheel.add(format!("k{i}").as_bytes(), ttl_ms).unwrap();
        }

        let mut delivered = Vec::new();
        let mut t = 0u64;
        while t < 10_000 {
            t += 37;
            delivered.extend(wheel.advance(t).into_iter().map(|e| e.key));
        }
        delivered.extend(wheel.advance(t + 5_000).into_iter().map(|e| e.key));

        delivered.sort();
        delivered.dedup();
        assert_eq!(delivered.len(), count);
        assert_eq!(wheel.size(), 0);
    }
}
