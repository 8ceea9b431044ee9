//! The shared contract both timer store engines implement.

use crate::error::TimerStoreError;

/// Sentinel returned by [`TimerStore::next_at`] when the store holds no
/// entries.
pub const NO_EXPIRATION: u64 = u64::MAX;

/// One entry delivered by [`TimerStore::pop_expired`].
///
/// The key is an owned copy: once a batch is returned, the caller may do
/// anything with it, including holding it past the store's next mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredEntry {
    pub key: Vec<u8>,
    pub expires_ms: u64,
}

/// Common contract for a large-scale timer store: track `(key, expiration)`
/// pairs and report which have expired as a logical clock advances.
///
/// Implementors never call back into user code and never retry a failed
/// operation: expiration is pulled via `pop_expired`, not pushed through a
/// callback. `remove` on an absent key differs between the two engines (see
/// each engine's module docs).
pub trait TimerStore {
    /// Inserts a new timer or replaces the existing one for `key`.
    ///
    /// `ttl_ms` must be greater than zero and `key` must be non-empty, or
    /// this returns [`TimerStoreError::InvalidArgument`].
    fn add(&mut self, key: &[u8], ttl_ms: u64) -> Result<(), TimerStoreError>;

    /// Removes the timer for `key`, if present.
    fn remove(&mut self, key: &[u8]) -> Result<(), TimerStoreError>;

    /// Returns and removes every entry whose expiration is at or before
    /// `reference_time_ms`.
    fn pop_expired(&mut self, reference_time_ms: u64) -> Vec<ExpiredEntry>;

    /// Returns the earliest expiration instant currently held, or
    /// [`NO_EXPIRATION`] if the store is empty.
    fn next_at(&mut self) -> u64;

    /// Number of live entries.
    fn size(&self) -> usize;
}
