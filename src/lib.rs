//! Two independent engines for tracking a large population of `(key, ttl)`
//! timers and reporting which have expired as a logical clock advances.
//!
//! [`Lawn`] groups timers by TTL duration into FIFO queues, which is cheap
//! when a workload uses only a handful of distinct TTLs. [`Wheel`] is a
//! hierarchical timer wheel, cheap regardless of how many distinct TTLs are
//! in play. Both implement the shared [`TimerStore`] trait, so a caller can
//! pick the engine that fits its TTL distribution without changing anything
//! else.
//!
//! Neither engine dispatches callbacks or spawns threads: expiration is
//! pulled through [`TimerStore::pop_expired`], driven by a clock the caller
//! owns.

pub mod clock;
pub mod error;
pub mod lawn;
pub mod list;
pub mod store;
pub mod wheel;

pub use clock::Clock;
pub use error::TimerStoreError;
pub use lawn::{Lawn, LawnConfig};
pub use store::{ExpiredEntry, TimerStore, NO_EXPIRATION};
pub use wheel::{Wheel, WheelConfig};
