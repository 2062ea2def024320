// Cache module.
// Memory table with TTL checks in front of a durable store, with stale fallback.

pub mod clock;
pub mod durable;
pub mod entry;
pub mod file_store;
pub mod key;
pub mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
pub use durable::{DurableStore, MemoryStore};
pub use entry::{CachedData, DEFAULT_TTL, Payload};
pub use file_store::FileStore;
pub use key::{CacheKey, ResourceKind};
pub use manager::{CacheConfig, CacheManager, Fetched, Source};
