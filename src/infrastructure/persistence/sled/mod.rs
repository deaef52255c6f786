//! Sled 存储实现

mod offline_cache;

pub use offline_cache::{CacheStats, SledCacheConfig, SledOfflineCache};
