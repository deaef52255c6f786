//! Persistence Layer - 数据持久化
//!
//! Sled 离线章节缓存

pub mod sled;

pub use self::sled::{CacheStats, SledCacheConfig, SledOfflineCache};
