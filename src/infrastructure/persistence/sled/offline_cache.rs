//! Sled-based Offline Chapter Cache

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{chapter_cache_key, CacheError, OfflineCachePort};
use crate::domain::playback::ChapterRef;

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
    /// 最大缓存大小（字节）
    pub max_size_bytes: u64,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/chapters.sled".to_string(),
            max_size_bytes: 256 * 1024 * 1024, // 256MB
        }
    }
}

/// 内部缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChapterEntry {
    raw_text: String,
    work_id: String,
    chapter_id: String,
    size_bytes: u64,
    /// 访问序号，越大越新
    last_accessed: u64,
    created_at: i64,
}

/// 缓存统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Sled 离线章节缓存
pub struct SledOfflineCache {
    db: Db,
    max_size_bytes: u64,
    current_size: AtomicU64,
    access_seq: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledOfflineCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        let (current_size, last_seq) = Self::scan_totals(&db)?;

        tracing::info!(
            db_path = %config.db_path,
            max_size_bytes = config.max_size_bytes,
            current_size = current_size,
            "SledOfflineCache initialized"
        );

        Ok(Self {
            db,
            max_size_bytes: config.max_size_bytes,
            current_size: AtomicU64::new(current_size),
            access_seq: AtomicU64::new(last_seq),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P, max_size_bytes: u64) -> Result<Self, CacheError> {
        let config = SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
            max_size_bytes,
        };
        Self::new(&config)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 已有条目的总大小与最大访问序号
    fn scan_totals(db: &Db) -> Result<(u64, u64), CacheError> {
        let mut total = 0u64;
        let mut last_seq = 0u64;
        for item in db.scan_prefix("chapter:") {
            let (_, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = bincode::deserialize::<ChapterEntry>(&value) {
                total += entry.size_bytes;
                last_seq = last_seq.max(entry.last_accessed);
            }
        }
        Ok((total, last_seq))
    }

    fn next_seq(&self) -> u64 {
        self.access_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// LRU 淘汰，缓存为空时返回 false
    fn evict_lru(&self) -> Result<bool, CacheError> {
        let mut oldest: Option<(sled::IVec, ChapterEntry)> = None;

        for item in self.db.scan_prefix("chapter:") {
            let (key, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = bincode::deserialize::<ChapterEntry>(&value) {
                let is_older = oldest
                    .as_ref()
                    .map(|(_, e)| entry.last_accessed < e.last_accessed)
                    .unwrap_or(true);
                if is_older {
                    oldest = Some((key, entry));
                }
            }
        }

        let Some((key, entry)) = oldest else {
            return Ok(false);
        };
        self.db
            .remove(&key)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        self.current_size.fetch_sub(entry.size_bytes, Ordering::Relaxed);
        tracing::debug!(
            work_id = %entry.work_id,
            chapter_id = %entry.chapter_id,
            size_bytes = entry.size_bytes,
            "LRU evicted chapter"
        );
        Ok(true)
    }

    pub fn remove(&self, chapter: &ChapterRef) -> Result<(), CacheError> {
        if let Some(data) = self
            .db
            .remove(chapter_cache_key(chapter))
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?
        {
            if let Ok(entry) = bincode::deserialize::<ChapterEntry>(&data) {
                self.current_size.fetch_sub(entry.size_bytes, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.db.scan_prefix("chapter:").count(),
            total_size_bytes: self.current_size.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), CacheError> {
        self.db
            .flush()
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl OfflineCachePort for SledOfflineCache {
    async fn get(&self, chapter: &ChapterRef) -> Result<Option<String>, CacheError> {
        let key = chapter_cache_key(chapter);

        match self.db.get(&key) {
            Ok(Some(data)) => {
                let mut entry: ChapterEntry = bincode::deserialize(&data)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;

                // LRU touch
                entry.last_accessed = self.next_seq();
                let entry_bytes = bincode::serialize(&entry)
                    .map_err(|e| CacheError::SerializationError(e.to_string()))?;
                self.db
                    .insert(&key, entry_bytes)
                    .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.raw_text))
            }
            Ok(None) => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(CacheError::DatabaseError(e.to_string())),
        }
    }

    async fn put(&self, chapter: &ChapterRef, raw_text: String) -> Result<(), CacheError> {
        let size = raw_text.len() as u64;
        if size > self.max_size_bytes {
            return Err(CacheError::IoError(format!(
                "chapter of {} bytes exceeds cache capacity {}",
                size, self.max_size_bytes
            )));
        }

        // 覆盖写入时先扣除旧条目
        self.remove(chapter)?;

        while self.current_size.load(Ordering::Relaxed) + size > self.max_size_bytes {
            if !self.evict_lru()? {
                break;
            }
        }

        let entry = ChapterEntry {
            raw_text,
            work_id: chapter.work_id.clone(),
            chapter_id: chapter.chapter_id.clone(),
            size_bytes: size,
            last_accessed: self.next_seq(),
            created_at: Utc::now().timestamp(),
        };
        let entry_bytes =
            bincode::serialize(&entry).map_err(|e| CacheError::SerializationError(e.to_string()))?;

        self.db
            .insert(chapter_cache_key(chapter), entry_bytes)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        self.current_size.fetch_add(size, Ordering::Relaxed);

        tracing::debug!(
            work_id = %chapter.work_id,
            chapter_id = %chapter.chapter_id,
            size_bytes = size,
            "Chapter cached"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chapter(id: &str) -> ChapterRef {
        ChapterRef {
            work_id: "w1".to_string(),
            chapter_id: id.to_string(),
            title: String::new(),
            index: 0,
            location: String::new(),
        }
    }

    #[tokio::test]
    async fn test_cache_put_get() {
        let dir = tempdir().unwrap();
        let config = SledCacheConfig {
            db_path: dir.path().join("test.sled").to_string_lossy().to_string(),
            max_size_bytes: 1024 * 1024,
        };
        let cache = SledOfflineCache::new(&config).unwrap();

        assert_eq!(cache.get(&chapter("c1")).await.unwrap(), None);

        cache
            .put(&chapter("c1"), "第一章。".to_string())
            .await
            .unwrap();
        assert_eq!(
            cache.get(&chapter("c1")).await.unwrap().as_deref(),
            Some("第一章。")
        );

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_keeps_recently_read() {
        let dir = tempdir().unwrap();
        let cache = SledOfflineCache::open(dir.path().join("lru.sled"), 10).unwrap();

        cache.put(&chapter("a"), "aaaa".to_string()).await.unwrap();
        cache.put(&chapter("b"), "bbbb".to_string()).await.unwrap();
        // 读取 a，使 b 成为最久未用
        cache.get(&chapter("a")).await.unwrap();
        cache.put(&chapter("c"), "cccc".to_string()).await.unwrap();

        assert!(cache.get(&chapter("a")).await.unwrap().is_some());
        assert!(cache.get(&chapter("b")).await.unwrap().is_none());
        assert!(cache.get(&chapter("c")).await.unwrap().is_some());
        assert_eq!(cache.stats().total_size_bytes, 8);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_double_count() {
        let dir = tempdir().unwrap();
        let cache = SledOfflineCache::open(dir.path().join("ow.sled"), 1024).unwrap();

        cache.put(&chapter("a"), "1234".to_string()).await.unwrap();
        cache.put(&chapter("a"), "123456".to_string()).await.unwrap();
        assert_eq!(cache.stats().total_size_bytes, 6);
        assert_eq!(cache.stats().total_entries, 1);
    }

    #[tokio::test]
    async fn test_reopen_restores_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reopen.sled");
        {
            let cache = SledOfflineCache::open(&path, 1024).unwrap();
            cache.put(&chapter("a"), "abc".to_string()).await.unwrap();
            cache.flush().unwrap();
        }
        let cache = SledOfflineCache::open(&path, 1024).unwrap();
        assert_eq!(cache.stats().total_size_bytes, 3);
        assert_eq!(cache.get(&chapter("a")).await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_oversized_chapter_rejected() {
        let dir = tempdir().unwrap();
        let cache = SledOfflineCache::open(dir.path().join("big.sled"), 4).unwrap();
        assert!(cache.put(&chapter("a"), "12345".to_string()).await.is_err());
    }
}
