//! In-Memory Chapter Cache Implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{chapter_cache_key, CacheError, OfflineCachePort};
use crate::domain::playback::ChapterRef;

#[derive(Debug, Clone)]
struct Entry {
    raw_text: String,
    last_used: u64,
}

/// 内存章节缓存
///
/// 容量以章节数计，超出时淘汰最久未用的条目。
/// 可叠加在持久缓存之前：未命中时回落到内层缓存并提升到内存
pub struct MemoryChapterCache {
    entries: DashMap<String, Entry>,
    capacity: usize,
    seq: AtomicU64,
    inner: Option<Arc<dyn OfflineCachePort>>,
}

impl MemoryChapterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            seq: AtomicU64::new(0),
            inner: None,
        }
    }

    /// 叠加在内层缓存之前
    pub fn layered(capacity: usize, inner: Arc<dyn OfflineCachePort>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new(capacity)
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn insert(&self, key: String, raw_text: String) {
        let last_used = self.touch();
        self.entries.insert(key, Entry { raw_text, last_used });

        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().last_used)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    tracing::trace!(key = %key, "Evicted chapter from memory cache");
                }
                None => break,
            }
        }
    }
}

#[async_trait]
impl OfflineCachePort for MemoryChapterCache {
    async fn get(&self, chapter: &ChapterRef) -> Result<Option<String>, CacheError> {
        let key = chapter_cache_key(chapter);
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.last_used = self.touch();
            return Ok(Some(entry.raw_text.clone()));
        }

        let Some(inner) = &self.inner else {
            return Ok(None);
        };
        let found = inner.get(chapter).await?;
        if let Some(raw_text) = &found {
            self.insert(key, raw_text.clone());
        }
        Ok(found)
    }

    async fn put(&self, chapter: &ChapterRef, raw_text: String) -> Result<(), CacheError> {
        if let Some(inner) = &self.inner {
            inner.put(chapter, raw_text.clone()).await?;
        }
        self.insert(chapter_cache_key(chapter), raw_text);
        Ok(())
    }
}
