//! Offline Cache Port - 离线章节缓存
//!
//! 对引擎而言只读（read-through），写入由外部下载子系统负责

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::playback::ChapterRef;

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Offline Cache Port
#[async_trait]
pub trait OfflineCachePort: Send + Sync {
    /// 读取章节原文，未命中返回 None
    async fn get(&self, chapter: &ChapterRef) -> Result<Option<String>, CacheError>;

    /// 写入章节原文
    async fn put(&self, chapter: &ChapterRef, raw_text: String) -> Result<(), CacheError>;
}

/// 生成章节缓存 key
///
/// `chapter:` + md5(work_id/chapter_id)
pub fn chapter_cache_key(chapter: &ChapterRef) -> String {
    let digest = md5::compute(format!("{}/{}", chapter.work_id, chapter.chapter_id).as_bytes());
    format!("chapter:{:x}", digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(work_id: &str, chapter_id: &str) -> ChapterRef {
        ChapterRef {
            work_id: work_id.to_string(),
            chapter_id: chapter_id.to_string(),
            title: String::new(),
            index: 0,
            location: String::new(),
        }
    }

    #[test]
    fn test_cache_key_ignores_title_and_location() {
        let a = chapter("w1", "c1");
        let mut b = a.clone();
        b.title = "其他标题".to_string();
        b.location = "elsewhere".to_string();

        assert_eq!(chapter_cache_key(&a), chapter_cache_key(&b));
        assert_ne!(chapter_cache_key(&a), chapter_cache_key(&chapter("w1", "c2")));
        assert!(chapter_cache_key(&a).starts_with("chapter:"));
    }
}
