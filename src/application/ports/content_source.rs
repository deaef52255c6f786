//! Content Source Port - 章节内容源抽象
//!
//! 内容源对引擎而言是不透明的外部能力：给定章节引用返回原文。
//! 引擎不施加重试策略，一次失败即为一次加载失败

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::playback::{ChapterRef, WorkOutline};

/// 内容源错误
#[derive(Debug, Clone, Error)]
pub enum ContentSourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Content Source Port
#[async_trait]
pub trait ContentSourcePort: Send + Sync {
    /// 获取作品目录
    async fn fetch_outline(&self, work_id: &str) -> Result<WorkOutline, ContentSourceError>;

    /// 获取章节原文（可能包含 HTML 标记）
    async fn fetch(&self, chapter: &ChapterRef) -> Result<String, ContentSourceError>;
}
