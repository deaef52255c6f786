//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::services::MediaAction;
use crate::domain::playback::{ChapterRef, PlaybackSnapshot};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// Playback DTOs
// ============================================================================

/// 播放状态 + 当前可用动作
#[derive(Debug, Serialize)]
pub struct PlaybackView {
    #[serde(flatten)]
    pub snapshot: PlaybackSnapshot,
    pub actions: Vec<MediaAction>,
}

impl From<PlaybackSnapshot> for PlaybackView {
    fn from(snapshot: PlaybackSnapshot) -> Self {
        let actions = crate::application::services::available_actions(&snapshot);
        Self { snapshot, actions }
    }
}

// ============================================================================
// Cache DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CacheChapterRequest {
    pub chapter: ChapterRef,
    pub raw_text: String,
}
