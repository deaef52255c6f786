//! Playback Context - Errors

use serde::Serialize;
use thiserror::Error;

/// 播放引擎错误
///
/// 全部为可恢复错误：引擎在任何错误之后都仍可接收新命令
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum PlaybackError {
    #[error("audio resource denied")]
    ResourceDenied,

    #[error("content load failed: {0}")]
    ContentLoadFailed(String),

    #[error("no active playback session")]
    NoActiveSession,

    #[error("no work is open")]
    NoWorkOpen,

    #[error("chapter index out of range: {index} (total chapters: {total})")]
    ChapterOutOfRange { index: usize, total: usize },

    #[error("chapter has no speakable segments: {0}")]
    EmptyContent(String),

    #[error("invalid speech rate: {0}")]
    InvalidRate(String),

    #[error("invalid sleep timer: {0}")]
    InvalidSleepTimer(String),

    #[error("load cancelled")]
    Cancelled,
}

impl PlaybackError {
    /// 用于状态广播的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackError::ResourceDenied => "resource_denied",
            PlaybackError::ContentLoadFailed(_) => "content_load_failed",
            PlaybackError::NoActiveSession => "no_active_session",
            PlaybackError::NoWorkOpen => "no_work_open",
            PlaybackError::ChapterOutOfRange { .. } => "chapter_out_of_range",
            PlaybackError::EmptyContent(_) => "empty_content",
            PlaybackError::InvalidRate(_) => "invalid_rate",
            PlaybackError::InvalidSleepTimer(_) => "invalid_sleep_timer",
            PlaybackError::Cancelled => "cancelled",
        }
    }
}
