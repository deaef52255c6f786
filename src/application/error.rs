//! 应用层错误定义

use thiserror::Error;

use crate::domain::playback::PlaybackError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 播放引擎拒绝或执行失败
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// 引擎任务已退出
    #[error("Playback engine unavailable")]
    EngineUnavailable,

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<crate::application::ports::CacheError> for ApplicationError {
    fn from(err: crate::application::ports::CacheError) -> Self {
        Self::ExternalServiceError(err.to_string())
    }
}
