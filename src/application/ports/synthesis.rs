//! Synthesis Port - 语音合成后端抽象
//!
//! `speak` 立即返回；每个请求恰好对应一次完成回调，回调携带发出请求时的令牌

use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::playback::{RequestToken, SpeechRate};

/// 合成后端错误（仅用于日志，最终都转化为 `SynthesisOutcome::Failed`）
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),
}

impl SynthesisError {
    /// 失败码
    pub fn code(&self) -> i32 {
        match self {
            SynthesisError::NetworkError(_) => -1,
            SynthesisError::Timeout => -2,
            SynthesisError::ServiceError(_) => -3,
        }
    }
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SpeakRequest {
    pub token: RequestToken,
    pub text: String,
    pub pause_after_ms: u32,
    pub rate: SpeechRate,
}

/// 合成结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Completed,
    Failed(i32),
    /// 被 `stop()` 打断
    Interrupted,
}

/// 完成回调
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisCompletion {
    pub token: RequestToken,
    pub outcome: SynthesisOutcome,
}

pub type CompletionSender = mpsc::UnboundedSender<SynthesisCompletion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<SynthesisCompletion>;

/// 创建完成回调通道
pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// Synthesis Port
///
/// 实现方在构造时持有 `CompletionSender`
pub trait SynthesisPort: Send + Sync {
    /// 开始合成，立即返回
    fn speak(&self, request: SpeakRequest);

    /// 停止当前合成
    fn stop(&self);

    /// 设置语速
    fn set_rate(&self, rate: SpeechRate);
}
