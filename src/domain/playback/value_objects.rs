//! Playback Context - Value Objects

use serde::{Deserialize, Serialize};

use super::PlaybackError;

/// 播放状态
///
/// `Stopped` 时不持有章节内容、音频独占资源和唤醒锁
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlaybackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
        }
    }

    /// 是否存在活动会话（播放中或暂停）
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackStatus::Stopped)
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 合成请求令牌
///
/// 单调递增；每次改变状态的操作都会推进令牌，回调携带的令牌与当前不一致即为过期回调
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct RequestToken(u64);

impl RequestToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 语速倍率
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechRate(f32);

impl SpeechRate {
    pub const MIN: f32 = 0.25;
    pub const MAX: f32 = 4.0;

    pub fn new(rate: f32) -> Result<Self, PlaybackError> {
        if !rate.is_finite() || !(Self::MIN..=Self::MAX).contains(&rate) {
            return Err(PlaybackError::InvalidRate(format!(
                "{} (expected {}..={})",
                rate,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(rate))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for SpeechRate {
    fn default() -> Self {
        Self(1.0)
    }
}

/// 会话结束原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// 用户主动停止
    User,
    /// 章节最后一段播放完毕
    ChapterFinished,
    /// 睡眠定时器到期
    SleepTimer,
    /// 音频独占资源被永久夺走
    FocusLost,
    /// 新的 start 覆盖了旧会话
    Replaced,
    /// 进程关闭
    Shutdown,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::User => "user",
            StopReason::ChapterFinished => "chapter_finished",
            StopReason::SleepTimer => "sleep_timer",
            StopReason::FocusLost => "focus_lost",
            StopReason::Replaced => "replaced",
            StopReason::Shutdown => "shutdown",
        }
    }
}

/// 最近一次播放位置（仅索引，不持有内容）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub work_id: String,
    pub chapter_index: usize,
    pub segment_index: usize,
}
