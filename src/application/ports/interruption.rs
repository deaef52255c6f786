//! Interruption Source Port - 外部中断信号
//!
//! 每个信号源是一个具名订阅，由 InterruptionCoordinator 持有其生命周期

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::AudioFocusChange;

/// 通话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Ringing,
    Active,
}

/// 中断信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum InterruptionSignal {
    AudioFocus { change: AudioFocusChange },
    Telephony { state: CallState },
    AccessoryConnected,
    AccessoryDisconnected,
    /// 音频输出即将外放（如耳机拔出）
    BecomingNoisy,
}

/// Interruption Source Port
pub trait InterruptionSourcePort: Send + Sync {
    fn name(&self) -> &'static str;

    fn subscribe(&self) -> broadcast::Receiver<InterruptionSignal>;
}
