//! Audio Focus Arbiter - 音频独占资源仲裁
//!
//! 在本进程与宿主平台的其他请求方之间仲裁独占资源：
//! - 其他请求方持有时，`acquire` 被拒绝
//! - 被夺走时向订阅者发出 `TransientLoss` / `PermanentLoss`
//! - 暂时占用结束时发出 `Regained`

use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::application::ports::{
    AudioFocusChange, AudioFocusPort, InterruptionSignal, InterruptionSourcePort,
};

#[derive(Debug, Default)]
struct FocusState {
    /// 本进程持有
    held: bool,
    /// 其他请求方持有，值为是否为暂时占用
    other: Option<bool>,
    /// 因暂时占用而失去，占用结束时需要通知
    suspended: bool,
}

/// 音频独占资源仲裁器
pub struct AudioFocusArbiter {
    state: Mutex<FocusState>,
    tx: broadcast::Sender<InterruptionSignal>,
}

impl Default for AudioFocusArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioFocusArbiter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(FocusState::default()),
            tx,
        }
    }

    /// 其他请求方取得独占资源
    pub fn grant_to_other(&self, transient: bool) {
        let change = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.other = Some(transient);
            if !state.held {
                return;
            }
            state.held = false;
            state.suspended = transient;
            if transient {
                AudioFocusChange::TransientLoss
            } else {
                AudioFocusChange::PermanentLoss
            }
        };
        tracing::info!(change = ?change, "Audio focus lost");
        self.emit(change);
    }

    /// 其他请求方释放独占资源
    pub fn release_other(&self) {
        let regained = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.other = None;
            std::mem::take(&mut state.suspended)
        };
        if regained {
            tracing::info!("Audio focus available again");
            self.emit(AudioFocusChange::Regained);
        }
    }

    /// 应用宿主平台转发的变化
    pub fn apply(&self, change: AudioFocusChange) {
        match change {
            AudioFocusChange::TransientLoss => self.grant_to_other(true),
            AudioFocusChange::PermanentLoss => self.grant_to_other(false),
            AudioFocusChange::Regained => self.release_other(),
        }
    }

    fn emit(&self, change: AudioFocusChange) {
        // 没有订阅者时发送失败，忽略
        let _ = self.tx.send(InterruptionSignal::AudioFocus { change });
    }
}

impl AudioFocusPort for AudioFocusArbiter {
    fn acquire(&self) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.held {
            return true;
        }
        if state.other.is_some() {
            tracing::debug!("Audio focus request denied");
            return false;
        }
        state.held = true;
        state.suspended = false;
        true
    }

    fn release(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.held = false;
            state.suspended = false;
        }
    }

    fn is_held(&self) -> bool {
        self.state.lock().map(|s| s.held).unwrap_or(false)
    }
}

impl InterruptionSourcePort for AudioFocusArbiter {
    fn name(&self) -> &'static str {
        "audio_focus"
    }

    fn subscribe(&self) -> broadcast::Receiver<InterruptionSignal> {
        self.tx.subscribe()
    }
}
