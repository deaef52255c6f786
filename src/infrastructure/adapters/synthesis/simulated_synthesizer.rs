//! Simulated Synthesizer - 不发声的合成后端
//!
//! 按文本长度与语速估算朗读时长，到时发送完成回调。
//! 用于本地运行与测试

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::AbortHandle;

use crate::application::ports::{
    CompletionSender, SpeakRequest, SynthesisCompletion, SynthesisOutcome, SynthesisPort,
};
use crate::domain::playback::{RequestToken, SpeechRate};

/// Simulated Synthesizer 配置
#[derive(Debug, Clone)]
pub struct SimulatedSynthesizerConfig {
    /// 1.0 倍速下每个字符的朗读时长（毫秒）
    pub ms_per_char: u64,
    pub default_rate: f32,
}

impl Default for SimulatedSynthesizerConfig {
    fn default() -> Self {
        Self {
            ms_per_char: 180,
            default_rate: 1.0,
        }
    }
}

struct InFlight {
    token: RequestToken,
    task: AbortHandle,
}

/// Simulated Synthesizer
///
/// 同一时刻最多一个在途请求；新的 `speak` 会打断前一个
pub struct SimulatedSynthesizer {
    config: SimulatedSynthesizerConfig,
    completions: CompletionSender,
    current: Mutex<Option<InFlight>>,
    rate: Mutex<f32>,
}

impl SimulatedSynthesizer {
    pub fn new(config: SimulatedSynthesizerConfig, completions: CompletionSender) -> Self {
        tracing::info!(
            ms_per_char = config.ms_per_char,
            default_rate = config.default_rate,
            "SimulatedSynthesizer initialized"
        );
        let rate = config.default_rate;
        Self {
            config,
            completions,
            current: Mutex::new(None),
            rate: Mutex::new(rate),
        }
    }

    /// 朗读时长 = 字符数 × 每字时长 / 语速 + 片段后停顿
    pub fn estimate(&self, text: &str, pause_after_ms: u32, rate: f32) -> Duration {
        let chars = text.chars().count() as f64;
        let speech_ms = chars * self.config.ms_per_char as f64 / rate.max(0.01) as f64;
        Duration::from_millis(speech_ms.round() as u64 + u64::from(pause_after_ms))
    }

    /// 当前生效的语速
    pub fn rate(&self) -> f32 {
        self.rate.lock().map(|r| *r).unwrap_or(self.config.default_rate)
    }

    fn interrupt_current(&self) {
        let previous = match self.current.lock() {
            Ok(mut current) => current.take(),
            Err(_) => None,
        };
        if let Some(InFlight { token, task }) = previous {
            if task.is_finished() {
                return;
            }
            task.abort();
            let _ = self.completions.send(SynthesisCompletion {
                token,
                outcome: SynthesisOutcome::Interrupted,
            });
        }
    }
}

impl SynthesisPort for SimulatedSynthesizer {
    fn speak(&self, request: SpeakRequest) {
        self.interrupt_current();

        let duration = self.estimate(&request.text, request.pause_after_ms, request.rate.value());
        tracing::trace!(
            token = %request.token,
            duration_ms = duration.as_millis() as u64,
            "Simulating speech"
        );

        let token = request.token;
        let completions = self.completions.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = completions.send(SynthesisCompletion {
                token,
                outcome: SynthesisOutcome::Completed,
            });
        });

        if let Ok(mut current) = self.current.lock() {
            *current = Some(InFlight {
                token,
                task: task.abort_handle(),
            });
        }
    }

    fn stop(&self) {
        self.interrupt_current();
    }

    fn set_rate(&self, rate: SpeechRate) {
        if let Ok(mut current) = self.rate.lock() {
            *current = rate.value();
        }
    }
}
