//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_resource;
mod content_source;
mod interruption;
mod offline_cache;
mod synthesis;

pub use audio_resource::{AudioFocusChange, AudioFocusPort, WakeLockPort};
pub use content_source::{ContentSourceError, ContentSourcePort};
pub use interruption::{CallState, InterruptionSignal, InterruptionSourcePort};
pub use offline_cache::{chapter_cache_key, CacheError, OfflineCachePort};
pub use synthesis::{
    completion_channel, CompletionReceiver, CompletionSender, SpeakRequest, SynthesisCompletion,
    SynthesisError, SynthesisOutcome, SynthesisPort,
};
