//! Application Services - 播放核心
//!
//! - PlaybackEngine: 单一写者状态机
//! - ContentLoader: 缓存优先加载、single-flight、预取
//! - InterruptionCoordinator: 外部中断 → 暂停/恢复/停止
//! - SleepTimer: 睡眠定时器
//! - SessionPresenter: 控制面边界

pub mod content_loader;
pub mod interruption;
pub mod playback_engine;
pub mod session_presenter;
pub mod sleep_timer;

#[cfg(test)]
pub(crate) mod test_support;

pub use content_loader::{ContentLoader, LoaderSettings};
pub use interruption::{
    CoordinatorGuard, InterruptionAction, InterruptionCoordinator, InterruptionPolicy,
};
pub use playback_engine::{PlaybackEngine, SegmentAdvance};
pub use session_presenter::{available_actions, MediaAction, SessionPresenter};
pub use sleep_timer::{SleepTimer, TimerState, TimerTick};
