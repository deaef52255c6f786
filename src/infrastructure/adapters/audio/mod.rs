//! Audio Adapter - 进程内音频独占资源与唤醒锁

mod focus_arbiter;
mod wake_lock;

pub use focus_arbiter::AudioFocusArbiter;
pub use wake_lock::WakeLock;
