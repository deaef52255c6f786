//! Wake Lock - 朗读期间的保活标记

use std::sync::atomic::{AtomicBool, Ordering};

use crate::application::ports::WakeLockPort;

/// 进程内唤醒锁，重复获取与释放都是幂等的
#[derive(Debug, Default)]
pub struct WakeLock {
    held: AtomicBool,
}

impl WakeLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WakeLockPort for WakeLock {
    fn acquire(&self) {
        if !self.held.swap(true, Ordering::SeqCst) {
            tracing::debug!("Wake lock acquired");
        }
    }

    fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            tracing::debug!("Wake lock released");
        }
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}
