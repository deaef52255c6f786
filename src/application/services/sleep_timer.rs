//! Sleep Timer - 睡眠定时器
//!
//! 每分钟递减一次，归零时由引擎停止播放。
//! 定时器由引擎持有，引擎经任何路径进入 STOPPED 都会取消它

use std::time::Duration;

use tokio::time::Instant;

/// 递减间隔
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// 定时器进度；跨章节时原样带到新会话
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub remaining: u32,
    pub next_tick: Instant,
}

/// tick 结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// 未启动
    Idle,
    /// 尚未到期
    NotDue,
    /// 递减后的剩余分钟数
    Remaining(u32),
    /// 已归零，定时器已清除
    Elapsed,
}

#[derive(Debug, Default)]
pub struct SleepTimer {
    state: Option<TimerState>,
}

impl SleepTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启动（覆盖已有定时器）
    pub fn start(&mut self, minutes: u32, now: Instant) {
        self.state = Some(TimerState {
            remaining: minutes,
            next_tick: now + TICK_INTERVAL,
        });
    }

    /// 恢复之前的进度，下一次递减时间点不变
    pub fn restore(&mut self, state: TimerState) {
        self.state = Some(state);
    }

    pub fn state(&self) -> Option<TimerState> {
        self.state
    }

    /// 取消，幂等
    pub fn cancel(&mut self) {
        self.state = None;
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn remaining(&self) -> Option<u32> {
        self.state.map(|s| s.remaining)
    }

    /// 下一次递减的时间点
    pub fn deadline(&self) -> Option<Instant> {
        self.state.map(|s| s.next_tick)
    }

    pub fn tick(&mut self, now: Instant) -> TimerTick {
        let Some(state) = self.state.as_mut() else {
            return TimerTick::Idle;
        };
        if now < state.next_tick {
            return TimerTick::NotDue;
        }

        state.remaining = state.remaining.saturating_sub(1);
        if state.remaining == 0 {
            self.state = None;
            return TimerTick::Elapsed;
        }
        state.next_tick += TICK_INTERVAL;
        TimerTick::Remaining(state.remaining)
    }
}

/// 等待到期；没有定时器时永不返回（用作 select! 分支）
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_countdown_to_elapsed() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        timer.start(2, now);

        assert_eq!(timer.tick(now), TimerTick::NotDue);
        assert_eq!(timer.tick(now + TICK_INTERVAL), TimerTick::Remaining(1));
        assert_eq!(timer.deadline(), Some(now + TICK_INTERVAL * 2));
        assert_eq!(timer.tick(now + TICK_INTERVAL * 2), TimerTick::Elapsed);
        assert!(!timer.is_active());
        assert_eq!(timer.tick(now + TICK_INTERVAL * 3), TimerTick::Idle);
    }

    #[test]
    fn test_restart_replaces_existing() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        timer.start(5, now);
        timer.start(1, now + Duration::from_secs(30));

        assert_eq!(timer.remaining(), Some(1));
        assert_eq!(timer.tick(now + TICK_INTERVAL), TimerTick::NotDue);
    }

    #[test]
    fn test_restore_keeps_next_tick() {
        let now = Instant::now();
        let mut timer = SleepTimer::new();
        timer.start(2, now);
        let saved = timer.state().unwrap();
        timer.cancel();

        timer.restore(saved);
        assert_eq!(timer.deadline(), Some(now + TICK_INTERVAL));
        assert_eq!(timer.tick(now + TICK_INTERVAL), TimerTick::Remaining(1));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timer = SleepTimer::new();
        timer.cancel();
        timer.start(3, Instant::now());
        timer.cancel();
        timer.cancel();
        assert_eq!(timer.remaining(), None);
        assert_eq!(timer.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline_waits() {
        let start = Instant::now();
        sleep_until_deadline(Some(start + TICK_INTERVAL)).await;
        assert!(Instant::now() >= start + TICK_INTERVAL);
    }
}
