//! Playback Engine - 分段朗读状态机
//!
//! 单一写者：只有持有引擎的 EngineWorker 任务调用这些 `&mut self` 方法。
//!
//! 不变量:
//! - STOPPED ⇒ 不持有章节内容、音频独占资源、唤醒锁
//! - 持有内容时 `0 ≤ position < content.len()`
//! - 唤醒锁只在 PLAYING 时持有
//! - 令牌与当前不一致的完成回调不改变任何状态

use std::sync::Arc;

use tokio::time::Instant;

use crate::application::ports::{
    AudioFocusPort, SpeakRequest, SynthesisCompletion, SynthesisOutcome, SynthesisPort,
    WakeLockPort,
};
use crate::application::services::sleep_timer::{SleepTimer, TimerState, TimerTick};
use crate::domain::playback::{
    ErrorInfo, PlaybackError, PlaybackSnapshot, PlaybackStatus, RequestToken, ResumePoint,
    SegmentStore, SpeechRate, StopReason,
};
use crate::infrastructure::events::EventPublisher;

/// 片段完成后的推进结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentAdvance {
    /// 过期或不适用的回调，已丢弃
    Ignored,
    /// 已推进到下一片段
    Advanced,
    /// 章节最后一段完成，引擎已进入 STOPPED
    ChapterFinished {
        work_id: String,
        chapter_index: usize,
        has_next: bool,
        /// 停止前睡眠定时器的进度
        sleep_timer: Option<TimerState>,
    },
}

pub struct PlaybackEngine {
    synthesis: Arc<dyn SynthesisPort>,
    audio_focus: Arc<dyn AudioFocusPort>,
    wake_lock: Arc<dyn WakeLockPort>,
    publisher: Arc<EventPublisher>,

    status: PlaybackStatus,
    content: Option<SegmentStore>,
    position: usize,
    token: RequestToken,
    rate: SpeechRate,
    sleep_timer: SleepTimer,
    session_id: u64,
    last_position: Option<ResumePoint>,
    last_error: Option<ErrorInfo>,
    consecutive_failures: u32,
    play_epoch: u64,
}

impl PlaybackEngine {
    pub fn new(
        synthesis: Arc<dyn SynthesisPort>,
        audio_focus: Arc<dyn AudioFocusPort>,
        wake_lock: Arc<dyn WakeLockPort>,
        publisher: Arc<EventPublisher>,
        rate: SpeechRate,
    ) -> Self {
        Self {
            synthesis,
            audio_focus,
            wake_lock,
            publisher,
            status: PlaybackStatus::Stopped,
            content: None,
            position: 0,
            token: RequestToken::default(),
            rate,
            sleep_timer: SleepTimer::new(),
            session_id: 0,
            last_position: None,
            last_error: None,
            consecutive_failures: 0,
            play_epoch: 0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// 当前片段索引，未加载内容时为 None
    pub fn position(&self) -> Option<usize> {
        self.content.as_ref().map(|_| self.position)
    }

    pub fn content(&self) -> Option<&SegmentStore> {
        self.content.as_ref()
    }

    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn rate(&self) -> SpeechRate {
        self.rate
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// 最近一次停止前的位置
    pub fn last_position(&self) -> Option<&ResumePoint> {
        self.last_position.as_ref()
    }

    pub fn sleep_timer_remaining(&self) -> Option<u32> {
        self.sleep_timer.remaining()
    }

    pub fn sleep_timer_deadline(&self) -> Option<Instant> {
        self.sleep_timer.deadline()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let mut snapshot = PlaybackSnapshot::describe(
            self.status,
            self.session_id,
            self.content.as_ref().map(|c| (c, self.position)),
            self.rate.value(),
            self.sleep_timer.remaining(),
            self.last_error.clone(),
        );
        snapshot.play_epoch = self.play_epoch;
        snapshot
    }

    /// 开始新会话
    ///
    /// 任何状态下都可调用；已有会话以 `Replaced` 结束。
    /// 获取音频独占资源失败时停留在 STOPPED 并返回 `ResourceDenied`
    pub fn start(&mut self, content: SegmentStore, start_index: usize) -> Result<(), PlaybackError> {
        self.stop(StopReason::Replaced);

        if !self.audio_focus.acquire() {
            tracing::warn!(
                work_id = %content.work_id(),
                chapter_index = content.chapter_index(),
                "Audio focus denied, staying stopped"
            );
            return Err(self.fail(PlaybackError::ResourceDenied));
        }
        self.wake_lock.acquire();

        self.position = content.clamp_index(start_index);
        self.session_id += 1;
        self.consecutive_failures = 0;
        self.last_error = None;
        self.status = PlaybackStatus::Playing;
        self.play_epoch += 1;

        tracing::info!(
            session_id = self.session_id,
            work_id = %content.work_id(),
            chapter_index = content.chapter_index(),
            segment_index = self.position,
            total_segments = content.len(),
            "Playback started"
        );
        self.content = Some(content);

        self.speak_current();
        self.publish();
        Ok(())
    }

    /// 暂停，仅在 PLAYING 时生效
    ///
    /// 保留音频独占资源以便快速恢复，释放唤醒锁
    pub fn pause(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        self.invalidate_in_flight();
        self.wake_lock.release();
        self.status = PlaybackStatus::Paused;

        tracing::info!(
            session_id = self.session_id,
            segment_index = self.position,
            "Playback paused"
        );
        self.publish();
    }

    /// 恢复，仅在 PAUSED 时生效
    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.status != PlaybackStatus::Paused {
            return Ok(());
        }
        if !self.audio_focus.acquire() {
            tracing::warn!(session_id = self.session_id, "Audio focus denied, staying paused");
            return Err(self.fail(PlaybackError::ResourceDenied));
        }
        self.wake_lock.acquire();
        self.status = PlaybackStatus::Playing;
        self.play_epoch += 1;

        tracing::info!(
            session_id = self.session_id,
            segment_index = self.position,
            "Playback resumed"
        );
        self.speak_current();
        self.publish();
        Ok(())
    }

    /// 停止并释放全部资源
    ///
    /// 已经 STOPPED 时什么也不做并返回 false；否则发布一次会话结束事件
    pub fn stop(&mut self, reason: StopReason) -> bool {
        if self.status == PlaybackStatus::Stopped {
            return false;
        }

        self.invalidate_in_flight();
        self.wake_lock.release();
        self.audio_focus.release();
        self.sleep_timer.cancel();

        if let Some(content) = self.content.take() {
            self.last_position = Some(resume_point(&content, self.position, reason));
        }
        self.position = 0;
        self.status = PlaybackStatus::Stopped;

        tracing::info!(
            session_id = self.session_id,
            reason = reason.as_str(),
            "Playback stopped"
        );
        self.publisher
            .publish_session_completed(self.session_id, reason);
        self.publish();
        true
    }

    /// 下一片段；到达章节末尾时不做任何事
    pub fn next(&mut self) -> Result<(), PlaybackError> {
        let len = self.require_content()?.len();
        if self.position + 1 >= len {
            return Ok(());
        }
        self.move_to(self.position + 1);
        Ok(())
    }

    /// 上一片段；位于第一段时不做任何事
    pub fn previous(&mut self) -> Result<(), PlaybackError> {
        self.require_content()?;
        if self.position == 0 {
            return Ok(());
        }
        self.move_to(self.position - 1);
        Ok(())
    }

    /// 跳转到指定片段（超出范围时取边界）
    pub fn seek(&mut self, index: usize) -> Result<(), PlaybackError> {
        let target = self.require_content()?.clamp_index(index);
        self.move_to(target);
        Ok(())
    }

    /// 合成完成回调
    ///
    /// 失败与成功同样推进，保证单个坏片段不会让播放停滞
    pub fn on_segment_complete(&mut self, completion: SynthesisCompletion) -> SegmentAdvance {
        if completion.token != self.token || self.status != PlaybackStatus::Playing {
            tracing::trace!(
                token = %completion.token,
                current = %self.token,
                status = %self.status,
                "Dropping stale completion"
            );
            return SegmentAdvance::Ignored;
        }

        match completion.outcome {
            SynthesisOutcome::Completed => self.consecutive_failures = 0,
            SynthesisOutcome::Failed(code) => {
                self.consecutive_failures += 1;
                tracing::warn!(
                    token = %completion.token,
                    segment_index = self.position,
                    code,
                    consecutive_failures = self.consecutive_failures,
                    "Synthesis failed, skipping segment"
                );
            }
            SynthesisOutcome::Interrupted => {
                tracing::debug!(token = %completion.token, "Current request interrupted externally");
                return SegmentAdvance::Ignored;
            }
        }

        let Some(content) = self.content.as_ref() else {
            return SegmentAdvance::Ignored;
        };

        if self.position + 1 < content.len() {
            self.position += 1;
            self.speak_current();
            self.publish();
            return SegmentAdvance::Advanced;
        }

        let finished = SegmentAdvance::ChapterFinished {
            work_id: content.work_id().to_string(),
            chapter_index: content.chapter_index(),
            has_next: content.has_next(),
            sleep_timer: self.sleep_timer.state(),
        };
        self.stop(StopReason::ChapterFinished);
        finished
    }

    /// 替换当前内容（如后台刷新），不改变播放状态
    ///
    /// `keep_position` 为 false 时回到第 0 段；为 true 时索引限制在新内容范围内，
    /// 索引不变时当前合成继续
    pub fn update_content(
        &mut self,
        content: SegmentStore,
        keep_position: bool,
    ) -> Result<(), PlaybackError> {
        self.require_content()?;

        let target = if keep_position {
            content.clamp_index(self.position)
        } else {
            0
        };
        let restart = !keep_position || target != self.position;

        tracing::info!(
            session_id = self.session_id,
            chapter_index = content.chapter_index(),
            segment_index = target,
            keep_position,
            "Content updated"
        );
        self.content = Some(content);

        if restart {
            self.move_to(target);
        } else {
            self.publish();
        }
        Ok(())
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<(), PlaybackError> {
        let rate = SpeechRate::new(rate)?;
        self.rate = rate;
        self.synthesis.set_rate(rate);
        tracing::debug!(rate = rate.value(), "Speech rate changed");
        self.publish();
        Ok(())
    }

    pub fn set_sleep_timer(&mut self, minutes: u32, now: Instant) -> Result<(), PlaybackError> {
        if self.status == PlaybackStatus::Stopped {
            return Err(PlaybackError::NoActiveSession);
        }
        if minutes == 0 {
            return Err(PlaybackError::InvalidSleepTimer(
                "minutes must be at least 1".to_string(),
            ));
        }
        self.sleep_timer.start(minutes, now);
        tracing::info!(minutes, "Sleep timer started");
        self.publish();
        Ok(())
    }

    /// 在新会话上接续之前的定时器，不重新计时
    pub fn restore_sleep_timer(&mut self, state: TimerState) -> Result<(), PlaybackError> {
        if self.status == PlaybackStatus::Stopped {
            return Err(PlaybackError::NoActiveSession);
        }
        self.sleep_timer.restore(state);
        tracing::debug!(minutes = state.remaining, "Sleep timer carried over");
        self.publish();
        Ok(())
    }

    pub fn cancel_sleep_timer(&mut self) {
        if self.sleep_timer.is_active() {
            self.sleep_timer.cancel();
            tracing::info!("Sleep timer cancelled");
            self.publish();
        }
    }

    /// 睡眠定时器到点；归零时停止播放并返回 true
    pub fn on_sleep_timer_tick(&mut self, now: Instant) -> bool {
        match self.sleep_timer.tick(now) {
            TimerTick::Elapsed => {
                tracing::info!("Sleep timer elapsed");
                self.stop(StopReason::SleepTimer)
            }
            TimerTick::Remaining(minutes) => {
                tracing::debug!(minutes, "Sleep timer tick");
                self.publish();
                false
            }
            TimerTick::Idle | TimerTick::NotDue => false,
        }
    }

    /// 播放/暂停切换
    ///
    /// STOPPED 时返回最近一次的位置，由调用方重新加载内容
    pub fn play_pause(&mut self) -> Result<Option<ResumePoint>, PlaybackError> {
        match self.status {
            PlaybackStatus::Playing => {
                self.pause();
                Ok(None)
            }
            PlaybackStatus::Paused => self.resume().map(|_| None),
            PlaybackStatus::Stopped => Ok(self.last_position.clone()),
        }
    }

    /// 记录可恢复错误并广播
    pub fn report_error(&mut self, error: &PlaybackError) {
        self.last_error = Some(ErrorInfo {
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
        self.publisher.publish_error(error.kind(), &error.to_string());
        self.publish();
    }

    fn fail(&mut self, error: PlaybackError) -> PlaybackError {
        self.report_error(&error);
        error
    }

    fn require_content(&self) -> Result<&SegmentStore, PlaybackError> {
        self.content.as_ref().ok_or(PlaybackError::NoActiveSession)
    }

    /// 作废在途请求：推进令牌后再停止合成，被打断的回调因此总是过期的
    fn invalidate_in_flight(&mut self) {
        self.token = self.token.next();
        self.synthesis.stop();
    }

    fn move_to(&mut self, index: usize) {
        self.invalidate_in_flight();
        self.position = index;
        if self.status == PlaybackStatus::Playing {
            self.speak_current();
        }
        self.publish();
    }

    fn speak_current(&mut self) {
        let Some(segment) = self.content.as_ref().and_then(|c| c.segment(self.position)) else {
            return;
        };
        self.token = self.token.next();
        let request = SpeakRequest {
            token: self.token,
            text: segment.text.clone(),
            pause_after_ms: segment.pause_after_ms,
            rate: self.rate,
        };
        tracing::debug!(
            token = %self.token,
            segment_index = self.position,
            "Speaking segment"
        );
        self.synthesis.speak(request);
    }

    fn publish(&self) {
        self.publisher.publish_snapshot(self.snapshot());
    }
}

/// 停止时记录的续播位置；章节自然结束时指向下一章开头
fn resume_point(content: &SegmentStore, position: usize, reason: StopReason) -> ResumePoint {
    let (chapter_index, segment_index) = match reason {
        StopReason::ChapterFinished if content.has_next() => (content.chapter_index() + 1, 0),
        _ => (content.chapter_index(), position),
    };
    ResumePoint {
        work_id: content.work_id().to_string(),
        chapter_index,
        segment_index,
    }
}
