//! Engine Worker - 播放引擎的单一写者任务
//!
//! 持有 PlaybackEngine，按顺序消费：
//! - 外部命令（EngineHandle）
//! - 合成完成回调
//! - 后台章节加载结果
//! - 睡眠定时器到期

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::application::commands::{CommandReply, ControlCommand, EngineCommand, EngineRequest};
use crate::application::ports::{
    CompletionReceiver, ContentSourcePort, OfflineCachePort, SynthesisCompletion,
};
use crate::application::services::sleep_timer::{sleep_until_deadline, TimerState};
use crate::application::services::{ContentLoader, LoaderSettings, PlaybackEngine, SegmentAdvance};
use crate::domain::playback::{PlaybackError, PlaybackStatus, ResumePoint, SegmentStore, StopReason};
use crate::infrastructure::events::EventPublisher;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct EngineWorkerConfig {
    /// 章节自然结束后自动播放下一章
    pub auto_advance: bool,
    pub loader: LoaderSettings,
}

impl Default for EngineWorkerConfig {
    fn default() -> Self {
        Self {
            auto_advance: true,
            loader: LoaderSettings::default(),
        }
    }
}

/// 加载完成后要做的事
#[derive(Debug, Clone, Copy)]
enum LoadIntent {
    /// 从指定片段开始新会话
    Start { segment_index: usize },
    /// 连续播放下一章，并恢复睡眠定时器
    AutoAdvance { sleep_timer: Option<TimerState> },
    /// 替换当前内容，保持位置
    Reload,
}

struct LoadOutcome {
    /// 打开新作品时创建的加载器
    loader: Option<Arc<ContentLoader>>,
    /// None 表示已在作品边界
    content: Option<SegmentStore>,
}

struct LoadResult {
    generation: u64,
    outcome: Result<LoadOutcome, PlaybackError>,
}

struct PendingLoad {
    generation: u64,
    intent: LoadIntent,
    reply: Option<CommandReply>,
    task: AbortHandle,
}

/// 引擎 Worker
pub struct EngineWorker {
    engine: PlaybackEngine,
    commands: mpsc::Receiver<EngineRequest>,
    completions: CompletionReceiver,
    source: Arc<dyn ContentSourcePort>,
    cache: Option<Arc<dyn OfflineCachePort>>,
    publisher: Arc<EventPublisher>,
    config: EngineWorkerConfig,
    loader: Option<Arc<ContentLoader>>,
    load_tx: mpsc::UnboundedSender<LoadResult>,
    load_rx: mpsc::UnboundedReceiver<LoadResult>,
    load_generation: u64,
    pending: Option<PendingLoad>,
}

impl EngineWorker {
    pub fn new(
        engine: PlaybackEngine,
        commands: mpsc::Receiver<EngineRequest>,
        completions: CompletionReceiver,
        source: Arc<dyn ContentSourcePort>,
        cache: Option<Arc<dyn OfflineCachePort>>,
        publisher: Arc<EventPublisher>,
        config: EngineWorkerConfig,
    ) -> Self {
        let (load_tx, load_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            commands,
            completions,
            source,
            cache,
            publisher,
            config,
            loader: None,
            load_tx,
            load_rx,
            load_generation: 0,
            pending: None,
        }
    }

    /// 启动 Worker，命令队列关闭或收到 Shutdown 时退出
    pub async fn run(mut self) {
        tracing::info!(
            auto_advance = self.config.auto_advance,
            prefetch = self.config.loader.prefetch,
            "EngineWorker started"
        );
        self.publisher.publish_snapshot(self.engine.snapshot());

        loop {
            tokio::select! {
                request = self.commands.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    if !self.handle_request(request) {
                        break;
                    }
                }
                Some(completion) = self.completions.recv() => {
                    self.handle_completion(completion);
                }
                Some(result) = self.load_rx.recv() => {
                    self.handle_load_result(result);
                }
                _ = sleep_until_deadline(self.engine.sleep_timer_deadline()) => {
                    if self.engine.on_sleep_timer_tick(Instant::now()) {
                        self.cancel_loads();
                    }
                }
            }
        }

        self.teardown();
        tracing::info!("EngineWorker stopped");
    }

    /// 返回 false 表示 Worker 应退出
    fn handle_request(&mut self, request: EngineRequest) -> bool {
        let EngineRequest { command, reply } = request;
        match command {
            EngineCommand::Control(cmd) => self.handle_control(cmd, reply),
            EngineCommand::Start {
                content,
                start_index,
            } => {
                self.cancel_loads();
                let result = self.start(content, start_index);
                respond(reply, result);
            }
            EngineCommand::UpdateContent {
                content,
                keep_position,
            } => {
                let result = self.engine.update_content(content, keep_position);
                respond(reply, result);
            }
            EngineCommand::StopWith(reason) => {
                self.stop(reason);
                respond(reply, Ok(()));
            }
            EngineCommand::Shutdown => {
                respond(reply, Ok(()));
                return false;
            }
        }
        true
    }

    fn handle_control(&mut self, command: ControlCommand, reply: Option<CommandReply>) {
        tracing::debug!(command = command.name(), "Control command");

        let result = match command {
            ControlCommand::PlayPause => {
                let was_stopped = self.engine.status() == PlaybackStatus::Stopped;
                match self.engine.play_pause() {
                    Ok(Some(point)) => return self.reopen(point, reply),
                    Ok(None) if was_stopped => {
                        let err = PlaybackError::NoActiveSession;
                        self.engine.report_error(&err);
                        Err(err)
                    }
                    other => other.map(|_| ()),
                }
            }
            ControlCommand::Pause => {
                self.engine.pause();
                Ok(())
            }
            ControlCommand::Resume => self.engine.resume(),
            ControlCommand::Stop => {
                self.stop(StopReason::User);
                Ok(())
            }
            ControlCommand::Next => self.engine.next(),
            ControlCommand::Previous => self.engine.previous(),
            ControlCommand::Seek { index } => self.engine.seek(index),
            ControlCommand::SetRate { rate } => self.engine.set_rate(rate),
            ControlCommand::SetSleepTimer { minutes } => {
                self.engine.set_sleep_timer(minutes, Instant::now())
            }
            ControlCommand::CancelSleepTimer => {
                self.engine.cancel_sleep_timer();
                Ok(())
            }
            ControlCommand::OpenWork {
                work_id,
                chapter_index,
                segment_index,
            } => return self.open_work(work_id, chapter_index, segment_index, reply),
            ControlCommand::OpenChapter {
                chapter_index,
                segment_index,
            } => match self.current_loader() {
                Ok(loader) => {
                    return self.begin_load(LoadIntent::Start { segment_index }, reply, async move {
                        let content = loader.load_chapter(chapter_index).await?;
                        Ok(LoadOutcome {
                            loader: None,
                            content: Some(content),
                        })
                    })
                }
                Err(e) => Err(e),
            },
            ControlCommand::NextChapter => match self.current_loader() {
                Ok(loader) => {
                    return self.begin_load(LoadIntent::Start { segment_index: 0 }, reply, async move {
                        let content = loader.load_next().await?;
                        Ok(LoadOutcome {
                            loader: None,
                            content,
                        })
                    })
                }
                Err(e) => Err(e),
            },
            ControlCommand::PreviousChapter => match self.current_loader() {
                Ok(loader) => {
                    return self.begin_load(LoadIntent::Start { segment_index: 0 }, reply, async move {
                        let content = loader.load_previous().await?;
                        Ok(LoadOutcome {
                            loader: None,
                            content,
                        })
                    })
                }
                Err(e) => Err(e),
            },
            ControlCommand::Reload => {
                if self.engine.status() == PlaybackStatus::Stopped {
                    Err(PlaybackError::NoActiveSession)
                } else {
                    match self.current_loader() {
                        Ok(loader) => {
                            return self.begin_load(LoadIntent::Reload, reply, async move {
                                let content = loader.reload_current().await?;
                                Ok(LoadOutcome {
                                    loader: None,
                                    content: Some(content),
                                })
                            })
                        }
                        Err(e) => Err(e),
                    }
                }
            }
        };

        if let Err(e) = &result {
            tracing::debug!(error = %e, "Control command not applied");
        }
        respond(reply, result);
    }

    fn handle_completion(&mut self, completion: SynthesisCompletion) {
        let SegmentAdvance::ChapterFinished {
            work_id,
            chapter_index,
            has_next,
            sleep_timer,
        } = self.engine.on_segment_complete(completion)
        else {
            return;
        };
        self.cancel_loads();

        if !has_next {
            tracing::info!(work_id = %work_id, "Work finished");
            self.publisher.publish_work_finished(&work_id);
            return;
        }
        if !self.config.auto_advance {
            return;
        }
        let loader = match self.loader.as_ref() {
            Some(loader) if loader.work_id() == work_id => Arc::clone(loader),
            _ => return,
        };

        tracing::info!(
            work_id = %work_id,
            chapter_index = chapter_index + 1,
            "Advancing to next chapter"
        );
        self.begin_load(
            LoadIntent::AutoAdvance { sleep_timer },
            None,
            async move {
                let content = loader.load_chapter(chapter_index + 1).await?;
                Ok(LoadOutcome {
                    loader: None,
                    content: Some(content),
                })
            },
        );
    }

    fn handle_load_result(&mut self, result: LoadResult) {
        let current = self
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == result.generation);
        if !current {
            tracing::debug!(generation = result.generation, "Dropping superseded load result");
            if let Ok(LoadOutcome {
                loader: Some(loader),
                ..
            }) = result.outcome
            {
                loader.shutdown();
            }
            return;
        }
        let Some(PendingLoad { intent, reply, .. }) = self.pending.take() else {
            return;
        };

        let outcome = match result.outcome {
            Ok(outcome) => outcome,
            Err(PlaybackError::Cancelled) => {
                respond(reply, Err(PlaybackError::Cancelled));
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Foreground load failed, keeping current content");
                self.engine.report_error(&e);
                respond(reply, Err(e));
                return;
            }
        };

        if let Some(loader) = outcome.loader {
            self.install_loader(loader);
        }

        let Some(content) = outcome.content else {
            if let LoadIntent::AutoAdvance { .. } = intent {
                if let Some(loader) = &self.loader {
                    self.publisher.publish_work_finished(loader.work_id());
                }
            }
            respond(reply, Ok(()));
            return;
        };

        let result = match intent {
            LoadIntent::Start { segment_index } => self.start(content, segment_index),
            LoadIntent::AutoAdvance { sleep_timer } => {
                self.start(content, 0).and_then(|_| match sleep_timer {
                    Some(state) => self.engine.restore_sleep_timer(state),
                    None => Ok(()),
                })
            }
            LoadIntent::Reload => self.engine.update_content(content, true),
        };
        respond(reply, result);
    }

    fn open_work(
        &mut self,
        work_id: String,
        chapter_index: usize,
        segment_index: usize,
        reply: Option<CommandReply>,
    ) {
        if let Some(loader) = self.loader.as_ref().filter(|l| l.work_id() == work_id) {
            let loader = Arc::clone(loader);
            return self.begin_load(LoadIntent::Start { segment_index }, reply, async move {
                let content = loader.load_chapter(chapter_index).await?;
                Ok(LoadOutcome {
                    loader: None,
                    content: Some(content),
                })
            });
        }

        let source = Arc::clone(&self.source);
        let cache = self.cache.clone();
        let settings = self.config.loader.clone();
        self.begin_load(LoadIntent::Start { segment_index }, reply, async move {
            let outline = source
                .fetch_outline(&work_id)
                .await
                .map_err(|e| PlaybackError::ContentLoadFailed(format!("outline {}: {}", work_id, e)))?;
            tracing::info!(
                work_id = %work_id,
                total_chapters = outline.total_chapters(),
                "Work outline loaded"
            );
            let loader = ContentLoader::new(outline, source, cache, settings);
            let content = loader.load_chapter(chapter_index).await?;
            Ok(LoadOutcome {
                loader: Some(loader),
                content: Some(content),
            })
        });
    }

    fn reopen(&mut self, point: ResumePoint, reply: Option<CommandReply>) {
        tracing::info!(
            work_id = %point.work_id,
            chapter_index = point.chapter_index,
            segment_index = point.segment_index,
            "Reopening last position"
        );
        self.open_work(point.work_id, point.chapter_index, point.segment_index, reply);
    }

    /// 在后台运行加载，结果带着代号回到主循环；新的加载会取代旧的
    fn begin_load<F>(&mut self, intent: LoadIntent, reply: Option<CommandReply>, load: F)
    where
        F: Future<Output = Result<LoadOutcome, PlaybackError>> + Send + 'static,
    {
        self.cancel_loads();
        let generation = self.load_generation;
        let tx = self.load_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = load.await;
            let _ = tx.send(LoadResult {
                generation,
                outcome,
            });
        });
        self.pending = Some(PendingLoad {
            generation,
            intent,
            reply,
            task: task.abort_handle(),
        });
    }

    /// 取消进行中的前台加载，迟到的结果因代号不匹配而被丢弃
    fn cancel_loads(&mut self) {
        self.load_generation += 1;
        if let Some(pending) = self.pending.take() {
            tracing::debug!(generation = pending.generation, "Cancelling foreground load");
            pending.task.abort();
            respond(pending.reply, Err(PlaybackError::Cancelled));
        }
        if let Some(loader) = &self.loader {
            loader.cancel_foreground();
        }
    }

    fn start(&mut self, content: SegmentStore, start_index: usize) -> Result<(), PlaybackError> {
        let work_id = content.work_id().to_string();
        let chapter_index = content.chapter_index();
        let chapter_title = content.chapter_title().to_string();
        self.engine.start(content, start_index)?;
        self.publisher
            .publish_chapter_loaded(&work_id, chapter_index, &chapter_title);
        Ok(())
    }

    fn stop(&mut self, reason: StopReason) {
        self.cancel_loads();
        self.engine.stop(reason);
    }

    fn current_loader(&self) -> Result<Arc<ContentLoader>, PlaybackError> {
        self.loader.clone().ok_or(PlaybackError::NoWorkOpen)
    }

    fn install_loader(&mut self, loader: Arc<ContentLoader>) {
        tracing::debug!(work_id = %loader.work_id(), "Installing content loader");
        if let Some(previous) = self.loader.replace(loader) {
            previous.shutdown();
        }
    }

    fn teardown(&mut self) {
        self.cancel_loads();
        self.engine.stop(StopReason::Shutdown);
        if let Some(loader) = self.loader.take() {
            loader.shutdown();
        }
    }
}

fn respond(reply: Option<CommandReply>, result: Result<(), PlaybackError>) {
    if let Some(reply) = reply {
        let _ = reply.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::commands::EngineHandle;
    use crate::application::ports::{
        completion_channel, AudioFocusChange, AudioFocusPort, CallState, CompletionSender,
        ContentSourceError, InterruptionSignal, SynthesisOutcome, WakeLockPort,
    };
    use crate::application::services::{CoordinatorGuard, InterruptionCoordinator};
    use crate::application::services::test_support::{
        outline, store, FakeAudioFocus, FakeWakeLock, RecordingSynthesis, ScriptedContentSource,
    };
    use crate::domain::playback::{PlaybackSnapshot, SpeechRate};
    use crate::infrastructure::adapters::synthesis::{SimulatedSynthesizer, SimulatedSynthesizerConfig};
    use crate::infrastructure::adapters::{AudioFocusArbiter, PlatformSignals};
    use crate::infrastructure::events::EngineEvent;

    struct Running {
        handle: EngineHandle,
        publisher: Arc<EventPublisher>,
        synthesis: Arc<RecordingSynthesis>,
        completions: CompletionSender,
        focus: Arc<FakeAudioFocus>,
        wake_lock: Arc<FakeWakeLock>,
        source: Arc<ScriptedContentSource>,
    }

    fn spawn_recording(config: EngineWorkerConfig) -> Running {
        spawn_with_source(config, ScriptedContentSource::new(outline("w1", 3), 3))
    }

    fn spawn_with_source(
        config: EngineWorkerConfig,
        source: Arc<ScriptedContentSource>,
    ) -> Running {
        let publisher = EventPublisher::new().arc();
        let synthesis = RecordingSynthesis::new();
        let focus = FakeAudioFocus::new();
        let wake_lock = FakeWakeLock::new();
        let (completions, completion_rx) = completion_channel();
        let (handle, commands) = EngineHandle::channel(16);

        let engine = PlaybackEngine::new(
            synthesis.clone(),
            focus.clone(),
            wake_lock.clone(),
            publisher.clone(),
            SpeechRate::default(),
        );
        let worker = EngineWorker::new(
            engine,
            commands,
            completion_rx,
            source.clone(),
            None,
            publisher.clone(),
            config,
        );
        tokio::spawn(worker.run());

        Running {
            handle,
            publisher,
            synthesis,
            completions,
            focus,
            wake_lock,
            source,
        }
    }

    fn snapshot(running: &Running) -> PlaybackSnapshot {
        running.publisher.snapshot()
    }

    async fn complete_current(running: &Running) {
        let token = running.synthesis.last().unwrap().token;
        running
            .completions
            .send(SynthesisCompletion {
                token,
                outcome: SynthesisOutcome::Completed,
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_stops_playback_after_a_minute() {
        let running = spawn_recording(EngineWorkerConfig::default());
        running
            .handle
            .execute(EngineCommand::Start {
                content: store(0, 3),
                start_index: 0,
            })
            .await
            .unwrap();
        running
            .handle
            .control(ControlCommand::SetSleepTimer { minutes: 1 })
            .await
            .unwrap();
        assert_eq!(snapshot(&running).sleep_timer_remaining, Some(1));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(snapshot(&running).status, PlaybackStatus::Playing);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(snapshot(&running).status, PlaybackStatus::Stopped);
        assert!(!running.focus.is_held());
        assert!(!running.wake_lock.is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_work_and_navigate_chapters() {
        let running = spawn_recording(EngineWorkerConfig::default());
        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 1,
                segment_index: 2,
            })
            .await
            .unwrap();

        let state = snapshot(&running);
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.chapter_index, Some(1));
        assert_eq!(state.segment_index, Some(2));
        assert_eq!(state.total_chapters, 3);
        assert!(state.has_next && state.has_previous);

        running.handle.control(ControlCommand::NextChapter).await.unwrap();
        let state = snapshot(&running);
        assert_eq!(state.chapter_index, Some(2));
        assert_eq!(state.segment_index, Some(0));
        assert!(!state.has_next);

        // 最后一章再前进不改变任何状态
        running.handle.control(ControlCommand::NextChapter).await.unwrap();
        assert_eq!(snapshot(&running).chapter_index, Some(2));

        running.handle.control(ControlCommand::PreviousChapter).await.unwrap();
        assert_eq!(snapshot(&running).chapter_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_chapter_load_keeps_current_content() {
        let running = spawn_recording(EngineWorkerConfig::default());
        running
            .source
            .set_chapter("c1.txt", Err(ContentSourceError::Timeout));
        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 0,
                segment_index: 1,
            })
            .await
            .unwrap();
        let mut events = running.publisher.subscribe();

        let err = running.handle.control(ControlCommand::NextChapter).await.unwrap_err();
        assert!(err.to_string().contains("content load failed"));

        let state = snapshot(&running);
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.chapter_index, Some(0));
        assert_eq!(state.segment_index, Some(1));
        assert_eq!(
            state.last_error.map(|e| e.kind),
            Some("content_load_failed".to_string())
        );

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            saw_error |= matches!(event, EngineEvent::Error { .. });
        }
        assert!(saw_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_load() {
        let running = spawn_recording(EngineWorkerConfig::default());
        running.source.set_delay("c0.txt", Duration::from_secs(30));

        let open = {
            let handle = running.handle.clone();
            tokio::spawn(async move {
                handle
                    .control(ControlCommand::OpenWork {
                        work_id: "w1".to_string(),
                        chapter_index: 0,
                        segment_index: 0,
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        running.handle.control(ControlCommand::Stop).await.unwrap();

        assert!(open.await.unwrap().is_err());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(snapshot(&running).status, PlaybackStatus::Stopped);
        assert_eq!(running.synthesis.speak_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_pause_resumes_last_position_after_stop() {
        let running = spawn_recording(EngineWorkerConfig::default());
        assert!(running.handle.control(ControlCommand::PlayPause).await.is_err());

        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 2,
                segment_index: 1,
            })
            .await
            .unwrap();
        running.handle.control(ControlCommand::Stop).await.unwrap();
        assert_eq!(snapshot(&running).status, PlaybackStatus::Stopped);

        running.handle.control(ControlCommand::PlayPause).await.unwrap();
        let state = snapshot(&running);
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.chapter_index, Some(2));
        assert_eq!(state.segment_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chapter_end_advances_and_keeps_sleep_timer() {
        let running = spawn_recording(EngineWorkerConfig::default());
        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 0,
                segment_index: 2,
            })
            .await
            .unwrap();
        running
            .handle
            .control(ControlCommand::SetSleepTimer { minutes: 10 })
            .await
            .unwrap();

        complete_current(&running).await;

        let state = snapshot(&running);
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.chapter_index, Some(1));
        assert_eq!(state.segment_index, Some(0));
        assert_eq!(state.sleep_timer_remaining, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_timer_counts_down_across_short_chapters() {
        let running = spawn_with_source(
            EngineWorkerConfig::default(),
            ScriptedContentSource::new(outline("w1", 50), 1),
        );
        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 0,
                segment_index: 0,
            })
            .await
            .unwrap();
        running
            .handle
            .control(ControlCommand::SetSleepTimer { minutes: 1 })
            .await
            .unwrap();
        let mut events = running.publisher.subscribe();

        // 每章 40 秒，跨章节不重新计时
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(40)).await;
            if snapshot(&running).status == PlaybackStatus::Stopped {
                break;
            }
            complete_current(&running).await;
        }

        assert_eq!(snapshot(&running).status, PlaybackStatus::Stopped);
        let mut reasons = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::SessionCompleted { reason, .. } = event {
                reasons.push(reason);
            }
        }
        assert_eq!(
            reasons,
            vec![StopReason::ChapterFinished, StopReason::SleepTimer]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_disabled_stops_at_chapter_end() {
        let running = spawn_recording(EngineWorkerConfig {
            auto_advance: false,
            ..EngineWorkerConfig::default()
        });
        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 0,
                segment_index: 2,
            })
            .await
            .unwrap();

        complete_current(&running).await;
        assert_eq!(snapshot(&running).status, PlaybackStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_keeps_position() {
        let running = spawn_recording(EngineWorkerConfig::default());
        running
            .handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 0,
                segment_index: 1,
            })
            .await
            .unwrap();
        running
            .source
            .set_chapter("c0.txt", Ok("新的一句。\n第二句。\n第三句。\n第四句。".to_string()));

        running.handle.control(ControlCommand::Reload).await.unwrap();
        let state = snapshot(&running);
        assert_eq!(state.total_segments, 4);
        assert_eq!(state.segment_index, Some(1));
        assert_eq!(state.status, PlaybackStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_whole_work_plays_with_simulated_synthesizer() {
        let publisher = EventPublisher::new().arc();
        let (completions, completion_rx) = completion_channel();
        let synthesis = Arc::new(SimulatedSynthesizer::new(
            SimulatedSynthesizerConfig {
                ms_per_char: 10,
                default_rate: 1.0,
            },
            completions,
        ));
        let source = ScriptedContentSource::new(outline("w1", 2), 2);
        let (handle, commands) = EngineHandle::channel(16);
        let engine = PlaybackEngine::new(
            synthesis,
            FakeAudioFocus::new(),
            FakeWakeLock::new(),
            publisher.clone(),
            SpeechRate::default(),
        );
        tokio::spawn(
            EngineWorker::new(
                engine,
                commands,
                completion_rx,
                source,
                None,
                publisher.clone(),
                EngineWorkerConfig::default(),
            )
            .run(),
        );

        let mut events = publisher.subscribe();
        handle
            .control(ControlCommand::OpenWork {
                work_id: "w1".to_string(),
                chapter_index: 0,
                segment_index: 0,
            })
            .await
            .unwrap();

        let mut chapters = Vec::new();
        let finished = tokio::time::timeout(Duration::from_secs(600), async {
            loop {
                match events.recv().await {
                    Ok(EngineEvent::ChapterLoaded { chapter_index, .. }) => {
                        chapters.push(chapter_index)
                    }
                    Ok(EngineEvent::WorkFinished { work_id }) => return work_id,
                    Ok(_) | Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(e) => panic!("event stream closed: {e}"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(finished, "w1");
        assert_eq!(chapters, vec![0, 1]);
        assert_eq!(publisher.snapshot().status, PlaybackStatus::Stopped);
    }

    struct WithSignals {
        handle: EngineHandle,
        publisher: Arc<EventPublisher>,
        synthesis: Arc<RecordingSynthesis>,
        signals: PlatformSignals,
        _completions: CompletionSender,
        _coordinator: CoordinatorGuard,
    }

    /// 真实仲裁器 + 平台信号 + 协调器 + Worker
    fn spawn_with_signals(settle: Duration) -> WithSignals {
        let publisher = EventPublisher::new().arc();
        let synthesis = RecordingSynthesis::new();
        let arbiter = Arc::new(AudioFocusArbiter::new());
        let signals = PlatformSignals::new(arbiter.clone());
        let (completions, completion_rx) = completion_channel();
        let (handle, commands) = EngineHandle::channel(16);

        let engine = PlaybackEngine::new(
            synthesis.clone(),
            arbiter,
            FakeWakeLock::new(),
            publisher.clone(),
            SpeechRate::default(),
        );
        tokio::spawn(
            EngineWorker::new(
                engine,
                commands,
                completion_rx,
                ScriptedContentSource::new(outline("w1", 3), 3),
                None,
                publisher.clone(),
                EngineWorkerConfig::default(),
            )
            .run(),
        );
        let coordinator = InterruptionCoordinator::spawn(
            handle.clone(),
            publisher.watch(),
            &signals.sources(),
            settle,
        );

        WithSignals {
            handle,
            publisher,
            synthesis,
            signals,
            _completions: completions,
            _coordinator: coordinator,
        }
    }

    async fn start_playing(stack: &WithSignals) {
        stack
            .handle
            .execute(EngineCommand::Start {
                content: store(0, 3),
                start_index: 1,
            })
            .await
            .unwrap();
        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Playing);
    }

    fn focus(change: AudioFocusChange) -> InterruptionSignal {
        InterruptionSignal::AudioFocus { change }
    }

    fn call(state: CallState) -> InterruptionSignal {
        InterruptionSignal::Telephony { state }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_focus_loss_and_regain_resume_playback() {
        let stack = spawn_with_signals(Duration::from_millis(500));
        start_playing(&stack).await;
        let speaks = stack.synthesis.speak_count();

        // 两个信号紧接着到达，中间不等待引擎
        stack.signals.dispatch(focus(AudioFocusChange::TransientLoss));
        stack.signals.dispatch(focus(AudioFocusChange::Regained));
        tokio::time::sleep(Duration::from_secs(5)).await;

        let state = stack.publisher.snapshot();
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.segment_index, Some(1));
        assert_eq!(stack.synthesis.speak_count(), speaks + 1);
        assert!(stack.signals.focus().is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_focus_loss_stops_without_resume() {
        let stack = spawn_with_signals(Duration::from_millis(500));
        start_playing(&stack).await;

        stack.signals.dispatch(focus(AudioFocusChange::PermanentLoss));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Stopped);

        stack.signals.dispatch(focus(AudioFocusChange::Regained));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Stopped);
        assert!(!stack.signals.focus().is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_resumes_only_after_settle_delay() {
        let stack = spawn_with_signals(Duration::from_millis(500));
        start_playing(&stack).await;

        stack.signals.dispatch(call(CallState::Ringing));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Paused);

        stack.signals.dispatch(call(CallState::Idle));
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Paused);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = stack.publisher.snapshot();
        assert_eq!(state.status, PlaybackStatus::Playing);
        assert_eq!(state.segment_index, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_call_still_resumes() {
        let stack = spawn_with_signals(Duration::from_millis(500));
        start_playing(&stack).await;

        stack.signals.dispatch(call(CallState::Ringing));
        stack.signals.dispatch(call(CallState::Idle));
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_pause_after_interruption_is_not_overridden() {
        let stack = spawn_with_signals(Duration::from_millis(500));
        start_playing(&stack).await;

        stack.signals.dispatch(call(CallState::Ringing));
        tokio::time::sleep(Duration::from_millis(10)).await;
        // 用户在通话期间恢复又暂停，协调器只看到最后的 PAUSED
        stack.handle.control(ControlCommand::Resume).await.unwrap();
        stack.handle.control(ControlCommand::Pause).await.unwrap();

        stack.signals.dispatch(call(CallState::Idle));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(stack.publisher.snapshot().status, PlaybackStatus::Paused);
    }
}
