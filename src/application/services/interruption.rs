//! Interruption Coordinator - 外部中断处理
//!
//! 订阅具名中断信号源（音频独占资源、通话、外设），
//! 把每个信号映射为暂停、恢复、停止之一发给引擎。
//! 订阅在协调器创建时建立，协调器退出时随之取消

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::commands::{ControlCommand, EngineCommand, EngineHandle};
use crate::application::ports::{
    AudioFocusChange, CallState, InterruptionSignal, InterruptionSourcePort,
};
use crate::application::services::sleep_timer::sleep_until_deadline;
use crate::domain::playback::{PlaybackSnapshot, PlaybackStatus, StopReason};

/// 中断处理动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptionAction {
    Ignore,
    Pause,
    /// `settle` 为 true 时等待音频子系统稳定后再恢复
    Resume { settle: bool },
    Stop,
}

/// 中断决策表
///
/// 只记住"暂停是否由可自动恢复的中断造成"
#[derive(Debug, Default)]
pub struct InterruptionPolicy {
    resume_on_regain: bool,
    resume_after_call: bool,
    call_in_progress: bool,
    last_epoch: u64,
}

impl InterruptionPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 观察到引擎状态
    ///
    /// 进入 STOPPED 或上次观察后又进入过 PLAYING（`play_epoch` 变化）时，
    /// 之前的自动恢复意图失效。watch 会合并中间状态，只能比较计数。
    /// 返回上次观察后是否进入过 PLAYING
    pub fn observe(&mut self, status: PlaybackStatus, play_epoch: u64) -> bool {
        let replayed = play_epoch != self.last_epoch;
        self.last_epoch = play_epoch;
        if status == PlaybackStatus::Stopped || replayed {
            self.clear();
        }
        replayed
    }

    pub fn decide(&mut self, signal: InterruptionSignal, status: PlaybackStatus) -> InterruptionAction {
        if let InterruptionSignal::Telephony { state } = signal {
            self.call_in_progress = state != CallState::Idle;
        }
        if status == PlaybackStatus::Stopped {
            return InterruptionAction::Ignore;
        }
        let playing = status == PlaybackStatus::Playing;

        match signal {
            InterruptionSignal::AudioFocus { change } => match change {
                AudioFocusChange::TransientLoss if playing => {
                    self.resume_on_regain = true;
                    InterruptionAction::Pause
                }
                AudioFocusChange::TransientLoss => InterruptionAction::Ignore,
                AudioFocusChange::PermanentLoss => {
                    self.clear();
                    InterruptionAction::Stop
                }
                AudioFocusChange::Regained => {
                    if self.resume_on_regain && !playing && !self.call_in_progress {
                        self.resume_on_regain = false;
                        InterruptionAction::Resume { settle: false }
                    } else {
                        InterruptionAction::Ignore
                    }
                }
            },
            InterruptionSignal::Telephony { state } => match state {
                CallState::Ringing | CallState::Active if playing => {
                    self.resume_after_call = true;
                    InterruptionAction::Pause
                }
                CallState::Ringing | CallState::Active => InterruptionAction::Ignore,
                CallState::Idle => {
                    if self.resume_after_call && !playing {
                        self.resume_after_call = false;
                        self.resume_on_regain = false;
                        InterruptionAction::Resume { settle: true }
                    } else {
                        InterruptionAction::Ignore
                    }
                }
            },
            InterruptionSignal::AccessoryDisconnected | InterruptionSignal::BecomingNoisy => {
                // 需要用户显式恢复
                self.clear();
                if playing {
                    InterruptionAction::Pause
                } else {
                    InterruptionAction::Ignore
                }
            }
            InterruptionSignal::AccessoryConnected => InterruptionAction::Ignore,
        }
    }

    fn clear(&mut self) {
        self.resume_on_regain = false;
        self.resume_after_call = false;
    }
}

/// 具名信号订阅；drop 时取消
pub struct SignalSubscription {
    name: &'static str,
    task: JoinHandle<()>,
}

impl SignalSubscription {
    fn forward(
        source: &dyn InterruptionSourcePort,
        tx: mpsc::UnboundedSender<(&'static str, InterruptionSignal)>,
    ) -> Self {
        let name = source.name();
        let mut rx = source.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) => {
                        if tx.send((name, signal)).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(source = name, skipped, "Interruption signals lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        tracing::debug!(source = name, "Subscribed to interruption source");
        Self { name, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!(source = self.name, "Unsubscribed from interruption source");
    }
}

/// 协调器任务句柄；drop 时停止协调器并取消全部订阅
pub struct CoordinatorGuard {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CoordinatorGuard {
    /// 停止并等待任务退出
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for CoordinatorGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct InterruptionCoordinator {
    engine: EngineHandle,
    state: watch::Receiver<PlaybackSnapshot>,
    policy: InterruptionPolicy,
    settle: Duration,
    signals: mpsc::UnboundedReceiver<(&'static str, InterruptionSignal)>,
    subscriptions: Vec<SignalSubscription>,
    pending_resume: Option<Instant>,
    cancel: CancellationToken,
}

impl InterruptionCoordinator {
    /// 订阅全部信号源并启动协调器任务
    pub fn spawn(
        engine: EngineHandle,
        state: watch::Receiver<PlaybackSnapshot>,
        sources: &[Arc<dyn InterruptionSourcePort>],
        settle: Duration,
    ) -> CoordinatorGuard {
        let (tx, signals) = mpsc::unbounded_channel();
        let subscriptions = sources
            .iter()
            .map(|source| SignalSubscription::forward(source.as_ref(), tx.clone()))
            .collect();

        let cancel = CancellationToken::new();
        let mut policy = InterruptionPolicy::new();
        {
            let snapshot = state.borrow();
            policy.observe(snapshot.status, snapshot.play_epoch);
        }

        let coordinator = Self {
            engine,
            state,
            policy,
            settle,
            signals,
            subscriptions,
            pending_resume: None,
            cancel: cancel.clone(),
        };
        CoordinatorGuard {
            cancel,
            task: Some(tokio::spawn(coordinator.run())),
        }
    }

    async fn run(mut self) {
        tracing::info!(
            sources = ?self.subscriptions.iter().map(|s| s.name()).collect::<Vec<_>>(),
            settle_ms = self.settle.as_millis() as u64,
            "InterruptionCoordinator started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                changed = self.state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.observe_state();
                }
                Some((source, signal)) = self.signals.recv() => {
                    self.handle_signal(source, signal).await;
                }
                _ = sleep_until_deadline(self.pending_resume) => {
                    let status = self.observe_state();
                    if self.pending_resume.take().is_some() && status == PlaybackStatus::Paused {
                        tracing::info!("Resuming after interruption settle delay");
                        self.dispatch(EngineCommand::Control(ControlCommand::Resume)).await;
                    }
                }
            }
        }

        tracing::info!("InterruptionCoordinator stopped");
    }

    /// 读取最新状态；期间有过播放或已离开 PAUSED 时放弃待执行的恢复
    fn observe_state(&mut self) -> PlaybackStatus {
        let (status, play_epoch) = {
            let snapshot = self.state.borrow_and_update();
            (snapshot.status, snapshot.play_epoch)
        };
        let replayed = self.policy.observe(status, play_epoch);
        if replayed || status != PlaybackStatus::Paused {
            self.pending_resume = None;
        }
        status
    }

    async fn handle_signal(&mut self, source: &'static str, signal: InterruptionSignal) {
        let status = self.observe_state();
        let action = self.policy.decide(signal, status);
        tracing::debug!(source, ?signal, status = %status, ?action, "Interruption signal");

        match action {
            InterruptionAction::Ignore => {}
            InterruptionAction::Pause => {
                self.pending_resume = None;
                self.dispatch(EngineCommand::Control(ControlCommand::Pause)).await;
            }
            InterruptionAction::Resume { settle: true } => {
                self.pending_resume = Some(Instant::now() + self.settle);
            }
            InterruptionAction::Resume { settle: false } => {
                self.dispatch(EngineCommand::Control(ControlCommand::Resume)).await;
            }
            InterruptionAction::Stop => {
                self.pending_resume = None;
                self.dispatch(EngineCommand::StopWith(StopReason::FocusLost)).await;
            }
        }
    }

    /// 等待引擎处理完毕；返回时新状态已经发布，下一个信号据此决策
    async fn dispatch(&self, command: EngineCommand) {
        if let Err(e) = self.engine.execute(command).await {
            tracing::warn!(error = %e, "Interruption command not applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::EngineRequest;

    fn focus(change: AudioFocusChange) -> InterruptionSignal {
        InterruptionSignal::AudioFocus { change }
    }

    fn call(state: CallState) -> InterruptionSignal {
        InterruptionSignal::Telephony { state }
    }

    #[test]
    fn test_transient_loss_then_regain() {
        let mut policy = InterruptionPolicy::new();
        policy.observe(PlaybackStatus::Playing, 1);

        assert_eq!(
            policy.decide(focus(AudioFocusChange::TransientLoss), PlaybackStatus::Playing),
            InterruptionAction::Pause
        );
        assert!(!policy.observe(PlaybackStatus::Paused, 1));
        assert_eq!(
            policy.decide(focus(AudioFocusChange::Regained), PlaybackStatus::Paused),
            InterruptionAction::Resume { settle: false }
        );
    }

    #[test]
    fn test_regain_does_not_resume_user_pause() {
        let mut policy = InterruptionPolicy::new();
        assert_eq!(
            policy.decide(focus(AudioFocusChange::TransientLoss), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
        assert_eq!(
            policy.decide(focus(AudioFocusChange::Regained), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
    }

    #[test]
    fn test_permanent_loss_stops_without_resume() {
        let mut policy = InterruptionPolicy::new();
        policy.decide(focus(AudioFocusChange::TransientLoss), PlaybackStatus::Playing);
        assert_eq!(
            policy.decide(focus(AudioFocusChange::PermanentLoss), PlaybackStatus::Paused),
            InterruptionAction::Stop
        );
        policy.observe(PlaybackStatus::Stopped, 0);
        assert_eq!(
            policy.decide(focus(AudioFocusChange::Regained), PlaybackStatus::Stopped),
            InterruptionAction::Ignore
        );
    }

    #[test]
    fn test_call_pauses_and_resumes_with_settle() {
        let mut policy = InterruptionPolicy::new();
        assert_eq!(
            policy.decide(call(CallState::Ringing), PlaybackStatus::Playing),
            InterruptionAction::Pause
        );
        assert_eq!(
            policy.decide(call(CallState::Active), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
        // 通话中重新获得焦点不恢复
        assert_eq!(
            policy.decide(focus(AudioFocusChange::Regained), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
        assert_eq!(
            policy.decide(call(CallState::Idle), PlaybackStatus::Paused),
            InterruptionAction::Resume { settle: true }
        );
    }

    #[test]
    fn test_call_ending_without_prior_playback_is_ignored() {
        let mut policy = InterruptionPolicy::new();
        policy.decide(call(CallState::Ringing), PlaybackStatus::Paused);
        assert_eq!(
            policy.decide(call(CallState::Idle), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
    }

    #[test]
    fn test_noisy_pauses_without_auto_resume() {
        let mut policy = InterruptionPolicy::new();
        policy.decide(call(CallState::Ringing), PlaybackStatus::Playing);
        assert_eq!(
            policy.decide(InterruptionSignal::BecomingNoisy, PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
        assert_eq!(
            policy.decide(call(CallState::Idle), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
        assert_eq!(
            policy.decide(InterruptionSignal::AccessoryDisconnected, PlaybackStatus::Playing),
            InterruptionAction::Pause
        );
    }

    #[test]
    fn test_signals_ignored_when_stopped() {
        let mut policy = InterruptionPolicy::new();
        for signal in [
            focus(AudioFocusChange::TransientLoss),
            focus(AudioFocusChange::PermanentLoss),
            call(CallState::Ringing),
            InterruptionSignal::BecomingNoisy,
        ] {
            assert_eq!(
                policy.decide(signal, PlaybackStatus::Stopped),
                InterruptionAction::Ignore
            );
        }
    }

    #[test]
    fn test_user_resume_clears_pending_intent() {
        let mut policy = InterruptionPolicy::new();
        policy.observe(PlaybackStatus::Playing, 1);
        policy.decide(focus(AudioFocusChange::TransientLoss), PlaybackStatus::Playing);
        policy.observe(PlaybackStatus::Paused, 1);
        // 用户恢复后又暂停，watch 只交付最后的 PAUSED
        assert!(policy.observe(PlaybackStatus::Paused, 2));

        assert_eq!(
            policy.decide(focus(AudioFocusChange::Regained), PlaybackStatus::Paused),
            InterruptionAction::Ignore
        );
    }

    struct TestSource {
        tx: broadcast::Sender<InterruptionSignal>,
    }

    impl InterruptionSourcePort for TestSource {
        fn name(&self) -> &'static str {
            "test"
        }

        fn subscribe(&self) -> broadcast::Receiver<InterruptionSignal> {
            self.tx.subscribe()
        }
    }

    fn snapshot(status: PlaybackStatus) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status,
            ..PlaybackSnapshot::default()
        }
    }

    fn control(request: EngineRequest) -> Option<ControlCommand> {
        let EngineRequest { command, reply } = request;
        if let Some(reply) = reply {
            let _ = reply.send(Ok(()));
        }
        match command {
            EngineCommand::Control(cmd) => Some(cmd),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_resume_waits_for_settle_delay() {
        let (tx, _) = broadcast::channel(8);
        let source: Arc<dyn InterruptionSourcePort> = Arc::new(TestSource { tx: tx.clone() });
        let (handle, mut commands) = EngineHandle::channel(8);
        let (state_tx, state_rx) = watch::channel(snapshot(PlaybackStatus::Playing));

        let _guard = InterruptionCoordinator::spawn(
            handle,
            state_rx,
            &[source],
            Duration::from_millis(500),
        );
        tokio::task::yield_now().await;

        tx.send(call(CallState::Ringing)).unwrap();
        assert_eq!(control(commands.recv().await.unwrap()), Some(ControlCommand::Pause));
        state_tx.send(snapshot(PlaybackStatus::Paused)).unwrap();
        tokio::task::yield_now().await;

        let ended = Instant::now();
        tx.send(call(CallState::Idle)).unwrap();
        assert_eq!(control(commands.recv().await.unwrap()), Some(ControlCommand::Resume));
        assert!(Instant::now() >= ended + Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_during_settle_delay_cancels_resume() {
        let (tx, _) = broadcast::channel(8);
        let source: Arc<dyn InterruptionSourcePort> = Arc::new(TestSource { tx: tx.clone() });
        let (handle, mut commands) = EngineHandle::channel(8);
        let (state_tx, state_rx) = watch::channel(snapshot(PlaybackStatus::Playing));

        let _guard = InterruptionCoordinator::spawn(
            handle,
            state_rx,
            &[source],
            Duration::from_millis(500),
        );
        tokio::task::yield_now().await;

        tx.send(call(CallState::Ringing)).unwrap();
        assert_eq!(control(commands.recv().await.unwrap()), Some(ControlCommand::Pause));
        state_tx.send(snapshot(PlaybackStatus::Paused)).unwrap();
        tokio::task::yield_now().await;

        tx.send(call(CallState::Idle)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // 用户恢复后又暂停，只留下最后一次 PAUSED
        state_tx
            .send(PlaybackSnapshot {
                play_epoch: 1,
                ..snapshot(PlaybackStatus::Paused)
            })
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_guard_unsubscribes() {
        let (tx, _) = broadcast::channel(8);
        let source: Arc<dyn InterruptionSourcePort> = Arc::new(TestSource { tx: tx.clone() });
        let (handle, _commands) = EngineHandle::channel(8);
        let (_state_tx, state_rx) = watch::channel(snapshot(PlaybackStatus::Playing));

        let guard = InterruptionCoordinator::spawn(handle, state_rx, &[source], Duration::ZERO);
        tokio::task::yield_now().await;
        assert_eq!(tx.receiver_count(), 1);

        guard.shutdown().await;
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(tx.receiver_count(), 0);
    }
}
