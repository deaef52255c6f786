//! Platform Signals - 宿主平台中断信号接入
//!
//! 宿主平台桥接层把通话、外设、音频独占资源的变化转发进来，
//! 这里把它们分发到各个具名信号源

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::application::ports::{InterruptionSignal, InterruptionSourcePort};

use super::audio::AudioFocusArbiter;

/// 具名广播信号源
pub struct SignalBus {
    name: &'static str,
    tx: broadcast::Sender<InterruptionSignal>,
}

impl SignalBus {
    pub fn new(name: &'static str) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { name, tx }
    }

    /// 发出信号，返回收到信号的订阅者数量
    pub fn emit(&self, signal: InterruptionSignal) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }
}

impl InterruptionSourcePort for SignalBus {
    fn name(&self) -> &'static str {
        self.name
    }

    fn subscribe(&self) -> broadcast::Receiver<InterruptionSignal> {
        self.tx.subscribe()
    }
}

/// 全部信号源
#[derive(Clone)]
pub struct PlatformSignals {
    focus: Arc<AudioFocusArbiter>,
    telephony: Arc<SignalBus>,
    accessory: Arc<SignalBus>,
}

impl PlatformSignals {
    pub fn new(focus: Arc<AudioFocusArbiter>) -> Self {
        Self {
            focus,
            telephony: Arc::new(SignalBus::new("telephony")),
            accessory: Arc::new(SignalBus::new("accessory")),
        }
    }

    pub fn focus(&self) -> &Arc<AudioFocusArbiter> {
        &self.focus
    }

    /// 把信号路由到对应的信号源
    pub fn dispatch(&self, signal: InterruptionSignal) {
        tracing::debug!(signal = ?signal, "Platform signal received");
        match signal {
            InterruptionSignal::AudioFocus { change } => self.focus.apply(change),
            InterruptionSignal::Telephony { .. } => {
                self.telephony.emit(signal);
            }
            InterruptionSignal::AccessoryConnected
            | InterruptionSignal::AccessoryDisconnected
            | InterruptionSignal::BecomingNoisy => {
                self.accessory.emit(signal);
            }
        }
    }

    /// 交给 InterruptionCoordinator 订阅的信号源列表
    pub fn sources(&self) -> Vec<Arc<dyn InterruptionSourcePort>> {
        vec![
            self.focus.clone() as Arc<dyn InterruptionSourcePort>,
            self.telephony.clone(),
            self.accessory.clone(),
        ]
    }
}
