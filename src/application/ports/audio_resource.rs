//! Audio Resource Ports - 音频独占资源与唤醒锁
//!
//! 引擎在单一写者任务中同步调用，因此这里是同步接口

use serde::{Deserialize, Serialize};

/// 音频独占资源变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFocusChange {
    /// 暂时被其他请求方占用
    TransientLoss,
    /// 永久失去
    PermanentLoss,
    /// 重新获得
    Regained,
}

/// Audio Focus Port
///
/// 获取是幂等的：已持有时再次获取直接返回 true
pub trait AudioFocusPort: Send + Sync {
    fn acquire(&self) -> bool;

    fn release(&self);

    fn is_held(&self) -> bool;
}

/// Wake Lock Port - 朗读期间阻止设备挂起后台处理
pub trait WakeLockPort: Send + Sync {
    fn acquire(&self);

    fn release(&self);

    fn is_held(&self) -> bool;
}
