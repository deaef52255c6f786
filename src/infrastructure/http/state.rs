//! Application State

use std::sync::Arc;

use crate::application::ports::OfflineCachePort;
use crate::application::SessionPresenter;
use crate::infrastructure::adapters::PlatformSignals;

/// 应用状态
pub struct AppState {
    pub presenter: SessionPresenter,
    pub signals: PlatformSignals,
    /// 未启用离线缓存时为 None
    pub offline_cache: Option<Arc<dyn OfflineCachePort>>,
}

impl AppState {
    pub fn new(
        presenter: SessionPresenter,
        signals: PlatformSignals,
        offline_cache: Option<Arc<dyn OfflineCachePort>>,
    ) -> Self {
        Self {
            presenter,
            signals,
            offline_cache,
        }
    }
}
