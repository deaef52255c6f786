//! Content Loader - 章节加载与预取
//!
//! - 前台加载由一把互斥锁串行化
//! - 同一章节的并发获取合并为一次（single-flight）
//! - 预取下一章作为后台任务运行，从不获取前台锁；
//!   结果只有在位置未变化且仍是"当前 + 1"时才进入预取槽

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ContentSourcePort, OfflineCachePort};
use crate::domain::parse_segments;
use crate::domain::playback::{
    ChapterRef, PlaybackError, PrefetchSlot, SegmentStore, WorkOutline,
};
use crate::domain::SegmentConfig;

type SharedFetch = Shared<BoxFuture<'static, Result<SegmentStore, PlaybackError>>>;

/// 加载配置
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub segment: SegmentConfig,
    /// 是否预取下一章
    pub prefetch: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            segment: SegmentConfig::default(),
            prefetch: true,
        }
    }
}

#[derive(Debug, Default)]
struct LoaderState {
    /// 最近一次前台加载成功的章节
    current: Option<usize>,
    /// 位置每变化一次递增，用于判断预取结果是否过期
    epoch: u64,
    slot: Option<PrefetchSlot>,
}

/// 单个作品的章节加载器
pub struct ContentLoader {
    outline: Arc<WorkOutline>,
    source: Arc<dyn ContentSourcePort>,
    cache: Option<Arc<dyn OfflineCachePort>>,
    settings: LoaderSettings,
    load_guard: tokio::sync::Mutex<()>,
    state: Mutex<LoaderState>,
    inflight: DashMap<usize, SharedFetch>,
    foreground: Mutex<CancellationToken>,
    shutdown: CancellationToken,
}

impl ContentLoader {
    pub fn new(
        outline: WorkOutline,
        source: Arc<dyn ContentSourcePort>,
        cache: Option<Arc<dyn OfflineCachePort>>,
        settings: LoaderSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            outline: Arc::new(outline),
            source,
            cache,
            settings,
            load_guard: tokio::sync::Mutex::new(()),
            state: Mutex::new(LoaderState::default()),
            inflight: DashMap::new(),
            foreground: Mutex::new(CancellationToken::new()),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn outline(&self) -> &WorkOutline {
        &self.outline
    }

    pub fn work_id(&self) -> &str {
        &self.outline.work_id
    }

    pub fn current_index(&self) -> Option<usize> {
        self.lock_state().current
    }

    /// 预取槽中的章节
    pub fn prefetched_index(&self) -> Option<usize> {
        self.lock_state().slot.as_ref().map(|s| s.chapter_index)
    }

    /// 加载指定章节
    pub async fn load_chapter(self: &Arc<Self>, index: usize) -> Result<SegmentStore, PlaybackError> {
        let loaded = self
            .load_with(|_, total| {
                if index < total {
                    Ok(Some(index))
                } else {
                    Err(PlaybackError::ChapterOutOfRange { index, total })
                }
            })
            .await?;
        loaded.ok_or(PlaybackError::ChapterOutOfRange {
            index,
            total: self.outline.total_chapters(),
        })
    }

    /// 加载下一章；尚未加载任何章节时加载第一章，已是最后一章时返回 None
    pub async fn load_next(self: &Arc<Self>) -> Result<Option<SegmentStore>, PlaybackError> {
        self.load_with(|current, total| {
            let target = current.map(|c| c + 1).unwrap_or(0);
            Ok((target < total).then_some(target))
        })
        .await
    }

    /// 加载上一章；已是第一章或尚未加载时返回 None
    pub async fn load_previous(self: &Arc<Self>) -> Result<Option<SegmentStore>, PlaybackError> {
        self.load_with(|current, _| Ok(current.and_then(|c| c.checked_sub(1))))
            .await
    }

    /// 绕过缓存重新获取当前章节，不改变加载位置
    pub async fn reload_current(self: &Arc<Self>) -> Result<SegmentStore, PlaybackError> {
        let cancel = self.foreground_token();
        let _guard = tokio::select! {
            guard = self.load_guard.lock() => guard,
            _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
        };
        let index = self.current_index().ok_or(PlaybackError::NoWorkOpen)?;
        let chapter = self.outline.chapter(index)?.clone();

        tracing::info!(work_id = %chapter.work_id, chapter_index = index, "Reloading chapter from source");
        let fetch = async {
            let raw = self
                .source
                .fetch(&chapter)
                .await
                .map_err(|e| PlaybackError::ContentLoadFailed(e.to_string()))?;
            build_store(&self.outline, index, &raw, &self.settings.segment)
        };
        tokio::select! {
            result = fetch => result,
            _ = cancel.cancelled() => Err(PlaybackError::Cancelled),
        }
    }

    /// 取消进行中的前台加载（预取不受影响）
    pub fn cancel_foreground(&self) {
        let previous = {
            let mut foreground = self
                .foreground
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::replace(&mut *foreground, CancellationToken::new())
        };
        previous.cancel();
    }

    /// 关闭加载器：取消所有前台加载与预取任务
    pub fn shutdown(&self) {
        tracing::debug!(work_id = %self.outline.work_id, "Content loader shutting down");
        self.shutdown.cancel();
        self.cancel_foreground();
        self.inflight.clear();
        self.lock_state().slot = None;
    }

    async fn load_with<F>(self: &Arc<Self>, pick: F) -> Result<Option<SegmentStore>, PlaybackError>
    where
        F: FnOnce(Option<usize>, usize) -> Result<Option<usize>, PlaybackError>,
    {
        let cancel = self.foreground_token();
        let _guard = tokio::select! {
            guard = self.load_guard.lock() => guard,
            _ = cancel.cancelled() => return Err(PlaybackError::Cancelled),
        };

        let Some(target) = pick(self.current_index(), self.outline.total_chapters())? else {
            return Ok(None);
        };

        if let Some(content) = self.take_prefetched(target) {
            tracing::debug!(chapter_index = target, "Serving chapter from prefetch slot");
            self.commit(target);
            self.spawn_prefetch(target + 1);
            return Ok(Some(content));
        }

        let fetch = self.shared_fetch(target);
        let result = tokio::select! {
            result = fetch => result,
            _ = cancel.cancelled() => {
                tracing::debug!(chapter_index = target, "Foreground load cancelled");
                return Err(PlaybackError::Cancelled);
            }
        };
        self.forget_finished(target);

        let content = result.inspect_err(|e| {
            tracing::warn!(chapter_index = target, error = %e, "Chapter load failed");
        })?;

        tracing::info!(
            work_id = %content.work_id(),
            chapter_index = target,
            total_segments = content.len(),
            "Chapter loaded"
        );
        self.commit(target);
        self.spawn_prefetch(target + 1);
        Ok(Some(content))
    }

    /// 获取（或加入已有的）章节获取任务
    fn shared_fetch(&self, index: usize) -> SharedFetch {
        self.inflight
            .entry(index)
            .or_insert_with(|| {
                let outline = Arc::clone(&self.outline);
                let source = Arc::clone(&self.source);
                let cache = self.cache.clone();
                let segment = self.settings.segment.clone();
                async move {
                    let chapter = outline.chapter(index)?.clone();
                    let raw = resolve_raw(&chapter, source.as_ref(), cache.as_deref()).await?;
                    build_store(&outline, index, &raw, &segment)
                }
                .boxed()
                .shared()
            })
            .clone()
    }

    /// 已完成的获取任务不再保留
    fn forget_finished(&self, index: usize) {
        self.inflight.remove_if(&index, |_, fetch| fetch.peek().is_some());
    }

    fn take_prefetched(&self, index: usize) -> Option<SegmentStore> {
        let mut state = self.lock_state();
        match state.slot.take() {
            Some(slot) if slot.chapter_index == index => Some(slot.content),
            other => {
                state.slot = other;
                None
            }
        }
    }

    /// 前台加载成功：更新位置并丢弃不再是"当前 + 1"的预取
    fn commit(&self, index: usize) {
        let mut state = self.lock_state();
        state.current = Some(index);
        state.epoch += 1;
        if state
            .slot
            .as_ref()
            .is_some_and(|slot| slot.chapter_index != index + 1)
        {
            tracing::debug!(chapter_index = index, "Discarding stale prefetch");
            state.slot = None;
        }
    }

    fn spawn_prefetch(self: &Arc<Self>, index: usize) {
        if !self.settings.prefetch || index >= self.outline.total_chapters() {
            return;
        }
        let epoch = {
            let state = self.lock_state();
            if state.slot.as_ref().is_some_and(|s| s.chapter_index == index) {
                return;
            }
            state.epoch
        };

        let this = Arc::clone(self);
        let shutdown = self.shutdown.child_token();
        let fetch = self.shared_fetch(index);
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!(chapter_index = index, "Prefetch cancelled");
                }
                result = fetch => {
                    this.forget_finished(index);
                    match result {
                        Ok(content) => this.offer_prefetch(epoch, index, content),
                        Err(e) => {
                            tracing::debug!(chapter_index = index, error = %e, "Prefetch failed");
                        }
                    }
                }
            }
        });
    }

    fn offer_prefetch(&self, epoch: u64, index: usize, content: SegmentStore) {
        let mut state = self.lock_state();
        if state.epoch == epoch && state.current.map(|c| c + 1) == Some(index) {
            tracing::debug!(chapter_index = index, "Prefetch stored");
            state.slot = Some(PrefetchSlot {
                chapter_index: index,
                content,
            });
        } else {
            tracing::debug!(chapter_index = index, "Prefetch no longer relevant, discarded");
        }
    }

    fn foreground_token(&self) -> CancellationToken {
        self.foreground
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LoaderState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 缓存优先：离线缓存 → 内容源
///
/// 缓存读取出错视为未命中
async fn resolve_raw(
    chapter: &ChapterRef,
    source: &dyn ContentSourcePort,
    cache: Option<&dyn OfflineCachePort>,
) -> Result<String, PlaybackError> {
    if let Some(cache) = cache {
        match cache.get(chapter).await {
            Ok(Some(raw)) => {
                tracing::debug!(chapter_id = %chapter.chapter_id, "Offline cache hit");
                return Ok(raw);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(chapter_id = %chapter.chapter_id, error = %e, "Offline cache read failed");
            }
        }
    }
    source
        .fetch(chapter)
        .await
        .map_err(|e| PlaybackError::ContentLoadFailed(format!("{}: {}", chapter.chapter_id, e)))
}

fn build_store(
    outline: &WorkOutline,
    index: usize,
    raw: &str,
    config: &SegmentConfig,
) -> Result<SegmentStore, PlaybackError> {
    let segments = parse_segments(raw, config);
    SegmentStore::new(outline, index, segments).map_err(|e| match e {
        PlaybackError::EmptyContent(_) => PlaybackError::ContentLoadFailed(e.to_string()),
        other => other,
    })
}
