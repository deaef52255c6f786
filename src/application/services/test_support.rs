//! 测试替身

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::ports::{
    chapter_cache_key, AudioFocusPort, CacheError, ContentSourceError, ContentSourcePort,
    OfflineCachePort, SpeakRequest, SynthesisPort, WakeLockPort,
};
use crate::domain::playback::{ChapterRef, Segment, SegmentStore, SpeechRate, WorkOutline};

/// 记录所有调用的合成后端，不主动回调
#[derive(Default)]
pub struct RecordingSynthesis {
    speaks: Mutex<Vec<SpeakRequest>>,
    stops: AtomicUsize,
    rates: Mutex<Vec<f32>>,
}

impl RecordingSynthesis {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn speaks(&self) -> Vec<SpeakRequest> {
        self.speaks.lock().unwrap().clone()
    }

    pub fn speak_count(&self) -> usize {
        self.speaks.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<SpeakRequest> {
        self.speaks.lock().unwrap().last().cloned()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn rates(&self) -> Vec<f32> {
        self.rates.lock().unwrap().clone()
    }
}

impl SynthesisPort for RecordingSynthesis {
    fn speak(&self, request: SpeakRequest) {
        self.speaks.lock().unwrap().push(request);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn set_rate(&self, rate: SpeechRate) {
        self.rates.lock().unwrap().push(rate.value());
    }
}

/// 可配置拒绝的音频独占资源
#[derive(Default)]
pub struct FakeAudioFocus {
    held: AtomicBool,
    deny: AtomicBool,
    acquisitions: AtomicUsize,
}

impl FakeAudioFocus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny(&self, deny: bool) {
        self.deny.store(deny, Ordering::SeqCst);
    }

    /// 模拟被其他请求方夺走
    pub fn revoke(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

impl AudioFocusPort for FakeAudioFocus {
    fn acquire(&self) -> bool {
        if self.held.load(Ordering::SeqCst) {
            return true;
        }
        if self.deny.load(Ordering::SeqCst) {
            return false;
        }
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        true
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeWakeLock {
    held: AtomicBool,
}

impl FakeWakeLock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl WakeLockPort for FakeWakeLock {
    fn acquire(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

/// 预设内容的内容源，可为单个章节设置延迟或失败
pub struct ScriptedContentSource {
    outline: WorkOutline,
    chapters: Mutex<HashMap<String, Result<String, ContentSourceError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    fetches: DashMap<String, usize>,
}

impl ScriptedContentSource {
    /// 每章内容为 `segments_per_chapter` 行
    pub fn new(outline: WorkOutline, segments_per_chapter: usize) -> Arc<Self> {
        let chapters = outline
            .chapters
            .iter()
            .map(|c| {
                (
                    c.location.clone(),
                    Ok(chapter_text(c.index, segments_per_chapter)),
                )
            })
            .collect();
        Arc::new(Self {
            outline,
            chapters: Mutex::new(chapters),
            delays: Mutex::new(HashMap::new()),
            fetches: DashMap::new(),
        })
    }

    pub fn set_chapter(&self, location: &str, content: Result<String, ContentSourceError>) {
        self.chapters
            .lock()
            .unwrap()
            .insert(location.to_string(), content);
    }

    pub fn set_delay(&self, location: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(location.to_string(), delay);
    }

    pub fn fetch_count(&self, location: &str) -> usize {
        self.fetches.get(location).map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl ContentSourcePort for ScriptedContentSource {
    async fn fetch_outline(&self, work_id: &str) -> Result<WorkOutline, ContentSourceError> {
        if work_id == self.outline.work_id {
            Ok(self.outline.clone())
        } else {
            Err(ContentSourceError::NotFound(work_id.to_string()))
        }
    }

    async fn fetch(&self, chapter: &ChapterRef) -> Result<String, ContentSourceError> {
        *self.fetches.entry(chapter.location.clone()).or_insert(0) += 1;
        let delay = self.delays.lock().unwrap().get(&chapter.location).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.chapters
            .lock()
            .unwrap()
            .get(&chapter.location)
            .cloned()
            .unwrap_or_else(|| Err(ContentSourceError::NotFound(chapter.location.clone())))
    }
}

/// 基于 DashMap 的离线缓存
#[derive(Default)]
pub struct InMemoryOfflineCache {
    entries: DashMap<String, String>,
    gets: AtomicUsize,
}

impl InMemoryOfflineCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfflineCachePort for InMemoryOfflineCache {
    async fn get(&self, chapter: &ChapterRef) -> Result<Option<String>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .get(&chapter_cache_key(chapter))
            .map(|e| e.value().clone()))
    }

    async fn put(&self, chapter: &ChapterRef, raw_text: String) -> Result<(), CacheError> {
        self.entries.insert(chapter_cache_key(chapter), raw_text);
        Ok(())
    }
}

/// 每行一个片段的章节原文
pub fn chapter_text(chapter_index: usize, segments: usize) -> String {
    (0..segments)
        .map(|i| format!("第{}章第{}句。", chapter_index + 1, i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn outline(work_id: &str, chapters: usize) -> WorkOutline {
    WorkOutline {
        work_id: work_id.to_string(),
        title: format!("作品{}", work_id),
        chapters: (0..chapters)
            .map(|i| ChapterRef {
                work_id: work_id.to_string(),
                chapter_id: format!("c{}", i),
                title: format!("第{}章", i + 1),
                index: i,
                location: format!("c{}.txt", i),
            })
            .collect(),
    }
}

/// 第 `chapter_index` 章，`segments` 个片段
pub fn store(chapter_index: usize, segments: usize) -> SegmentStore {
    let segments = (0..segments)
        .map(|i| Segment::new(format!("片段{}", i), 100))
        .collect();
    SegmentStore::new(&outline("w1", chapter_index + 3), chapter_index, segments)
        .expect("valid store")
}
