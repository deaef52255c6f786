//! Tingshu - 分段朗读播放引擎
//!
//! 架构设计: Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Playback Context: 片段、章节、播放状态与快照
//! - 文本分割器: 章节原文 → 带停顿提示的片段
//!
//! 应用层 (application/):
//! - Ports: 内容源、离线缓存、语音合成、音频资源、中断信号
//! - Commands: 控制命令与引擎命令队列
//! - Services: PlaybackEngine, ContentLoader, InterruptionCoordinator, SleepTimer, SessionPresenter
//!
//! 基础设施层 (infrastructure/):
//! - Worker: EngineWorker 单一写者任务
//! - Adapters: 合成后端、内容源、音频独占资源、平台信号
//! - Persistence: Sled 离线章节缓存
//! - Memory: 内存章节缓存
//! - HTTP: RESTful API + WebSocket 控制面
//! - Events: 状态快照与事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
