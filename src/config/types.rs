//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::SegmentConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 章节内容源
    #[serde(default)]
    pub content: ContentConfig,

    /// 语音合成后端
    #[serde(default)]
    pub synthesis: SynthesisConfig,

    /// 离线缓存
    #[serde(default)]
    pub cache: CacheConfig,

    /// 播放行为
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 分段规则
    #[serde(default)]
    pub segment: SegmentSettings,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

/// 内容源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    #[default]
    Http,
    File,
}

/// 内容源配置
#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    #[serde(default)]
    pub backend: ContentBackend,

    /// HTTP 内容服务地址
    #[serde(default = "default_content_url")]
    pub url: String,

    /// 本地作品根目录
    #[serde(default = "default_content_dir")]
    pub dir: PathBuf,

    /// 请求超时时间（秒）
    #[serde(default = "default_content_timeout")]
    pub timeout_secs: u64,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            backend: ContentBackend::default(),
            url: default_content_url(),
            dir: default_content_dir(),
            timeout_secs: default_content_timeout(),
        }
    }
}

fn default_content_url() -> String {
    "http://localhost:8100".to_string()
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("data/works")
}

fn default_content_timeout() -> u64 {
    15
}

/// 合成后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    #[default]
    Simulated,
    Http,
}

/// 合成后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub backend: SynthesisBackend,

    /// HTTP 合成服务地址
    #[serde(default = "default_synthesis_url")]
    pub url: String,

    /// 单个片段超时时间（秒）
    #[serde(default = "default_synthesis_timeout")]
    pub timeout_secs: u64,

    /// 启动时的语速
    #[serde(default = "default_rate")]
    pub default_rate: f32,

    /// 模拟后端每字时长（毫秒）
    #[serde(default = "default_ms_per_char")]
    pub ms_per_char: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backend: SynthesisBackend::default(),
            url: default_synthesis_url(),
            timeout_secs: default_synthesis_timeout(),
            default_rate: default_rate(),
            ms_per_char: default_ms_per_char(),
        }
    }
}

fn default_synthesis_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_synthesis_timeout() -> u64 {
    60
}

fn default_rate() -> f32 {
    1.0
}

fn default_ms_per_char() -> u64 {
    180
}

/// 离线缓存配置
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sled 数据库路径
    #[serde(default = "default_cache_db_path")]
    pub db_path: String,

    /// 持久缓存上限（MB）
    #[serde(default = "default_cache_max_size_mb")]
    pub max_size_mb: u64,

    /// 内存缓存章节数
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_cache_db_path(),
            max_size_mb: default_cache_max_size_mb(),
            memory_capacity: default_memory_capacity(),
        }
    }
}

impl CacheConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

fn default_cache_db_path() -> String {
    "data/chapters.sled".to_string()
}

fn default_cache_max_size_mb() -> u64 {
    256
}

fn default_memory_capacity() -> usize {
    8
}

/// 播放行为配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// 通话结束后恢复播放前的等待（毫秒）
    #[serde(default = "default_resume_settle_ms")]
    pub resume_settle_ms: u64,

    /// 章节结束后自动播放下一章
    #[serde(default = "default_true")]
    pub auto_advance: bool,

    /// 预取下一章
    #[serde(default = "default_true")]
    pub prefetch: bool,

    /// 命令队列容量
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            resume_settle_ms: default_resume_settle_ms(),
            auto_advance: true,
            prefetch: true,
            command_buffer: default_command_buffer(),
        }
    }
}

impl PlaybackConfig {
    pub fn resume_settle(&self) -> Duration {
        Duration::from_millis(self.resume_settle_ms)
    }
}

fn default_resume_settle_ms() -> u64 {
    500
}

fn default_command_buffer() -> usize {
    64
}

/// 分段规则配置
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentSettings {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_clause_pause")]
    pub clause_pause_ms: u32,
    #[serde(default = "default_sentence_pause")]
    pub sentence_pause_ms: u32,
    #[serde(default = "default_paragraph_pause")]
    pub paragraph_pause_ms: u32,
}

impl Default for SegmentSettings {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            clause_pause_ms: default_clause_pause(),
            sentence_pause_ms: default_sentence_pause(),
            paragraph_pause_ms: default_paragraph_pause(),
        }
    }
}

impl From<&SegmentSettings> for SegmentConfig {
    fn from(settings: &SegmentSettings) -> Self {
        SegmentConfig {
            min_chars: settings.min_chars,
            clause_pause_ms: settings.clause_pause_ms,
            sentence_pause_ms: settings.sentence_pause_ms,
            paragraph_pause_ms: settings.paragraph_pause_ms,
        }
    }
}

fn default_min_chars() -> usize {
    crate::domain::DEFAULT_MIN_CHARS
}

fn default_clause_pause() -> u32 {
    150
}

fn default_sentence_pause() -> u32 {
    350
}

fn default_paragraph_pause() -> u32 {
    700
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别 (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
