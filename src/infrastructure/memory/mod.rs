//! Memory Layer - In-Memory State Management
//!
//! 实现 MemoryChapterCache，在持久缓存之前保留最近读取的章节

mod chapter_cache;

pub use chapter_cache::MemoryChapterCache;
