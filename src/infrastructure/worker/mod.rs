//! Worker Layer - 引擎任务
//!
//! 实现 EngineWorker，串行处理播放命令与合成回调

mod engine_worker;

pub use engine_worker::{EngineWorker, EngineWorkerConfig};
