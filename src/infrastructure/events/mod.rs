//! Events - 播放状态与事件推送

mod publisher;

pub use publisher::{EngineEvent, EventPublisher};
