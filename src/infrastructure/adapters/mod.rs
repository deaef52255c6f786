//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod audio;
pub mod content;
pub mod signals;
pub mod synthesis;

pub use audio::*;
pub use content::*;
pub use signals::*;
pub use synthesis::*;
