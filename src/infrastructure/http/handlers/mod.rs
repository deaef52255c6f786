//! HTTP Handlers

mod cache;
mod ping;
mod playback;
mod signals;
mod websocket;

pub use cache::*;
pub use ping::*;
pub use playback::*;
pub use signals::*;
pub use websocket::*;
