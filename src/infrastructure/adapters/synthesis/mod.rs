//! Synthesis Adapter - 语音合成后端实现

mod http_synthesis_client;
mod simulated_synthesizer;

pub use http_synthesis_client::{HttpSynthesisClient, HttpSynthesisClientConfig};
pub use simulated_synthesizer::{SimulatedSynthesizer, SimulatedSynthesizerConfig};
