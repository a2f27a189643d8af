//! LLM provider implementations

pub mod deepseek;
pub mod gemini;

pub use deepseek::{DeepseekConfig, DeepseekProvider};
pub use gemini::{GeminiConfig, GeminiProvider};
