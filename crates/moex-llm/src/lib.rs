//! LLM provider abstraction for the moex-agents pipeline
//!
//! Defines a provider-neutral conversation model (messages, content blocks,
//! tool definitions) and the [`LlmProvider`] trait, with two symmetric
//! implementations: DeepSeek (OpenAI-compatible chat completions) and
//! Google Gemini (`generateContent`).

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod tools;

pub use completion::{
    CompletionRequest, CompletionRequestBuilder, CompletionResponse, StopReason, TokenUsage,
};
pub use error::{LlmError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LlmProvider;
pub use tools::ToolDefinition;
