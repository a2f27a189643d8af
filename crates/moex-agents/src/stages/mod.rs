//! Pipeline stages
//!
//! Each stage reads the shared state and returns a typed update; the
//! run driver applies it. Stages hold their own LLM handle (quick or
//! deep model) and never touch the state directly, so a stage is
//! testable with a scripted provider and an assembled state.

mod analyst;
mod debate;
mod risk;

pub use analyst::{AnalystStage, ClearMessagesStage, ToolExecutionStage};
pub use debate::{BearResearcher, BullResearcher, ResearchManager, Trader};
pub use risk::{PortfolioManager, RiskDebator, RiskManager};

use crate::error::Result;
use crate::state::{AgentState, StateUpdate};
use async_trait::async_trait;
use moex_llm::{CompletionRequest, CompletionResponse, LlmProvider, Message};
use std::sync::Arc;

/// One step of the trading pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Execute the stage against the current state
    async fn run(&self, state: &AgentState) -> Result<StateUpdate>;

    /// Node name used in logs, errors and observer events
    fn name(&self) -> &str;
}

/// Provider + model + sampling parameters for one class of stages
#[derive(Clone)]
pub struct LlmHandle {
    /// Backing provider
    pub provider: Arc<dyn LlmProvider>,
    /// Model name passed on every request
    pub model: String,
    /// Max tokens per completion
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,
}

impl LlmHandle {
    /// Complete a prepared request
    pub async fn complete(&self, request: CompletionRequest) -> moex_llm::Result<CompletionResponse> {
        self.provider.complete(request).await
    }

    /// Single-prompt completion returning plain text. Used by the
    /// debate and manager stages, which carry their whole context in
    /// one rendered prompt.
    pub async fn prompt_text(&self, prompt: String) -> moex_llm::Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .add_message(Message::user(prompt))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();
        let response = self.provider.complete(request).await?;
        Ok(response.message.text().unwrap_or_default().to_string())
    }
}
