//! Error types for the trading pipeline

use crate::state::AgentState;
use moex_llm::LlmError;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while building or running the trading graph
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid or incomplete configuration; raised before any network call
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM provider failure outside a stage
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Prompt template failed to render
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Tool invocation failed (unknown tool, malformed parameters)
    #[error("Tool error: {0}")]
    Tool(String),

    /// A stage's LLM call failed mid-walk; the state accumulated so far
    /// is preserved for reporting
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        /// Name of the failed stage
        stage: String,
        /// Underlying LLM error
        source: LlmError,
        /// Pipeline state at the moment of failure
        partial: Box<AgentState>,
    },

    /// The graph walk exceeded the configured step ceiling
    #[error("Step limit of {limit} exceeded; a debate loop is not terminating")]
    StepLimitExceeded {
        /// Configured maximum number of graph steps
        limit: usize,
    },

    /// Run log could not be written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run log serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
