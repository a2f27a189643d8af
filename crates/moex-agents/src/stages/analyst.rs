//! Analyst stages and their tool-execution companions

use super::{LlmHandle, Stage};
use crate::error::Result;
use crate::prompts;
use crate::state::{AgentState, AnalystKind, StateUpdate};
use crate::tools::Toolkit;
use async_trait::async_trait;
use moex_llm::{CompletionRequest, ContentBlock, Message};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// One analyst role: renders the role's system prompt, calls the quick
/// model with the role's tools bound, and either reports or requests
/// tool calls
pub struct AnalystStage {
    kind: AnalystKind,
    llm: LlmHandle,
    toolkit: Arc<Toolkit>,
    name: String,
}

impl AnalystStage {
    /// Create the stage for one analyst kind
    pub fn new(kind: AnalystKind, llm: LlmHandle, toolkit: Arc<Toolkit>) -> Self {
        Self {
            kind,
            llm,
            toolkit,
            name: format!("{}_analyst", kind.as_str()),
        }
    }
}

#[async_trait]
impl Stage for AnalystStage {
    #[instrument(skip(self, state), fields(stage = %self.name, ticker = %state.company_ticker))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let registry = self.toolkit.registry(self.kind);
        let mut tool_names = registry.tool_names();
        tool_names.sort();

        let system = prompts::analyst_system(self.kind, state, &tool_names)?;

        // The opening user turn is rebuilt every call rather than kept
        // in state; state.messages holds only the tool-call exchange.
        let mut messages = vec![Message::user(format!(
            "Проведите анализ компании {} по состоянию на {}.",
            state.company_ticker, state.trade_date
        ))];
        messages.extend(state.messages.iter().cloned());

        let mut builder = CompletionRequest::builder(&self.llm.model)
            .system(system)
            .messages(messages)
            .max_tokens(self.llm.max_tokens)
            .temperature(self.llm.temperature);
        let definitions = registry.definitions();
        if !definitions.is_empty() {
            builder = builder.tools(definitions);
        }

        let response = self.llm.complete(builder.build()).await?;

        let report = if response.message.has_tool_uses() {
            debug!(
                calls = response.message.tool_uses().len(),
                "analyst requested tools"
            );
            None
        } else {
            Some(
                response
                    .message
                    .text()
                    .unwrap_or_default()
                    .to_string(),
            )
        };

        Ok(StateUpdate::AnalystTurn {
            kind: self.kind,
            message: response.message,
            report,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Executes the tool calls requested by the preceding analyst turn
///
/// A tool failure does not abort the run: the error text is fed back
/// to the model as a failed tool result and the analyst continues with
/// degraded input.
pub struct ToolExecutionStage {
    kind: AnalystKind,
    toolkit: Arc<Toolkit>,
    name: String,
}

impl ToolExecutionStage {
    /// Create the tool node for one analyst kind
    pub fn new(kind: AnalystKind, toolkit: Arc<Toolkit>) -> Self {
        Self {
            kind,
            toolkit,
            name: format!("{}_tools", kind.as_str()),
        }
    }
}

#[async_trait]
impl Stage for ToolExecutionStage {
    #[instrument(skip(self, state), fields(stage = %self.name))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let mut results = Vec::new();

        let calls: Vec<(String, String, serde_json::Value)> = state
            .messages
            .last()
            .map(|message| {
                message
                    .tool_uses()
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::ToolUse { id, name, input } => {
                            Some((id.clone(), name.clone(), input.clone()))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        for (id, name, input) in calls {
            debug!(tool = %name, "executing tool");
            match self.toolkit.execute(self.kind, &name, input).await {
                Ok(payload) => results.push(Message::tool_result(id, payload)),
                Err(e) => {
                    warn!(tool = %name, error = %e, "tool call failed");
                    results.push(Message::tool_error(id, format!("Ошибка инструмента: {e}")));
                }
            }
        }

        Ok(StateUpdate::ToolResults { messages: results })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Clears the per-analyst conversation before the next analyst starts
pub struct ClearMessagesStage;

#[async_trait]
impl Stage for ClearMessagesStage {
    async fn run(&self, _state: &AgentState) -> Result<StateUpdate> {
        Ok(StateUpdate::ClearMessages)
    }

    fn name(&self) -> &str {
        "clear_messages"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolRegistry};
    use moex_llm::MessageContent;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        async fn execute(&self, params: serde_json::Value) -> Result<String> {
            Ok(format!("echo: {params}"))
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes parameters"
        }

        fn input_schema(&self) -> serde_json::Value {
            moex_llm::tools::schema::object(json!({}), vec![])
        }
    }

    fn toolkit_with_market_echo() -> Arc<Toolkit> {
        let mut market = ToolRegistry::new();
        market.register(Arc::new(EchoTool));
        Arc::new(Toolkit::from_registries(
            market,
            ToolRegistry::new(),
            ToolRegistry::new(),
        ))
    }

    #[tokio::test]
    async fn test_tool_execution_returns_result_per_call() {
        let stage = ToolExecutionStage::new(AnalystKind::Market, toolkit_with_market_echo());
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.messages.push(Message {
            role: moex_llm::Role::Assistant,
            content: Some(MessageContent::Blocks(vec![
                ContentBlock::ToolUse {
                    id: "call_1".to_string(),
                    name: "echo".to_string(),
                    input: json!({"symbol": "SBER"}),
                },
                ContentBlock::ToolUse {
                    id: "call_2".to_string(),
                    name: "missing".to_string(),
                    input: json!({}),
                },
            ])),
        });

        let update = stage.run(&state).await.unwrap();
        let StateUpdate::ToolResults { messages } = update else {
            panic!("expected tool results");
        };
        assert_eq!(messages.len(), 2);
        // Unknown tool comes back as a failed tool result, not an Err
        assert!(!messages[0].has_tool_uses());
    }

    #[tokio::test]
    async fn test_tool_execution_with_no_calls_is_empty() {
        let stage = ToolExecutionStage::new(AnalystKind::Market, toolkit_with_market_echo());
        let state = AgentState::new("SBER", "2025-06-02");
        let update = stage.run(&state).await.unwrap();
        let StateUpdate::ToolResults { messages } = update else {
            panic!("expected tool results");
        };
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn test_clear_messages_stage() {
        let state = AgentState::new("SBER", "2025-06-02");
        let update = ClearMessagesStage.run(&state).await.unwrap();
        assert!(matches!(update, StateUpdate::ClearMessages));
    }
}
