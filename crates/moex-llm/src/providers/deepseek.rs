//! DeepSeek provider implementation
//!
//! Implements the [`LlmProvider`] trait against DeepSeek's OpenAI-compatible
//! chat completions endpoint. See: https://api-docs.deepseek.com
//!
//! # Examples
//!
//! ```no_run
//! use moex_llm::{CompletionRequest, Message, LlmProvider};
//! use moex_llm::providers::DeepseekProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create provider from DEEPSEEK_API_KEY environment variable
//!     let provider = DeepseekProvider::from_env()?;
//!
//!     let request = CompletionRequest::builder("deepseek-chat")
//!         .add_message(Message::user("Проанализируй акции Сбербанка"))
//!         .max_tokens(1024)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.text().unwrap());
//!
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmProvider, Message, MessageContent,
    Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_DEEPSEEK_API_BASE: &str = "https://api.deepseek.com";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Configuration for the DeepSeek provider
#[derive(Debug, Clone)]
pub struct DeepseekConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the DeepSeek API (default: "https://api.deepseek.com")
    pub api_base: String,

    /// Request timeout in seconds (default: 180; deep analyses run long)
    pub timeout_secs: u64,
}

impl DeepseekConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_DEEPSEEK_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from environment
    ///
    /// Reads the API key from `DEEPSEEK_API_KEY`. Optionally reads the
    /// base URL from `DEEPSEEK_API_BASE` if set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DEEPSEEK_API_KEY").map_err(|_| {
            crate::LlmError::ConfigurationError(
                "DEEPSEEK_API_KEY environment variable not set".to_string(),
            )
        })?;

        let api_base = std::env::var("DEEPSEEK_API_BASE")
            .unwrap_or_else(|_| DEFAULT_DEEPSEEK_API_BASE.to_string());

        Ok(Self {
            api_key,
            api_base,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// DeepSeek provider
///
/// Supports the `deepseek-reasoner` (deep thinking) and `deepseek-chat`
/// (fast) models over DeepSeek's OpenAI-compatible API.
pub struct DeepseekProvider {
    client: Client,
    config: DeepseekConfig,
}

impl DeepseekProvider {
    /// Create a new DeepSeek provider with custom configuration
    pub fn with_config(config: DeepseekConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new DeepSeek provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(DeepseekConfig::new(api_key))
    }

    /// Create a provider from the `DEEPSEEK_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let config = DeepseekConfig::from_env()?;
        Self::with_config(config)
    }

    /// Get the current configuration
    pub fn config(&self) -> &DeepseekConfig {
        &self.config
    }
}

#[async_trait]
impl LlmProvider for DeepseekProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to DeepSeek API at {}", self.config.api_base);

        // System prompt goes into the messages array for OpenAI-style APIs
        let wire_messages = build_wire_messages(request.system.clone(), request.messages);
        let wire_tools = request.tools.as_ref().map(|tools| convert_tools(tools));

        let wire_request = WireRequest {
            model: request.model.clone(),
            messages: wire_messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: wire_tools,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 => crate::LlmError::AuthenticationFailed,
                429 => crate::LlmError::RateLimitExceeded(error_text),
                400 => crate::LlmError::InvalidRequest(error_text),
                404 => crate::LlmError::ModelNotFound(request.model),
                _ => crate::LlmError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let wire_response: WireResponse = response.json().await.map_err(|e| {
            crate::LlmError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = wire_response.choices.into_iter().next().ok_or_else(|| {
            crate::LlmError::UnexpectedResponse("No choices in response".to_string())
        })?;

        debug!(
            "Received response - finish_reason: {}, tokens: {}/{}",
            choice.finish_reason,
            wire_response.usage.prompt_tokens,
            wire_response.usage.completion_tokens
        );

        let message = parse_wire_response(choice.message)?;
        let stop_reason = map_stop_reason(&choice.finish_reason);

        Ok(CompletionResponse {
            message,
            stop_reason,
            usage: TokenUsage {
                input_tokens: wire_response.usage.prompt_tokens,
                output_tokens: wire_response.usage.completion_tokens,
            },
        })
    }

    fn name(&self) -> &'static str {
        "deepseek"
    }
}

// ============================================================================
// Wire request types
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

// ============================================================================
// Wire response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireResponseFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// Build wire messages from our generic format
///
/// The system prompt becomes the first message in the array.
fn build_wire_messages(system: Option<String>, messages: Vec<Message>) -> Vec<WireMessage> {
    let mut result = Vec::new();

    if let Some(sys) = system {
        result.push(WireMessage {
            role: "system".to_string(),
            content: Some(sys),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for msg in messages {
        result.extend(convert_message(msg));
    }

    result
}

/// Convert a single message to wire format
///
/// Tool results become separate messages with role="tool", so one input
/// message may expand to several wire messages.
fn convert_message(msg: Message) -> Vec<WireMessage> {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    };

    match msg.content {
        Some(MessageContent::Text(text)) => {
            vec![WireMessage {
                role: role.to_string(),
                content: Some(text),
                tool_calls: None,
                tool_call_id: None,
            }]
        }
        Some(MessageContent::Blocks(blocks)) => convert_blocks(role, blocks),
        None => {
            vec![WireMessage {
                role: role.to_string(),
                content: Some(String::new()),
                tool_calls: None,
                tool_call_id: None,
            }]
        }
    }
}

/// Convert content blocks to wire messages
fn convert_blocks(role: &str, blocks: Vec<ContentBlock>) -> Vec<WireMessage> {
    let mut messages = Vec::new();
    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => {
                text_parts.push(text);
            }
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input).unwrap_or_default();
                tool_calls.push(WireToolCall {
                    id,
                    tool_type: "function".to_string(),
                    function: WireFunctionCall { name, arguments },
                });
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => {
                messages.push(WireMessage {
                    role: "tool".to_string(),
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: Some(tool_use_id),
                });
            }
        }
    }

    if !text_parts.is_empty() || !tool_calls.is_empty() {
        let content = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join("\n"))
        };

        messages.insert(
            0,
            WireMessage {
                role: role.to_string(),
                content,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            },
        );
    }

    messages
}

/// Convert tool definitions to wire format
fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireTool> {
    tools
        .iter()
        .map(|tool| WireTool {
            tool_type: "function".to_string(),
            function: WireFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

/// Parse a wire response message to our format
fn parse_wire_response(msg: WireResponseMessage) -> Result<Message> {
    let mut blocks = Vec::new();

    if let Some(content) = msg.content {
        if !content.is_empty() {
            blocks.push(ContentBlock::Text { text: content });
        }
    }

    if let Some(tool_calls) = msg.tool_calls {
        for call in tool_calls {
            let input: serde_json::Value =
                serde_json::from_str(&call.function.arguments).map_err(|e| {
                    crate::LlmError::UnexpectedResponse(format!(
                        "Failed to parse tool arguments: {e}"
                    ))
                })?;

            blocks.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }
    }

    if blocks.is_empty() {
        blocks.push(ContentBlock::Text {
            text: String::new(),
        });
    }

    Ok(Message {
        role: Role::Assistant,
        content: Some(MessageContent::Blocks(blocks)),
    })
}

/// Map an OpenAI-style finish reason to our format
fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "tool_calls" => StopReason::ToolUse,
        _ => {
            debug!("Unknown finish reason: {}", reason);
            StopReason::EndTurn
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_creation() {
        let provider = DeepseekProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "deepseek");
        assert_eq!(provider.config().api_key, "test-key");
        assert_eq!(provider.config().api_base, "https://api.deepseek.com");
    }

    #[test]
    fn test_provider_with_custom_config() {
        let config = DeepseekConfig::new("test-key")
            .with_api_base("http://localhost:8000/v1")
            .with_timeout(60);

        let provider = DeepseekProvider::with_config(config).unwrap();
        assert_eq!(provider.config().api_base, "http://localhost:8000/v1");
        assert_eq!(provider.config().timeout_secs, 60);
    }

    #[test]
    fn test_simple_text_message_conversion() {
        let msg = Message::user("Привет");
        let wire_msgs = convert_message(msg);

        assert_eq!(wire_msgs.len(), 1);
        assert_eq!(wire_msgs[0].role, "user");
        assert_eq!(wire_msgs[0].content.as_deref(), Some("Привет"));
    }

    #[test]
    fn test_system_message_in_array() {
        let messages = build_wire_messages(Some("Вы - финансовый аналитик".to_string()), vec![]);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content.as_deref(), Some("Вы - финансовый аналитик"));
    }

    #[test]
    fn test_tool_result_conversion() {
        let msg = Message::tool_result("call_123".to_string(), "candle data".to_string());
        let wire_msgs = convert_message(msg);

        assert_eq!(wire_msgs.len(), 1);
        assert_eq!(wire_msgs[0].role, "tool");
        assert_eq!(wire_msgs[0].tool_call_id, Some("call_123".to_string()));
        assert_eq!(wire_msgs[0].content.as_deref(), Some("candle data"));
    }

    #[test]
    fn test_multiple_tool_results() {
        let msg = Message {
            role: Role::User,
            content: Some(MessageContent::Blocks(vec![
                ContentBlock::ToolResult {
                    tool_use_id: "call_1".to_string(),
                    content: "result 1".to_string(),
                    is_error: None,
                },
                ContentBlock::ToolResult {
                    tool_use_id: "call_2".to_string(),
                    content: "result 2".to_string(),
                    is_error: None,
                },
            ])),
        };

        let wire_msgs = convert_message(msg);

        assert_eq!(wire_msgs.len(), 2);
        assert_eq!(wire_msgs[0].tool_call_id, Some("call_1".to_string()));
        assert_eq!(wire_msgs[1].tool_call_id, Some("call_2".to_string()));
    }

    #[test]
    fn test_assistant_tool_call_round_trip() {
        let msg = Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "get_moex_market_data".to_string(),
                input: json!({"symbol": "GAZP"}),
            }])),
        };

        let wire_msgs = convert_message(msg);

        assert_eq!(wire_msgs.len(), 1);
        assert_eq!(wire_msgs[0].role, "assistant");
        let calls = wire_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "get_moex_market_data");
    }

    #[test]
    fn test_tool_definition_conversion() {
        let tool = ToolDefinition::new(
            "get_moex_market_data",
            "Fetch MOEX candles",
            json!({"type": "object", "properties": {"symbol": {"type": "string"}}}),
        );

        let wire_tools = convert_tools(&[tool]);

        assert_eq!(wire_tools.len(), 1);
        assert_eq!(wire_tools[0].tool_type, "function");
        assert_eq!(wire_tools[0].function.name, "get_moex_market_data");
    }

    #[test]
    fn test_response_with_tool_calls() {
        let response_msg = WireResponseMessage {
            content: Some("Получаю данные".to_string()),
            tool_calls: Some(vec![WireResponseToolCall {
                id: "call_123".to_string(),
                function: WireResponseFunctionCall {
                    name: "get_moex_market_data".to_string(),
                    arguments: r#"{"symbol":"SBER"}"#.to_string(),
                },
            }]),
        };

        let message = parse_wire_response(response_msg).unwrap();

        assert_eq!(message.role, Role::Assistant);
        let uses = message.tool_uses();
        assert_eq!(uses.len(), 1);
        match uses[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_123");
                assert_eq!(name, "get_moex_market_data");
                assert_eq!(input["symbol"], "SBER");
            }
            _ => panic!("Expected tool use"),
        }
    }

    #[test]
    fn test_malformed_tool_arguments() {
        let response_msg = WireResponseMessage {
            content: None,
            tool_calls: Some(vec![WireResponseToolCall {
                id: "call_1".to_string(),
                function: WireResponseFunctionCall {
                    name: "get_moex_market_data".to_string(),
                    arguments: "not json".to_string(),
                },
            }]),
        };

        let result = parse_wire_response(response_msg);
        assert!(matches!(result, Err(crate::LlmError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("stop"), StopReason::EndTurn);
        assert_eq!(map_stop_reason("length"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("tool_calls"), StopReason::ToolUse);
        assert_eq!(map_stop_reason("unknown"), StopReason::EndTurn);
    }
}
