//! Google Gemini provider implementation
//!
//! Implements the [`LlmProvider`] trait against the Gemini `generateContent`
//! endpoint. See: https://ai.google.dev/api/generate-content
//!
//! Gemini's wire format differs from the OpenAI family in three ways this
//! module has to bridge:
//! - the system prompt is a separate `systemInstruction` field, not a message
//! - the assistant role is called `model`
//! - function calls carry no IDs, so this provider synthesizes
//!   `<name>-<index>` IDs and recovers the function name from the ID when
//!   sending function responses back

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmProvider, Message, MessageContent,
    Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the Gemini API
    pub api_base: String,

    /// Request timeout in seconds (default: 180)
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from the `GEMINI_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            crate::LlmError::ConfigurationError(
                "GEMINI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self {
            api_key,
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
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

/// Google Gemini provider
///
/// Supports the `gemini-2.5-pro` (deep thinking) and `gemini-2.5-flash`
/// (fast) models.
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider with custom configuration
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new Gemini provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a provider from the `GEMINI_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let config = GeminiConfig::from_env()?;
        Self::with_config(config)
    }

    /// Get the current configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        debug!("Sending request to Gemini API at {}", self.config.api_base);

        let contents = convert_messages(request.messages);
        let tools = request.tools.as_ref().map(|tools| {
            vec![WireToolGroup {
                function_declarations: convert_tools(tools),
            }]
        });

        let wire_request = WireRequest {
            contents,
            system_instruction: request.system.map(|text| WireContent {
                role: None,
                parts: vec![WirePart::text(text)],
            }),
            tools,
            generation_config: WireGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base, request.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 | 403 => crate::LlmError::AuthenticationFailed,
                429 => crate::LlmError::RateLimitExceeded(error_text),
                400 => crate::LlmError::InvalidRequest(error_text),
                404 => crate::LlmError::ModelNotFound(request.model),
                _ => crate::LlmError::RequestFailed(format!("HTTP {status}: {error_text}")),
            });
        }

        let wire_response: WireResponse = response.json().await.map_err(|e| {
            crate::LlmError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let candidate = wire_response.candidates.into_iter().next().ok_or_else(|| {
            crate::LlmError::UnexpectedResponse("No candidates in response".to_string())
        })?;

        let usage = wire_response.usage_metadata.unwrap_or_default();

        debug!(
            "Received response - finish_reason: {:?}, tokens: {}/{}",
            candidate.finish_reason, usage.prompt_token_count, usage.candidates_token_count
        );

        let (message, has_tool_use) = parse_candidate(candidate.content)?;

        let stop_reason = if has_tool_use {
            StopReason::ToolUse
        } else {
            map_finish_reason(candidate.finish_reason.as_deref())
        };

        Ok(CompletionResponse {
            message,
            stop_reason,
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ============================================================================
// Wire request types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireToolGroup>>,
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

impl WirePart {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireToolGroup {
    function_declarations: Vec<WireFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct WireFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

// ============================================================================
// Wire response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    candidates: Vec<WireCandidate>,
    usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireUsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// Convert messages to Gemini contents
fn convert_messages(messages: Vec<Message>) -> Vec<WireContent> {
    messages.into_iter().map(convert_message).collect()
}

fn convert_message(msg: Message) -> WireContent {
    let role = match msg.role {
        Role::Assistant => "model",
        // Gemini has no system role in contents; system text rides as user
        Role::User | Role::System => "user",
    };

    let parts = match msg.content {
        Some(MessageContent::Text(text)) => vec![WirePart::text(text)],
        Some(MessageContent::Blocks(blocks)) => blocks.into_iter().map(convert_block).collect(),
        None => vec![WirePart::text(String::new())],
    };

    WireContent {
        role: Some(role.to_string()),
        parts,
    }
}

fn convert_block(block: ContentBlock) -> WirePart {
    match block {
        ContentBlock::Text { text } => WirePart::text(text),
        ContentBlock::ToolUse { name, input, .. } => WirePart {
            function_call: Some(WireFunctionCall { name, args: input }),
            ..WirePart::default()
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            ..
        } => WirePart {
            function_response: Some(WireFunctionResponse {
                name: function_name_from_id(&tool_use_id),
                response: serde_json::json!({ "result": content }),
            }),
            ..WirePart::default()
        },
    }
}

/// Convert tool definitions to Gemini function declarations
fn convert_tools(tools: &[ToolDefinition]) -> Vec<WireFunctionDeclaration> {
    tools
        .iter()
        .map(|tool| WireFunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        })
        .collect()
}

/// Synthesize a tool-use ID for a Gemini function call
///
/// Tool names use underscores, so `-` is safe as the separator.
fn synthesize_tool_use_id(name: &str, index: usize) -> String {
    format!("{name}-{index}")
}

/// Recover the function name from a synthesized tool-use ID
fn function_name_from_id(id: &str) -> String {
    match id.rsplit_once('-') {
        Some((name, _)) => name.to_string(),
        None => id.to_string(),
    }
}

/// Parse a response candidate into our message format
///
/// Returns the message and whether it contains any function calls.
fn parse_candidate(content: Option<WireContent>) -> Result<(Message, bool)> {
    let mut blocks = Vec::new();
    let mut call_index = 0usize;

    if let Some(content) = content {
        for part in content.parts {
            if let Some(text) = part.text {
                if !text.is_empty() {
                    blocks.push(ContentBlock::Text { text });
                }
            }
            if let Some(call) = part.function_call {
                blocks.push(ContentBlock::ToolUse {
                    id: synthesize_tool_use_id(&call.name, call_index),
                    name: call.name,
                    input: call.args,
                });
                call_index += 1;
            }
        }
    }

    if blocks.is_empty() {
        blocks.push(ContentBlock::Text {
            text: String::new(),
        });
    }

    let has_tool_use = call_index > 0;

    Ok((
        Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(blocks)),
        },
        has_tool_use,
    ))
}

/// Map a Gemini finish reason to our format
fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        Some("STOP") | None => StopReason::EndTurn,
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some(other) => {
            debug!("Unknown finish reason: {}", other);
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
        let provider = GeminiProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "gemini");
        assert_eq!(
            provider.config().api_base,
            "https://generativelanguage.googleapis.com/v1beta"
        );
    }

    #[test]
    fn test_assistant_role_is_model() {
        let content = convert_message(Message::assistant("Готово"));
        assert_eq!(content.role.as_deref(), Some("model"));
        assert_eq!(content.parts[0].text.as_deref(), Some("Готово"));
    }

    #[test]
    fn test_tool_use_becomes_function_call() {
        let msg = Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "get_moex_market_data-0".to_string(),
                name: "get_moex_market_data".to_string(),
                input: json!({"symbol": "LKOH"}),
            }])),
        };

        let content = convert_message(msg);
        let call = content.parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.name, "get_moex_market_data");
        assert_eq!(call.args["symbol"], "LKOH");
    }

    #[test]
    fn test_tool_result_becomes_function_response() {
        let msg = Message::tool_result(
            "get_rbc_news-0".to_string(),
            "новости за неделю".to_string(),
        );

        let content = convert_message(msg);
        assert_eq!(content.role.as_deref(), Some("user"));
        let resp = content.parts[0].function_response.as_ref().unwrap();
        assert_eq!(resp.name, "get_rbc_news");
        assert_eq!(resp.response["result"], "новости за неделю");
    }

    #[test]
    fn test_id_synthesis_round_trip() {
        let id = synthesize_tool_use_id("get_company_fundamentals", 2);
        assert_eq!(id, "get_company_fundamentals-2");
        assert_eq!(function_name_from_id(&id), "get_company_fundamentals");
    }

    #[test]
    fn test_parse_candidate_with_function_call() {
        let content = WireContent {
            role: Some("model".to_string()),
            parts: vec![
                WirePart::text("Смотрю котировки".to_string()),
                WirePart {
                    function_call: Some(WireFunctionCall {
                        name: "get_moex_market_data".to_string(),
                        args: json!({"symbol": "SBER"}),
                    }),
                    ..WirePart::default()
                },
            ],
        };

        let (message, has_tool_use) = parse_candidate(Some(content)).unwrap();
        assert!(has_tool_use);
        assert_eq!(message.tool_uses().len(), 1);
        assert_eq!(message.text(), Some("Смотрю котировки"));
    }

    #[test]
    fn test_parse_empty_candidate() {
        let (message, has_tool_use) = parse_candidate(None).unwrap();
        assert!(!has_tool_use);
        assert_eq!(message.text(), Some(""));
    }

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(map_finish_reason(Some("STOP")), StopReason::EndTurn);
        assert_eq!(map_finish_reason(Some("MAX_TOKENS")), StopReason::MaxTokens);
        assert_eq!(map_finish_reason(None), StopReason::EndTurn);
        assert_eq!(map_finish_reason(Some("SAFETY")), StopReason::EndTurn);
    }

    #[test]
    fn test_request_serialization_camel_case() {
        let request = WireRequest {
            contents: vec![convert_message(Message::user("тест"))],
            system_instruction: Some(WireContent {
                role: None,
                parts: vec![WirePart::text("Вы - аналитик".to_string())],
            }),
            tools: None,
            generation_config: WireGenerationConfig {
                max_output_tokens: 1024,
                temperature: Some(0.7),
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("systemInstruction").is_some());
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 1024);
    }
}
