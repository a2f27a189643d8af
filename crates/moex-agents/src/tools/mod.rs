//! Tools the analysts can call during their sub-chains
//!
//! Each tool wraps one function of the data interface and returns a
//! formatted text payload. Data-source failures come back as error
//! markers inside the payload, so a tool call only `Err`s on malformed
//! parameters or an unknown tool name.

mod data;

pub use data::{
    CompanyInfoTool, DividendsTool, IndexInfoTool, MarketOverviewTool, MoexMarketDataTool,
    RbcNewsTool, SmartlabNewsTool,
};

use crate::error::{PipelineError, Result};
use crate::state::AnalystKind;
use async_trait::async_trait;
use moex_llm::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for tools the analysts can execute
#[async_trait]
pub trait Tool: Send + Sync {
    /// Execute the tool with the given parameters
    async fn execute(&self, params: Value) -> Result<String>;

    /// Tool name; must be unique within a registry
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// JSON schema of the tool's input parameters
    fn input_schema(&self) -> Value;
}

/// Registry of tools for one analyst role
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Provider-facing definitions for every registered tool
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|tool| {
                ToolDefinition::new(tool.name(), tool.description(), tool.input_schema())
            })
            .collect()
    }

    /// Names of all registered tools
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Per-analyst tool registries
pub struct Toolkit {
    market: ToolRegistry,
    news: ToolRegistry,
    fundamentals: ToolRegistry,
}

impl Toolkit {
    /// Toolkit backed by the live MOEX/RBC/Smart-Lab adapters
    pub fn new() -> Self {
        let mut market = ToolRegistry::new();
        market.register(Arc::new(MoexMarketDataTool));
        market.register(Arc::new(CompanyInfoTool));

        let mut news = ToolRegistry::new();
        news.register(Arc::new(RbcNewsTool));
        news.register(Arc::new(SmartlabNewsTool));
        news.register(Arc::new(MarketOverviewTool));

        let mut fundamentals = ToolRegistry::new();
        fundamentals.register(Arc::new(CompanyInfoTool));
        fundamentals.register(Arc::new(DividendsTool));
        fundamentals.register(Arc::new(IndexInfoTool));

        Self {
            market,
            news,
            fundamentals,
        }
    }

    /// Toolkit from prebuilt registries (tests inject stub tools here)
    pub fn from_registries(
        market: ToolRegistry,
        news: ToolRegistry,
        fundamentals: ToolRegistry,
    ) -> Self {
        Self {
            market,
            news,
            fundamentals,
        }
    }

    /// Registry for one analyst role
    pub fn registry(&self, kind: AnalystKind) -> &ToolRegistry {
        match kind {
            AnalystKind::Market => &self.market,
            AnalystKind::News => &self.news,
            AnalystKind::Fundamentals => &self.fundamentals,
        }
    }

    /// Execute one named tool from an analyst's registry
    pub async fn execute(&self, kind: AnalystKind, name: &str, params: Value) -> Result<String> {
        let tool = self
            .registry(kind)
            .get(name)
            .ok_or_else(|| PipelineError::Tool(format!("unknown tool '{name}'")))?;
        tool.execute(params).await
    }
}

impl Default for Toolkit {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a required string parameter
pub(crate) fn require_str(params: &Value, key: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PipelineError::Tool(format!("missing required parameter '{key}'")))
}

/// Extract an optional integer parameter with a default
pub(crate) fn optional_i64(params: &Value, key: &str, default: i64) -> i64 {
    params.get(key).and_then(Value::as_i64).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_toolkit_shape() {
        let toolkit = Toolkit::new();
        assert_eq!(toolkit.registry(AnalystKind::Market).len(), 2);
        assert_eq!(toolkit.registry(AnalystKind::News).len(), 3);
        assert_eq!(toolkit.registry(AnalystKind::Fundamentals).len(), 3);
    }

    #[test]
    fn test_definitions_match_registrations() {
        let toolkit = Toolkit::new();
        let mut names = toolkit.registry(AnalystKind::Market).tool_names();
        names.sort();
        assert_eq!(names, vec!["get_company_info", "get_moex_market_data"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error() {
        let toolkit = Toolkit::new();
        let result = toolkit
            .execute(AnalystKind::Market, "no_such_tool", json!({}))
            .await;
        assert!(matches!(result, Err(PipelineError::Tool(_))));
    }

    #[test]
    fn test_require_str() {
        let params = json!({"symbol": "SBER"});
        assert_eq!(require_str(&params, "symbol").unwrap(), "SBER");
        assert!(require_str(&params, "missing").is_err());
    }
}
