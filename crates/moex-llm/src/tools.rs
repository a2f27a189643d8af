//! Tool definition types for LLM tool use

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition for an LLM provider
///
/// Describes a tool the model may call: name, description, and the
/// JSON Schema of its input parameters. Both providers translate this
/// into their own function-declaration wire formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match a registered tool)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON schema for the tool's input parameters
    pub input_schema: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Helper module to build JSON schemas for tools
pub mod schema {
    use serde_json::{json, Value};

    /// Create a JSON schema for an object with properties
    ///
    /// # Example
    ///
    /// ```
    /// use moex_llm::tools::schema;
    /// use serde_json::json;
    ///
    /// let schema = schema::object(
    ///     json!({
    ///         "symbol": schema::string("Stock ticker, e.g. SBER"),
    ///         "look_back_days": schema::integer("History window in days"),
    ///     }),
    ///     vec!["symbol"],
    /// );
    /// ```
    pub fn object(properties: Value, required: Vec<&str>) -> Value {
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// String property schema
    pub fn string(description: &str) -> Value {
        json!({
            "type": "string",
            "description": description,
        })
    }

    /// Number property schema
    pub fn number(description: &str) -> Value {
        json!({
            "type": "number",
            "description": description,
        })
    }

    /// Integer property schema
    pub fn integer(description: &str) -> Value {
        json!({
            "type": "integer",
            "description": description,
        })
    }

    /// Boolean property schema
    pub fn boolean(description: &str) -> Value {
        json!({
            "type": "boolean",
            "description": description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_creation() {
        let schema = schema::object(
            json!({
                "symbol": schema::string("Stock ticker"),
            }),
            vec!["symbol"],
        );

        let tool = ToolDefinition::new("get_moex_market_data", "Fetch MOEX candles", schema.clone());
        assert_eq!(tool.name, "get_moex_market_data");
        assert_eq!(tool.input_schema, schema);
    }

    #[test]
    fn test_schema_builders() {
        let str_schema = schema::string("ticker");
        assert_eq!(str_schema["type"], "string");

        let int_schema = schema::integer("days");
        assert_eq!(int_schema["type"], "integer");

        let obj = schema::object(json!({"a": schema::boolean("flag")}), vec!["a"]);
        assert_eq!(obj["required"][0], "a");
    }
}
