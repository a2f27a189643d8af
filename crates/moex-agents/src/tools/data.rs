//! Concrete tools over the MOEX/RBC/Smart-Lab data interface

use super::{optional_i64, require_str, Tool};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use moex_llm::tools::schema;
use moex_utils::dates::lookback_start;
use serde_json::{json, Value};

const DEFAULT_LOOKBACK_DAYS: i64 = 7;
const MARKET_DATA_LOOKBACK_DAYS: i64 = 30;

/// Daily MOEX candles for a company
pub struct MoexMarketDataTool;

#[async_trait]
impl Tool for MoexMarketDataTool {
    async fn execute(&self, params: Value) -> Result<String> {
        let symbol = require_str(&params, "symbol")?;
        let end_date = require_str(&params, "end_date")?;
        // start_date may be omitted; default to a 30-day window
        let start_date = match params.get("start_date").and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => lookback_start(&end_date, MARKET_DATA_LOOKBACK_DAYS)
                .map_err(|e| PipelineError::Tool(e.to_string()))?,
        };

        Ok(moex_data::interface::fetch_market_data(&symbol, &start_date, &end_date).await)
    }

    fn name(&self) -> &str {
        "get_moex_market_data"
    }

    fn description(&self) -> &str {
        "Получить дневные свечи российской компании с Московской биржи в формате CSV"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "symbol": schema::string("Тикер компании на MOEX, например SBER"),
                "start_date": schema::string("Дата начала в формате YYYY-MM-DD"),
                "end_date": schema::string("Дата окончания в формате YYYY-MM-DD"),
            }),
            vec!["symbol", "end_date"],
        )
    }
}

/// Security description and current market snapshot
pub struct CompanyInfoTool;

#[async_trait]
impl Tool for CompanyInfoTool {
    async fn execute(&self, params: Value) -> Result<String> {
        let symbol = require_str(&params, "symbol")?;
        Ok(moex_data::interface::fetch_company_info(&symbol).await)
    }

    fn name(&self) -> &str {
        "get_company_info"
    }

    fn description(&self) -> &str {
        "Получить информацию о российской компании и её текущие рыночные показатели"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "symbol": schema::string("Тикер компании на MOEX"),
            }),
            vec!["symbol"],
        )
    }
}

/// Company news from RBC
pub struct RbcNewsTool;

#[async_trait]
impl Tool for RbcNewsTool {
    async fn execute(&self, params: Value) -> Result<String> {
        let query = require_str(&params, "query")?;
        let look_back = optional_i64(&params, "look_back_days", DEFAULT_LOOKBACK_DAYS);
        Ok(moex_data::interface::fetch_rbc_news(Some(&query), look_back).await)
    }

    fn name(&self) -> &str {
        "get_rbc_news"
    }

    fn description(&self) -> &str {
        "Получить новости о российской компании с РБК"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "query": schema::string("Тикер или название компании"),
                "look_back_days": schema::integer("Количество дней назад для поиска"),
            }),
            vec!["query"],
        )
    }
}

/// Company posts from Smart-Lab
pub struct SmartlabNewsTool;

#[async_trait]
impl Tool for SmartlabNewsTool {
    async fn execute(&self, params: Value) -> Result<String> {
        let query = require_str(&params, "query")?;
        let look_back = optional_i64(&params, "look_back_days", DEFAULT_LOOKBACK_DAYS);
        Ok(moex_data::interface::fetch_smartlab_news(Some(&query), look_back).await)
    }

    fn name(&self) -> &str {
        "get_smartlab_news"
    }

    fn description(&self) -> &str {
        "Получить новости и аналитику о российской компании с Smart-Lab"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "query": schema::string("Тикер или название компании"),
                "look_back_days": schema::integer("Количество дней назад для поиска"),
            }),
            vec!["query"],
        )
    }
}

/// Market-wide digest from RBC and Smart-Lab
pub struct MarketOverviewTool;

#[async_trait]
impl Tool for MarketOverviewTool {
    async fn execute(&self, _params: Value) -> Result<String> {
        Ok(moex_data::interface::fetch_market_overview().await)
    }

    fn name(&self) -> &str {
        "get_market_overview"
    }

    fn description(&self) -> &str {
        "Получить общий обзор российского фондового рынка"
    }

    fn input_schema(&self) -> Value {
        schema::object(json!({}), vec![])
    }
}

/// Dividend history of a company
pub struct DividendsTool;

#[async_trait]
impl Tool for DividendsTool {
    async fn execute(&self, params: Value) -> Result<String> {
        let symbol = require_str(&params, "symbol")?;
        Ok(moex_data::interface::fetch_dividends(&symbol).await)
    }

    fn name(&self) -> &str {
        "get_dividends"
    }

    fn description(&self) -> &str {
        "Получить историю дивидендных выплат российской компании"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "symbol": schema::string("Тикер компании на MOEX"),
            }),
            vec!["symbol"],
        )
    }
}

/// Snapshot of a MOEX index
pub struct IndexInfoTool;

#[async_trait]
impl Tool for IndexInfoTool {
    async fn execute(&self, params: Value) -> Result<String> {
        let index = params
            .get("index_name")
            .and_then(Value::as_str)
            .unwrap_or("IMOEX");
        Ok(moex_data::interface::fetch_index(index).await)
    }

    fn name(&self) -> &str {
        "get_index_info"
    }

    fn description(&self) -> &str {
        "Получить данные российского фондового индекса (IMOEX, RTSI и др.)"
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "index_name": schema::string("Название индекса, по умолчанию IMOEX"),
            }),
            vec![],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_are_objects() {
        for tool in [
            Box::new(MoexMarketDataTool) as Box<dyn Tool>,
            Box::new(CompanyInfoTool),
            Box::new(RbcNewsTool),
            Box::new(SmartlabNewsTool),
            Box::new(MarketOverviewTool),
            Box::new(DividendsTool),
            Box::new(IndexInfoTool),
        ] {
            let schema = tool.input_schema();
            assert_eq!(schema["type"], "object", "tool {}", tool.name());
        }
    }

    #[tokio::test]
    async fn test_missing_symbol_is_tool_error() {
        let result = CompanyInfoTool.execute(json!({})).await;
        assert!(matches!(result, Err(PipelineError::Tool(_))));
    }
}
