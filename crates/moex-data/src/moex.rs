//! MOEX ISS API client
//!
//! Talks to the Moscow Exchange Information & Statistical Server.
//! See: https://iss.moex.com/iss/reference/
//!
//! ISS responses are keyed tables of the form
//! `{"<block>": {"columns": [...], "data": [[...], ...]}}`; [`IssTable`]
//! decodes one block and resolves cells by column name.

use crate::error::{DataError, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ISS_BASE: &str = "https://iss.moex.com/iss";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "moex-agents/0.1";

/// One keyed table from an ISS response
#[derive(Debug, Deserialize)]
pub struct IssTable {
    /// Column names, in data order
    pub columns: Vec<String>,
    /// Row data; cell types vary per column
    pub data: Vec<Vec<Value>>,
}

impl IssTable {
    /// Index of a column by name
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value by row index and column name
    pub fn cell<'a>(&'a self, row: &'a [Value], name: &str) -> Option<&'a Value> {
        self.column(name).and_then(|idx| row.get(idx))
    }

    /// Zip one row with the column names
    pub fn row_pairs<'a>(&'a self, row: &'a [Value]) -> Vec<(&'a str, &'a Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(row.iter())
            .collect()
    }
}

/// A single daily candle
#[derive(Debug, Clone)]
pub struct Candle {
    /// Bar start timestamp, `YYYY-MM-DD HH:MM:SS`
    pub begin: String,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Traded value in RUB
    pub value: f64,
}

/// Dividend record for a security
#[derive(Debug, Clone)]
pub struct Dividend {
    /// Registry close date, `YYYY-MM-DD`
    pub registry_close_date: String,
    /// Dividend per share
    pub value: f64,
    /// Payment currency
    pub currency: String,
}

/// Search hit from the securities directory
#[derive(Debug, Clone)]
pub struct SecuritySummary {
    /// Security ID (ticker)
    pub secid: String,
    /// Full security name
    pub name: String,
    /// Security type
    pub sec_type: String,
}

/// Client for the MOEX ISS API
pub struct MoexClient {
    client: Client,
    base_url: String,
}

impl MoexClient {
    /// Create a new client with default settings
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_ISS_BASE)
    }

    /// Create a client against a custom base URL (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// GET `{base}/{endpoint}.json` with query parameters
    async fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{}.json", self.base_url, endpoint);
        debug!("MOEX ISS request: {}", url);

        let response = self.client.get(&url).query(params).send().await?;

        if !response.status().is_success() {
            return Err(DataError::Api(format!(
                "ISS returned HTTP {} for {endpoint}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// Extract one keyed table from an ISS response
    fn table(body: &Value, key: &str) -> Result<IssTable> {
        let block = body
            .get(key)
            .ok_or_else(|| DataError::Format(format!("missing '{key}' block in ISS response")))?;
        Ok(serde_json::from_value(block.clone())?)
    }

    /// Daily candles for a security over a date range
    pub async fn get_candles(&self, secid: &str, from: &str, till: &str) -> Result<Vec<Candle>> {
        let endpoint = format!("engines/stock/markets/shares/securities/{secid}/candles");
        // interval 24 = daily bars
        let body = self
            .request(&endpoint, &[("from", from), ("till", till), ("interval", "24")])
            .await?;

        let table = Self::table(&body, "candles")?;
        let mut candles = Vec::with_capacity(table.data.len());

        for row in &table.data {
            candles.push(Candle {
                begin: cell_str(&table, row, "begin").unwrap_or_default(),
                open: cell_f64(&table, row, "open").unwrap_or(0.0),
                high: cell_f64(&table, row, "high").unwrap_or(0.0),
                low: cell_f64(&table, row, "low").unwrap_or(0.0),
                close: cell_f64(&table, row, "close").unwrap_or(0.0),
                value: cell_f64(&table, row, "value").unwrap_or(0.0),
            });
        }

        candles.sort_by(|a, b| a.begin.cmp(&b.begin));
        Ok(candles)
    }

    /// Descriptive attributes of a security as name/value pairs
    pub async fn get_security_info(&self, secid: &str) -> Result<Vec<(String, String)>> {
        let endpoint = format!("securities/{secid}");
        let body = self.request(&endpoint, &[]).await?;

        let table = Self::table(&body, "description")?;
        let mut info = Vec::new();

        // description rows are [name, title, value, ...]
        for row in &table.data {
            if let (Some(Value::String(name)), Some(value)) = (row.first(), row.get(2)) {
                let value = value_to_string(value);
                if !value.is_empty() {
                    info.push((name.clone(), value));
                }
            }
        }

        if info.is_empty() {
            return Err(DataError::NotFound(secid.to_string()));
        }
        Ok(info)
    }

    /// Current market data snapshot for a security on the TQBR board
    pub async fn get_market_data(&self, secid: &str) -> Result<Vec<(String, Value)>> {
        let endpoint = format!("engines/stock/markets/shares/boards/TQBR/securities/{secid}");
        let body = self.request(&endpoint, &[]).await?;
        Self::snapshot(&body, secid)
    }

    /// Current snapshot for a market index (IMOEX, RTSI, ...)
    pub async fn get_index_data(&self, index: &str) -> Result<Vec<(String, Value)>> {
        let endpoint = format!("engines/stock/markets/index/securities/{index}");
        let body = self.request(&endpoint, &[]).await?;
        Self::snapshot(&body, index)
    }

    fn snapshot(body: &Value, secid: &str) -> Result<Vec<(String, Value)>> {
        let table = Self::table(body, "securities")?;
        let row = table
            .data
            .first()
            .ok_or_else(|| DataError::NotFound(secid.to_string()))?;

        Ok(table
            .row_pairs(row)
            .into_iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect())
    }

    /// Search the securities directory by name or ticker
    pub async fn search_securities(&self, query: &str) -> Result<Vec<SecuritySummary>> {
        let body = self.request("securities", &[("q", query)]).await?;
        let table = Self::table(&body, "securities")?;

        let mut results = Vec::new();
        for row in &table.data {
            let secid = cell_str(&table, row, "secid").unwrap_or_default();
            if secid.is_empty() {
                continue;
            }
            results.push(SecuritySummary {
                secid,
                name: cell_str(&table, row, "name").unwrap_or_default(),
                sec_type: cell_str(&table, row, "type").unwrap_or_default(),
            });
        }
        Ok(results)
    }

    /// Dividend history for a security
    pub async fn get_dividends(&self, secid: &str) -> Result<Vec<Dividend>> {
        let endpoint = format!("securities/{secid}/dividends");
        let body = self.request(&endpoint, &[]).await?;
        let table = Self::table(&body, "dividends")?;

        let mut dividends = Vec::with_capacity(table.data.len());
        for row in &table.data {
            dividends.push(Dividend {
                registry_close_date: cell_str(&table, row, "registryclosedate")
                    .unwrap_or_default(),
                value: cell_f64(&table, row, "value").unwrap_or(0.0),
                currency: cell_str(&table, row, "currencyid")
                    .unwrap_or_else(|| "RUB".to_string()),
            });
        }
        Ok(dividends)
    }
}

fn cell_str(table: &IssTable, row: &[Value], name: &str) -> Option<String> {
    match table.cell(row, name) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn cell_f64(table: &IssTable, row: &[Value], name: &str) -> Option<f64> {
    table.cell(row, name).and_then(Value::as_f64)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candle_body() -> Value {
        json!({
            "candles": {
                "columns": ["open", "close", "high", "low", "value", "volume", "begin", "end"],
                "data": [
                    [305.0, 309.9, 310.5, 304.1, 1.2e9, 4000000, "2025-06-02 00:00:00", "2025-06-02 23:59:59"],
                    [300.1, 305.2, 306.0, 299.5, 1.1e9, 3900000, "2025-06-01 00:00:00", "2025-06-01 23:59:59"]
                ]
            }
        })
    }

    #[test]
    fn test_iss_table_column_lookup() {
        let table = MoexClient::table(&candle_body(), "candles").unwrap();
        assert_eq!(table.column("close"), Some(1));
        assert_eq!(table.column("missing"), None);
    }

    #[test]
    fn test_missing_block_is_format_error() {
        let result = MoexClient::table(&json!({}), "candles");
        assert!(matches!(result, Err(DataError::Format(_))));
    }

    #[test]
    fn test_snapshot_zips_columns() {
        let body = json!({
            "securities": {
                "columns": ["SECID", "LAST", "PRCCHANGE"],
                "data": [["IMOEX", 3150.2, 0.8]]
            }
        });

        let snapshot = MoexClient::snapshot(&body, "IMOEX").unwrap();
        assert_eq!(snapshot[0].0, "SECID");
        assert_eq!(snapshot[1].1, json!(3150.2));
    }

    #[test]
    fn test_snapshot_empty_is_not_found() {
        let body = json!({
            "securities": { "columns": ["SECID"], "data": [] }
        });
        let result = MoexClient::snapshot(&body, "NOPE");
        assert!(matches!(result, Err(DataError::NotFound(_))));
    }
}
