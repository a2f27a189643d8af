//! Text-payload interface consumed by the analyst tools
//!
//! Every function returns a ready-to-embed markdown string. Failures are
//! reported inside the text (a Russian error marker) instead of an `Err`,
//! so a dead data source degrades the analysis without aborting the run.

use crate::companies::company_name;
use crate::error::Result;
use crate::moex::MoexClient;
use crate::news::{NewsItem, RbcCategory, RbcClient, SmartlabClient};
use tracing::warn;

const NEWS_LIMIT: usize = 20;
const OVERVIEW_LIMIT: usize = 5;
const SEARCH_LIMIT: usize = 10;
const DIVIDEND_LIMIT: usize = 10;

/// Daily candles for a ticker over a date range, CSV-formatted
pub async fn fetch_market_data(symbol: &str, start_date: &str, end_date: &str) -> String {
    match market_data_inner(symbol, start_date, end_date).await {
        Ok(text) => text,
        Err(e) => {
            warn!("MOEX market data for {} failed: {}", symbol, e);
            format!("Ошибка получения данных MOEX для {symbol}: {e}")
        }
    }
}

async fn market_data_inner(symbol: &str, start_date: &str, end_date: &str) -> Result<String> {
    let client = MoexClient::new()?;
    let candles = client.get_candles(symbol, start_date, end_date).await?;

    if candles.is_empty() {
        return Ok(format!(
            "Данные для {symbol} за период {start_date} - {end_date} не найдены"
        ));
    }

    let mut out = format!("# Данные MOEX для {symbol} с {start_date} по {end_date}\n");
    out.push_str(&format!("# Всего записей: {}\n\n", candles.len()));
    out.push_str("Date,Open,High,Low,Close,Volume\n");

    for candle in &candles {
        let date = candle.begin.split(' ').next().unwrap_or(&candle.begin);
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            date, candle.open, candle.high, candle.low, candle.close, candle.value
        ));
    }

    Ok(out)
}

/// Security description plus the current market snapshot
pub async fn fetch_company_info(symbol: &str) -> String {
    match company_info_inner(symbol).await {
        Ok(text) => text,
        Err(e) => {
            warn!("MOEX company info for {} failed: {}", symbol, e);
            format!("Информация о {symbol} не найдена: {e}")
        }
    }
}

async fn company_info_inner(symbol: &str) -> Result<String> {
    let client = MoexClient::new()?;
    let info = client.get_security_info(symbol).await?;

    let mut out = format!("## Информация о ценной бумаге {symbol}\n\n");
    out.push_str("### Основные данные:\n");
    for (name, value) in &info {
        out.push_str(&format!("- {name}: {value}\n"));
    }

    // The snapshot is best-effort; description alone is still useful
    if let Ok(market) = client.get_market_data(symbol).await {
        out.push_str("\n### Текущие рыночные данные:\n");
        for field in ["LAST", "CHANGE", "PRCCHANGE", "VOLTODAY", "VALTODAY"] {
            if let Some((_, value)) = market.iter().find(|(name, _)| name == field) {
                if !value.is_null() {
                    out.push_str(&format!("- {field}: {value}\n"));
                }
            }
        }
    }

    Ok(out)
}

/// RBC news, optionally filtered to one company
pub async fn fetch_rbc_news(query: Option<&str>, look_back_days: i64) -> String {
    let result = async {
        let client = RbcClient::new()?;
        match query {
            Some(ticker) => client.search_company_news(ticker, look_back_days).await,
            None => client.get_market_news(look_back_days).await,
        }
    }
    .await;

    let header = match query {
        Some(ticker) => {
            format!("## Новости РБК о {ticker} за последние {look_back_days} дней:\n\n")
        }
        None => format!("## Рыночные новости РБК за последние {look_back_days} дней:\n\n"),
    };

    match result {
        Ok(items) => header + &format_news(&items, NEWS_LIMIT),
        Err(e) => {
            warn!("RBC news failed: {}", e);
            format!("{header}Ошибка получения новостей РБК: {e}")
        }
    }
}

/// Smart-Lab community posts, optionally filtered to one company
pub async fn fetch_smartlab_news(query: Option<&str>, look_back_days: i64) -> String {
    let result = async {
        let client = SmartlabClient::new()?;
        match query {
            Some(ticker) => client.search_company_news(ticker, look_back_days).await,
            None => client.get_recent(look_back_days).await,
        }
    }
    .await;

    let header = match query {
        Some(ticker) => {
            format!("## Новости Smart-Lab о {ticker} за последние {look_back_days} дней:\n\n")
        }
        None => format!("## Посты Smart-Lab за последние {look_back_days} дней:\n\n"),
    };

    match result {
        Ok(items) => header + &format_news(&items, NEWS_LIMIT),
        Err(e) => {
            warn!("Smart-Lab news failed: {}", e);
            format!("{header}Ошибка получения новостей Smart-Lab: {e}")
        }
    }
}

/// RBC economics/stock digest plus Smart-Lab sentiment, per-source degraded
pub async fn fetch_market_overview() -> String {
    let mut out = String::from("## Обзор рынка от РБК\n\n");

    match rbc_overview().await {
        Ok(text) => out.push_str(&text),
        Err(e) => {
            warn!("RBC overview failed: {}", e);
            out.push_str(&format!("Ошибка получения обзора РБК: {e}\n"));
        }
    }

    out.push_str("\n## Настроения Smart-Lab\n\n");
    match smartlab_overview().await {
        Ok(text) => out.push_str(&text),
        Err(e) => {
            warn!("Smart-Lab overview failed: {}", e);
            out.push_str(&format!("Ошибка получения данных Smart-Lab: {e}\n"));
        }
    }

    out
}

async fn rbc_overview() -> Result<String> {
    let client = RbcClient::new()?;
    let mut out = String::new();

    let economics = client.get_feed(RbcCategory::Economics).await?;
    if !economics.is_empty() {
        out.push_str("### Экономические новости:\n");
        push_digest(&mut out, &economics);
    }

    let stock = client.get_feed(RbcCategory::Stock).await?;
    if !stock.is_empty() {
        out.push_str("### Фондовый рынок:\n");
        push_digest(&mut out, &stock);
    }

    Ok(out)
}

async fn smartlab_overview() -> Result<String> {
    let client = SmartlabClient::new()?;
    let items = client.get_feed().await?;

    let mut out = String::new();
    for item in items.iter().take(OVERVIEW_LIMIT) {
        out.push_str(&format!(
            "- **{}** [{}] ({})\n",
            item.title, item.category, item.published
        ));
    }
    Ok(out)
}

fn push_digest(out: &mut String, items: &[NewsItem]) {
    for item in items.iter().take(OVERVIEW_LIMIT) {
        out.push_str(&format!("- **{}** ({})\n", item.title, item.published));
        if !item.summary.is_empty() {
            let preview: String = item.summary.chars().take(200).collect();
            out.push_str(&format!("  {preview}...\n"));
        }
    }
    out.push('\n');
}

/// Dividend history for a ticker
pub async fn fetch_dividends(symbol: &str) -> String {
    let result = async {
        let client = MoexClient::new()?;
        client.get_dividends(symbol).await
    }
    .await;

    match result {
        Ok(dividends) if dividends.is_empty() => {
            format!("Информация о дивидендах для {symbol} не найдена")
        }
        Ok(dividends) => {
            let mut out = format!("## Дивиденды {symbol}\n\n");
            for div in dividends.iter().take(DIVIDEND_LIMIT) {
                out.push_str(&format!("### Дивиденд от {}\n", div.registry_close_date));
                out.push_str(&format!("- Размер: {} руб.\n", div.value));
                out.push_str(&format!("- Валюта: {}\n\n", div.currency));
            }
            out
        }
        Err(e) => {
            warn!("MOEX dividends for {} failed: {}", symbol, e);
            format!("Ошибка получения дивидендов для {symbol}: {e}")
        }
    }
}

/// Current snapshot of a MOEX index (IMOEX, RTSI, ...)
pub async fn fetch_index(index_name: &str) -> String {
    let result = async {
        let client = MoexClient::new()?;
        client.get_index_data(index_name).await
    }
    .await;

    match result {
        Ok(snapshot) => {
            let mut out = format!("## Индекс {index_name}\n\n");
            for field in ["LAST", "CHANGE", "PRCCHANGE", "OPEN", "HIGH", "LOW"] {
                if let Some((_, value)) = snapshot.iter().find(|(name, _)| name == field) {
                    if !value.is_null() {
                        out.push_str(&format!("- {field}: {value}\n"));
                    }
                }
            }
            out
        }
        Err(e) => {
            warn!("MOEX index {} failed: {}", index_name, e);
            format!("Данные по индексу {index_name} не найдены: {e}")
        }
    }
}

/// Securities directory search, formatted for the model
pub async fn fetch_security_search(query: &str) -> String {
    let result = async {
        let client = MoexClient::new()?;
        client.search_securities(query).await
    }
    .await;

    match result {
        Ok(results) if results.is_empty() => {
            format!("Ценные бумаги по запросу '{query}' не найдены")
        }
        Ok(results) => {
            let mut out = format!("## Результаты поиска по запросу '{query}':\n\n");
            for (i, sec) in results.iter().take(SEARCH_LIMIT).enumerate() {
                out.push_str(&format!("### {}. {}\n", i + 1, sec.name));
                out.push_str(&format!("- Код: {}\n", sec.secid));
                out.push_str(&format!("- Тип: {}\n\n", sec.sec_type));
            }
            out
        }
        Err(e) => {
            warn!("MOEX search '{}' failed: {}", query, e);
            format!("Ошибка поиска ценных бумаг по запросу '{query}': {e}")
        }
    }
}

fn format_news(items: &[NewsItem], limit: usize) -> String {
    if items.is_empty() {
        return "Новости не найдены.".to_string();
    }

    let mut out = String::new();
    for item in items.iter().take(limit) {
        out.push_str(&format!("### {} ({})\n", item.title, item.published));
        out.push_str(&format!("**Категория:** {}\n", item.category));
        if !item.summary.is_empty() {
            out.push_str(&format!("{}\n", item.summary));
        }
        out.push_str(&format!("**Ссылка:** {}\n\n", item.link));
    }
    out
}

/// Russian company name for a ticker (table lookup, no network)
pub fn fetch_company_name(ticker: &str) -> String {
    company_name(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::NewsItem;

    fn item(title: &str) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            link: "https://example.com".to_string(),
            published: "2025-06-02 10:00:00".to_string(),
            summary: String::new(),
            category: "stock".to_string(),
        }
    }

    #[test]
    fn test_format_news_empty() {
        assert_eq!(format_news(&[], 20), "Новости не найдены.");
    }

    #[test]
    fn test_format_news_limit() {
        let items: Vec<NewsItem> = (0..30).map(|i| item(&format!("N{i}"))).collect();
        let text = format_news(&items, 20);
        assert!(text.contains("N19"));
        assert!(!text.contains("N20"));
    }

    #[test]
    fn test_company_name_lookup() {
        assert_eq!(fetch_company_name("lkoh"), "Лукойл");
    }
}
