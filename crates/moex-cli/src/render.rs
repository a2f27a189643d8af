//! Console output for analysis results

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use moex_agents::{AgentState, MarketSummary, PortfolioAnalysis, Verdict};

/// Russian title for a pipeline stage label
pub fn stage_title(stage: &str) -> &str {
    match stage {
        "market_analyst" => "Аналитик рынка",
        "market_tools" | "news_tools" | "fundamentals_tools" => "Сбор данных",
        "market_clear" | "news_clear" | "fundamentals_clear" => "Очистка контекста",
        "news_analyst" => "Новостной аналитик",
        "fundamentals_analyst" => "Фундаментальный аналитик",
        "bull_researcher" => "Бычий исследователь",
        "bear_researcher" => "Медвежий исследователь",
        "research_manager" => "Менеджер исследований",
        "trader" => "Трейдер",
        "risky_analyst" => "Агрессивный аналитик",
        "safe_analyst" => "Консервативный аналитик",
        "neutral_analyst" => "Нейтральный аналитик",
        "risk_manager" => "Риск-менеджер",
        "portfolio_manager" => "Портфельный менеджер",
        other => other,
    }
}

fn verdict_marker(verdict: &str) -> &'static str {
    match verdict {
        "BUY" => "🟢",
        "SELL" => "🔴",
        "HOLD" => "🟡",
        "ERROR" => "⚠",
        _ => "⚪",
    }
}

/// Print the outcome of one full pipeline run
pub fn print_analysis(state: &AgentState, verdict: Verdict) {
    println!();
    println!(
        "Анализ {} на {}",
        state.company_ticker, state.trade_date
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Этап", "Результат"]);

    for (title, content) in [
        ("Рыночный отчет", state.market_report.as_deref()),
        ("Новостной отчет", state.news_report.as_deref()),
        ("Фундаментальный отчет", state.fundamentals_report.as_deref()),
        ("Инвестиционный план", state.investment_plan.as_deref()),
        ("План трейдера", state.trader_investment_plan.as_deref()),
    ] {
        if let Some(text) = content {
            table.add_row(vec![Cell::new(title), Cell::new(truncate(text, 400))]);
        }
    }
    println!("{table}");

    if let Some(decision) = &state.final_trade_decision {
        println!();
        println!("{decision}");
    }

    println!();
    println!(
        "{} Итоговая рекомендация: {} ({})",
        verdict_marker(verdict.as_str()),
        verdict.as_russian(),
        verdict.as_str()
    );
}

/// Print the portfolio table and counts
pub fn print_portfolio(analysis: &PortfolioAnalysis) {
    println!();
    println!("Портфель на {}", analysis.date);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Тикер", "Рекомендация", "Комментарий"]);

    for company in &analysis.companies {
        let note = company
            .error
            .clone()
            .unwrap_or_else(|| truncate(&company.final_decision, 80));
        table.add_row(vec![
            Cell::new(&company.ticker),
            Cell::new(format!(
                "{} {}",
                verdict_marker(&company.recommendation),
                company.recommendation
            )),
            Cell::new(note),
        ]);
    }
    println!("{table}");

    println!(
        "Покупать: {}  Держать: {}  Продавать: {}",
        analysis.buy_count, analysis.hold_count, analysis.sell_count
    );
}

/// Print index snapshots and the news digest
pub fn print_market_summary(summary: &MarketSummary) {
    println!();
    println!("Обзор российского рынка на {}", summary.date);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Индекс", "Данные"]);
    for index in &summary.indices {
        table.add_row(vec![
            Cell::new(&index.name),
            Cell::new(truncate(&index.data, 200)),
        ]);
    }
    println!("{table}");

    println!();
    println!("{}", summary.overview);
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "российский рынок";
        assert_eq!(truncate(text, 100), text);
        let short = truncate(text, 10);
        assert!(short.ends_with('…'));
        assert_eq!(short.chars().count(), 11);
    }

    #[test]
    fn test_stage_title_known_and_unknown() {
        assert_eq!(stage_title("trader"), "Трейдер");
        assert_eq!(stage_title("custom_node"), "custom_node");
    }
}
