//! Command-line interface for the moex-agents trading pipeline

mod render;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use moex_agents::{
    AgentState, AnalystKind, PipelineObserver, ProviderKind, TradingConfig, TradingGraph,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "moex-cli")]
#[command(about = "Мульти-агентный анализ российского фондового рынка", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// LLM provider
    #[arg(long, global = true, value_enum, default_value_t = ProviderArg::Deepseek)]
    provider: ProviderArg,

    /// Override the provider's base URL (local deployments)
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Analysis date, YYYY-MM-DD (defaults to today)
    #[arg(long, global = true)]
    date: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline for one company
    Analyze {
        /// MOEX ticker, e.g. SBER
        ticker: String,

        /// Analysts to include, comma-separated
        /// (market, news, fundamentals)
        #[arg(long, default_value = "market,news,fundamentals")]
        analysts: String,

        /// Bull/bear debate rounds
        #[arg(long, default_value_t = 2)]
        debate_rounds: usize,

        /// Risk debate rounds
        #[arg(long, default_value_t = 2)]
        risk_rounds: usize,

        /// Directory for the JSON run log
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// Analyze several tickers sequentially
    Portfolio {
        /// MOEX tickers, comma-separated
        tickers: String,
    },

    /// Show index snapshots and the market news digest
    Overview,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProviderArg {
    Deepseek,
    Gemini,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Deepseek => Self::Deepseek,
            ProviderArg::Gemini => Self::Gemini,
        }
    }
}

fn parse_analysts(input: &str) -> anyhow::Result<Vec<AnalystKind>> {
    let mut analysts = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let kind = match part {
            "market" => AnalystKind::Market,
            "news" => AnalystKind::News,
            "fundamentals" => AnalystKind::Fundamentals,
            other => bail!("неизвестный аналитик '{other}' (ожидается market, news или fundamentals)"),
        };
        if !analysts.contains(&kind) {
            analysts.push(kind);
        }
    }
    Ok(analysts)
}

fn resolve_date(date: Option<String>) -> anyhow::Result<String> {
    match date {
        Some(date) => {
            moex_utils::validate_date(&date).context("некорректная дата")?;
            Ok(date)
        }
        None => Ok(chrono::Local::now().format("%Y-%m-%d").to_string()),
    }
}

/// Prints pipeline progress as stages run
struct ConsoleObserver;

impl PipelineObserver for ConsoleObserver {
    fn on_stage_start(&self, stage: &str, state: &AgentState) {
        println!("▶ {} [{}]", render::stage_title(stage), state.company_ticker);
    }

    fn on_tool_call(&self, _stage: &str, tool: &str) {
        println!("  ⚙ инструмент: {tool}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    moex_utils::init_tracing();

    let args = Args::parse();
    let date = resolve_date(args.date)?;
    let provider: ProviderKind = args.provider.into();

    match args.command {
        Command::Analyze {
            ticker,
            analysts,
            debate_rounds,
            risk_rounds,
            results_dir,
        } => {
            let selected = parse_analysts(&analysts)?;
            let mut builder = TradingConfig::builder()
                .provider(provider)
                .selected_analysts(selected)
                .max_debate_rounds(debate_rounds)
                .max_risk_rounds(risk_rounds);
            if let Some(url) = args.backend_url {
                builder = builder.backend_url(url);
            }
            if let Some(dir) = results_dir {
                builder = builder.results_dir(dir);
            }
            let config = builder.build().with_env_api_key();

            info!(ticker = %ticker, date = %date, "running analysis");
            let graph = TradingGraph::new(config)?.with_observer(Arc::new(ConsoleObserver));
            let (state, verdict) = graph.propagate(&ticker, &date).await?;
            render::print_analysis(&state, verdict);
        }

        Command::Portfolio { tickers } => {
            let tickers: Vec<String> = tickers
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            if tickers.is_empty() {
                bail!("не указано ни одного тикера");
            }

            let mut builder = TradingConfig::builder().provider(provider);
            if let Some(url) = args.backend_url {
                builder = builder.backend_url(url);
            }
            let config = builder.build().with_env_api_key();

            let graph = TradingGraph::new(config)?.with_observer(Arc::new(ConsoleObserver));
            let analysis = graph.analyze_portfolio(&tickers, &date).await;
            render::print_portfolio(&analysis);
        }

        Command::Overview => {
            let mut builder = TradingConfig::builder().provider(provider);
            if let Some(url) = args.backend_url {
                builder = builder.backend_url(url);
            }
            let config = builder.build().with_env_api_key();

            let graph = TradingGraph::new(config)?;
            let summary = graph.market_summary(&date).await;
            render::print_market_summary(&summary);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysts() {
        let analysts = parse_analysts("market, news").unwrap();
        assert_eq!(analysts, vec![AnalystKind::Market, AnalystKind::News]);
    }

    #[test]
    fn test_parse_analysts_deduplicates() {
        let analysts = parse_analysts("market,market").unwrap();
        assert_eq!(analysts, vec![AnalystKind::Market]);
    }

    #[test]
    fn test_parse_analysts_rejects_unknown() {
        assert!(parse_analysts("market,technical").is_err());
    }

    #[test]
    fn test_resolve_date_validates() {
        assert!(resolve_date(Some("2025-06-02".to_string())).is_ok());
        assert!(resolve_date(Some("02.06.2025".to_string())).is_err());
        assert!(resolve_date(None).is_ok());
    }
}
