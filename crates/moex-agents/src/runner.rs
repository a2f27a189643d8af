//! Run driver
//!
//! [`TradingGraph`] owns the providers, the toolkit and the routing,
//! and walks the graph one node at a time: run the node's stage, apply
//! the returned update, emit observer events, pick the next node. A
//! run ends at the terminal node or at the step ceiling.

use crate::config::{ProviderKind, TradingConfig};
use crate::error::{PipelineError, Result};
use crate::graph::{ConditionalRouter, GraphNode, Propagator, SignalProcessor};
use crate::stages::{
    AnalystStage, BearResearcher, BullResearcher, ClearMessagesStage, LlmHandle,
    PortfolioManager, ResearchManager, RiskDebator, RiskManager, Stage, ToolExecutionStage,
    Trader,
};
use crate::state::{AgentState, RiskStance, Verdict};
use crate::tools::Toolkit;
use moex_llm::providers::{DeepseekConfig, DeepseekProvider, GeminiConfig, GeminiProvider};
use moex_llm::{ContentBlock, LlmProvider};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Callbacks emitted by the run driver as the walk progresses
///
/// Default implementations are no-ops, so an observer implements only
/// the events it cares about.
pub trait PipelineObserver: Send + Sync {
    /// A node is about to run
    fn on_stage_start(&self, _stage: &str, _state: &AgentState) {}

    /// A node's update was applied to the state
    fn on_state_update(&self, _stage: &str, _state: &AgentState) {}

    /// A tool call is about to execute
    fn on_tool_call(&self, _stage: &str, _tool: &str) {}

    /// The walk finished and the verdict was extracted
    fn on_complete(&self, _state: &AgentState, _verdict: Verdict) {}
}

/// Observer that ignores every event
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Outcome for one ticker in a portfolio run
#[derive(Debug, Clone, Serialize)]
pub struct CompanyResult {
    /// Uppercased ticker
    pub ticker: String,
    /// Canonical verdict, or `ERROR` when the run failed
    pub recommendation: String,
    /// Full final-decision text (empty on failure)
    pub final_decision: String,
    /// Error description when the run failed
    pub error: Option<String>,
}

/// Result of a sequential portfolio run
#[derive(Debug, Serialize)]
pub struct PortfolioAnalysis {
    /// Analysis date
    pub date: String,
    /// Per-ticker outcomes, in input order
    pub companies: Vec<CompanyResult>,
    /// Number of buy recommendations
    pub buy_count: usize,
    /// Number of hold recommendations
    pub hold_count: usize,
    /// Number of sell recommendations
    pub sell_count: usize,
}

/// One index row of the market summary
#[derive(Debug, Clone, Serialize)]
pub struct IndexSnapshot {
    /// Index name (IMOEX, RTSI, ...)
    pub name: String,
    /// Formatted snapshot, or embedded error text
    pub data: String,
}

/// Market-wide summary for the CLI overview command
#[derive(Debug, Serialize)]
pub struct MarketSummary {
    /// Summary date
    pub date: String,
    /// Configured index snapshots
    pub indices: Vec<IndexSnapshot>,
    /// RBC + Smart-Lab digest
    pub overview: String,
}

/// The assembled trading pipeline for one configuration
pub struct TradingGraph {
    config: TradingConfig,
    router: ConditionalRouter,
    propagator: Propagator,
    signal: SignalProcessor,
    toolkit: Arc<Toolkit>,
    deep: LlmHandle,
    quick: LlmHandle,
    observer: Arc<dyn PipelineObserver>,
}

impl TradingGraph {
    /// Build the graph from a configuration, constructing the
    /// configured provider. Fails fast on invalid configuration,
    /// before any network call.
    pub fn new(config: TradingConfig) -> Result<Self> {
        config.validate()?;
        // validate() guarantees the key is present and non-empty
        let api_key = config.api_key.clone().ok_or_else(|| {
            PipelineError::Config("api_key is not set".to_string())
        })?;

        let provider: Arc<dyn LlmProvider> = match config.provider {
            ProviderKind::Deepseek => {
                let mut provider_config = DeepseekConfig::new(api_key);
                if let Some(url) = &config.backend_url {
                    provider_config = provider_config.with_api_base(url);
                }
                Arc::new(DeepseekProvider::with_config(provider_config)?)
            }
            ProviderKind::Gemini => {
                let mut provider_config = GeminiConfig::new(api_key);
                if let Some(url) = &config.backend_url {
                    provider_config = provider_config.with_api_base(url);
                }
                Arc::new(GeminiProvider::with_config(provider_config)?)
            }
        };

        Self::with_providers(config, provider.clone(), provider, Arc::new(Toolkit::new()))
    }

    /// Build the graph over prebuilt providers and toolkit. The deep
    /// provider serves judges, trader and portfolio manager; the quick
    /// provider serves analysts and debate turns.
    pub fn with_providers(
        config: TradingConfig,
        deep_provider: Arc<dyn LlmProvider>,
        quick_provider: Arc<dyn LlmProvider>,
        toolkit: Arc<Toolkit>,
    ) -> Result<Self> {
        let router = ConditionalRouter::from_config(&config)?;
        let deep = LlmHandle {
            provider: deep_provider,
            model: config.deep_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        let quick = LlmHandle {
            provider: quick_provider,
            model: config.quick_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };
        Ok(Self {
            propagator: Propagator::new(config.max_steps),
            signal: SignalProcessor::new(),
            router,
            toolkit,
            deep,
            quick,
            observer: Arc::new(NoopObserver),
            config,
        })
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Configuration this graph was built from
    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    fn stage_for(&self, node: GraphNode) -> Option<Box<dyn Stage>> {
        match node {
            GraphNode::Analyst(kind) => Some(Box::new(AnalystStage::new(
                kind,
                self.quick.clone(),
                self.toolkit.clone(),
            ))),
            GraphNode::AnalystTools(kind) => {
                Some(Box::new(ToolExecutionStage::new(kind, self.toolkit.clone())))
            }
            GraphNode::ClearMessages(_) => Some(Box::new(ClearMessagesStage)),
            GraphNode::BullResearcher => Some(Box::new(BullResearcher::new(self.quick.clone()))),
            GraphNode::BearResearcher => Some(Box::new(BearResearcher::new(self.quick.clone()))),
            GraphNode::ResearchManager => Some(Box::new(ResearchManager::new(self.deep.clone()))),
            GraphNode::Trader => Some(Box::new(Trader::new(self.deep.clone()))),
            GraphNode::RiskyAnalyst => Some(Box::new(RiskDebator::new(
                RiskStance::Risky,
                self.quick.clone(),
            ))),
            GraphNode::SafeAnalyst => Some(Box::new(RiskDebator::new(
                RiskStance::Safe,
                self.quick.clone(),
            ))),
            GraphNode::NeutralAnalyst => Some(Box::new(RiskDebator::new(
                RiskStance::Neutral,
                self.quick.clone(),
            ))),
            GraphNode::RiskManager => Some(Box::new(RiskManager::new(self.deep.clone()))),
            GraphNode::PortfolioManager => {
                Some(Box::new(PortfolioManager::new(self.deep.clone())))
            }
            GraphNode::End => None,
        }
    }

    /// Run the full pipeline for one ticker and date
    #[instrument(skip(self), fields(provider = self.config.provider.as_str()))]
    pub async fn propagate(&self, ticker: &str, trade_date: &str) -> Result<(AgentState, Verdict)> {
        let mut state = self.propagator.create_initial_state(ticker, trade_date);
        let mut node = self.router.entry();
        let mut steps = 0usize;

        info!(ticker = %state.company_ticker, date = %trade_date, "starting pipeline run");

        while let Some(stage) = self.stage_for(node) {
            steps += 1;
            if steps > self.propagator.max_steps() {
                return Err(PipelineError::StepLimitExceeded {
                    limit: self.propagator.max_steps(),
                });
            }

            let label = node.label();
            self.observer.on_stage_start(&label, &state);

            if matches!(node, GraphNode::AnalystTools(_)) {
                if let Some(message) = state.messages.last() {
                    for block in message.tool_uses() {
                        if let ContentBlock::ToolUse { name, .. } = block {
                            self.observer.on_tool_call(&label, name);
                        }
                    }
                }
            }

            let update = match stage.run(&state).await {
                Ok(update) => update,
                Err(PipelineError::Llm(source)) => {
                    return Err(PipelineError::Stage {
                        stage: label,
                        source,
                        partial: Box::new(state),
                    });
                }
                Err(e) => return Err(e),
            };

            state.apply(update);
            self.observer.on_state_update(&label, &state);
            node = self.router.next(node, &state);
        }

        let decision_text = state.final_trade_decision.clone().unwrap_or_default();
        let verdict = self.signal.process_signal(&decision_text);

        if let Some(dir) = self.config.results_dir.clone() {
            self.write_run_log(&dir, &state)?;
        }

        info!(ticker = %state.company_ticker, verdict = %verdict, steps, "pipeline run finished");
        self.observer.on_complete(&state, verdict);
        Ok((state, verdict))
    }

    /// Analyze a list of tickers sequentially. A failed ticker is
    /// recorded as `ERROR` and does not abort the remaining tickers.
    pub async fn analyze_portfolio(
        &self,
        tickers: &[String],
        trade_date: &str,
    ) -> PortfolioAnalysis {
        let mut companies = Vec::with_capacity(tickers.len());
        let mut buy_count = 0;
        let mut hold_count = 0;
        let mut sell_count = 0;

        for ticker in tickers {
            match self.propagate(ticker, trade_date).await {
                Ok((state, verdict)) => {
                    match verdict {
                        Verdict::Buy => buy_count += 1,
                        Verdict::Hold => hold_count += 1,
                        Verdict::Sell => sell_count += 1,
                        Verdict::Unknown => {}
                    }
                    companies.push(CompanyResult {
                        ticker: state.company_ticker.clone(),
                        recommendation: verdict.as_str().to_string(),
                        final_decision: state.final_trade_decision.unwrap_or_default(),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "portfolio ticker failed");
                    companies.push(CompanyResult {
                        ticker: ticker.to_uppercase(),
                        recommendation: "ERROR".to_string(),
                        final_decision: String::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        PortfolioAnalysis {
            date: trade_date.to_string(),
            companies,
            buy_count,
            hold_count,
            sell_count,
        }
    }

    /// Gather snapshots of the configured indices plus the news
    /// digest. Per-index failures come back as embedded error text.
    pub async fn market_summary(&self, date: &str) -> MarketSummary {
        let mut indices = Vec::with_capacity(self.config.market_indices.len());
        for name in &self.config.market_indices {
            let data = moex_data::interface::fetch_index(name).await;
            indices.push(IndexSnapshot {
                name: name.clone(),
                data,
            });
        }

        MarketSummary {
            date: date.to_string(),
            indices,
            overview: moex_data::interface::fetch_market_overview().await,
        }
    }

    fn write_run_log(&self, dir: &Path, state: &AgentState) -> Result<()> {
        let entry = json!({
            "company_ticker": state.company_ticker,
            "trade_date": state.trade_date,
            "market_report": state.market_report.as_deref().unwrap_or(""),
            "news_report": state.news_report.as_deref().unwrap_or(""),
            "fundamentals_report": state.fundamentals_report.as_deref().unwrap_or(""),
            "investment_debate_state": {
                "bull_history": state.investment_debate.bull_history,
                "bear_history": state.investment_debate.bear_history,
                "history": state.investment_debate.history,
                "current_response": state.investment_debate.current_response,
                "judge_decision": state.investment_debate.judge_decision,
            },
            "trader_investment_decision": state.trader_investment_plan.as_deref().unwrap_or(""),
            "risk_debate_state": {
                "risky_history": state.risk_debate.risky_history,
                "safe_history": state.risk_debate.safe_history,
                "neutral_history": state.risk_debate.neutral_history,
                "history": state.risk_debate.history,
                "judge_decision": state.risk_debate.judge_decision,
            },
            "investment_plan": state.investment_plan.as_deref().unwrap_or(""),
            "final_trade_decision": state.final_trade_decision.as_deref().unwrap_or(""),
            "config_used": {
                "llm_provider": self.config.provider.as_str(),
                "deep_model": self.config.deep_model,
                "fast_model": self.config.quick_model,
            },
        });

        // The log is keyed by date, matching the historical file schema
        let mut log = serde_json::Map::new();
        log.insert(state.trade_date.clone(), entry);

        let ticker_dir = dir.join(&state.company_ticker);
        std::fs::create_dir_all(&ticker_dir)?;
        let path = ticker_dir.join(format!("full_states_log_{}.json", state.trade_date));
        std::fs::write(&path, serde_json::to_string_pretty(&log)?)?;
        info!(path = %path.display(), "run log written");
        Ok(())
    }
}
