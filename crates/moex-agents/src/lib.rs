//! Multi-agent trading pipeline for MOEX equities
//!
//! A run walks a directed graph of LLM-backed stages: the analyst team
//! (market, news, fundamentals) gathers data through tools and writes
//! reports; a bull/bear debate is judged by the research manager; the
//! trader drafts a plan; a three-way risk debate is judged by the risk
//! manager; the portfolio manager makes the final call, which the
//! signal processor reduces to a buy/hold/sell verdict.

pub mod client;
pub mod config;
pub mod error;
pub mod graph;
pub mod prompts;
pub mod runner;
pub mod stages;
pub mod state;
pub mod tools;

pub use client::{Analysis, AnalysisClient};
pub use config::{ProviderKind, TradingConfig, TradingConfigBuilder};
pub use error::{PipelineError, Result};
pub use graph::{ConditionalRouter, GraphNode, Propagator, SignalProcessor};
pub use runner::{
    CompanyResult, IndexSnapshot, MarketSummary, NoopObserver, PipelineObserver,
    PortfolioAnalysis, TradingGraph,
};
pub use state::{
    AgentState, AnalystKind, DebateSide, InvestDebateState, RiskDebateState, RiskStance,
    StateUpdate, Verdict,
};
pub use tools::{Tool, ToolRegistry, Toolkit};
