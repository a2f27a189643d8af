//! Risk debate, risk manager and portfolio manager stages

use super::{LlmHandle, Stage};
use crate::error::Result;
use crate::prompts;
use crate::state::{AgentState, RiskStance, StateUpdate};
use async_trait::async_trait;
use tracing::instrument;

/// One participant of the risk debate; the stance picks the prompt
/// (quick model)
pub struct RiskDebator {
    stance: RiskStance,
    llm: LlmHandle,
    name: String,
}

impl RiskDebator {
    /// Create a debator for one stance
    pub fn new(stance: RiskStance, llm: LlmHandle) -> Self {
        let name = match stance {
            RiskStance::Risky => "risky_analyst",
            RiskStance::Safe => "safe_analyst",
            RiskStance::Neutral => "neutral_analyst",
        };
        Self {
            stance,
            llm,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Stage for RiskDebator {
    #[instrument(skip(self, state), fields(stage = %self.name, turn = state.risk_debate.count))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::risk_turn(self.stance, state)?;
        let response = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::RiskDebateTurn {
            stance: self.stance,
            response,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Judges the risk debate and adjusts the trading plan (deep model)
pub struct RiskManager {
    llm: LlmHandle,
}

impl RiskManager {
    /// Create the risk manager
    pub fn new(llm: LlmHandle) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for RiskManager {
    #[instrument(skip(self, state), fields(stage = "risk_manager"))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::risk_manager(state)?;
        let decision = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::RiskJudge { decision })
    }

    fn name(&self) -> &str {
        "risk_manager"
    }
}

/// Makes the final trade decision ending with the sentinel line
/// (deep model)
pub struct PortfolioManager {
    llm: LlmHandle,
}

impl PortfolioManager {
    /// Create the portfolio manager
    pub fn new(llm: LlmHandle) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for PortfolioManager {
    #[instrument(skip(self, state), fields(stage = "portfolio_manager"))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::portfolio_manager(state)?;
        let decision = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::FinalDecision { decision })
    }

    fn name(&self) -> &str {
        "portfolio_manager"
    }
}
