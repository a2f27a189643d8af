//! Investment debate, research manager and trader stages

use super::{LlmHandle, Stage};
use crate::error::Result;
use crate::prompts;
use crate::state::{AgentState, DebateSide, StateUpdate};
use async_trait::async_trait;
use tracing::instrument;

/// Bull side of the investment debate (quick model)
pub struct BullResearcher {
    llm: LlmHandle,
}

impl BullResearcher {
    /// Create the bull researcher
    pub fn new(llm: LlmHandle) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for BullResearcher {
    #[instrument(skip(self, state), fields(stage = "bull_researcher", turn = state.investment_debate.count))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::debate_turn(DebateSide::Bull, state)?;
        let argument = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::InvestDebateTurn {
            side: DebateSide::Bull,
            argument,
        })
    }

    fn name(&self) -> &str {
        "bull_researcher"
    }
}

/// Bear side of the investment debate (quick model)
pub struct BearResearcher {
    llm: LlmHandle,
}

impl BearResearcher {
    /// Create the bear researcher
    pub fn new(llm: LlmHandle) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for BearResearcher {
    #[instrument(skip(self, state), fields(stage = "bear_researcher", turn = state.investment_debate.count))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::debate_turn(DebateSide::Bear, state)?;
        let argument = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::InvestDebateTurn {
            side: DebateSide::Bear,
            argument,
        })
    }

    fn name(&self) -> &str {
        "bear_researcher"
    }
}

/// Judges the investment debate and produces the investment plan
/// (deep model)
pub struct ResearchManager {
    llm: LlmHandle,
}

impl ResearchManager {
    /// Create the research manager
    pub fn new(llm: LlmHandle) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for ResearchManager {
    #[instrument(skip(self, state), fields(stage = "research_manager"))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::research_manager(state)?;
        let decision = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::InvestJudge { decision })
    }

    fn name(&self) -> &str {
        "research_manager"
    }
}

/// Turns the investment plan into a concrete trading plan (deep model)
pub struct Trader {
    llm: LlmHandle,
}

impl Trader {
    /// Create the trader stage
    pub fn new(llm: LlmHandle) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Stage for Trader {
    #[instrument(skip(self, state), fields(stage = "trader"))]
    async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = prompts::trader(state)?;
        let plan = self.llm.prompt_text(prompt).await?;
        Ok(StateUpdate::TraderPlan { plan })
    }

    fn name(&self) -> &str {
        "trader"
    }
}
