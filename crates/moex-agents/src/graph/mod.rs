//! Graph structure and conditional routing
//!
//! The pipeline is a fixed directed graph walked one node at a time:
//! analyst sub-chains (analyst ⇄ tools, then message pruning), the
//! bull/bear debate, research manager, trader, the three-way risk
//! debate, risk manager and portfolio manager. Routing decisions that
//! depend on state (tool calls pending, debate turn counters) live in
//! [`ConditionalRouter`]; everything else is a fixed edge.

mod signal;

pub use signal::SignalProcessor;

use crate::config::TradingConfig;
use crate::error::{PipelineError, Result};
use crate::state::{AgentState, AnalystKind};

/// Node in the trading graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    /// Analyst LLM turn
    Analyst(AnalystKind),
    /// Tool execution for the preceding analyst turn
    AnalystTools(AnalystKind),
    /// Conversation pruning after an analyst finishes
    ClearMessages(AnalystKind),
    /// Bull side of the investment debate
    BullResearcher,
    /// Bear side of the investment debate
    BearResearcher,
    /// Investment debate judge
    ResearchManager,
    /// Trading plan construction
    Trader,
    /// Aggressive risk debator
    RiskyAnalyst,
    /// Conservative risk debator
    SafeAnalyst,
    /// Balanced risk debator
    NeutralAnalyst,
    /// Risk debate judge
    RiskManager,
    /// Final decision
    PortfolioManager,
    /// Terminal marker
    End,
}

impl GraphNode {
    /// Stable node label for logs and observer events
    pub fn label(self) -> String {
        match self {
            Self::Analyst(kind) => format!("{}_analyst", kind.as_str()),
            Self::AnalystTools(kind) => format!("{}_tools", kind.as_str()),
            Self::ClearMessages(kind) => format!("{}_clear", kind.as_str()),
            Self::BullResearcher => "bull_researcher".to_string(),
            Self::BearResearcher => "bear_researcher".to_string(),
            Self::ResearchManager => "research_manager".to_string(),
            Self::Trader => "trader".to_string(),
            Self::RiskyAnalyst => "risky_analyst".to_string(),
            Self::SafeAnalyst => "safe_analyst".to_string(),
            Self::NeutralAnalyst => "neutral_analyst".to_string(),
            Self::RiskManager => "risk_manager".to_string(),
            Self::PortfolioManager => "portfolio_manager".to_string(),
            Self::End => "end".to_string(),
        }
    }
}

/// State-dependent routing over the fixed graph shape
pub struct ConditionalRouter {
    analysts: Vec<AnalystKind>,
    invest_turn_limit: usize,
    risk_turn_limit: usize,
}

impl ConditionalRouter {
    /// Build the router from a validated configuration
    pub fn from_config(config: &TradingConfig) -> Result<Self> {
        if config.selected_analysts.is_empty() {
            return Err(PipelineError::Config(
                "at least one analyst must be selected".to_string(),
            ));
        }
        Ok(Self {
            analysts: config.selected_analysts.clone(),
            invest_turn_limit: config.invest_turn_limit(),
            risk_turn_limit: config.risk_turn_limit(),
        })
    }

    /// First node of the walk
    pub fn entry(&self) -> GraphNode {
        GraphNode::Analyst(self.analysts[0])
    }

    /// Next node after `node`, given the state the driver just updated
    pub fn next(&self, node: GraphNode, state: &AgentState) -> GraphNode {
        match node {
            GraphNode::Analyst(kind) => {
                // Tool calls pending means the sub-chain continues
                let wants_tools = state
                    .messages
                    .last()
                    .is_some_and(moex_llm::Message::has_tool_uses);
                if wants_tools {
                    GraphNode::AnalystTools(kind)
                } else {
                    GraphNode::ClearMessages(kind)
                }
            }
            GraphNode::AnalystTools(kind) => GraphNode::Analyst(kind),
            GraphNode::ClearMessages(kind) => match self.analyst_after(kind) {
                Some(next) => GraphNode::Analyst(next),
                None => self.invest_debate_node(state),
            },
            GraphNode::BullResearcher | GraphNode::BearResearcher => {
                self.invest_debate_node(state)
            }
            GraphNode::ResearchManager => GraphNode::Trader,
            GraphNode::Trader => self.risk_debate_node(state),
            GraphNode::RiskyAnalyst | GraphNode::SafeAnalyst | GraphNode::NeutralAnalyst => {
                self.risk_debate_node(state)
            }
            GraphNode::RiskManager => GraphNode::PortfolioManager,
            GraphNode::PortfolioManager | GraphNode::End => GraphNode::End,
        }
    }

    fn analyst_after(&self, kind: AnalystKind) -> Option<AnalystKind> {
        let position = self.analysts.iter().position(|&k| k == kind)?;
        self.analysts.get(position + 1).copied()
    }

    /// Speaker for the next investment debate turn, or the judge once
    /// the turn bound is reached. Bull opens and takes even turns.
    fn invest_debate_node(&self, state: &AgentState) -> GraphNode {
        let count = state.investment_debate.count;
        if count >= self.invest_turn_limit {
            GraphNode::ResearchManager
        } else if count % 2 == 0 {
            GraphNode::BullResearcher
        } else {
            GraphNode::BearResearcher
        }
    }

    /// Speaker for the next risk debate turn, cycling
    /// risky → safe → neutral, or the judge at the bound
    fn risk_debate_node(&self, state: &AgentState) -> GraphNode {
        let count = state.risk_debate.count;
        if count >= self.risk_turn_limit {
            GraphNode::RiskManager
        } else {
            match count % 3 {
                0 => GraphNode::RiskyAnalyst,
                1 => GraphNode::SafeAnalyst,
                _ => GraphNode::NeutralAnalyst,
            }
        }
    }
}

/// Creates initial run state and bounds the walk length
pub struct Propagator {
    max_steps: usize,
}

impl Propagator {
    /// Create with the configured step ceiling
    pub fn new(max_steps: usize) -> Self {
        Self { max_steps }
    }

    /// Fresh state for one `(ticker, date)` run
    pub fn create_initial_state(&self, ticker: &str, trade_date: &str) -> AgentState {
        AgentState::new(ticker, trade_date)
    }

    /// Step ceiling for one walk
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateUpdate;
    use moex_llm::{ContentBlock, Message, MessageContent, Role};

    fn router(analysts: Vec<AnalystKind>) -> ConditionalRouter {
        let config = TradingConfig::builder()
            .api_key("k")
            .selected_analysts(analysts)
            .build();
        ConditionalRouter::from_config(&config).unwrap()
    }

    fn tool_use_message() -> Message {
        Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "get_moex_market_data".to_string(),
                input: serde_json::json!({}),
            }])),
        }
    }

    #[test]
    fn test_empty_selection_is_config_error() {
        let config = TradingConfig::builder()
            .api_key("k")
            .selected_analysts(vec![])
            .build();
        assert!(matches!(
            ConditionalRouter::from_config(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_analyst_loops_through_tools() {
        let router = router(vec![AnalystKind::Market]);
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.messages.push(tool_use_message());

        let next = router.next(GraphNode::Analyst(AnalystKind::Market), &state);
        assert_eq!(next, GraphNode::AnalystTools(AnalystKind::Market));
        assert_eq!(
            router.next(next, &state),
            GraphNode::Analyst(AnalystKind::Market)
        );
    }

    #[test]
    fn test_analyst_chain_order() {
        let router = router(vec![AnalystKind::Market, AnalystKind::News]);
        let state = AgentState::new("SBER", "2025-06-02");

        let next = router.next(GraphNode::Analyst(AnalystKind::Market), &state);
        assert_eq!(next, GraphNode::ClearMessages(AnalystKind::Market));
        assert_eq!(
            router.next(next, &state),
            GraphNode::Analyst(AnalystKind::News)
        );
    }

    #[test]
    fn test_last_analyst_enters_debate_with_bull() {
        let router = router(vec![AnalystKind::Market]);
        let state = AgentState::new("SBER", "2025-06-02");
        assert_eq!(
            router.next(GraphNode::ClearMessages(AnalystKind::Market), &state),
            GraphNode::BullResearcher
        );
    }

    #[test]
    fn test_invest_debate_alternates_and_terminates() {
        let router = router(vec![AnalystKind::Market]);
        let mut state = AgentState::new("SBER", "2025-06-02");

        // Default is 2 rounds, so 4 turns: bull, bear, bull, bear
        let expected = [
            GraphNode::BullResearcher,
            GraphNode::BearResearcher,
            GraphNode::BullResearcher,
            GraphNode::BearResearcher,
        ];
        let mut node = GraphNode::ClearMessages(AnalystKind::Market);
        for want in expected {
            node = router.next(node, &state);
            assert_eq!(node, want);
            let side = match node {
                GraphNode::BullResearcher => crate::state::DebateSide::Bull,
                _ => crate::state::DebateSide::Bear,
            };
            state.apply(StateUpdate::InvestDebateTurn {
                side,
                argument: "аргумент".to_string(),
            });
        }
        assert_eq!(router.next(node, &state), GraphNode::ResearchManager);
    }

    #[test]
    fn test_risk_debate_cycles_and_terminates() {
        let router = router(vec![AnalystKind::Market]);
        let mut state = AgentState::new("SBER", "2025-06-02");

        let expected = [
            GraphNode::RiskyAnalyst,
            GraphNode::SafeAnalyst,
            GraphNode::NeutralAnalyst,
            GraphNode::RiskyAnalyst,
            GraphNode::SafeAnalyst,
            GraphNode::NeutralAnalyst,
        ];
        let mut node = GraphNode::Trader;
        for want in expected {
            node = router.next(node, &state);
            assert_eq!(node, want);
            let stance = match node {
                GraphNode::RiskyAnalyst => crate::state::RiskStance::Risky,
                GraphNode::SafeAnalyst => crate::state::RiskStance::Safe,
                _ => crate::state::RiskStance::Neutral,
            };
            state.apply(StateUpdate::RiskDebateTurn {
                stance,
                response: "ответ".to_string(),
            });
        }
        assert_eq!(router.next(node, &state), GraphNode::RiskManager);
    }

    #[test]
    fn test_tail_edges() {
        let router = router(vec![AnalystKind::Market]);
        let state = AgentState::new("SBER", "2025-06-02");
        assert_eq!(
            router.next(GraphNode::ResearchManager, &state),
            GraphNode::Trader
        );
        assert_eq!(
            router.next(GraphNode::RiskManager, &state),
            GraphNode::PortfolioManager
        );
        assert_eq!(
            router.next(GraphNode::PortfolioManager, &state),
            GraphNode::End
        );
    }
}
