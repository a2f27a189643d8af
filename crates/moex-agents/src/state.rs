//! Shared pipeline state and typed state updates
//!
//! One [`AgentState`] is created per `(ticker, date)` run and threaded
//! through every stage. Stages never mutate it directly; they return a
//! [`StateUpdate`] which the run driver applies via [`AgentState::apply`],
//! emitting observer events after each mutation.

use moex_llm::Message;
use serde::{Deserialize, Serialize};

/// Which analyst produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalystKind {
    /// Price action and volume analysis
    Market,
    /// News sentiment analysis
    News,
    /// Fundamentals and dividends analysis
    Fundamentals,
}

impl AnalystKind {
    /// All analyst kinds, in pipeline order
    pub const ALL: [Self; 3] = [Self::Market, Self::News, Self::Fundamentals];

    /// Short identifier used in node names and CLI flags
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::News => "news",
            Self::Fundamentals => "fundamentals",
        }
    }
}

/// Speaker in the investment debate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebateSide {
    /// Argues for buying
    Bull,
    /// Argues against buying
    Bear,
}

impl DebateSide {
    /// Russian label used when interleaving debate history
    pub fn label(self) -> &'static str {
        match self {
            Self::Bull => "Аналитик-бык",
            Self::Bear => "Аналитик-медведь",
        }
    }
}

/// Speaker in the risk debate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStance {
    /// Aggressive, return-seeking position
    Risky,
    /// Conservative, capital-preservation position
    Safe,
    /// Balanced position
    Neutral,
}

impl RiskStance {
    /// Russian label used when interleaving debate history
    pub fn label(self) -> &'static str {
        match self {
            Self::Risky => "Агрессивный аналитик",
            Self::Safe => "Консервативный аналитик",
            Self::Neutral => "Нейтральный аналитик",
        }
    }
}

/// Canonical trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// Buy recommendation
    Buy,
    /// Hold recommendation
    Hold,
    /// Sell recommendation
    Sell,
    /// No recognizable signal in the final decision text
    Unknown,
}

impl Verdict {
    /// Canonical English token
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Russian verdict word as it appears in model output
    pub fn as_russian(self) -> &'static str {
        match self {
            Self::Buy => "ПОКУПАТЬ",
            Self::Hold => "ДЕРЖАТЬ",
            Self::Sell => "ПРОДАВАТЬ",
            Self::Unknown => "НЕИЗВЕСТНО",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Investment debate sub-state (bull vs bear)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvestDebateState {
    /// All bull turns, concatenated
    pub bull_history: String,
    /// All bear turns, concatenated
    pub bear_history: String,
    /// Interleaved transcript of the whole debate
    pub history: String,
    /// Most recent turn
    pub current_response: String,
    /// Research manager's verdict on the debate
    pub judge_decision: String,
    /// Participant turns taken so far
    pub count: usize,
}

/// Risk debate sub-state (risky vs safe vs neutral)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskDebateState {
    /// All risky-analyst turns, concatenated
    pub risky_history: String,
    /// All safe-analyst turns, concatenated
    pub safe_history: String,
    /// All neutral-analyst turns, concatenated
    pub neutral_history: String,
    /// Interleaved transcript of the whole debate
    pub history: String,
    /// Most recent turn
    pub current_response: String,
    /// Risk manager's verdict on the debate
    pub judge_decision: String,
    /// Participant turns taken so far
    pub count: usize,
}

/// Shared state for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Uppercased MOEX ticker
    pub company_ticker: String,
    /// Trade date, `YYYY-MM-DD`
    pub trade_date: String,

    /// Market analyst's report; written at most once
    pub market_report: Option<String>,
    /// News analyst's report; written at most once
    pub news_report: Option<String>,
    /// Fundamentals analyst's report; written at most once
    pub fundamentals_report: Option<String>,

    /// Bull/bear debate sub-state
    pub investment_debate: InvestDebateState,
    /// Research manager's investment plan
    pub investment_plan: Option<String>,
    /// Trader's concrete plan
    pub trader_investment_plan: Option<String>,
    /// Risky/safe/neutral debate sub-state
    pub risk_debate: RiskDebateState,
    /// Portfolio manager's decision; the only field the signal
    /// processor consumes
    pub final_trade_decision: Option<String>,

    /// Conversation turns within the current analyst sub-chain;
    /// cleared between analysts
    pub messages: Vec<Message>,
}

impl AgentState {
    /// Fresh state for a run (ticker is uppercased)
    pub fn new(ticker: &str, trade_date: &str) -> Self {
        Self {
            company_ticker: ticker.to_uppercase(),
            trade_date: trade_date.to_string(),
            market_report: None,
            news_report: None,
            fundamentals_report: None,
            investment_debate: InvestDebateState::default(),
            investment_plan: None,
            trader_investment_plan: None,
            risk_debate: RiskDebateState::default(),
            final_trade_decision: None,
            messages: Vec::new(),
        }
    }

    /// Report slot for one analyst
    pub fn report(&self, kind: AnalystKind) -> Option<&str> {
        match kind {
            AnalystKind::Market => self.market_report.as_deref(),
            AnalystKind::News => self.news_report.as_deref(),
            AnalystKind::Fundamentals => self.fundamentals_report.as_deref(),
        }
    }

    /// All analyst reports concatenated for downstream prompts
    pub fn combined_reports(&self) -> String {
        let mut out = String::new();
        for (title, report) in [
            ("Рыночный отчет", &self.market_report),
            ("Новостной отчет", &self.news_report),
            ("Фундаментальный отчет", &self.fundamentals_report),
        ] {
            if let Some(text) = report {
                out.push_str(&format!("## {title}\n{text}\n\n"));
            }
        }
        out
    }

    /// Apply one typed update. Report fields are write-once: a second
    /// write to the same slot is ignored.
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::AnalystTurn {
                kind,
                message,
                report,
            } => {
                self.messages.push(message);
                if let Some(text) = report {
                    let slot = match kind {
                        AnalystKind::Market => &mut self.market_report,
                        AnalystKind::News => &mut self.news_report,
                        AnalystKind::Fundamentals => &mut self.fundamentals_report,
                    };
                    if slot.is_none() {
                        *slot = Some(text);
                    }
                }
            }
            StateUpdate::ToolResults { messages } => {
                self.messages.extend(messages);
            }
            StateUpdate::ClearMessages => {
                self.messages.clear();
            }
            StateUpdate::InvestDebateTurn { side, argument } => {
                let labeled = format!("{}: {}", side.label(), argument);
                match side {
                    DebateSide::Bull => append_line(&mut self.investment_debate.bull_history, &labeled),
                    DebateSide::Bear => append_line(&mut self.investment_debate.bear_history, &labeled),
                }
                append_line(&mut self.investment_debate.history, &labeled);
                self.investment_debate.current_response = labeled;
                self.investment_debate.count += 1;
            }
            StateUpdate::InvestJudge { decision } => {
                self.investment_debate.judge_decision.clone_from(&decision);
                if self.investment_plan.is_none() {
                    self.investment_plan = Some(decision);
                }
            }
            StateUpdate::TraderPlan { plan } => {
                if self.trader_investment_plan.is_none() {
                    self.trader_investment_plan = Some(plan);
                }
            }
            StateUpdate::RiskDebateTurn { stance, response } => {
                let labeled = format!("{}: {}", stance.label(), response);
                match stance {
                    RiskStance::Risky => append_line(&mut self.risk_debate.risky_history, &labeled),
                    RiskStance::Safe => append_line(&mut self.risk_debate.safe_history, &labeled),
                    RiskStance::Neutral => {
                        append_line(&mut self.risk_debate.neutral_history, &labeled);
                    }
                }
                append_line(&mut self.risk_debate.history, &labeled);
                self.risk_debate.current_response = labeled;
                self.risk_debate.count += 1;
            }
            StateUpdate::RiskJudge { decision } => {
                self.risk_debate.judge_decision = decision;
            }
            StateUpdate::FinalDecision { decision } => {
                if self.final_trade_decision.is_none() {
                    self.final_trade_decision = Some(decision);
                }
            }
        }
    }
}

fn append_line(history: &mut String, line: &str) {
    if !history.is_empty() {
        history.push('\n');
    }
    history.push_str(line);
}

/// Typed mutation produced by a stage and applied by the run driver
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Analyst produced a message; `report` is set only when the turn
    /// is final (no tool calls requested)
    AnalystTurn {
        /// Which analyst
        kind: AnalystKind,
        /// Assistant message to append to the conversation
        message: Message,
        /// Final report text, if the turn finished the sub-chain
        report: Option<String>,
    },
    /// Tool results to append to the conversation
    ToolResults {
        /// One tool-result message per executed call
        messages: Vec<Message>,
    },
    /// Clear the conversation between analyst sub-chains
    ClearMessages,
    /// One bull or bear turn
    InvestDebateTurn {
        /// Who spoke
        side: DebateSide,
        /// Argument text
        argument: String,
    },
    /// Research manager's decision; also fills `investment_plan`
    InvestJudge {
        /// Decision text
        decision: String,
    },
    /// Trader's plan
    TraderPlan {
        /// Plan text
        plan: String,
    },
    /// One risky/safe/neutral turn
    RiskDebateTurn {
        /// Who spoke
        stance: RiskStance,
        /// Response text
        response: String,
    },
    /// Risk manager's decision on the risk debate
    RiskJudge {
        /// Decision text
        decision: String,
    },
    /// Portfolio manager's final decision
    FinalDecision {
        /// Decision text containing the sentinel line
        decision: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_uppercases_ticker() {
        let state = AgentState::new("sber", "2025-06-02");
        assert_eq!(state.company_ticker, "SBER");
        assert_eq!(state.investment_debate.count, 0);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn test_report_write_once() {
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.apply(StateUpdate::AnalystTurn {
            kind: AnalystKind::Market,
            message: Message::assistant("отчет 1"),
            report: Some("отчет 1".to_string()),
        });
        state.apply(StateUpdate::AnalystTurn {
            kind: AnalystKind::Market,
            message: Message::assistant("отчет 2"),
            report: Some("отчет 2".to_string()),
        });

        assert_eq!(state.market_report.as_deref(), Some("отчет 1"));
        assert_eq!(state.messages.len(), 2);
    }

    #[test]
    fn test_debate_turn_updates_histories_and_count() {
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.apply(StateUpdate::InvestDebateTurn {
            side: DebateSide::Bull,
            argument: "рост".to_string(),
        });
        state.apply(StateUpdate::InvestDebateTurn {
            side: DebateSide::Bear,
            argument: "риски".to_string(),
        });

        assert_eq!(state.investment_debate.count, 2);
        assert!(state.investment_debate.bull_history.contains("рост"));
        assert!(state.investment_debate.bear_history.contains("риски"));
        assert!(state.investment_debate.history.contains("Аналитик-бык"));
        assert!(state.investment_debate.history.contains("Аналитик-медведь"));
        assert!(state.investment_debate.current_response.contains("риски"));
    }

    #[test]
    fn test_risk_turn_cycles_histories() {
        let mut state = AgentState::new("SBER", "2025-06-02");
        for (stance, text) in [
            (RiskStance::Risky, "наращивать"),
            (RiskStance::Safe, "сокращать"),
            (RiskStance::Neutral, "баланс"),
        ] {
            state.apply(StateUpdate::RiskDebateTurn {
                stance,
                response: text.to_string(),
            });
        }

        assert_eq!(state.risk_debate.count, 3);
        assert!(state.risk_debate.risky_history.contains("наращивать"));
        assert!(state.risk_debate.safe_history.contains("сокращать"));
        assert!(state.risk_debate.neutral_history.contains("баланс"));
    }

    #[test]
    fn test_clear_messages() {
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.messages.push(Message::user("x"));
        state.apply(StateUpdate::ClearMessages);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn test_final_decision_write_once() {
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.apply(StateUpdate::FinalDecision {
            decision: "ПОКУПАТЬ".to_string(),
        });
        state.apply(StateUpdate::FinalDecision {
            decision: "ПРОДАВАТЬ".to_string(),
        });
        assert_eq!(state.final_trade_decision.as_deref(), Some("ПОКУПАТЬ"));
    }

    #[test]
    fn test_combined_reports_skips_missing() {
        let mut state = AgentState::new("SBER", "2025-06-02");
        state.market_report = Some("тренд вверх".to_string());
        let combined = state.combined_reports();
        assert!(combined.contains("Рыночный отчет"));
        assert!(!combined.contains("Новостной отчет"));
    }
}
