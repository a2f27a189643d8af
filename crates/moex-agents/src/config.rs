//! Pipeline configuration
//!
//! One [`TradingConfig`] value is constructed up front and passed into
//! the graph constructor. There is no global mutable configuration;
//! everything a stage needs travels through the config or the state.

use crate::error::{PipelineError, Result};
use crate::state::AnalystKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which LLM provider backs the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// DeepSeek (OpenAI-compatible API)
    Deepseek,
    /// Google Gemini
    Gemini,
}

impl ProviderKind {
    /// Default deep-thinking model for this provider
    pub fn default_deep_model(self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek-reasoner",
            Self::Gemini => "gemini-2.5-pro",
        }
    }

    /// Default quick-thinking model for this provider
    pub fn default_quick_model(self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek-chat",
            Self::Gemini => "gemini-2.5-flash",
        }
    }

    /// Environment variable holding the provider's API key
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Deepseek => "DEEPSEEK_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Provider name for logs and summaries
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek",
            Self::Gemini => "gemini",
        }
    }
}

/// Configuration for one trading graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// LLM provider
    pub provider: ProviderKind,
    /// Model for judges, trader and portfolio manager
    pub deep_model: String,
    /// Model for analysts and debate turns
    pub quick_model: String,
    /// API key for the selected provider
    pub api_key: Option<String>,
    /// Override for the provider's base URL (local deployments)
    pub backend_url: Option<String>,

    /// Full bull/bear cycles before the research manager judges
    pub max_debate_rounds: usize,
    /// Full risky/safe/neutral cycles before the risk manager judges
    pub max_risk_rounds: usize,
    /// Safety ceiling on total graph steps
    pub max_steps: usize,

    /// Max tokens per completion
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: f32,

    /// Analysts included in the run; must be non-empty
    pub selected_analysts: Vec<AnalystKind>,
    /// Indices included in the market summary
    pub market_indices: Vec<String>,
    /// When set, the JSON run log is written under this directory
    pub results_dir: Option<PathBuf>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Deepseek,
            deep_model: ProviderKind::Deepseek.default_deep_model().to_string(),
            quick_model: ProviderKind::Deepseek.default_quick_model().to_string(),
            api_key: None,
            backend_url: None,
            max_debate_rounds: 2,
            max_risk_rounds: 2,
            max_steps: 150,
            max_tokens: 4000,
            temperature: 0.7,
            selected_analysts: AnalystKind::ALL.to_vec(),
            market_indices: ["IMOEX", "RTSI", "MOEXFN", "MOEXOG", "MOEXMM"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            results_dir: None,
        }
    }
}

impl TradingConfig {
    /// Create a configuration builder
    pub fn builder() -> TradingConfigBuilder {
        TradingConfigBuilder::default()
    }

    /// Load the API key for the selected provider from the environment
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var(self.provider.api_key_var()).ok();
        }
        self
    }

    /// Validate the configuration; fails fast before any network call
    pub fn validate(&self) -> Result<()> {
        if self.selected_analysts.is_empty() {
            return Err(PipelineError::Config(
                "at least one analyst must be selected".to_string(),
            ));
        }

        if self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(PipelineError::Config(format!(
                "{} is not set for provider '{}'",
                self.provider.api_key_var(),
                self.provider.as_str()
            )));
        }

        if self.max_debate_rounds == 0 || self.max_risk_rounds == 0 {
            return Err(PipelineError::Config(
                "debate round limits must be greater than 0".to_string(),
            ));
        }

        if self.max_steps == 0 {
            return Err(PipelineError::Config(
                "max_steps must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Investment debate turn bound: one round is a full bull+bear cycle
    pub fn invest_turn_limit(&self) -> usize {
        2 * self.max_debate_rounds
    }

    /// Risk debate turn bound: one round is a full risky+safe+neutral cycle
    pub fn risk_turn_limit(&self) -> usize {
        3 * self.max_risk_rounds
    }
}

/// Builder for [`TradingConfig`]
#[derive(Debug, Default)]
pub struct TradingConfigBuilder {
    provider: Option<ProviderKind>,
    deep_model: Option<String>,
    quick_model: Option<String>,
    api_key: Option<String>,
    backend_url: Option<String>,
    max_debate_rounds: Option<usize>,
    max_risk_rounds: Option<usize>,
    max_steps: Option<usize>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    selected_analysts: Option<Vec<AnalystKind>>,
    market_indices: Option<Vec<String>>,
    results_dir: Option<PathBuf>,
}

impl TradingConfigBuilder {
    /// Set the LLM provider
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the deep-thinking model
    pub fn deep_model(mut self, model: impl Into<String>) -> Self {
        self.deep_model = Some(model.into());
        self
    }

    /// Set the quick-thinking model
    pub fn quick_model(mut self, model: impl Into<String>) -> Self {
        self.quick_model = Some(model.into());
        self
    }

    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set a custom backend URL
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    /// Set the investment debate round limit
    pub fn max_debate_rounds(mut self, rounds: usize) -> Self {
        self.max_debate_rounds = Some(rounds);
        self
    }

    /// Set the risk debate round limit
    pub fn max_risk_rounds(mut self, rounds: usize) -> Self {
        self.max_risk_rounds = Some(rounds);
        self
    }

    /// Set the graph step ceiling
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }

    /// Set max tokens per completion
    pub fn max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the analyst selection
    pub fn selected_analysts(mut self, analysts: Vec<AnalystKind>) -> Self {
        self.selected_analysts = Some(analysts);
        self
    }

    /// Set the indices for the market summary
    pub fn market_indices(mut self, indices: Vec<String>) -> Self {
        self.market_indices = Some(indices);
        self
    }

    /// Set the run-log output directory
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    /// Build the configuration
    ///
    /// Model names default per provider when unset. The result is not
    /// validated; call [`TradingConfig::validate`] before use.
    pub fn build(self) -> TradingConfig {
        let provider = self.provider.unwrap_or(ProviderKind::Deepseek);
        let defaults = TradingConfig::default();

        TradingConfig {
            provider,
            deep_model: self
                .deep_model
                .unwrap_or_else(|| provider.default_deep_model().to_string()),
            quick_model: self
                .quick_model
                .unwrap_or_else(|| provider.default_quick_model().to_string()),
            api_key: self.api_key,
            backend_url: self.backend_url,
            max_debate_rounds: self.max_debate_rounds.unwrap_or(defaults.max_debate_rounds),
            max_risk_rounds: self.max_risk_rounds.unwrap_or(defaults.max_risk_rounds),
            max_steps: self.max_steps.unwrap_or(defaults.max_steps),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            selected_analysts: self.selected_analysts.unwrap_or(defaults.selected_analysts),
            market_indices: self.market_indices.unwrap_or(defaults.market_indices),
            results_dir: self.results_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_provider() {
        let config = TradingConfig::builder()
            .provider(ProviderKind::Gemini)
            .api_key("k")
            .build();
        assert_eq!(config.deep_model, "gemini-2.5-pro");
        assert_eq!(config.quick_model, "gemini-2.5-flash");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_analysts_is_config_error() {
        let config = TradingConfig::builder()
            .api_key("k")
            .selected_analysts(vec![])
            .build();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = TradingConfig::builder().build();
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_turn_limits() {
        let config = TradingConfig::builder()
            .api_key("k")
            .max_debate_rounds(2)
            .max_risk_rounds(1)
            .build();
        assert_eq!(config.invest_turn_limit(), 4);
        assert_eq!(config.risk_turn_limit(), 3);
    }
}
