//! Standalone analysis client
//!
//! Wraps a provider with category-specific analysis prompts. Unlike the
//! graph stages, this client never returns an error: provider failures
//! come back as an error-describing string in `content`, so callers can
//! print or log the result without branching.

use moex_llm::{CompletionRequest, LlmProvider, Message, TokenUsage};
use std::sync::Arc;
use tracing::warn;

const ANALYST_SYSTEM: &str =
    "Вы - эксперт по анализу российского фондового рынка. Проводите глубокий анализ с пошаговыми рассуждениями.";

/// Result of one analysis call
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Model output, or an error description on provider failure
    pub content: String,
    /// Model that produced the content
    pub model: String,
    /// Token usage, when the call succeeded
    pub usage: Option<TokenUsage>,
}

/// One provider + model pair with fixed Russian analysis prompts
pub struct AnalysisClient {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl AnalysisClient {
    /// Create a client for one model
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Model this client invokes
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one analysis. Provider failures are swallowed into the
    /// returned content.
    pub async fn analyze(&self, prompt: &str, context: Option<&str>) -> Analysis {
        let user_text = match context {
            Some(ctx) => format!("Контекст: {ctx}\n\nЗапрос: {prompt}"),
            None => prompt.to_string(),
        };

        let request = CompletionRequest::builder(&self.model)
            .system(ANALYST_SYSTEM)
            .add_message(Message::user(user_text))
            .build();

        match self.provider.complete(request).await {
            Ok(response) => Analysis {
                content: response.message.text().unwrap_or_default().to_string(),
                model: self.model.clone(),
                usage: Some(response.usage),
            },
            Err(e) => {
                warn!(model = %self.model, error = %e, "analysis call failed");
                Analysis {
                    content: format!("Ошибка анализа: {e}"),
                    model: self.model.clone(),
                    usage: None,
                }
            }
        }
    }

    /// Technical analysis of raw market data
    pub async fn analyze_market_data(&self, market_data: &str, company: &str) -> Analysis {
        let prompt = format!(
            "Проанализируйте рыночные данные для компании {company} на российском фондовом рынке.\n\n\
             Рыночные данные:\n{market_data}\n\n\
             Предоставьте:\n\
             1. Технический анализ ценовых движений\n\
             2. Анализ объемов торгов\n\
             3. Ключевые уровни поддержки и сопротивления\n\
             4. Краткосрочные и среднесрочные тренды\n\
             5. Рекомендации для трейдеров"
        );
        self.analyze(&prompt, None).await
    }

    /// Sentiment analysis of a news digest
    pub async fn analyze_news_sentiment(&self, news_data: &str, company: &str) -> Analysis {
        let prompt = format!(
            "Проанализируйте новостной фон и настроения для компании {company} на российском рынке.\n\n\
             Новостные данные:\n{news_data}\n\n\
             Предоставьте:\n\
             1. Общую тональность новостей (позитивная/негативная/нейтральная)\n\
             2. Ключевые события, влияющие на котировки\n\
             3. Анализ рисков и возможностей\n\
             4. Влияние на краткосрочные и долгосрочные перспективы\n\
             5. Рекомендации по торговой стратегии"
        );
        self.analyze(&prompt, None).await
    }

    /// Fundamental analysis of company data
    pub async fn analyze_fundamentals(&self, fundamental_data: &str, company: &str) -> Analysis {
        let prompt = format!(
            "Проанализируйте фундаментальные показатели компании {company} на российском рынке.\n\n\
             Фундаментальные данные:\n{fundamental_data}\n\n\
             Предоставьте:\n\
             1. Анализ финансовых показателей\n\
             2. Оценку справедливой стоимости\n\
             3. Сравнение с отраслевыми мультипликаторами\n\
             4. Анализ дивидендной политики\n\
             5. Долгосрочные инвестиционные перспективы"
        );
        self.analyze(&prompt, None).await
    }

    /// Aggregate decision over all category analyses; the response is
    /// instructed to end with the sentinel line the signal processor
    /// extracts
    pub async fn make_trading_decision(&self, all_data: &str, company: &str) -> Analysis {
        let prompt = format!(
            "На основе всех доступных данных примите торговое решение для {company} на российском фондовом рынке.\n\n\
             Все данные для анализа:\n{all_data}\n\n\
             Предоставьте:\n\
             1. Четкое торговое решение: ПОКУПАТЬ/ПРОДАВАТЬ/ДЕРЖАТЬ\n\
             2. Обоснование решения\n\
             3. Целевые уровни цены\n\
             4. Уровни стоп-лосса\n\
             5. Временной горизонт рекомендации\n\
             6. Размер позиции (% от портфеля)\n\
             7. Основные риски\n\n\
             Завершите ответ четким решением: {}",
            crate::prompts::DECISION_SENTINEL
        );
        self.analyze(&prompt, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use moex_llm::{CompletionResponse, LlmError, Message, StopReason};
    use std::sync::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<Result<String, LlmError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: moex_llm::CompletionRequest,
        ) -> moex_llm::Result<CompletionResponse> {
            self.prompts.lock().unwrap().push(
                request
                    .messages
                    .last()
                    .and_then(|m| m.text())
                    .unwrap_or_default()
                    .to_string(),
            );
            match self.responses.lock().unwrap().remove(0) {
                Ok(text) => Ok(CompletionResponse {
                    message: Message::assistant(text),
                    stop_reason: StopReason::EndTurn,
                    usage: TokenUsage {
                        input_tokens: 10,
                        output_tokens: 5,
                    },
                }),
                Err(e) => Err(e),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_analyze_returns_content_and_usage() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("вывод".to_string())]));
        let client = AnalysisClient::new(provider, "deepseek-reasoner");
        let analysis = client.analyze("запрос", None).await;
        assert_eq!(analysis.content, "вывод");
        assert_eq!(analysis.model, "deepseek-reasoner");
        assert!(analysis.usage.is_some());
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_error_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            LlmError::RateLimitExceeded("retry later".to_string()),
        )]));
        let client = AnalysisClient::new(provider, "deepseek-chat");
        let analysis = client.analyze("запрос", None).await;
        assert!(analysis.content.starts_with("Ошибка анализа:"));
        assert!(analysis.usage.is_none());
    }

    #[tokio::test]
    async fn test_context_is_prepended() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("ок".to_string())]));
        let client = AnalysisClient::new(provider.clone(), "m");
        client.analyze("запрос", Some("данные")).await;
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Контекст: данные"));
        assert!(prompts[0].contains("Запрос: запрос"));
    }

    #[tokio::test]
    async fn test_decision_prompt_carries_sentinel() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("ок".to_string())]));
        let client = AnalysisClient::new(provider.clone(), "m");
        client.make_trading_decision("данные", "Сбербанк").await;
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("ФИНАЛЬНОЕ ТОРГОВОЕ РЕШЕНИЕ"));
    }
}
