//! Verdict extraction from the portfolio manager's free text
//!
//! The only string-scanning of model output in the whole pipeline
//! happens here. The function is total: any input maps to a verdict,
//! with `Unknown` as the floor.

use crate::state::Verdict;
use regex::Regex;
use std::sync::LazyLock;

static SENTINEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:ФИНАЛЬНОЕ ТОРГОВОЕ РЕШЕНИЕ|FINAL TRADE DECISION)\s*:?\s*\**\s*(ПОКУПАТЬ|ДЕРЖАТЬ|ПРОДАВАТЬ|BUY|HOLD|SELL)",
    )
    .expect("static regex")
});

/// Extracts the canonical verdict from final-decision text
#[derive(Debug, Default)]
pub struct SignalProcessor;

impl SignalProcessor {
    /// Create the processor
    pub fn new() -> Self {
        Self
    }

    /// Map decision text to a verdict. Sentinel line first; without
    /// one, a whole-text keyword scan in priority order
    /// buy > sell > hold; otherwise [`Verdict::Unknown`].
    pub fn process_signal(&self, text: &str) -> Verdict {
        if let Some(captures) = SENTINEL_RE.captures(text) {
            if let Some(verdict) = keyword_verdict(&captures[1].to_uppercase()) {
                return verdict;
            }
        }

        let upper = text.to_uppercase();
        for (keywords, verdict) in [
            (["ПОКУПАТЬ", "BUY"], Verdict::Buy),
            (["ПРОДАВАТЬ", "SELL"], Verdict::Sell),
            (["ДЕРЖАТЬ", "HOLD"], Verdict::Hold),
        ] {
            if keywords.iter().any(|k| upper.contains(k)) {
                return verdict;
            }
        }

        Verdict::Unknown
    }
}

fn keyword_verdict(token: &str) -> Option<Verdict> {
    match token {
        "ПОКУПАТЬ" | "BUY" => Some(Verdict::Buy),
        "ДЕРЖАТЬ" | "HOLD" => Some(Verdict::Hold),
        "ПРОДАВАТЬ" | "SELL" => Some(Verdict::Sell),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_russian_sentinel() {
        let processor = SignalProcessor::new();
        let text = "Обоснование...\nФИНАЛЬНОЕ ТОРГОВОЕ РЕШЕНИЕ: **ПОКУПАТЬ**";
        assert_eq!(processor.process_signal(text), Verdict::Buy);
    }

    #[test]
    fn test_english_sentinel() {
        let processor = SignalProcessor::new();
        let text = "Reasoning...\nFINAL TRADE DECISION: **SELL**";
        assert_eq!(processor.process_signal(text), Verdict::Sell);
    }

    #[test]
    fn test_sentinel_without_markup_or_colon_spacing() {
        let processor = SignalProcessor::new();
        assert_eq!(
            processor.process_signal("финальное торговое решение: держать"),
            Verdict::Hold
        );
    }

    #[test]
    fn test_fallback_priority_buy_over_hold() {
        let processor = SignalProcessor::new();
        let text = "Рекомендуем держать, но при просадке покупать";
        assert_eq!(processor.process_signal(text), Verdict::Buy);
    }

    #[test]
    fn test_no_signal_is_unknown() {
        let processor = SignalProcessor::new();
        assert_eq!(processor.process_signal("нет однозначного вывода"), Verdict::Unknown);
        assert_eq!(processor.process_signal(""), Verdict::Unknown);
    }

    #[test]
    fn test_idempotent_over_own_output() {
        let processor = SignalProcessor::new();
        let verdict = processor.process_signal("ФИНАЛЬНОЕ ТОРГОВОЕ РЕШЕНИЕ: **ПРОДАВАТЬ**");
        assert_eq!(processor.process_signal(verdict.as_russian()), verdict);
        assert_eq!(processor.process_signal(verdict.as_str()), verdict);
    }
}
