//! Token accounting against a model's context window.
//!
//! Wraps `tiktoken-rs` behind the [`TokenCounter`] trait so the session loop
//! and the summarizer share one counting seam (and tests can substitute a
//! deterministic stub). Counting never fails: if no encoder can be loaded
//! for a model, counts degrade to 0 with a logged warning — undercounting is
//! safer than crashing an interactive session.

use crate::Turn;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Fraction of the context window at which compaction triggers.
const MAX_CONTEXT_PCT: usize = 80;
/// Fraction of the context window a summarization pass compacts down toward.
const SUMMARIZE_TARGET_PCT: usize = 60;

/// Token counting seam shared by the session loop and the summarizer.
///
/// Implementations must be `Send + Sync`: the summarization task counts
/// tokens concurrently with the interactive loop.
pub trait TokenCounter: Send + Sync {
    /// Token count for a piece of text. Must not fail or panic.
    fn count(&self, text: &str) -> usize;

    /// Maximum tokens the model accepts in one request.
    fn context_limit(&self) -> usize;

    /// Sum of [`count`](Self::count) over every turn's content.
    fn total(&self, turns: &[Turn]) -> usize {
        turns.iter().map(|t| self.count(&t.content)).sum()
    }

    /// The derived budget for this counter's context limit. Recomputed per
    /// turn, never stored.
    fn budget(&self) -> ContextBudget {
        ContextBudget::for_limit(self.context_limit())
    }
}

/// Thresholds derived from a model's context limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// The model's full context window.
    pub limit: usize,
    /// Usage at or above this triggers summarization (80% of the limit).
    pub max_context: usize,
    /// A summarization pass compacts the history down toward this (60%).
    pub summarize_target: usize,
}

impl ContextBudget {
    pub fn for_limit(limit: usize) -> Self {
        Self {
            limit,
            max_context: limit * MAX_CONTEXT_PCT / 100,
            summarize_target: limit * SUMMARIZE_TARGET_PCT / 100,
        }
    }
}

/// BPE-backed token counter for one model.
///
/// The encoder is resolved from the model name, falling back to `o200k_base`
/// for models the tiktoken table does not know (every local model, in
/// practice). The context limit likewise comes from the tiktoken model
/// table unless overridden via `context_window` in the project config.
#[derive(Clone)]
pub struct TokenAccountant {
    model: String,
    bpe: Option<Arc<CoreBPE>>,
    limit: usize,
}

impl TokenAccountant {
    pub fn new(model: impl Into<String>, limit_override: Option<usize>) -> Self {
        let model = model.into();
        let bpe = tiktoken_rs::get_bpe_from_model(&model)
            .or_else(|_| tiktoken_rs::o200k_base())
            .ok()
            .map(Arc::new);
        if bpe.is_none() {
            warn!("no tokenizer available for model '{model}'; token counts will read 0");
        }
        let limit = limit_override.unwrap_or_else(|| tiktoken_rs::model::get_context_size(&model));
        Self { model, bpe, limit }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl TokenCounter for TokenAccountant {
    fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => 0,
        }
    }

    fn context_limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_percentages_floor() {
        let budget = ContextBudget::for_limit(1000);
        assert_eq!(budget.max_context, 800);
        assert_eq!(budget.summarize_target, 600);

        let odd = ContextBudget::for_limit(999);
        assert_eq!(odd.max_context, 799);
        assert_eq!(odd.summarize_target, 599);
    }

    #[test]
    fn counts_real_tokens_for_known_models() {
        let accountant = TokenAccountant::new("gpt-4o", None);
        let t = accountant.count("hello");
        assert!((1..=3).contains(&t), "expected 1-3 tokens for 'hello', got {t}");
        assert!(accountant.count("") <= 1);
    }

    #[test]
    fn unknown_model_falls_back_to_o200k() {
        // Local model names are not in the tiktoken table; the fallback
        // encoder still produces non-zero counts.
        let accountant = TokenAccountant::new("llama3.1", None);
        assert!(accountant.count("hello world, this is a sentence") > 3);
    }

    #[test]
    fn limit_override_wins() {
        let accountant = TokenAccountant::new("llama3.1", Some(32_768));
        assert_eq!(accountant.context_limit(), 32_768);
        assert_eq!(accountant.budget().max_context, 26_214);
    }

    #[test]
    fn total_is_sum_over_content() {
        let accountant = TokenAccountant::new("gpt-4o", Some(1000));
        let turns = vec![
            Turn::system("persona text"),
            Turn::user("first question"),
            Turn::assistant("first answer"),
        ];
        let expected: usize = turns.iter().map(|t| accountant.count(&t.content)).sum();
        assert_eq!(accountant.total(&turns), expected);
    }

    #[test]
    fn total_is_monotonic_under_append() {
        let accountant = TokenAccountant::new("gpt-4o", Some(1000));
        let mut turns = vec![Turn::system("persona"), Turn::user("question one")];
        let before = accountant.total(&turns);

        let next = Turn::assistant("an answer with several words in it");
        let cost = accountant.count(&next.content);
        turns.push(next);

        assert_eq!(accountant.total(&turns), before + cost);
    }
}
