//! Threshold-triggered history compaction.
//!
//! When a session's token usage crosses `max_context` (80% of the window),
//! the oldest turns after the persona are condensed into a single system
//! turn whose content opens with the literal `"Summary:"` marker, and the
//! history file is rewritten atomically. The pass runs on a background task
//! while the interactive loop keeps accepting input; crash-only semantics
//! throughout — any failure leaves the persisted log byte-identical and the
//! pass is simply retried on the next over-budget turn.

use crate::context::tokens::TokenCounter;
use crate::provider::CompletionProvider;
use crate::session::store::HistoryStore;
use crate::{Role, Turn};
use tracing::{debug, warn};

/// Literal marker opening every synthetic summary turn.
pub const SUMMARY_MARKER: &str = "Summary:";

const SUMMARY_RULES: &str = "\
Condense the transcript into a summary. Rules:
- Capture the key facts and decisions.
- Preserve any preferences the user has stated.
- Note tasks that remain unresolved.
- Ignore junk or spam input.
- Stay under roughly 150 words.
- Use bullet points.";

/// The greedy prefix window selected for summarization.
///
/// `end` is exclusive: `turns[1..end]` gets summarized; `turns[0]` (the
/// persona) and `turns[end..]` are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryWindow {
    pub end: usize,
    pub tokens: usize,
}

/// Select the window to summarize: skip the persona, then include turns in
/// order while the running token sum stays within `target`, stopping at the
/// first turn that would exceed it. `None` when not even one turn fits.
pub fn select_window(
    turns: &[Turn],
    counter: &dyn TokenCounter,
    target: usize,
) -> Option<SummaryWindow> {
    let mut tokens = 0usize;
    let mut end = 1usize;
    for turn in turns.get(1..)? {
        let cost = counter.count(&turn.content);
        if tokens + cost > target {
            break;
        }
        tokens += cost;
        end += 1;
    }
    if end == 1 {
        None
    } else {
        Some(SummaryWindow { end, tokens })
    }
}

/// Build the one-shot summarization request: the persona as system context,
/// then the role-labeled transcript followed by the summary rules.
pub fn build_summary_request(persona: &str, window: &[Turn]) -> Vec<Turn> {
    let transcript: Vec<String> = window.iter().map(Turn::transcript_line).collect();
    let instruction = format!(
        "Conversation transcript:\n{}\n\n{SUMMARY_RULES}",
        transcript.join("\n")
    );
    vec![Turn::system(persona), Turn::user(instruction)]
}

/// Run one compaction pass against `store`.
///
/// `snapshot` is the history the session loop observed when it crossed the
/// threshold; the loop may append further turns while this runs. Returns
/// `true` when the store was rewritten — the caller must then reload its
/// in-memory history and recompute totals. Provider failures, rewrite
/// failures, and snapshot/disk mismatches all leave the persisted log
/// untouched and return `false`.
pub async fn summarize(
    provider: &dyn CompletionProvider,
    counter: &dyn TokenCounter,
    store: &HistoryStore,
    snapshot: &[Turn],
) -> bool {
    let target = counter.budget().summarize_target;
    let Some(window) = select_window(snapshot, counter, target) else {
        debug!("no summarizable prefix within {target} tokens");
        return false;
    };

    let request = build_summary_request(&snapshot[0].content, &snapshot[1..window.end]);
    let summary = match provider.complete(&request).await {
        Ok(text) => text,
        Err(e) => {
            warn!("summarization completion failed, keeping full history: {e}");
            return false;
        }
    };
    let summary_turn = Turn::system(format!("{SUMMARY_MARKER} {}", summary.trim()));

    let window_turns: Vec<Turn> = snapshot[1..window.end].to_vec();
    let result = store
        .rewrite(move |current| {
            // The loop may have appended turns since the snapshot was taken;
            // they sit after the window and are carried forward. If the
            // window no longer prefixes the persisted file, bail out and
            // leave the log untouched.
            if current.len() < window.end
                || current.first().is_none_or(|t| t.role != Role::System)
            {
                return None;
            }
            let unchanged = current[1..window.end]
                .iter()
                .zip(&window_turns)
                .all(|(a, b)| a.role == b.role && a.content == b.content);
            if !unchanged {
                return None;
            }

            let mut next = Vec::with_capacity(current.len() - window_turns.len() + 1);
            next.push(current[0].clone());
            next.push(summary_turn);
            next.extend(current[window.end..].iter().cloned());
            Some(next)
        })
        .await;

    match result {
        Ok(Some(written)) => {
            debug!(
                "compacted {} turns into one summary ({} turns persisted)",
                window.end - 1,
                written.len()
            );
            true
        }
        Ok(None) => {
            warn!("history no longer matches the summarized window; leaving log untouched");
            false
        }
        Err(e) => {
            warn!("failed to rewrite history: {e}");
            false
        }
    }
}
