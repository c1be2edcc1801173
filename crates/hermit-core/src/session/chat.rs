//! The interactive chat session state machine.
//!
//! [`ChatSession`] owns the history store and token accounting for one
//! session. Each submitted line becomes a persisted user turn, the full
//! history goes to the completion provider in streaming mode, and the
//! streamed reply is persisted as the assistant turn. When usage crosses
//! the budget's `max_context`, a compaction task is spawned against a
//! snapshot of the history; the loop keeps accepting input and reconciles
//! with the store once the task finishes.
//!
//! Ordering discipline: turns reach the log in issuance order, and the
//! in-memory history always mirrors the persisted log except for the
//! assistant turn currently being streamed. After a compaction the store is
//! the source of truth — every in-memory turn was persisted before the
//! provider saw it, and the rewrite carries forward turns appended while
//! the summary was generated, so reloading wholesale cannot drop anything.

use crate::context::summarizer;
use crate::context::tokens::{ContextBudget, TokenCounter};
use crate::provider::CompletionProvider;
use crate::session::store::HistoryStore;
use crate::{Role, Turn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Exit token ending an interactive session (matched case-insensitively).
pub const EXIT_TOKEN: &str = "/bye";

/// Usage snapshot reported after each turn.
#[derive(Debug, Clone, Copy)]
pub struct TokenReport {
    pub used: usize,
    pub limit: usize,
}

pub struct ChatSession {
    store: HistoryStore,
    provider: Arc<dyn CompletionProvider>,
    counter: Arc<dyn TokenCounter>,
    history: Vec<Turn>,
    used_tokens: usize,
    /// At most one compaction runs per session; this slot is the flag.
    compaction: Option<JoinHandle<bool>>,
}

impl ChatSession {
    /// Open a brand-new session, persisting the persona turn exactly once.
    /// If the log file already exists (name collision), this behaves like
    /// [`resume`](Self::resume).
    pub async fn create(
        store: HistoryStore,
        provider: Arc<dyn CompletionProvider>,
        counter: Arc<dyn TokenCounter>,
        persona: &str,
    ) -> Result<Self, String> {
        if !store.exists() {
            store.append(Turn::system(persona)).await?;
        }
        Self::resume(store, provider, counter).await
    }

    /// Open an existing session from its log file.
    pub async fn resume(
        store: HistoryStore,
        provider: Arc<dyn CompletionProvider>,
        counter: Arc<dyn TokenCounter>,
    ) -> Result<Self, String> {
        let mut history = store.load().await?;
        if history.is_empty() {
            history.push(store.append(Turn::system(crate::PERSONA)).await?);
        }
        if history[0].role != Role::System {
            warn!(
                "session log {} does not start with a system turn",
                store.path().display()
            );
        }
        let used_tokens = counter.total(&history);
        Ok(Self {
            store,
            provider,
            counter,
            history,
            used_tokens,
            compaction: None,
        })
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Path of the session's log file.
    pub fn log_path(&self) -> &std::path::Path {
        self.store.path()
    }

    pub fn budget(&self) -> ContextBudget {
        self.counter.budget()
    }

    pub fn usage(&self) -> TokenReport {
        TokenReport {
            used: self.used_tokens,
            limit: self.counter.context_limit(),
        }
    }

    /// Whether a compaction task is currently in flight.
    pub fn compacting(&self) -> bool {
        self.compaction.is_some()
    }

    /// Process one line of user input: persist the user turn, stream the
    /// full history to the provider (rendering fragments through
    /// `on_chunk` in arrival order), persist the assistant turn, and kick
    /// off compaction if the budget is exceeded. Returns the post-turn
    /// usage.
    ///
    /// Provider failures are folded into the assistant turn's content as
    /// inline diagnostic text — the log always records the failure and the
    /// loop continues. Only persistence failures surface as `Err`.
    pub async fn submit(
        &mut self,
        input: &str,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<TokenReport, String> {
        let user = self.store.append(Turn::user(input)).await?;
        self.used_tokens += self.counter.count(&user.content);
        self.history.push(user);

        let content = match self.provider.stream_complete(&self.history, on_chunk).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                let msg = "[error] the model returned an empty response".to_string();
                on_chunk(&msg);
                msg
            }
            Err(e) => {
                let msg = format!("[error] completion failed: {e}");
                on_chunk(&msg);
                msg
            }
        };

        let assistant = self.store.append(Turn::assistant(content)).await?;
        self.used_tokens += self.counter.count(&assistant.content);
        self.history.push(assistant);

        self.maybe_compact();
        Ok(self.usage())
    }

    /// Spawn the background compaction task when over budget.
    fn maybe_compact(&mut self) {
        if self.compaction.is_some() {
            return;
        }
        let budget = self.counter.budget();
        if self.used_tokens < budget.max_context {
            return;
        }
        debug!(
            "context at {}/{} tokens, spawning compaction",
            self.used_tokens, budget.limit
        );
        let provider = Arc::clone(&self.provider);
        let counter = Arc::clone(&self.counter);
        let store = self.store.clone();
        let snapshot = self.history.clone();
        self.compaction = Some(tokio::spawn(async move {
            summarizer::summarize(provider.as_ref(), counter.as_ref(), &store, &snapshot).await
        }));
    }

    /// Reconcile with the compaction task if it has finished; never blocks
    /// on a still-running task. The interactive loop calls this between
    /// prompts. Returns `true` when the history was reloaded.
    pub async fn reap_compaction(&mut self) -> Result<bool, String> {
        if self.compaction.as_ref().is_none_or(|h| !h.is_finished()) {
            return Ok(false);
        }
        self.finish_compaction().await
    }

    /// Wait for an in-flight compaction to complete and reconcile with the
    /// store. Reloads the persisted history wholesale and recomputes the
    /// token total when the task rewrote the log.
    pub async fn finish_compaction(&mut self) -> Result<bool, String> {
        let Some(handle) = self.compaction.take() else {
            return Ok(false);
        };
        let rewrote = match handle.await {
            Ok(r) => r,
            Err(e) => {
                warn!("compaction task failed: {e}");
                false
            }
        };
        if !rewrote {
            return Ok(false);
        }
        self.history = self.store.load().await?;
        self.used_tokens = self.counter.total(&self.history);
        debug!(
            "reloaded history after compaction: {} turns, {} tokens",
            self.history.len(),
            self.used_tokens
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SUMMARY_MARKER;
    use crate::provider::ProviderFuture;

    /// Echo provider: streams a fixed reply, summarizes with a fixed string.
    struct EchoProvider {
        reply: Result<String, String>,
    }

    impl EchoProvider {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
            })
        }
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err("connection refused".to_string()),
            })
        }
    }

    impl CompletionProvider for EchoProvider {
        fn complete<'a>(&'a self, _turns: &'a [Turn]) -> ProviderFuture<'a> {
            let reply = self.reply.clone();
            Box::pin(async move { reply })
        }

        fn stream_complete<'a>(
            &'a self,
            _turns: &'a [Turn],
            on_chunk: &'a mut (dyn FnMut(&str) + Send),
        ) -> ProviderFuture<'a> {
            let reply = self.reply.clone();
            Box::pin(async move {
                let text = reply?;
                // Two fragments, to exercise accumulation order.
                let mid = text.len() / 2;
                on_chunk(text.get(..mid).unwrap_or(""));
                on_chunk(text.get(mid..).unwrap_or(""));
                Ok(text)
            })
        }
    }

    struct FlatCounter {
        per_turn: usize,
        limit: usize,
    }

    impl TokenCounter for FlatCounter {
        fn count(&self, _text: &str) -> usize {
            self.per_turn
        }
        fn context_limit(&self) -> usize {
            self.limit
        }
    }

    fn roomy_counter() -> Arc<FlatCounter> {
        Arc::new(FlatCounter {
            per_turn: 1,
            limit: 1_000_000,
        })
    }

    fn store_in(dir: &std::path::Path) -> HistoryStore {
        HistoryStore::new(dir.join("session.json"))
    }

    #[tokio::test]
    async fn three_turns_leave_seven_interleaved_lines() {
        let dir = tempfile::tempdir().unwrap();
        let provider = EchoProvider::ok("pong");
        let mut session = ChatSession::create(
            store_in(dir.path()),
            provider,
            roomy_counter(),
            "test persona",
        )
        .await
        .unwrap();

        let mut sink = |_: &str| {};
        for prompt in ["one", "two", "three"] {
            session.submit(prompt, &mut sink).await.unwrap();
        }

        let turns = session.store.load().await.unwrap();
        assert_eq!(turns.len(), 7);
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant,
            ]
        );
        assert_eq!(turns[1].content, "one");
        assert_eq!(turns[2].content, "pong");
    }

    #[tokio::test]
    async fn persona_is_written_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let provider = EchoProvider::ok("pong");

        let session =
            ChatSession::create(store.clone(), provider.clone(), roomy_counter(), "persona")
                .await
                .unwrap();
        drop(session);

        // Re-opening the same file must not add a second persona turn.
        let session = ChatSession::create(store.clone(), provider, roomy_counter(), "persona")
            .await
            .unwrap();
        assert_eq!(session.history().len(), 1);
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn streamed_fragments_arrive_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ChatSession::create(
            store_in(dir.path()),
            EchoProvider::ok("hello world"),
            roomy_counter(),
            "persona",
        )
        .await
        .unwrap();

        let mut seen = String::new();
        let mut sink = |chunk: &str| seen.push_str(chunk);
        session.submit("hi", &mut sink).await.unwrap();
        assert_eq!(seen, "hello world");
    }

    #[tokio::test]
    async fn provider_failure_is_recorded_inline_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ChatSession::create(
            store_in(dir.path()),
            EchoProvider::failing(),
            roomy_counter(),
            "persona",
        )
        .await
        .unwrap();

        let mut sink = |_: &str| {};
        let report = session.submit("hi", &mut sink).await.unwrap();
        assert_eq!(report.used, 3); // persona + user + assistant, 1 each

        let turns = session.store.load().await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2].role, Role::Assistant);
        assert!(turns[2].content.contains("completion failed"));
        assert!(turns[2].content.contains("connection refused"));
    }

    #[tokio::test]
    async fn usage_grows_by_counted_tokens_per_turn() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(FlatCounter {
            per_turn: 7,
            limit: 1_000_000,
        });
        let mut session = ChatSession::create(
            store_in(dir.path()),
            EchoProvider::ok("pong"),
            counter,
            "persona",
        )
        .await
        .unwrap();

        let before = session.usage().used;
        let mut sink = |_: &str| {};
        let after = session.submit("hi", &mut sink).await.unwrap();
        assert_eq!(after.used, before + 14); // user + assistant
    }

    #[tokio::test]
    async fn over_budget_turn_triggers_compaction_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        // limit 20: max_context 16, summarize_target 12. Each turn costs 5,
        // so the second exchange (25 tokens) crosses the threshold and the
        // window fits 2 turns (10 <= 12).
        let counter = Arc::new(FlatCounter {
            per_turn: 5,
            limit: 20,
        });
        let mut session = ChatSession::create(
            store_in(dir.path()),
            EchoProvider::ok("pong"),
            counter,
            "persona",
        )
        .await
        .unwrap();

        let mut sink = |_: &str| {};
        session.submit("one", &mut sink).await.unwrap();
        assert!(!session.compacting());

        session.submit("two", &mut sink).await.unwrap();
        assert!(session.compacting());

        let reloaded = session.finish_compaction().await.unwrap();
        assert!(reloaded);

        // persona + summary + the 2 turns beyond the window.
        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "persona");
        assert!(history[1].content.starts_with(SUMMARY_MARKER));
        assert_eq!(session.usage().used, 20);
    }

    #[tokio::test]
    async fn reap_without_compaction_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ChatSession::create(
            store_in(dir.path()),
            EchoProvider::ok("pong"),
            roomy_counter(),
            "persona",
        )
        .await
        .unwrap();
        assert!(!session.reap_compaction().await.unwrap());
    }
}
