//! Append-only session history persisted as line-delimited JSON.
//!
//! One file per session. During steady state the interactive loop is the
//! sole writer, appending one line per turn; a summarization pass replaces
//! the whole file in a single atomic rewrite. A per-session mutex serializes
//! every mutation so an append and a rewrite can never interleave at the
//! byte level, and rewrites go through a temp file renamed into place so a
//! crash mid-write leaves the previous content intact.

use crate::Turn;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// Handle to one session's log file. Cheap to clone; clones share the
/// session lock, which is what lets the summarization task and the
/// interactive loop mutate the same file safely.
#[derive(Clone)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load every turn in the log, in file order. A malformed line is
    /// skipped with a warning rather than aborting the load; a missing file
    /// loads as an empty history.
    pub async fn load(&self) -> Result<Vec<Turn>, String> {
        let _guard = self.lock.lock().await;
        read_turns(&self.path)
    }

    /// Append one turn, stamping its timestamp immediately before the line
    /// is flushed. Creates parent directories on first write. Returns the
    /// stamped turn for the caller's in-memory copy.
    ///
    /// An I/O failure here means a turn could not be persisted — callers
    /// treat that as fatal to the session rather than continuing with a
    /// silently lost turn.
    pub async fn append(&self, mut turn: Turn) -> Result<Turn, String> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
        }
        turn.timestamp = Some(Utc::now());
        let line =
            serde_json::to_string(&turn).map_err(|e| format!("failed to serialize turn: {e}"))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("failed to open {}: {e}", self.path.display()))?;
        writeln!(file, "{line}")
            .and_then(|()| file.flush())
            .map_err(|e| format!("failed to write {}: {e}", self.path.display()))?;
        Ok(turn)
    }

    /// Atomically replace the whole log.
    ///
    /// Loads the current persisted turns under the session lock and hands
    /// them to `f`, which returns the replacement sequence — or `None` to
    /// abort without touching the file. Because the current turns are read
    /// under the same lock that `append` takes, the closure always sees
    /// every append that completed before the rewrite, including ones made
    /// after the caller took its snapshot.
    ///
    /// Unstamped turns in the replacement are given a timestamp before the
    /// file is flushed. Returns the turns as written, or `None` if `f`
    /// aborted.
    pub async fn rewrite<F>(&self, f: F) -> Result<Option<Vec<Turn>>, String>
    where
        F: FnOnce(Vec<Turn>) -> Option<Vec<Turn>> + Send,
    {
        let _guard = self.lock.lock().await;
        let current = read_turns(&self.path)?;
        let Some(replacement) = f(current) else {
            return Ok(None);
        };
        let written = write_all_atomic(&self.path, replacement)?;
        Ok(Some(written))
    }
}

fn read_turns(path: &Path) -> Result<Vec<Turn>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let mut turns = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Turn>(line) {
            Ok(turn) => turns.push(turn),
            Err(e) => warn!(
                "skipping malformed line {} in {}: {e}",
                idx + 1,
                path.display()
            ),
        }
    }
    Ok(turns)
}

/// Write the full replacement: temp file in the same directory, flush, then
/// rename over the original.
fn write_all_atomic(path: &Path, turns: Vec<Turn>) -> Result<Vec<Turn>, String> {
    let turns: Vec<Turn> = turns
        .into_iter()
        .map(|mut t| {
            if t.timestamp.is_none() {
                t.timestamp = Some(Utc::now());
            }
            t
        })
        .collect();

    let mut body = String::new();
    for turn in &turns {
        let line =
            serde_json::to_string(turn).map_err(|e| format!("failed to serialize turn: {e}"))?;
        body.push_str(&line);
        body.push('\n');
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| format!("history path {} has no file name", path.display()))?
        .to_string_lossy();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&tmp_path, body)
        .map_err(|e| format!("failed to write {}: {e}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("failed to rename {}: {e}", tmp_path.display()))?;
    Ok(turns)
}

// ── Session naming ─────────────────────────────────────────────────

/// File name for a session: lowercase, whitespace/hyphen runs collapsed to
/// a single hyphen, everything outside `[a-z0-9-]` dropped, `.json` suffix.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.trim().to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            pending_hyphen = !slug.is_empty();
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if pending_hyphen {
                slug.push('-');
                pending_hyphen = false;
            }
            slug.push(c);
        }
    }
    format!("{slug}.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    fn store_in(dir: &Path) -> HistoryStore {
        HistoryStore::new(dir.join("session.json"))
    }

    #[tokio::test]
    async fn append_then_load_reproduces_turns_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.append(Turn::system("persona")).await.unwrap();
        store.append(Turn::user("first")).await.unwrap();
        store.append(Turn::assistant("second")).await.unwrap();

        let turns = store.load().await.unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, Role::System);
        assert_eq!(turns[1].content, "first");
        assert_eq!(turns[2].content, "second");

        // Every persisted turn is stamped, in non-decreasing order.
        let stamps: Vec<_> = turns.iter().map(|t| t.timestamp.unwrap()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn append_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("deep").join("chats").join("s.json"));

        store.append(Turn::user("hi")).await.unwrap();
        assert!(store.exists());
    }

    #[tokio::test]
    async fn load_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let good = serde_json::to_string(&Turn::user("ok")).unwrap();
        std::fs::write(&path, format!("{good}\nnot json at all\n{good}\n")).unwrap();

        let turns = HistoryStore::new(&path).load().await.unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns.iter().all(|t| t.content == "ok"));
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(dir.path()).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rewrite_replaces_content_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.append(Turn::user("old one")).await.unwrap();
        store.append(Turn::user("old two")).await.unwrap();

        let written = store
            .rewrite(|_current| Some(vec![Turn::system("replacement")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].timestamp.is_some());

        let turns = store.load().await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "replacement");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }

    #[tokio::test]
    async fn aborted_rewrite_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.append(Turn::user("keep me")).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let result = store.rewrite(|_current| None).await.unwrap();
        assert!(result.is_none());
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn rewrite_sees_prior_appends() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.append(Turn::user("a")).await.unwrap();
        store.append(Turn::user("b")).await.unwrap();

        store
            .rewrite(|current| {
                assert_eq!(current.len(), 2);
                Some(current)
            })
            .await
            .unwrap();
    }

    #[test]
    fn slugify_shapes() {
        assert_eq!(slugify("My First Chat"), "my-first-chat.json");
        assert_eq!(slugify("  spaced   out  "), "spaced-out.json");
        assert_eq!(slugify("Aug-04-at-09-15PM"), "aug-04-at-09-15pm.json");
        assert_eq!(slugify("weird!@#chars"), "weirdchars.json");
        assert_eq!(slugify("dash---runs end-"), "dash-runs-end.json");
    }
}
