//! Debounced search input.
//!
//! [`DebouncedSearch`] keeps two values: the raw input, updated on every
//! keystroke, and the committed term, which only follows the raw input once
//! it has stopped changing for the quiet period. Each keystroke aborts the
//! pending commit and schedules a new one, so a burst of typing produces a
//! single trailing commit.

use crate::config::SearchSettings;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Raw/committed search term pair with a cancellable commit timer.
#[derive(Debug)]
pub struct DebouncedSearch {
    raw: String,
    delay: Duration,
    max_len: usize,
    committed: Arc<watch::Sender<String>>,
    commits: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

/// Replace the committed term, notifying only on an actual change.
fn commit(sender: &watch::Sender<String>, commits: &AtomicU64, term: &str) -> bool {
    let changed = sender.send_if_modified(|committed| {
        if committed == term {
            return false;
        }
        committed.clear();
        committed.push_str(term);
        true
    });
    if changed {
        commits.fetch_add(1, Ordering::SeqCst);
        debug!("Search term committed: {:?}", term);
    }
    changed
}

impl DebouncedSearch {
    pub fn new(settings: &SearchSettings) -> Self {
        Self::with_delay(settings.debounce, settings.max_term_len)
    }

    pub fn with_delay(delay: Duration, max_len: usize) -> Self {
        let (committed, _) = watch::channel(String::new());
        Self {
            raw: String::new(),
            delay,
            max_len,
            committed: Arc::new(committed),
            commits: Arc::new(AtomicU64::new(0)),
            pending: None,
        }
    }

    /// The input as typed (capped at the maximum length).
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The term filtering currently uses.
    pub fn committed(&self) -> String {
        self.committed.borrow().clone()
    }

    /// Observe commits.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.committed.subscribe()
    }

    /// Number of commits that changed the term.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// A commit is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Record a keystroke and restart the quiet period.
    ///
    /// Returns true if the raw input changed.
    pub fn set(&mut self, input: &str) -> bool {
        let input: String = input.chars().take(self.max_len).collect();
        if input == self.raw && self.pending.is_some() {
            return false;
        }
        let changed = input != self.raw;
        self.raw = input;
        self.schedule();
        changed
    }

    /// Drop the pending commit, if any, without committing.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Commit the raw input now (submit).
    pub fn flush(&mut self) -> bool {
        self.cancel();
        commit(&self.committed, &self.commits, &self.raw)
    }

    /// Set both values at once, e.g. from a URL.
    pub fn reset(&mut self, term: &str) -> bool {
        self.cancel();
        self.raw = term.chars().take(self.max_len).collect();
        commit(&self.committed, &self.commits, &self.raw)
    }

    fn schedule(&mut self) {
        self.cancel();
        if self.delay.is_zero() {
            commit(&self.committed, &self.commits, &self.raw);
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime for the search debounce timer, committing immediately");
            commit(&self.committed, &self.commits, &self.raw);
            return;
        };

        let delay = self.delay;
        let term = self.raw.clone();
        let committed = Arc::clone(&self.committed);
        let commits = Arc::clone(&self.commits);
        self.pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            commit(&committed, &commits, &term);
        }));
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(300);

    fn search() -> DebouncedSearch {
        DebouncedSearch::with_delay(DELAY, 80)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_commits_once_after_quiet_period() {
        let mut search = search();
        for input in ["r", "re", "rea"] {
            search.set(input);
            assert_eq!(search.raw(), input);
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(search.committed(), "");
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(search.committed(), "");
        assert!(search.is_pending());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(search.committed(), "rea");
        assert_eq!(search.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_only_changes() {
        let mut search = search();
        let mut rx = search.subscribe();

        search.set("lucide");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), "lucide");

        // Retyping the committed value does not notify.
        search.set("lucid");
        search.set("lucide");
        tokio::time::sleep(DELAY * 2).await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(search.commit_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop_abort_pending_commit() {
        let mut search = search();
        let rx = search.subscribe();
        search.set("radix");
        search.cancel();
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(search.committed(), "");
        assert_eq!(search.raw(), "radix");

        search.set("ark");
        drop(search);
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(*rx.borrow(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_commits_immediately() {
        let mut search = search();
        search.set("vue");
        assert!(search.flush());
        assert_eq!(search.committed(), "vue");
        assert!(!search.is_pending());
    }

    #[tokio::test]
    async fn test_input_is_capped() {
        let mut search = DebouncedSearch::with_delay(Duration::ZERO, 5);
        search.set("tailwind");
        assert_eq!(search.raw(), "tailw");
        assert_eq!(search.committed(), "tailw");
    }

    #[tokio::test]
    async fn test_reset_sets_both_values() {
        let mut search = search();
        search.set("typing");
        assert!(search.reset("icons"));
        assert_eq!(search.raw(), "icons");
        assert_eq!(search.committed(), "icons");
        assert!(!search.is_pending());
    }
}
