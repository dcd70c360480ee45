//! Debounced free-text search over the collection, with typed suggestions.
//!
//! The raw query is staged by [`SearchIndex::set_query`] and only becomes the
//! committed query, the one used for filtering, once typing pauses. History is
//! persisted through the [`StoreAdapter`] under its own key.

mod history;
mod rank;
mod suggest;

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    models::{Category, CollectionItem, GameStatus},
    schedule::{Scheduler, TimerToken},
    storage::{StorageError, StoreAdapter},
};

pub use history::QueryHistory;
pub use rank::{matches_query, rank_results};
pub use suggest::{build_suggestions, Suggestion, SuggestionKind, MIN_SUGGESTION_QUERY};

/// Tuning for [`SearchIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Quiet period before a typed query is committed.
    pub debounce: Duration,
    /// Maximum number of persisted history entries.
    pub history_limit: usize,
    /// History entries shown for short queries.
    pub recent_display: usize,
    /// Cap on collection-derived suggestions.
    pub max_suggestions: usize,
    /// Idle period after a commit before the query is written to history.
    pub history_idle: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            history_limit: 10,
            recent_display: 5,
            max_suggestions: 8,
            history_idle: Duration::from_millis(2000),
        }
    }
}

struct State {
    raw: String,
    committed: String,
    searching: bool,
    status_filter: Option<GameStatus>,
    category_filter: Option<Category>,
    history: QueryHistory,
    debounce: Option<TimerToken>,
    idle: Option<TimerToken>,
    debounce_seq: u64,
    idle_seq: u64,
}

impl State {
    /// Detach both timers; tasks already running see a newer sequence and stand down.
    fn take_timers(&mut self) -> [Option<TimerToken>; 2] {
        self.debounce_seq += 1;
        self.idle_seq += 1;
        [self.debounce.take(), self.idle.take()]
    }
}

struct Shared {
    state: Mutex<State>,
    store: StoreAdapter,
    scheduler: Arc<dyn Scheduler>,
    config: SearchConfig,
}

/// Query state, filters and history for one collection view.
pub struct SearchIndex {
    shared: Arc<Shared>,
}

impl SearchIndex {
    /// Create an index, loading persisted history.
    ///
    /// Unreadable history is logged and replaced with an empty list.
    pub fn new(store: StoreAdapter, scheduler: Arc<dyn Scheduler>, config: SearchConfig) -> Self {
        let entries = store.load_history().unwrap_or_else(|err| {
            warn!("starting with empty search history: {err}");
            Vec::new()
        });
        let history = QueryHistory::from_entries(entries, config.history_limit);
        debug!(entries = history.entries().len(), "search history loaded");

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    raw: String::new(),
                    committed: String::new(),
                    searching: false,
                    status_filter: None,
                    category_filter: None,
                    history,
                    debounce: None,
                    idle: None,
                    debounce_seq: 0,
                    idle_seq: 0,
                }),
                store,
                scheduler,
                config,
            }),
        }
    }

    /// Stage `raw` and restart the debounce window.
    pub fn set_query(&self, raw: impl Into<String>) {
        let raw = raw.into();
        let (stale, changed) = {
            let mut state = self.shared.state.lock();
            let changed = raw != state.committed;
            state.raw = raw;
            state.searching = changed;
            (state.take_timers(), changed)
        };
        self.cancel_all(stale);
        if changed {
            arm_debounce(&self.shared);
        }
    }

    /// Commit the staged query now instead of waiting for the debounce.
    pub fn commit_query(&self) {
        let stale = {
            let mut state = self.shared.state.lock();
            state.take_timers()
        };
        self.cancel_all(stale);
        commit(&self.shared);
    }

    /// Text last passed to [`SearchIndex::set_query`].
    pub fn query(&self) -> String {
        self.shared.state.lock().raw.clone()
    }

    /// Query currently used for filtering.
    pub fn committed_query(&self) -> String {
        self.shared.state.lock().committed.clone()
    }

    /// True while a staged query is waiting to be committed.
    pub fn is_searching(&self) -> bool {
        self.shared.state.lock().searching
    }

    /// Restrict results to one status, or lift the restriction.
    pub fn set_status_filter(&self, status: Option<GameStatus>) {
        self.shared.state.lock().status_filter = status;
    }

    /// Restrict results to one category, or lift the restriction.
    pub fn set_category_filter(&self, category: Option<Category>) {
        self.shared.state.lock().category_filter = category;
    }

    /// Items matching the committed query and filters, ranked.
    pub fn results<'a>(&self, items: &'a [CollectionItem]) -> Vec<&'a CollectionItem> {
        let (query, status, category) = {
            let state = self.shared.state.lock();
            (state.committed.clone(), state.status_filter, state.category_filter)
        };
        let matches = items
            .iter()
            .filter(|item| status.map_or(true, |status| item.status == status))
            .filter(|item| category.map_or(true, |category| item.categories.contains(&category)))
            .filter(|item| matches_query(item, &query))
            .collect();
        rank_results(matches, &query)
    }

    /// Suggestions for the committed query.
    pub fn suggestions(&self, items: &[CollectionItem]) -> Vec<Suggestion> {
        let (query, history) = {
            let state = self.shared.state.lock();
            (state.committed.clone(), state.history.entries().to_vec())
        };
        let config = &self.shared.config;
        build_suggestions(
            items,
            &query,
            &history,
            config.recent_display,
            config.max_suggestions,
        )
    }

    /// Adopt a suggestion as the committed query and remember it.
    pub fn select_suggestion(&self, suggestion: &Suggestion) -> Result<(), StorageError> {
        let stale = {
            let mut state = self.shared.state.lock();
            state.raw = suggestion.text.clone();
            state.committed = suggestion.text.clone();
            state.searching = false;
            state.take_timers()
        };
        self.cancel_all(stale);
        self.record_history(&suggestion.text)
    }

    /// Put `query` at the front of history and persist it.
    pub fn record_history(&self, query: &str) -> Result<(), StorageError> {
        record_history(&self.shared, query)
    }

    /// Drop `query` from history and persist the change.
    pub fn remove_history_entry(&self, query: &str) -> Result<(), StorageError> {
        let entries = {
            let mut state = self.shared.state.lock();
            if !state.history.remove(query) {
                return Ok(());
            }
            state.history.entries().to_vec()
        };
        self.shared.store.save_history(&entries)
    }

    /// Forget every past query.
    pub fn clear_history(&self) -> Result<(), StorageError> {
        self.shared.state.lock().history.clear();
        self.shared.store.save_history(&[])
    }

    /// Past queries, newest first.
    pub fn history(&self) -> Vec<String> {
        self.shared.state.lock().history.entries().to_vec()
    }

    fn cancel_all(&self, tokens: [Option<TimerToken>; 2]) {
        for token in tokens.into_iter().flatten() {
            self.shared.scheduler.cancel(token);
        }
    }
}

impl Drop for SearchIndex {
    fn drop(&mut self) {
        let tokens = {
            let mut state = self.shared.state.lock();
            state.take_timers()
        };
        self.cancel_all(tokens);
    }
}

fn record_history(shared: &Shared, query: &str) -> Result<(), StorageError> {
    let entries = {
        let mut state = shared.state.lock();
        if !state.history.record(query) {
            return Ok(());
        }
        state.history.entries().to_vec()
    };
    shared.store.save_history(&entries)
}

fn arm_debounce(shared: &Arc<Shared>) {
    let seq = {
        let mut state = shared.state.lock();
        state.debounce_seq += 1;
        state.debounce_seq
    };
    let weak = Arc::downgrade(shared);
    let token = shared.scheduler.schedule(
        shared.config.debounce,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                on_debounce(&shared, seq);
            }
        }),
    );
    let mut state = shared.state.lock();
    if state.debounce_seq == seq {
        state.debounce = Some(token);
    }
}

fn on_debounce(shared: &Arc<Shared>, seq: u64) {
    {
        let mut state = shared.state.lock();
        if state.debounce_seq != seq {
            return;
        }
        state.debounce = None;
    }
    commit(shared);
}

fn commit(shared: &Arc<Shared>) {
    let committed = {
        let mut state = shared.state.lock();
        state.committed = state.raw.clone();
        state.searching = false;
        state.committed.clone()
    };
    debug!(query = %committed, "search query committed");
    if committed.trim().chars().count() >= MIN_SUGGESTION_QUERY {
        arm_idle(shared, committed);
    }
}

fn arm_idle(shared: &Arc<Shared>, query: String) {
    let seq = {
        let mut state = shared.state.lock();
        state.idle_seq += 1;
        state.idle_seq
    };
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let token = shared.scheduler.schedule(
        shared.config.history_idle,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                let current = {
                    let mut state = shared.state.lock();
                    if state.idle_seq != seq {
                        return;
                    }
                    state.idle = None;
                    state.committed == query
                };
                if current {
                    if let Err(err) = record_history(&shared, &query) {
                        warn!("failed to persist search history: {err}");
                    }
                }
            }
        }),
    );
    let mut state = shared.state.lock();
    if state.idle_seq == seq {
        state.idle = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{ItemDraft, Platform},
        schedule::ManualScheduler,
    };
    use chrono::Utc;

    fn item(title: &str, status: GameStatus, categories: &[Category]) -> CollectionItem {
        let mut draft = ItemDraft::new(title, categories.iter().copied(), [Platform::Pc]);
        draft.status = status;
        CollectionItem::from_draft(draft, Utc::now()).expect("valid draft")
    }

    fn library() -> Vec<CollectionItem> {
        vec![
            item("Tsushima Ghost Story", GameStatus::Backlog, &[Category::Adventure]),
            item("Ghostrunner", GameStatus::Completed, &[Category::Action]),
            item("Ghost of Tsushima", GameStatus::Playing, &[Category::Action, Category::Adventure]),
            item("Celeste", GameStatus::Completed, &[Category::Platformer]),
        ]
    }

    fn index(store: &StoreAdapter, scheduler: &Arc<ManualScheduler>) -> SearchIndex {
        SearchIndex::new(store.clone(), scheduler.clone(), SearchConfig::default())
    }

    fn titles(items: &[&CollectionItem]) -> Vec<String> {
        items.iter().map(|item| item.title.clone()).collect()
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn typing_commits_after_the_quiet_period() {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        let items = library();

        search.set_query("Gh");
        scheduler.advance(ms(100));
        search.set_query("Ghost");
        assert!(search.is_searching());
        assert_eq!(search.committed_query(), "");
        assert_eq!(search.results(&items).len(), 4);

        scheduler.advance(ms(299));
        assert!(search.is_searching());
        scheduler.advance(ms(1));
        assert!(!search.is_searching());
        assert_eq!(
            titles(&search.results(&items)),
            vec!["Ghost of Tsushima", "Ghostrunner", "Tsushima Ghost Story"]
        );
    }

    #[test]
    fn filters_and_query_combine() {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        let items = library();

        search.set_status_filter(Some(GameStatus::Completed));
        assert_eq!(titles(&search.results(&items)), vec!["Ghostrunner", "Celeste"]);

        search.set_query("ghost");
        search.commit_query();
        assert_eq!(titles(&search.results(&items)), vec!["Ghostrunner"]);

        search.set_status_filter(None);
        search.set_category_filter(Some(Category::Adventure));
        assert_eq!(
            titles(&search.results(&items)),
            vec!["Ghost of Tsushima", "Tsushima Ghost Story"]
        );
    }

    #[test]
    fn idle_commit_lands_in_history_and_survives_restart() -> Result<(), StorageError> {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);

        search.set_query("celeste");
        scheduler.advance(ms(300));
        assert!(search.history().is_empty());
        scheduler.advance(ms(2000));
        assert_eq!(search.history(), vec!["celeste"]);
        drop(search);

        assert_eq!(store.load_history()?, vec!["celeste"]);
        let reopened = index(&store, &scheduler);
        assert_eq!(reopened.history(), vec!["celeste"]);
        Ok(())
    }

    #[test]
    fn typing_on_cancels_the_history_timer() {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);

        search.set_query("cel");
        scheduler.advance(ms(300));
        search.set_query("celes");
        scheduler.advance(ms(1000));
        search.set_query("celeste");
        scheduler.advance(ms(300));
        scheduler.advance(ms(2000));
        assert_eq!(search.history(), vec!["celeste"]);
    }

    #[test]
    fn short_queries_never_reach_history() {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        search.set_query("c");
        scheduler.advance(ms(5000));
        assert!(search.history().is_empty());
    }

    #[test]
    fn suggestions_switch_from_history_to_matches() -> Result<(), StorageError> {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        let items = library();

        search.record_history("zelda")?;
        let recent = search.suggestions(&items);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].kind, SuggestionKind::Recent);

        search.set_query("tsu");
        search.commit_query();
        let kinds: Vec<_> = search.suggestions(&items).iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SuggestionKind::Title, SuggestionKind::Title]);
        Ok(())
    }

    #[test]
    fn selecting_a_suggestion_commits_and_remembers_it() -> Result<(), StorageError> {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        search.set_query("gho");

        let suggestion = Suggestion {
            text: "Ghostrunner".into(),
            kind: SuggestionKind::Title,
            count: None,
        };
        search.select_suggestion(&suggestion)?;
        assert_eq!(search.committed_query(), "Ghostrunner");
        assert!(!search.is_searching());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(store.load_history()?, vec!["Ghostrunner"]);

        search.remove_history_entry("ghostrunner")?;
        assert!(store.load_history()?.is_empty());
        Ok(())
    }

    #[test]
    fn history_is_capped_and_clearable() -> Result<(), StorageError> {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        for n in 0..15 {
            search.record_history(&format!("query {n}"))?;
        }
        let history = search.history();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0], "query 14");

        search.clear_history()?;
        assert!(search.history().is_empty());
        assert!(store.load_history()?.is_empty());
        Ok(())
    }

    #[test]
    fn superseded_debounce_task_does_not_commit() {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);

        search.set_query("Gh");
        let stale = search.shared.state.lock().debounce_seq;
        search.set_query("Ghost");

        // The first timer lost the race with its cancellation and runs anyway.
        on_debounce(&search.shared, stale);
        assert!(search.is_searching());
        assert_eq!(search.committed_query(), "");
        assert!(search.shared.state.lock().debounce.is_some());

        scheduler.advance(ms(300));
        assert!(!search.is_searching());
        assert_eq!(search.committed_query(), "Ghost");
    }

    #[test]
    fn dropping_the_index_cancels_pending_timers() {
        let store = StoreAdapter::in_memory();
        let scheduler = Arc::new(ManualScheduler::new());
        let search = index(&store, &scheduler);
        search.set_query("ghost");
        assert_eq!(scheduler.pending(), 1);
        drop(search);
        assert_eq!(scheduler.pending(), 0);
    }
}
