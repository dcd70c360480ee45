/// Most-recent-first list of past queries, deduplicated ignoring case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHistory {
    entries: Vec<String>,
    limit: usize,
}

impl QueryHistory {
    /// Empty history holding at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
        }
    }

    /// Rebuild from persisted entries, re-applying the dedup and the cap.
    pub fn from_entries(entries: Vec<String>, limit: usize) -> Self {
        let mut history = Self::new(limit);
        for entry in entries.into_iter().rev() {
            history.record(&entry);
        }
        history
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Move `query` to the front. Returns false when nothing changed.
    pub fn record(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() || self.limit == 0 {
            return false;
        }
        if self.entries.first().map(String::as_str) == Some(query) {
            return false;
        }
        let folded = query.to_lowercase();
        self.entries.retain(|entry| entry.to_lowercase() != folded);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(self.limit);
        true
    }

    /// Drop every entry equal to `query` ignoring case.
    pub fn remove(&mut self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        let before = self.entries.len();
        self.entries.retain(|entry| entry.to_lowercase() != needle);
        self.entries.len() != before
    }

    /// Forget everything.
    pub fn clear(&mut self) -> bool {
        let changed = !self.entries.is_empty();
        self.entries.clear();
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_without_case_duplicates() {
        let mut history = QueryHistory::new(10);
        assert!(history.record("zelda"));
        assert!(history.record("hades"));
        assert!(history.record("  ZELDA "));
        assert_eq!(history.entries(), ["ZELDA", "hades"]);
        assert!(!history.record("ZELDA"));
        assert!(!history.record("   "));
    }

    #[test]
    fn cap_evicts_the_oldest() {
        let mut history = QueryHistory::new(3);
        for query in ["a1", "a2", "a3", "a4"] {
            history.record(query);
        }
        assert_eq!(history.entries(), ["a4", "a3", "a2"]);
    }

    #[test]
    fn restored_entries_keep_their_order() {
        let history = QueryHistory::from_entries(
            vec!["new".into(), "mid".into(), "NEW".into(), "old".into()],
            2,
        );
        assert_eq!(history.entries(), ["new", "mid"]);
    }

    #[test]
    fn remove_and_clear_report_changes() {
        let mut history = QueryHistory::new(5);
        history.record("celeste");
        assert!(!history.remove("hades"));
        assert!(history.remove("CELESTE"));
        assert!(!history.clear());
    }
}
