use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use serde::Serialize;

use crate::models::{Category, CollectionItem};

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    /// A matching item title.
    Title,
    /// A matching developer name.
    Developer,
    /// A matching category label.
    Category,
    /// A past query from history.
    Recent,
}

impl fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            SuggestionKind::Title => "title",
            SuggestionKind::Developer => "developer",
            SuggestionKind::Category => "category",
            SuggestionKind::Recent => "recent",
        })
    }
}

/// A typed autocomplete candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Text to place in the search box when selected.
    pub text: String,
    /// Source of the suggestion.
    pub kind: SuggestionKind,
    /// Number of items sharing this developer or category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Suggestion {
    fn new(text: impl Into<String>, kind: SuggestionKind, count: Option<usize>) -> Self {
        Self {
            text: text.into(),
            kind,
            count,
        }
    }
}

/// Queries shorter than this get recent history instead of collection matches.
pub const MIN_SUGGESTION_QUERY: usize = 2;

/// Assemble suggestions for `query`.
///
/// Short queries return up to `recent_display` history entries. Longer ones run
/// three passes over `items` (titles, developers, categories), skipping any text
/// an earlier suggestion already used, and stop at `max` entries.
pub fn build_suggestions(
    items: &[CollectionItem],
    query: &str,
    history: &[String],
    recent_display: usize,
    max: usize,
) -> Vec<Suggestion> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < MIN_SUGGESTION_QUERY {
        return history
            .iter()
            .take(recent_display)
            .map(|entry| Suggestion::new(entry.as_str(), SuggestionKind::Recent, None))
            .collect();
    }

    let mut out = Suggestions {
        items: Vec::new(),
        seen: HashSet::new(),
        max,
    };

    for item in items {
        if item.title.to_lowercase().contains(&needle) {
            out.push(Suggestion::new(item.title.as_str(), SuggestionKind::Title, None));
        }
    }

    let mut developers: Vec<(&str, usize)> = Vec::new();
    for developer in items.iter().filter_map(|item| item.developer.as_deref()) {
        if !developer.to_lowercase().contains(&needle) {
            continue;
        }
        match developers.iter_mut().find(|(name, _)| *name == developer) {
            Some((_, count)) => *count += 1,
            None => developers.push((developer, 1)),
        }
    }
    for (developer, count) in by_count(developers) {
        out.push(Suggestion::new(developer, SuggestionKind::Developer, Some(count)));
    }

    let mut categories: HashMap<Category, usize> = HashMap::new();
    for category in items.iter().flat_map(|item| item.categories.iter()) {
        if category.label().to_lowercase().contains(&needle) {
            *categories.entry(*category).or_default() += 1;
        }
    }
    let categories = categories
        .into_iter()
        .map(|(category, count)| (category.label(), count))
        .collect();
    for (label, count) in by_count(categories) {
        out.push(Suggestion::new(label, SuggestionKind::Category, Some(count)));
    }

    out.items
}

/// Most frequent first, then alphabetical.
fn by_count(mut entries: Vec<(&str, usize)>) -> Vec<(&str, usize)> {
    entries.sort_by(|(name_a, count_a), (name_b, count_b)| {
        count_b
            .cmp(count_a)
            .then_with(|| name_a.to_lowercase().cmp(&name_b.to_lowercase()))
            .then_with(|| name_a.cmp(name_b))
    });
    entries
}

struct Suggestions {
    items: Vec<Suggestion>,
    seen: HashSet<String>,
    max: usize,
}

impl Suggestions {
    fn push(&mut self, suggestion: Suggestion) {
        if self.items.len() >= self.max {
            return;
        }
        if self.seen.insert(suggestion.text.to_lowercase()) {
            self.items.push(suggestion);
        }
    }
}
