//! The in-memory collection and the single entry point for mutating it.
//!
//! Every mutation hands the full snapshot to the [`AutosaveEngine`]; readers
//! such as the [`SearchIndex`] borrow the current items when they are asked.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    autosave::AutosaveEngine,
    config::EngineConfig,
    models::{CollectionItem, GameStatus, ItemDraft, ValidationError},
    schedule::Scheduler,
    search::{SearchIndex, Suggestion},
    storage::{StorageError, StoreAdapter},
    transcode::{self, ExportOptions, ExportedFile, Format, ImportResult, TranscodeError},
};

/// Failures surfaced by [`Collection`] operations.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The draft was refused.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// No item carries the given id.
    #[error("no game with id `{0}`")]
    NotFound(String),
    /// The stored snapshot could not be loaded.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Aggregates over the current items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    /// Number of items.
    pub total: usize,
    /// Items per status, every status present.
    pub by_status: BTreeMap<GameStatus, usize>,
    /// Sum of recorded playtime.
    pub total_hours: f64,
    /// Mean over rated items.
    pub average_rating: Option<f64>,
}

/// Owns the collection and wires it to autosave and search.
pub struct Collection {
    items: Vec<CollectionItem>,
    autosave: AutosaveEngine,
    search: SearchIndex,
}

impl Collection {
    /// Load the stored snapshot and start the autosave and search engines.
    ///
    /// A snapshot that cannot be decoded is an error; it is never replaced
    /// with an empty collection.
    pub fn open(
        store: StoreAdapter,
        scheduler: Arc<dyn Scheduler>,
        config: &EngineConfig,
    ) -> Result<Self, CollectionError> {
        let items = store.load_collection()?;
        info!(items = items.len(), "collection loaded");
        let autosave = AutosaveEngine::new(store.clone(), Arc::clone(&scheduler), config.autosave);
        let search = SearchIndex::new(store, scheduler, config.search);
        Ok(Self {
            items,
            autosave,
            search,
        })
    }

    /// Items in insertion order.
    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    /// Look up one item.
    pub fn get(&self, id: &str) -> Option<&CollectionItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Validate `draft` and append it with a fresh id.
    pub fn add(&mut self, draft: ItemDraft) -> Result<&CollectionItem, CollectionError> {
        let item = CollectionItem::from_draft(draft, Utc::now())?;
        debug!(id = %item.id, title = %item.title, "adding game");
        self.items.push(item);
        self.changed();
        let index = self.items.len() - 1;
        Ok(&self.items[index])
    }

    /// Replace the editable fields of `id`, keeping its identity.
    pub fn update(&mut self, id: &str, draft: ItemDraft) -> Result<&CollectionItem, CollectionError> {
        let index = self.position(id)?;
        self.items[index].apply_draft(draft, Utc::now())?;
        self.changed();
        Ok(&self.items[index])
    }

    /// Move `id` to `status`, stamping start or completion dates that are still unset.
    pub fn set_status(&mut self, id: &str, status: GameStatus) -> Result<&CollectionItem, CollectionError> {
        let index = self.position(id)?;
        apply_status(&mut self.items[index], status, Utc::now());
        self.changed();
        Ok(&self.items[index])
    }

    /// Delete `id`, returning the removed item.
    pub fn remove(&mut self, id: &str) -> Result<CollectionItem, CollectionError> {
        let index = self.position(id)?;
        let item = self.items.remove(index);
        debug!(id = %item.id, title = %item.title, "removed game");
        self.changed();
        Ok(item)
    }

    /// Import `input`, appending whatever the transcoder accepts.
    pub fn import(&mut self, input: &str, format: Format) -> ImportResult {
        let result = transcode::import_items(input, format, &self.items, Utc::now());
        if !result.imported.is_empty() {
            self.items.extend(result.imported.iter().cloned());
            self.changed();
        }
        info!("{}", result.summary());
        result
    }

    /// Render the current items.
    pub fn export(&self, format: Format, options: &ExportOptions) -> Result<ExportedFile, TranscodeError> {
        transcode::export_items(&self.items, format, options, Utc::now())
    }

    /// Query state and history.
    pub fn search(&self) -> &SearchIndex {
        &self.search
    }

    /// Current items filtered and ranked by the search state.
    pub fn search_results(&self) -> Vec<&CollectionItem> {
        self.search.results(&self.items)
    }

    /// Suggestions for the committed query.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.search.suggestions(&self.items)
    }

    /// Aggregates for summary views.
    pub fn stats(&self) -> CollectionStats {
        let mut by_status: BTreeMap<GameStatus, usize> =
            GameStatus::ALL.iter().map(|status| (*status, 0)).collect();
        for item in &self.items {
            *by_status.entry(item.status).or_default() += 1;
        }
        let total_hours: f64 = self.items.iter().filter_map(|item| item.hours_played).sum();
        let ratings: Vec<f64> = self
            .items
            .iter()
            .filter_map(|item| item.rating)
            .map(|rating| f64::from(rating.value()))
            .collect();
        let average_rating =
            (!ratings.is_empty()).then(|| ratings.iter().sum::<f64>() / ratings.len() as f64);

        CollectionStats {
            total: self.items.len(),
            by_status,
            total_hours,
            average_rating,
        }
    }

    /// Write any pending snapshot now.
    pub fn flush(&self) -> bool {
        self.autosave.flush()
    }

    /// Save status and events.
    pub fn autosave(&self) -> &AutosaveEngine {
        &self.autosave
    }

    fn position(&self, id: &str) -> Result<usize, CollectionError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CollectionError::NotFound(id.to_string()))
    }

    fn changed(&self) {
        self.autosave.save(self.items.clone());
    }
}

fn apply_status(item: &mut CollectionItem, status: GameStatus, now: DateTime<Utc>) {
    item.status = status;
    match status {
        GameStatus::Playing if item.start_date.is_none() => item.start_date = Some(now),
        GameStatus::Completed if item.completion_date.is_none() => item.completion_date = Some(now),
        _ => {}
    }
    item.touch(now);
}
