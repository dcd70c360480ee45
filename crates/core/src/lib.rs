#![warn(clippy::all, missing_docs)]

//! Core of gamevault, a local-first game catalog.
//!
//! This crate hosts the data models, the key-value persistence layer, the
//! debounced autosave and search engines, and the file-format transcoder
//! used by the command-line front end and any future frontends.

pub mod autosave;
pub mod collection;
pub mod config;
pub mod models;
pub mod schedule;
pub mod search;
pub mod storage;
pub mod transcode;

pub use autosave::{AutosaveConfig, AutosaveEngine, AutosaveEvent, SaveStatus};
pub use collection::{Collection, CollectionError, CollectionStats};
pub use config::{AppConfig, EngineConfig};
pub use models::{Category, CollectionItem, GameStatus, ItemDraft, Platform, Rating, ValidationError};
pub use schedule::{ManualScheduler, Scheduler, TimerToken, TokioScheduler};
pub use search::{SearchConfig, SearchIndex, Suggestion, SuggestionKind};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError, StorageKeys, StoreAdapter};
pub use transcode::{ExportOptions, ExportedFile, Format, ImportResult, TranscodeError};
