//! Debounced, periodically flushed persistence of collection snapshots.
//!
//! Status transitions:
//!
//! ```text
//! idle -> saving -> saved -> idle
//!           \-> error -> idle
//! ```
//!
//! `save` only records the latest snapshot and re-arms the debounce timer; the
//! write itself happens when a timer fires or when [`AutosaveEngine::flush`] is
//! called. A failed write keeps the snapshot buffered for the next attempt.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    models::CollectionItem,
    schedule::{Scheduler, TimerToken},
    storage::StoreAdapter,
};

/// Timing knobs for the autosave engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
    /// Quiet period after the last `save` before writing.
    pub debounce: Duration,
    /// Period of the background safety-net flush.
    pub interval: Duration,
    /// How long `Saved`/`Error` stay visible before reverting to `Idle`.
    pub saved_display: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            interval: Duration::from_secs(30),
            saved_display: Duration::from_secs(2),
        }
    }
}

/// Observable save progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SaveStatus {
    /// Nothing in flight.
    Idle,
    /// A write is being applied to the store.
    Saving,
    /// The most recent write succeeded.
    Saved,
    /// The most recent write failed.
    Error(String),
}

/// Notifications emitted after each write attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveEvent {
    /// A snapshot reached the store.
    Saved {
        /// Number of items in the snapshot.
        items: usize,
        /// Completion time.
        at: DateTime<Utc>,
    },
    /// A write failed; the snapshot stays buffered.
    Failed {
        /// Human-readable cause.
        message: String,
        /// Whether a later attempt may succeed.
        retryable: bool,
    },
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Debounce,
    Interval,
    Explicit,
}

struct State {
    status: SaveStatus,
    latest: Option<Arc<Vec<CollectionItem>>>,
    generation: u64,
    persisted_generation: u64,
    last_saved_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    debounce: Option<TimerToken>,
    debounce_seq: u64,
    interval: Option<TimerToken>,
    revert: Option<TimerToken>,
    listeners: Vec<mpsc::UnboundedSender<AutosaveEvent>>,
}

struct Shared {
    state: Mutex<State>,
    store: StoreAdapter,
    scheduler: Arc<dyn Scheduler>,
    config: AutosaveConfig,
}

/// Writes full collection snapshots to a [`StoreAdapter`] without blocking mutations.
pub struct AutosaveEngine {
    shared: Arc<Shared>,
}

impl AutosaveEngine {
    /// Create an engine and arm its background flush.
    pub fn new(store: StoreAdapter, scheduler: Arc<dyn Scheduler>, config: AutosaveConfig) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                status: SaveStatus::Idle,
                latest: None,
                generation: 0,
                persisted_generation: 0,
                last_saved_at: None,
                last_error: None,
                debounce: None,
                debounce_seq: 0,
                interval: None,
                revert: None,
                listeners: Vec::new(),
            }),
            store,
            scheduler,
            config,
        });
        arm_interval(&shared);
        Self { shared }
    }

    /// Record the latest snapshot and restart the debounce window.
    ///
    /// Calls landing inside one window collapse into a single write of the last
    /// snapshot passed.
    pub fn save(&self, snapshot: Vec<CollectionItem>) {
        let previous = {
            let mut state = self.shared.state.lock();
            state.latest = Some(Arc::new(snapshot));
            state.generation += 1;
            state.debounce.take()
        };
        if let Some(token) = previous {
            self.shared.scheduler.cancel(token);
        }
        arm_debounce(&self.shared);
    }

    /// Write the buffered snapshot now, returning whether the store accepted it.
    ///
    /// Returns `true` without writing when the store already holds the latest
    /// snapshot and the last attempt succeeded. Returns `false` without touching
    /// the pending debounce while another write is in flight.
    pub fn flush(&self) -> bool {
        let pending = {
            let mut state = self.shared.state.lock();
            if state.status == SaveStatus::Saving {
                return false;
            }
            let current = state.generation == state.persisted_generation;
            if state.latest.is_none() || (current && state.last_error.is_none()) {
                return true;
            }
            state.debounce.take()
        };
        if let Some(token) = pending {
            self.shared.scheduler.cancel(token);
        }
        write_attempt(&self.shared, Trigger::Explicit)
    }

    /// Current status.
    pub fn status(&self) -> SaveStatus {
        self.shared.state.lock().status.clone()
    }

    /// Completion time of the last successful write.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.lock().last_saved_at
    }

    /// Cause of the last failure, kept until a write succeeds.
    pub fn last_error(&self) -> Option<String> {
        self.shared.state.lock().last_error.clone()
    }

    /// Whether the latest recorded snapshot has not reached the store yet.
    pub fn has_unsaved_changes(&self) -> bool {
        let state = self.shared.state.lock();
        state.generation != state.persisted_generation
    }

    /// Receive an [`AutosaveEvent`] after every write attempt.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AutosaveEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.state.lock().listeners.push(tx);
        rx
    }
}

impl Drop for AutosaveEngine {
    fn drop(&mut self) {
        let tokens = {
            let mut state = self.shared.state.lock();
            [state.debounce.take(), state.interval.take(), state.revert.take()]
        };
        for token in tokens.into_iter().flatten() {
            self.shared.scheduler.cancel(token);
        }
        if self.has_unsaved_changes() {
            warn!("autosave engine dropped with unsaved changes");
        }
    }
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
    let busy = {
        let mut state = shared.state.lock();
        // A newer timer owns the slot; it will do the write.
        if state.debounce_seq != seq {
            return;
        }
        state.debounce = None;
        state.status == SaveStatus::Saving
    };
    if busy {
        debug!("write in flight, deferring debounced save");
        arm_debounce(shared);
    } else {
        write_attempt(shared, Trigger::Debounce);
    }
}

fn arm_interval(shared: &Arc<Shared>) {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let token = shared.scheduler.schedule(
        shared.config.interval,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                write_attempt(&shared, Trigger::Interval);
                arm_interval(&shared);
            }
        }),
    );
    shared.state.lock().interval = Some(token);
}

fn write_attempt(shared: &Arc<Shared>, trigger: Trigger) -> bool {
    let (snapshot, generation) = {
        let mut state = shared.state.lock();
        if state.status == SaveStatus::Saving {
            return false;
        }
        let Some(snapshot) = state.latest.clone() else {
            return true;
        };
        state.status = SaveStatus::Saving;
        (snapshot, state.generation)
    };

    debug!(?trigger, items = snapshot.len(), "writing collection snapshot");
    let result = shared.store.save_collection(&snapshot);

    let (event, listeners, stale_revert) = {
        let mut state = shared.state.lock();
        let event = match result {
            Ok(bytes) => {
                let at = Utc::now();
                state.persisted_generation = state.persisted_generation.max(generation);
                state.status = SaveStatus::Saved;
                state.last_saved_at = Some(at);
                state.last_error = None;
                info!(?trigger, items = snapshot.len(), bytes, "collection saved");
                AutosaveEvent::Saved {
                    items: snapshot.len(),
                    at,
                }
            }
            Err(err) => {
                let message = format!("Failed to save collection: {err}");
                warn!(?trigger, "{message}");
                state.status = SaveStatus::Error(message.clone());
                state.last_error = Some(message.clone());
                AutosaveEvent::Failed {
                    message,
                    retryable: true,
                }
            }
        };
        state.listeners.retain(|listener| !listener.is_closed());
        (event, state.listeners.clone(), state.revert.take())
    };

    if let Some(token) = stale_revert {
        shared.scheduler.cancel(token);
    }
    arm_revert(shared);

    let succeeded = matches!(event, AutosaveEvent::Saved { .. });
    for listener in listeners {
        let _ = listener.send(event.clone());
    }
    succeeded
}

fn arm_revert(shared: &Arc<Shared>) {
    let weak = Arc::downgrade(shared);
    let token = shared.scheduler.schedule(
        shared.config.saved_display,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                let mut state = shared.state.lock();
                state.revert = None;
                if matches!(state.status, SaveStatus::Saved | SaveStatus::Error(_)) {
                    state.status = SaveStatus::Idle;
                }
            }
        }),
    );
    shared.state.lock().revert = Some(token);
}
