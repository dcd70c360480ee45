use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::models::CollectionItem;

use super::{json::candidate_from_value, Candidate, TranscodeError};

/// Envelope version written by this build.
pub const BACKUP_VERSION: &str = "1.0";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupEnvelope<'a> {
    version: &'static str,
    timestamp: DateTime<Utc>,
    games_count: usize,
    games: &'a [CollectionItem],
    metadata: BackupMetadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupMetadata {
    app_version: &'static str,
    exported_by: &'static str,
    platform: &'static str,
}

pub(super) fn export(items: &[CollectionItem], now: DateTime<Utc>) -> Result<String, TranscodeError> {
    let envelope = BackupEnvelope {
        version: BACKUP_VERSION,
        timestamp: now,
        games_count: items.len(),
        games: items,
        metadata: BackupMetadata {
            app_version: env!("CARGO_PKG_VERSION"),
            exported_by: "gamevault",
            platform: std::env::consts::OS,
        },
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Requires the envelope; its games go through the same validation as any import.
pub(super) fn parse(input: &str) -> Result<Vec<Candidate>, TranscodeError> {
    let value: Value = serde_json::from_str(input)?;
    let Value::Object(mut envelope) = value else {
        return Err(not_a_backup());
    };
    let version = match envelope.get("version") {
        Some(Value::String(version)) => version.clone(),
        Some(Value::Number(version)) => version.to_string(),
        _ => return Err(not_a_backup()),
    };
    if version.split('.').next() != BACKUP_VERSION.split('.').next() {
        warn!(%version, supported = BACKUP_VERSION, "backup was written by an incompatible version");
    }
    let Some(Value::Array(games)) = envelope.remove("games") else {
        return Err(not_a_backup());
    };
    if let Some(declared) = envelope.get("gamesCount").and_then(Value::as_u64) {
        if declared != games.len() as u64 {
            warn!(declared, found = games.len(), "backup game count does not match its contents");
        }
    }
    Ok(games.iter().map(candidate_from_value).collect())
}

fn not_a_backup() -> TranscodeError {
    TranscodeError::Structure("expected a backup with `version` and `games`".into())
}
