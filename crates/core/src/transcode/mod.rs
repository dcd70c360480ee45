//! Conversion between the in-memory collection and external file formats.
//!
//! Four formats are supported in both directions:
//!
//! - [`Format::Json`]: a pretty-printed array of items, fields gated by [`ExportOptions`].
//! - [`Format::Csv`]: one header row plus one row per item.
//! - [`Format::Steam`]: a lossy `{list: [...]}` projection of the PC library.
//! - [`Format::Backup`]: a versioned envelope carrying every field.
//!
//! Imports never fail as a whole: [`import_items`] always returns an
//! [`ImportResult`] describing what was accepted, rejected and skipped.

mod backup;
mod csv;
mod json;
/// Untyped intermediate records produced by the parsers.
pub mod record;
mod steam;

use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::CollectionItem;

pub use record::RawRecord;

/// Failures that abort a whole export or a whole file's import.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Nothing to parse.
    #[error("file is empty")]
    Empty,
    /// The file parsed but held no records.
    #[error("no games found in file")]
    NoRecords,
    /// Syntax error in JSON input or failure encoding JSON output.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Syntax error in CSV input or failure encoding CSV output.
    #[error("invalid CSV: {0}")]
    Csv(#[from] ::csv::Error),
    /// Well-formed input whose top-level shape is not the expected one.
    #[error("unexpected file structure: {0}")]
    Structure(String),
    /// Output buffer failure.
    #[error("failed to finish output: {0}")]
    Io(#[from] std::io::Error),
    /// Output was not valid UTF-8.
    #[error("output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// External representation selected by the caller. Formats are never sniffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Pretty-printed JSON array.
    Json,
    /// Comma-separated values.
    Csv,
    /// Steam-like library listing.
    Steam,
    /// Versioned full backup.
    Backup,
}

impl Format {
    /// Every supported format.
    pub const ALL: &'static [Format] = &[Format::Json, Format::Csv, Format::Steam, Format::Backup];

    /// Short identifier.
    pub fn label(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Steam => "steam",
            Format::Backup => "backup",
        }
    }

    /// File extension for downloads.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            _ => "json",
        }
    }

    /// MIME type for downloads.
    pub fn mime_type(self) -> &'static str {
        match self {
            Format::Csv => "text/csv",
            _ => "application/json",
        }
    }

    /// Base file name used when the caller does not supply one.
    pub fn default_base_name(self) -> &'static str {
        match self {
            Format::Json | Format::Csv => "game-collection",
            Format::Steam => "steam-library",
            Format::Backup => "game-backup",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .iter()
            .copied()
            .find(|format| format.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown format `{value}`"))
    }
}

/// Which optional field groups an export carries.
///
/// Ignored by [`Format::Backup`], which always carries everything, and by
/// [`Format::Steam`], whose field set is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Developer, publisher, dates, playtime and cover image.
    pub include_metadata: bool,
    /// Notes and description.
    pub include_notes: bool,
    /// Rating.
    pub include_ratings: bool,
    /// Overrides [`Format::default_base_name`].
    pub base_name: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_metadata: true,
            include_notes: true,
            include_ratings: true,
            base_name: None,
        }
    }
}

/// A rendered export ready to be written or downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// `<base>-<YYYY-MM-DD>.<ext>`.
    pub filename: String,
    /// MIME type matching the content.
    pub mime_type: &'static str,
    /// UTF-8 document.
    pub content: String,
    /// Number of items that made it into the document.
    pub item_count: usize,
}

/// Outcome of importing one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportResult {
    /// True iff at least one item was imported.
    pub success: bool,
    /// Accepted items, carrying fresh ids and timestamps.
    pub imported: Vec<CollectionItem>,
    /// One message per rejected record, or a single message for an unreadable file.
    pub errors: Vec<String>,
    /// Records skipped because the collection already holds that title.
    pub duplicates: usize,
    /// Candidate records found in the file.
    pub total: usize,
}

impl ImportResult {
    fn aborted(error: &TranscodeError) -> Self {
        Self {
            errors: vec![error.to_string()],
            ..Default::default()
        }
    }

    /// Single-line summary suitable for a notification.
    pub fn summary(&self) -> String {
        if self.total == 0 {
            return match self.errors.first() {
                Some(error) => format!("Import failed: {error}"),
                None => "Import failed: nothing to import".to_string(),
            };
        }
        let mut summary = format!("Imported {} of {} games", self.imported.len(), self.total);
        if self.duplicates > 0 {
            summary.push_str(&format!(", {} duplicates skipped", self.duplicates));
        }
        if !self.errors.is_empty() {
            summary.push_str(&format!(", {} errors", self.errors.len()));
        }
        summary
    }
}

/// Download name for an export produced on `date`.
pub fn export_filename(base_name: &str, format: Format, date: NaiveDate) -> String {
    format!(
        "{}-{}.{}",
        base_name,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Render `items` in the requested format.
pub fn export_items(
    items: &[CollectionItem],
    format: Format,
    options: &ExportOptions,
    now: DateTime<Utc>,
) -> Result<ExportedFile, TranscodeError> {
    let (content, item_count) = match format {
        Format::Json => (json::export(items, options)?, items.len()),
        Format::Csv => (csv::export(items, options)?, items.len()),
        Format::Steam => steam::export(items)?,
        Format::Backup => (backup::export(items, now)?, items.len()),
    };
    let base_name = options
        .base_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(format.default_base_name());
    let file = ExportedFile {
        filename: export_filename(base_name, format, now.date_naive()),
        mime_type: format.mime_type(),
        content,
        item_count,
    };
    info!(%format, items = item_count, filename = %file.filename, "exported collection");
    Ok(file)
}

/// A parsed candidate, or the reason the parser could not read it as a record.
pub(crate) type Candidate = Result<RawRecord, String>;

fn parse_candidates(input: &str, format: Format) -> Result<Vec<Candidate>, TranscodeError> {
    let input = input.trim_start_matches('\u{feff}');
    if input.trim().is_empty() {
        return Err(TranscodeError::Empty);
    }
    let candidates = match format {
        Format::Json => json::parse(input)?,
        Format::Csv => csv::parse(input)?,
        Format::Steam => steam::parse(input)?,
        Format::Backup => backup::parse(input)?,
    };
    if candidates.is_empty() {
        return Err(TranscodeError::NoRecords);
    }
    Ok(candidates)
}

/// Parse, validate and deduplicate `input` against the `existing` collection.
///
/// Duplicates are matched by case-insensitive title against `existing` only,
/// never against other records of the same file. Accepted items get fresh ids
/// and timestamps regardless of what the file carries.
pub fn import_items(
    input: &str,
    format: Format,
    existing: &[CollectionItem],
    now: DateTime<Utc>,
) -> ImportResult {
    let candidates = match parse_candidates(input, format) {
        Ok(candidates) => candidates,
        Err(err) => {
            warn!(%format, "import aborted: {err}");
            return ImportResult::aborted(&err);
        }
    };

    let known: HashSet<String> = existing.iter().map(|item| title_key(&item.title)).collect();
    let mut result = ImportResult {
        total: candidates.len(),
        ..Default::default()
    };

    for (index, candidate) in candidates.into_iter().enumerate() {
        let position = index + 1;
        let item = match candidate {
            Ok(record) => record.into_item(now).map_err(|err| err.to_string()),
            Err(reason) => Err(reason),
        };
        match item {
            Ok(item) if known.contains(&title_key(&item.title)) => result.duplicates += 1,
            Ok(item) => result.imported.push(item),
            Err(reason) => result.errors.push(format!("Record {position}: {reason}")),
        }
    }

    result.success = !result.imported.is_empty();
    info!(
        %format,
        total = result.total,
        imported = result.imported.len(),
        duplicates = result.duplicates,
        errors = result.errors.len(),
        "import finished"
    );
    result
}

pub(crate) fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, GameStatus, ItemDraft, Platform, Rating};
    use chrono::TimeZone;

    pub(super) fn sample(title: &str) -> CollectionItem {
        let mut draft = ItemDraft::new(title, [Category::Action, Category::Rpg], [Platform::Pc]);
        draft.status = GameStatus::Playing;
        draft.rating = Some(Rating::new(8).expect("valid rating"));
        draft.hours_played = Some(12.5);
        draft.developer = Some("Supergiant Games".into());
        draft.notes = Some("Great soundtrack".into());
        CollectionItem::from_draft(draft, Utc::now()).expect("valid draft")
    }

    #[test]
    fn filenames_carry_the_export_date() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).expect("valid date");
        assert_eq!(
            export_filename("my-games", Format::Csv, date),
            "my-games-2024-05-17.csv"
        );
        assert_eq!(
            export_filename("my-games", Format::Backup, date),
            "my-games-2024-05-17.json"
        );
    }

    #[test]
    fn export_uses_default_or_custom_base_names() -> Result<(), TranscodeError> {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let items = vec![sample("Hades")];

        let file = export_items(&items, Format::Steam, &ExportOptions::default(), now)?;
        assert_eq!(file.filename, "steam-library-2024-01-02.json");
        assert_eq!(file.mime_type, "application/json");

        let options = ExportOptions {
            base_name: Some("shelf".into()),
            ..Default::default()
        };
        let file = export_items(&items, Format::Csv, &options, now)?;
        assert_eq!(file.filename, "shelf-2024-01-02.csv");
        assert_eq!(file.mime_type, "text/csv");
        Ok(())
    }

    #[test]
    fn empty_csv_import_reports_one_error() {
        let result = import_items("", Format::Csv, &[], Utc::now());
        assert!(!result.success);
        assert!(result.imported.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.duplicates, 0);
        assert_eq!(result.total, 0);
    }

    #[test]
    fn malformed_top_level_aborts_with_one_error() {
        let result = import_items(r#"{"title": "Hades"}"#, Format::Json, &[], Utc::now());
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.total, 0);

        let result = import_items("[{", Format::Json, &[], Utc::now());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("invalid JSON"));
    }

    #[test]
    fn duplicates_match_existing_titles_case_insensitively() {
        let existing = vec![sample("Hades")];
        let input = r#"[
            {"title": "  HADES ", "categories": ["Action"], "platforms": ["PC"]},
            {"title": "Celeste", "categories": ["Platformer"], "platforms": ["PC"]}
        ]"#;
        let result = import_items(input, Format::Json, &existing, Utc::now());
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.imported.len(), 1);
        assert_eq!(result.imported[0].title, "Celeste");
        assert!(result.errors.is_empty());
        assert!(result.success);
    }

    #[test]
    fn duplicates_inside_one_batch_are_both_kept() {
        let input = r#"[
            {"title": "Tetris", "categories": ["Puzzle"], "platforms": ["Mobile"]},
            {"title": "tetris", "categories": ["Puzzle"], "platforms": ["PC"]}
        ]"#;
        let result = import_items(input, Format::Json, &[], Utc::now());
        assert_eq!(result.imported.len(), 2);
        assert_eq!(result.duplicates, 0);
    }

    #[test]
    fn invalid_records_are_counted_not_dropped() {
        let input = r#"{"games": [
            {"categories": ["Action"], "platforms": ["PC"]},
            {"title": "No Tags", "categories": [], "platforms": ["PC"]},
            {"title": "No Platforms", "categories": ["Action"], "platforms": []},
            "not an object",
            {"title": "Fine", "categories": ["Action"], "platforms": ["PC"]}
        ]}"#;
        let result = import_items(input, Format::Json, &[], Utc::now());
        assert_eq!(result.total, 5);
        assert_eq!(result.imported.len(), 1);
        assert_eq!(result.errors.len(), 4);
        assert_eq!(result.errors[0], "Record 1: missing title");
        assert!(result.errors[3].starts_with("Record 4:"));
        assert!(result.success);
        assert_eq!(
            result.summary(),
            "Imported 1 of 5 games, 4 errors"
        );
    }

    #[test]
    fn imports_assign_fresh_identity() {
        let original = sample("Hades");
        let input = serde_json::to_string(&vec![original.clone()]).expect("serializable");
        let now = Utc::now();
        let result = import_items(&input, Format::Json, &[], now);
        let imported = &result.imported[0];
        assert_ne!(imported.id, original.id);
        assert_eq!(imported.created_at, now);
        assert_eq!(imported.updated_at, now);
    }

    #[test]
    fn empty_array_is_reported() {
        let result = import_items("[]", Format::Json, &[], Utc::now());
        assert_eq!(result.errors, vec!["no games found in file".to_string()]);
        assert_eq!(result.summary(), "Import failed: no games found in file");
    }

    #[test]
    fn formats_parse_from_labels() {
        assert_eq!("CSV".parse::<Format>(), Ok(Format::Csv));
        assert_eq!(" backup ".parse::<Format>(), Ok(Format::Backup));
        assert!("xml".parse::<Format>().is_err());
    }
}
