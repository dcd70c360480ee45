use ::csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::models::CollectionItem;

use super::{record::split_list, Candidate, ExportOptions, RawRecord, TranscodeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Id,
    Title,
    Categories,
    Platforms,
    Status,
    Rating,
    HoursPlayed,
    Developer,
    Publisher,
    ReleaseDate,
    StartDate,
    CompletionDate,
    CoverImage,
    CreatedAt,
    UpdatedAt,
    Notes,
    Description,
}

const BASE_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Title,
    Column::Categories,
    Column::Platforms,
    Column::Status,
];
const RATING_COLUMNS: &[Column] = &[Column::Rating];
const METADATA_COLUMNS: &[Column] = &[
    Column::HoursPlayed,
    Column::Developer,
    Column::Publisher,
    Column::ReleaseDate,
    Column::StartDate,
    Column::CompletionDate,
    Column::CoverImage,
    Column::CreatedAt,
    Column::UpdatedAt,
];
const NOTE_COLUMNS: &[Column] = &[Column::Notes, Column::Description];

impl Column {
    fn header(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Title => "Title",
            Column::Categories => "Categories",
            Column::Platforms => "Platforms",
            Column::Status => "Status",
            Column::Rating => "Rating",
            Column::HoursPlayed => "Hours Played",
            Column::Developer => "Developer",
            Column::Publisher => "Publisher",
            Column::ReleaseDate => "Release Date",
            Column::StartDate => "Start Date",
            Column::CompletionDate => "Completion Date",
            Column::CoverImage => "Cover Image",
            Column::CreatedAt => "Created At",
            Column::UpdatedAt => "Updated At",
            Column::Notes => "Notes",
            Column::Description => "Description",
        }
    }

    /// Matches headers ignoring case, spaces and punctuation, plus a few aliases.
    fn from_header(header: &str) -> Option<Self> {
        let normalized: String = header
            .trim_matches('\u{feff}')
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        let column = match normalized.as_str() {
            "id" => Column::Id,
            "title" | "name" => Column::Title,
            "categories" | "category" | "genre" | "genres" => Column::Categories,
            "platforms" | "platform" => Column::Platforms,
            "status" => Column::Status,
            "rating" => Column::Rating,
            "hoursplayed" | "hours" | "playtime" => Column::HoursPlayed,
            "developer" => Column::Developer,
            "publisher" => Column::Publisher,
            "releasedate" | "released" => Column::ReleaseDate,
            "startdate" => Column::StartDate,
            "completiondate" => Column::CompletionDate,
            "coverimage" | "cover" => Column::CoverImage,
            "createdat" => Column::CreatedAt,
            "updatedat" => Column::UpdatedAt,
            "notes" => Column::Notes,
            "description" => Column::Description,
            _ => return None,
        };
        Some(column)
    }

    fn cell(self, item: &CollectionItem) -> String {
        match self {
            Column::Id => item.id.clone(),
            Column::Title => item.title.clone(),
            Column::Categories => join_labels(item.categories.iter().map(|tag| tag.label())),
            Column::Platforms => join_labels(item.platforms.iter().map(|tag| tag.label())),
            Column::Status => item.status.label().to_string(),
            Column::Rating => item.rating.map(|rating| rating.to_string()).unwrap_or_default(),
            Column::HoursPlayed => item.hours_played.map(|hours| hours.to_string()).unwrap_or_default(),
            Column::Developer => item.developer.clone().unwrap_or_default(),
            Column::Publisher => item.publisher.clone().unwrap_or_default(),
            Column::ReleaseDate => date_cell(item.release_date),
            Column::StartDate => date_cell(item.start_date),
            Column::CompletionDate => date_cell(item.completion_date),
            Column::CoverImage => item.cover_image.clone().unwrap_or_default(),
            Column::CreatedAt => timestamp_cell(item.created_at),
            Column::UpdatedAt => timestamp_cell(item.updated_at),
            Column::Notes => item.notes.clone().unwrap_or_default(),
            Column::Description => item.description.clone().unwrap_or_default(),
        }
    }

    fn assign(self, record: &mut RawRecord, value: &str) {
        if value.is_empty() {
            return;
        }
        let text = Some(value.to_string());
        match self {
            Column::Id | Column::CreatedAt | Column::UpdatedAt => {}
            Column::Title => record.title = text,
            Column::Categories => record.categories = split_list(value),
            Column::Platforms => record.platforms = split_list(value),
            Column::Status => record.status = text,
            Column::Rating => record.rating = text,
            Column::HoursPlayed => record.hours_played = text,
            Column::Developer => record.developer = text,
            Column::Publisher => record.publisher = text,
            Column::ReleaseDate => record.release_date = text,
            Column::StartDate => record.start_date = text,
            Column::CompletionDate => record.completion_date = text,
            Column::CoverImage => record.cover_image = text,
            Column::Notes => record.notes = text,
            Column::Description => record.description = text,
        }
    }
}

fn join_labels<'a>(labels: impl Iterator<Item = &'a str>) -> String {
    labels.collect::<Vec<_>>().join(", ")
}

fn date_cell(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn timestamp_cell(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn columns(options: &ExportOptions) -> Vec<Column> {
    let mut columns = BASE_COLUMNS.to_vec();
    if options.include_ratings {
        columns.extend_from_slice(RATING_COLUMNS);
    }
    if options.include_metadata {
        columns.extend_from_slice(METADATA_COLUMNS);
    }
    if options.include_notes {
        columns.extend_from_slice(NOTE_COLUMNS);
    }
    columns
}

/// Data cells are always quoted so tag lists read as one cell even with a
/// single entry; the header is quoted only where needed.
pub(super) fn export(items: &[CollectionItem], options: &ExportOptions) -> Result<String, TranscodeError> {
    let columns = columns(options);
    let mut header = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    header.write_record(columns.iter().map(|column| column.header()))?;
    let head = header.into_inner().map_err(|err| err.into_error())?;

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(head);
    for item in items {
        writer.write_record(columns.iter().map(|column| column.cell(item)))?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    let mut content = String::from_utf8(bytes)?;
    if content.ends_with('\n') {
        content.pop();
    }
    Ok(content)
}

/// Header-driven; unknown columns are dropped.
pub(super) fn parse(input: &str) -> Result<Vec<Candidate>, TranscodeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(input.as_bytes());

    let mapping: Vec<Option<Column>> = reader.headers()?.iter().map(Column::from_header).collect();
    let ignored: Vec<&str> = reader
        .headers()?
        .iter()
        .zip(&mapping)
        .filter(|(_, column)| column.is_none())
        .map(|(header, _)| header)
        .collect();
    if !ignored.is_empty() {
        debug!(?ignored, "dropping unrecognised CSV columns");
    }
    if !mapping.contains(&Some(Column::Title)) {
        return Err(TranscodeError::Structure("CSV header has no Title column".into()));
    }

    let mut candidates = Vec::new();
    for row in reader.records() {
        let candidate = match row {
            Ok(row) => {
                let mut record = RawRecord::default();
                for (value, column) in row.iter().zip(&mapping) {
                    if let Some(column) = column {
                        column.assign(&mut record, value);
                    }
                }
                Ok(record)
            }
            Err(err) => Err(format!("unreadable row: {err}")),
        };
        candidates.push(candidate);
    }
    Ok(candidates)
}
