use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{
    Category, CollectionItem, GameStatus, ItemDraft, Platform, Rating, ValidationError,
};

/// A candidate record as read from a file, before any validation.
///
/// Every field is kept as text; nothing about its shape is trusted until
/// [`RawRecord::into_item`] has checked it.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct RawRecord {
    pub title: Option<String>,
    pub categories: Vec<String>,
    pub platforms: Vec<String>,
    pub status: Option<String>,
    pub rating: Option<String>,
    pub hours_played: Option<String>,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub cover_image: Option<String>,
    pub release_date: Option<String>,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
}

impl RawRecord {
    /// Read a loosely-typed JSON object, accepting camelCase and snake_case keys.
    pub fn from_json_object(object: &Map<String, Value>) -> Self {
        Self {
            title: field(object, &["title", "name"]).and_then(text),
            categories: field(object, &["categories", "category", "genres"])
                .map(list)
                .unwrap_or_default(),
            platforms: field(object, &["platforms", "platform"])
                .map(list)
                .unwrap_or_default(),
            status: field(object, &["status"]).and_then(text),
            rating: field(object, &["rating"]).and_then(text),
            hours_played: field(object, &["hoursPlayed", "hours_played"]).and_then(text),
            notes: field(object, &["notes"]).and_then(text),
            description: field(object, &["description"]).and_then(text),
            developer: field(object, &["developer"]).and_then(text),
            publisher: field(object, &["publisher"]).and_then(text),
            cover_image: field(object, &["coverImage", "cover_image"]).and_then(text),
            release_date: field(object, &["releaseDate", "release_date"]).and_then(text),
            start_date: field(object, &["startDate", "start_date"]).and_then(text),
            completion_date: field(object, &["completionDate", "completion_date"])
                .and_then(text),
        }
    }

    /// Validate and convert into a domain item with a fresh id and timestamps.
    pub fn into_item(self, now: DateTime<Utc>) -> Result<CollectionItem, ValidationError> {
        let title = self
            .title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::MissingTitle)?;

        let categories = tags(&self.categories, Category::from_label, "category");
        if categories.is_empty() {
            return Err(ValidationError::NoCategories);
        }
        let platforms = tags(&self.platforms, Platform::from_label, "platform");
        if platforms.is_empty() {
            return Err(ValidationError::NoPlatforms);
        }

        let status = match self.status {
            None => GameStatus::default(),
            Some(raw) => GameStatus::from_label(&raw).ok_or(ValidationError::UnknownStatus(raw))?,
        };

        let rating = self
            .rating
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| ValidationError::RatingOutOfRange(raw.clone()))
                    .and_then(Rating::from_f64)
            })
            .transpose()?;

        let hours_played = self
            .hours_played
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|hours| hours.is_finite() && *hours >= 0.0)
                    .ok_or(ValidationError::InvalidHours(raw))
            })
            .transpose()?;

        let draft = ItemDraft {
            title,
            categories,
            platforms,
            status,
            rating,
            hours_played,
            notes: self.notes,
            description: self.description,
            developer: self.developer,
            publisher: self.publisher,
            cover_image: self.cover_image,
            release_date: self.release_date.as_deref().and_then(parse_date),
            start_date: self.start_date.as_deref().and_then(parse_date),
            completion_date: self.completion_date.as_deref().and_then(parse_date),
        };
        CollectionItem::from_draft(draft, now)
    }
}

/// Parse RFC 3339 timestamps, bare `YYYY-MM-DD` dates (midnight UTC) and
/// zone-less ISO datetimes (taken as UTC). Anything else is dropped with a warning.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Some(parsed) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Some(parsed.and_utc());
    }
    warn!("dropping unparseable date `{raw}`");
    None
}

/// Split a multi-valued cell on commas.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn tags<T: PartialEq + Copy>(
    raw: &[String],
    lookup: fn(&str) -> Option<T>,
    kind: &str,
) -> Vec<T> {
    let mut out = Vec::with_capacity(raw.len());
    for value in raw {
        match lookup(value) {
            Some(tag) if !out.contains(&tag) => out.push(tag),
            Some(_) => {}
            None => debug!("ignoring unknown {kind} `{value}`"),
        }
    }
    out
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| object.get(*name))
        .find(|value| !value.is_null())
}

fn text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(value) => value.trim().to_string(),
        Value::Number(value) => value.to_string(),
        Value::Bool(value) => value.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values.iter().filter_map(text).collect(),
        Value::String(value) => split_list(value),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn reads_loose_json_shapes() {
        let record = RawRecord::from_json_object(&object(json!({
            "name": "  Hollow Knight ",
            "category": "Platformer, Indie",
            "platforms": ["PC", 5, null],
            "rating": 9,
            "hours_played": "41.5",
            "releaseDate": null
        })));
        assert_eq!(record.title.as_deref(), Some("Hollow Knight"));
        assert_eq!(record.categories, vec!["Platformer", "Indie"]);
        assert_eq!(record.platforms, vec!["PC", "5"]);
        assert_eq!(record.rating.as_deref(), Some("9"));
        assert_eq!(record.hours_played.as_deref(), Some("41.5"));
        assert_eq!(record.release_date, None);
    }

    #[test]
    fn conversion_validates_each_field() {
        let now = Utc::now();
        let base = RawRecord {
            title: Some("Hades".into()),
            categories: vec!["Action".into(), "Roguelike".into()],
            platforms: vec!["pc".into()],
            ..Default::default()
        };

        let item = base.clone().into_item(now).expect("valid record");
        assert_eq!(item.categories, vec![Category::Action]);
        assert_eq!(item.status, GameStatus::Backlog);

        let mut unknown_only = base.clone();
        unknown_only.categories = vec!["Roguelike".into()];
        assert_eq!(unknown_only.into_item(now), Err(ValidationError::NoCategories));

        let mut bad_rating = base.clone();
        bad_rating.rating = Some("11".into());
        assert!(matches!(
            bad_rating.into_item(now),
            Err(ValidationError::RatingOutOfRange(_))
        ));

        let mut bad_hours = base.clone();
        bad_hours.hours_played = Some("-3".into());
        assert!(matches!(bad_hours.into_item(now), Err(ValidationError::InvalidHours(_))));

        let mut bad_status = base;
        bad_status.status = Some("finished".into());
        assert_eq!(
            bad_status.into_item(now),
            Err(ValidationError::UnknownStatus("finished".into()))
        );
    }

    #[test]
    fn dates_accept_common_shapes() {
        let midnight = parse_date("2020-03-20").expect("date");
        assert_eq!(midnight.to_rfc3339(), "2020-03-20T00:00:00+00:00");
        let zoned = parse_date("2020-03-20T10:00:00+02:00").expect("datetime");
        assert_eq!(zoned.to_rfc3339(), "2020-03-20T08:00:00+00:00");
        assert!(parse_date("2020-03-20T10:00:00.250").is_some());
        assert_eq!(parse_date("next spring"), None);
    }
}
