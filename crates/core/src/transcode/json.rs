use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Category, CollectionItem, GameStatus, Platform, Rating};

use super::{Candidate, ExportOptions, RawRecord, TranscodeError};

/// Export shape: the identity fields always, the rest as the toggles allow.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportRecord<'a> {
    id: &'a str,
    title: &'a str,
    categories: &'a [Category],
    platforms: &'a [Platform],
    status: GameStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hours_played: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    developer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    publisher: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cover_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> ExportRecord<'a> {
    fn new(item: &'a CollectionItem, options: &ExportOptions) -> Self {
        let metadata = options.include_metadata;
        let notes = options.include_notes;
        Self {
            id: &item.id,
            title: &item.title,
            categories: &item.categories,
            platforms: &item.platforms,
            status: item.status,
            rating: item.rating.filter(|_| options.include_ratings),
            hours_played: item.hours_played.filter(|_| metadata),
            developer: item.developer.as_deref().filter(|_| metadata),
            publisher: item.publisher.as_deref().filter(|_| metadata),
            cover_image: item.cover_image.as_deref().filter(|_| metadata),
            release_date: item.release_date.filter(|_| metadata),
            start_date: item.start_date.filter(|_| metadata),
            completion_date: item.completion_date.filter(|_| metadata),
            created_at: Some(item.created_at).filter(|_| metadata),
            updated_at: Some(item.updated_at).filter(|_| metadata),
            notes: item.notes.as_deref().filter(|_| notes),
            description: item.description.as_deref().filter(|_| notes),
        }
    }
}

pub(super) fn export(items: &[CollectionItem], options: &ExportOptions) -> Result<String, TranscodeError> {
    let records: Vec<_> = items
        .iter()
        .map(|item| ExportRecord::new(item, options))
        .collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

/// Accepts a top-level array or a `{"games": [...]}` wrapper.
pub(super) fn parse(input: &str) -> Result<Vec<Candidate>, TranscodeError> {
    let value: Value = serde_json::from_str(input)?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("games") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(TranscodeError::Structure(
                    "expected an array of games or an object with a `games` array".into(),
                ))
            }
        },
        _ => {
            return Err(TranscodeError::Structure(
                "expected an array of games or an object with a `games` array".into(),
            ))
        }
    };
    Ok(entries.iter().map(candidate_from_value).collect())
}

pub(super) fn candidate_from_value(value: &Value) -> Candidate {
    match value {
        Value::Object(object) => Ok(RawRecord::from_json_object(object)),
        other => Err(format!("expected an object, found {}", kind(other))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::sample;
    use super::*;
    use serde_json::json;

    #[test]
    fn always_emits_identity_fields() -> Result<(), TranscodeError> {
        let item = sample("Hades");
        let options = ExportOptions {
            include_metadata: false,
            include_notes: false,
            include_ratings: false,
            base_name: None,
        };
        let value: Value = serde_json::from_str(&export(std::slice::from_ref(&item), &options)?)?;
        assert_eq!(
            value,
            json!([{
                "id": item.id,
                "title": "Hades",
                "categories": ["Action", "RPG"],
                "platforms": ["PC"],
                "status": "Playing"
            }])
        );
        Ok(())
    }

    #[test]
    fn toggles_gate_their_field_groups() -> Result<(), TranscodeError> {
        let item = sample("Hades");
        let options = ExportOptions {
            include_notes: false,
            ..Default::default()
        };
        let value: Value = serde_json::from_str(&export(&[item], &options)?)?;
        let record = &value[0];
        assert_eq!(record["rating"], json!(8));
        assert_eq!(record["developer"], json!("Supergiant Games"));
        assert_eq!(record["hoursPlayed"], json!(12.5));
        assert!(record.get("createdAt").is_some());
        assert!(record.get("notes").is_none());
        Ok(())
    }

    #[test]
    fn output_is_pretty_printed_with_two_spaces() -> Result<(), TranscodeError> {
        let content = export(&[sample("Hades")], &ExportOptions::default())?;
        assert!(content.starts_with("[\n  {\n    \"id\""));
        Ok(())
    }

    #[test]
    fn parse_accepts_array_or_games_wrapper() -> Result<(), TranscodeError> {
        assert_eq!(parse(r#"[{"title": "A"}]"#)?.len(), 1);
        assert_eq!(parse(r#"{"games": [{"title": "A"}, {"title": "B"}]}"#)?.len(), 2);
        assert!(matches!(
            parse(r#"{"items": []}"#),
            Err(TranscodeError::Structure(_))
        ));
        assert!(matches!(parse("42"), Err(TranscodeError::Structure(_))));
        Ok(())
    }
}
