use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{Category, CollectionItem, GameStatus, Platform};

use super::{Candidate, RawRecord, TranscodeError};

const UNKNOWN_DEVELOPER: &str = "Unknown Developer";
const UNKNOWN_PUBLISHER: &str = "Unknown Publisher";

#[derive(Serialize)]
struct SteamLibrary<'a> {
    list: Vec<SteamEntry<'a>>,
}

#[derive(Serialize)]
struct SteamEntry<'a> {
    appid: &'a str,
    title: &'a str,
    released: String,
    developer: &'a str,
    publisher: &'a str,
    playtime_forever: u64,
}

impl<'a> SteamEntry<'a> {
    fn new(item: &'a CollectionItem) -> Self {
        Self {
            appid: &item.id,
            title: &item.title,
            released: item
                .release_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            developer: item.developer.as_deref().unwrap_or(UNKNOWN_DEVELOPER),
            publisher: item.publisher.as_deref().unwrap_or(UNKNOWN_PUBLISHER),
            playtime_forever: item
                .hours_played
                .map(|hours| (hours * 60.0).round() as u64)
                .unwrap_or(0),
        }
    }
}

/// Only PC-tagged items survive; returns the document and how many items it holds.
pub(super) fn export(items: &[CollectionItem]) -> Result<(String, usize), TranscodeError> {
    let list: Vec<_> = items
        .iter()
        .filter(|item| item.is_on(Platform::Pc))
        .map(SteamEntry::new)
        .collect();
    let count = list.len();
    Ok((serde_json::to_string_pretty(&SteamLibrary { list })?, count))
}

/// Accepts `{list: [...]}`, the Web API's `{response: {games: [...]}}`, or a bare array.
pub(super) fn parse(input: &str) -> Result<Vec<Candidate>, TranscodeError> {
    let value: Value = serde_json::from_str(input)?;
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut object) => match object.remove("list") {
            Some(Value::Array(entries)) => entries,
            _ => match object.remove("response") {
                Some(Value::Object(mut response)) => match response.remove("games") {
                    Some(Value::Array(entries)) => entries,
                    _ => return Err(structure_error()),
                },
                _ => return Err(structure_error()),
            },
        },
        _ => return Err(structure_error()),
    };
    Ok(entries
        .iter()
        .map(|entry| match entry {
            Value::Object(object) => Ok(record_from_entry(object)),
            _ => Err("expected a library entry object".to_string()),
        })
        .collect())
}

fn structure_error() -> TranscodeError {
    TranscodeError::Structure("expected a Steam library with a `list` array".into())
}

fn record_from_entry(entry: &Map<String, Value>) -> RawRecord {
    let text = |key: &str| {
        entry.get(key).and_then(|value| match value {
            Value::String(value) => Some(value.trim().to_string()).filter(|v| !v.is_empty()),
            Value::Number(value) => Some(value.to_string()),
            _ => None,
        })
    };
    let minutes = entry.get("playtime_forever").and_then(Value::as_f64);

    RawRecord {
        title: text("title").or_else(|| text("name")),
        categories: vec![Category::Other.label().to_string()],
        platforms: vec![Platform::Pc.label().to_string()],
        status: Some(GameStatus::Backlog.label().to_string()),
        hours_played: minutes
            .map(|minutes| ((minutes / 60.0) * 100.0).round() / 100.0)
            .map(|hours| hours.to_string()),
        developer: text("developer").filter(|value| value != UNKNOWN_DEVELOPER),
        publisher: text("publisher").filter(|value| value != UNKNOWN_PUBLISHER),
        release_date: text("released"),
        ..Default::default()
    }
}
