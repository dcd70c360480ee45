//! Shared domain models.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Reasons a record is refused at the collection boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Title missing or blank.
    #[error("missing title")]
    MissingTitle,
    /// No recognised category.
    #[error("at least one category is required")]
    NoCategories,
    /// No recognised platform.
    #[error("at least one platform is required")]
    NoPlatforms,
    /// Rating outside the allowed bounds (or not a whole number).
    #[error("rating {0} is outside 1-10")]
    RatingOutOfRange(String),
    /// Negative or non-finite playtime.
    #[error("hours played must be a non-negative number (got {0})")]
    InvalidHours(String),
    /// Status value not part of the lifecycle vocabulary.
    #[error("unknown status `{0}`")]
    UnknownStatus(String),
}

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[allow(missing_docs)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member of the vocabulary, in display order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire and display label.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Case-insensitive lookup accepting either the label or the variant name.
            pub fn from_label(value: &str) -> Option<Self> {
                let needle = value.trim();
                Self::ALL.iter().copied().find(|candidate| {
                    candidate.label().eq_ignore_ascii_case(needle)
                        || candidate.ident().eq_ignore_ascii_case(needle)
                })
            }

            fn ident(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::from_label(&raw).ok_or_else(|| {
                    de::Error::custom(format!("unknown {} `{}`", stringify!($name), raw))
                })
            }
        }
    };
}

vocabulary! {
    /// Genre tags an item can carry.
    Category {
        Action => "Action",
        Adventure => "Adventure",
        Rpg => "RPG",
        Strategy => "Strategy",
        Simulation => "Simulation",
        Sports => "Sports",
        Racing => "Racing",
        Puzzle => "Puzzle",
        Platformer => "Platformer",
        Shooter => "Shooter",
        Fighting => "Fighting",
        Horror => "Horror",
        Indie => "Indie",
        Other => "Other",
    }
}

vocabulary! {
    /// Platforms an item is owned on.
    Platform {
        Pc => "PC",
        PlayStation5 => "PlayStation 5",
        PlayStation4 => "PlayStation 4",
        XboxSeries => "Xbox Series X|S",
        XboxOne => "Xbox One",
        NintendoSwitch => "Nintendo Switch",
        Mobile => "Mobile",
        Other => "Other",
    }
}

vocabulary! {
    /// Lifecycle state of an item.
    GameStatus {
        Wishlist => "Wishlist",
        Backlog => "Backlog",
        Playing => "Playing",
        Completed => "Completed",
        Dropped => "Dropped",
    }
}

impl Default for GameStatus {
    fn default() -> Self {
        GameStatus::Backlog
    }
}

/// A personal rating, always within `Rating::MIN..=Rating::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Lowest accepted rating.
    pub const MIN: u8 = 1;
    /// Highest accepted rating.
    pub const MAX: u8 = 10;

    /// Build a rating, refusing out-of-range values instead of clamping.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ValidationError::RatingOutOfRange(value.to_string()))
        }
    }

    /// Accepts whole numbers only; `7.0` is fine, `7.5` is not.
    pub fn from_f64(value: f64) -> Result<Self, ValidationError> {
        if value.fract() != 0.0 || value < f64::from(Self::MIN) || value > f64::from(Self::MAX) {
            return Err(ValidationError::RatingOutOfRange(value.to_string()));
        }
        Self::new(value as u8)
    }

    /// Underlying numeric value.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionItem {
    /// Stable identifier, unique within a collection.
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// Genre tags; never empty.
    pub categories: Vec<Category>,
    /// Platform tags; never empty.
    pub platforms: Vec<Platform>,
    /// Lifecycle state.
    pub status: GameStatus,
    /// Optional personal rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    /// Optional playtime in hours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours_played: Option<f64>,
    /// Personal notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Longer description, searchable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Developer credit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer: Option<String>,
    /// Publisher credit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Cover art URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[allow(missing_docs)]
    pub completion_date: Option<DateTime<Utc>>,
    /// When the item entered the collection.
    pub created_at: DateTime<Utc>,
    /// Last mutation; never earlier than `created_at`.
    pub updated_at: DateTime<Utc>,
}

impl CollectionItem {
    /// Accept a validated draft, assigning a fresh id and timestamps.
    pub fn from_draft(draft: ItemDraft, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        let draft = draft.normalized()?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            title: draft.title,
            categories: draft.categories,
            platforms: draft.platforms,
            status: draft.status,
            rating: draft.rating,
            hours_played: draft.hours_played,
            notes: draft.notes,
            description: draft.description,
            developer: draft.developer,
            publisher: draft.publisher,
            cover_image: draft.cover_image,
            release_date: draft.release_date,
            start_date: draft.start_date,
            completion_date: draft.completion_date,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace every user-editable field, keeping `id` and `created_at`.
    pub fn apply_draft(&mut self, draft: ItemDraft, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let draft = draft.normalized()?;
        self.title = draft.title;
        self.categories = draft.categories;
        self.platforms = draft.platforms;
        self.status = draft.status;
        self.rating = draft.rating;
        self.hours_played = draft.hours_played;
        self.notes = draft.notes;
        self.description = draft.description;
        self.developer = draft.developer;
        self.publisher = draft.publisher;
        self.cover_image = draft.cover_image;
        self.release_date = draft.release_date;
        self.start_date = draft.start_date;
        self.completion_date = draft.completion_date;
        self.touch(now);
        Ok(())
    }

    /// Rewrite `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }

    /// Whether the item is tagged for the given platform.
    pub fn is_on(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }

    /// Editable view of this item, e.g. to prefill an edit form.
    pub fn to_draft(&self) -> ItemDraft {
        ItemDraft {
            title: self.title.clone(),
            categories: self.categories.clone(),
            platforms: self.platforms.clone(),
            status: self.status,
            rating: self.rating,
            hours_played: self.hours_played,
            notes: self.notes.clone(),
            description: self.description.clone(),
            developer: self.developer.clone(),
            publisher: self.publisher.clone(),
            cover_image: self.cover_image.clone(),
            release_date: self.release_date,
            start_date: self.start_date,
            completion_date: self.completion_date,
        }
    }
}

/// A user-authored record before it is accepted into the collection.
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct ItemDraft {
    pub title: String,
    pub categories: Vec<Category>,
    pub platforms: Vec<Platform>,
    pub status: GameStatus,
    pub rating: Option<Rating>,
    pub hours_played: Option<f64>,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub cover_image: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
}

impl ItemDraft {
    /// Minimal draft carrying only the required fields.
    pub fn new(
        title: impl Into<String>,
        categories: impl IntoIterator<Item = Category>,
        platforms: impl IntoIterator<Item = Platform>,
    ) -> Self {
        Self {
            title: title.into(),
            categories: categories.into_iter().collect(),
            platforms: platforms.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Check the boundary invariants without consuming the draft.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        if self.categories.is_empty() {
            return Err(ValidationError::NoCategories);
        }
        if self.platforms.is_empty() {
            return Err(ValidationError::NoPlatforms);
        }
        if let Some(hours) = self.hours_played {
            if !hours.is_finite() || hours < 0.0 {
                return Err(ValidationError::InvalidHours(hours.to_string()));
            }
        }
        Ok(())
    }

    fn normalized(mut self) -> Result<Self, ValidationError> {
        self.validate()?;
        self.title = self.title.trim().to_string();
        dedup_in_order(&mut self.categories);
        dedup_in_order(&mut self.platforms);
        for field in [
            &mut self.notes,
            &mut self.description,
            &mut self.developer,
            &mut self.publisher,
            &mut self.cover_image,
        ] {
            *field = field
                .take()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        }
        Ok(self)
    }
}

fn dedup_in_order<T: PartialEq + Copy>(values: &mut Vec<T>) {
    let mut seen = Vec::with_capacity(values.len());
    values.retain(|value| {
        if seen.contains(value) {
            false
        } else {
            seen.push(*value);
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn vocabulary_lookup_is_lenient() {
        assert_eq!(Category::from_label("rpg"), Some(Category::Rpg));
        assert_eq!(Category::from_label(" Action "), Some(Category::Action));
        assert_eq!(Platform::from_label("playstation 5"), Some(Platform::PlayStation5));
        assert_eq!(Platform::from_label("Pc"), Some(Platform::Pc));
        assert_eq!(GameStatus::from_label("COMPLETED"), Some(GameStatus::Completed));
        assert_eq!(GameStatus::from_label("finished"), None);
    }

    #[test]
    fn rating_rejects_out_of_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(11).is_err());
        assert_eq!(Rating::new(10).map(Rating::value), Ok(10));
        assert!(Rating::from_f64(7.5).is_err());
        assert_eq!(Rating::from_f64(7.0).map(Rating::value), Ok(7));
    }

    #[test]
    fn draft_validation_covers_required_fields() {
        let mut draft = ItemDraft::new("  ", [Category::Action], [Platform::Pc]);
        assert_eq!(draft.validate(), Err(ValidationError::MissingTitle));

        draft.title = "Hades".into();
        draft.categories.clear();
        assert_eq!(draft.validate(), Err(ValidationError::NoCategories));

        draft.categories.push(Category::Action);
        draft.platforms.clear();
        assert_eq!(draft.validate(), Err(ValidationError::NoPlatforms));

        draft.platforms.push(Platform::Pc);
        draft.hours_played = Some(-1.0);
        assert!(matches!(draft.validate(), Err(ValidationError::InvalidHours(_))));
    }

    #[test]
    fn from_draft_trims_and_dedups() {
        let now = Utc::now();
        let mut draft = ItemDraft::new(
            "  Celeste ",
            [Category::Platformer, Category::Platformer, Category::Indie],
            [Platform::Pc],
        );
        draft.developer = Some("   ".into());
        let item = CollectionItem::from_draft(draft, now).expect("valid draft");
        assert_eq!(item.title, "Celeste");
        assert_eq!(item.categories, vec![Category::Platformer, Category::Indie]);
        assert_eq!(item.developer, None);
        assert_eq!(item.created_at, item.updated_at);
        assert!(!item.id.is_empty());
    }

    #[test]
    fn touch_never_precedes_creation() {
        let now = Utc::now();
        let mut item = CollectionItem::from_draft(
            ItemDraft::new("Celeste", [Category::Platformer], [Platform::Pc]),
            now,
        )
        .expect("valid draft");
        item.touch(now - Duration::hours(1));
        assert_eq!(item.updated_at, item.created_at);
        item.touch(now + Duration::hours(1));
        assert!(item.updated_at > item.created_at);
    }

    #[test]
    fn serializes_with_camel_case_labels() {
        let now = Utc::now();
        let mut draft = ItemDraft::new("Celeste", [Category::Rpg], [Platform::NintendoSwitch]);
        draft.hours_played = Some(12.5);
        draft.rating = Some(Rating::new(9).expect("valid rating"));
        let item = CollectionItem::from_draft(draft, now).expect("valid draft");

        let value = serde_json::to_value(&item).expect("serializable");
        assert_eq!(value["categories"], json!(["RPG"]));
        assert_eq!(value["platforms"], json!(["Nintendo Switch"]));
        assert_eq!(value["status"], json!("Backlog"));
        assert_eq!(value["hoursPlayed"], json!(12.5));
        assert_eq!(value["rating"], json!(9));
        assert!(value.get("notes").is_none());

        let back: CollectionItem = serde_json::from_value(value).expect("deserializable");
        assert_eq!(back, item);
    }

    #[test]
    fn deserialize_refuses_out_of_range_rating() {
        let value = json!({
            "id": "x",
            "title": "Celeste",
            "categories": ["Indie"],
            "platforms": ["PC"],
            "status": "Playing",
            "rating": 42,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        assert!(serde_json::from_value::<CollectionItem>(value).is_err());
    }
}
