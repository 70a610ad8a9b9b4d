//! Resource model shared by the server and its collaborators.
//!
//! All structs use `#[serde(rename_all = "camelCase")]` so the JSON produced
//! for clients matches the wire contract (`ownerId`, `scheduledDate`, ...).

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// An event listing owned by a single principal.
///
/// `owner_id` is assigned at creation and never changes afterwards; no
/// update path in this crate carries an owner field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Opaque unique key assigned by the data store.
    pub id: String,
    /// Principal that created the resource.
    pub owner_id: String,
    pub title: String,
    pub description: String,
    /// Calendar date the event takes place on.
    pub scheduled_date: NaiveDate,
    /// Optional time of day, serialized as `HH:MM`.
    #[serde(with = "hhmm", default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<NaiveTime>,
    pub location_description: String,
    pub organizer_name: String,
    pub category: String,
    /// Unordered tag set. Stored as given (trimmed), normalised only on aggregation.
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated payload for creating a resource. The owner comes from the
/// acting principal, never from the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDraft {
    pub title: String,
    pub description: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: Option<NaiveTime>,
    pub location_description: String,
    pub organizer_name: String,
    pub category: String,
    pub tags: Vec<String>,
    pub external_url: Option<String>,
}

/// Validated partial update.
///
/// `None` leaves a field untouched. For the clearable optional fields the
/// inner `Option` distinguishes "set to value" from "clear" (`null` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[allow(clippy::option_option)]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<Option<NaiveTime>>,
    pub location_description: Option<String>,
    pub organizer_name: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub external_url: Option<Option<String>>,
}

impl ResourcePatch {
    /// Applies the patch to `resource` in place. Does not touch `updated_at`;
    /// the store owns timestamps.
    pub fn apply_to(&self, resource: &mut Resource) {
        if let Some(title) = &self.title {
            resource.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            resource.description.clone_from(description);
        }
        if let Some(date) = self.scheduled_date {
            resource.scheduled_date = date;
        }
        if let Some(time) = self.scheduled_time {
            resource.scheduled_time = time;
        }
        if let Some(location) = &self.location_description {
            resource.location_description.clone_from(location);
        }
        if let Some(organizer) = &self.organizer_name {
            resource.organizer_name.clone_from(organizer);
        }
        if let Some(category) = &self.category {
            resource.category.clone_from(category);
        }
        if let Some(tags) = &self.tags {
            resource.tags.clone_from(tags);
        }
        if let Some(url) = &self.external_url {
            resource.external_url.clone_from(url);
        }
    }
}

/// A principal's bookmark of a resource. Unique per `(user_id, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRelation {
    pub user_id: String,
    pub resource_id: String,
    pub saved_at: DateTime<Utc>,
}

/// Authenticated identity derived from a verified bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Unique identifier for the authenticated entity.
    pub id: String,
    /// Human-readable name carried in the credential.
    pub display_name: String,
}

/// `HH:MM` (de)serialization for optional times of day.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<NaiveTime>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(time) => s.serialize_str(&time.format(FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw
            .map(|s| NaiveTime::parse_from_str(&s, FORMAT))
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Resource {
        Resource {
            id: "r1".to_string(),
            owner_id: "u1".to_string(),
            title: "Rust meetup".to_string(),
            description: "Monthly gathering".to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 11, 5).unwrap(),
            scheduled_time: NaiveTime::from_hms_opt(18, 30, 0),
            location_description: "Community hall".to_string(),
            organizer_name: "Rustaceans".to_string(),
            category: "Tech".to_string(),
            tags: vec!["rust".to_string()],
            external_url: None,
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn resource_serializes_camel_case_with_hhmm_time() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["scheduledDate"], "2026-11-05");
        assert_eq!(json["scheduledTime"], "18:30");
        assert!(json.get("externalUrl").is_none());
    }

    #[test]
    fn resource_json_parses_back() {
        let json = serde_json::to_string(&sample()).unwrap();
        let parsed: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let mut resource = sample();
        let patch = ResourcePatch {
            title: Some("Renamed".to_string()),
            scheduled_time: Some(None),
            ..ResourcePatch::default()
        };
        patch.apply_to(&mut resource);
        assert_eq!(resource.title, "Renamed");
        assert_eq!(resource.scheduled_time, None);
        assert_eq!(resource.description, "Monthly gathering");
        assert_eq!(resource.owner_id, "u1");
    }
}
