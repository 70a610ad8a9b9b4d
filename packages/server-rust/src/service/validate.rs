//! Request validation: raw query strings and JSON bodies into typed commands.
//!
//! Nothing downstream of this module sees an untyped payload. Every function
//! either returns a fully-typed command or a [`ValidationFailure`] listing
//! each offending field; validation never stops at the first issue.

use chrono::{NaiveDate, NaiveTime};
use eventboard_core::query::{DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT};
use eventboard_core::{
    IssueCollector, ListQuery, ResourceDraft, ResourcePatch, SortDirection, SortField, SortSpec,
    ValidationFailure, ValidationIssue,
};
use serde::Deserialize;
use serde_json::{Map, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

const MAX_TAGS: usize = 10;
const MAX_TAG_LEN: usize = 30;
const MAX_URL_LEN: usize = 2048;
const MAX_SEARCH_LEN: usize = 100;
const MAX_ID_LEN: usize = 128;
const MAX_BATCH_IDS: usize = 100;

/// Length bounds for a required text field.
struct TextRule {
    field: &'static str,
    label: &'static str,
    min: usize,
    max: usize,
}

const TITLE: TextRule = TextRule {
    field: "title",
    label: "Title",
    min: 3,
    max: 100,
};
const DESCRIPTION: TextRule = TextRule {
    field: "description",
    label: "Description",
    min: 10,
    max: 2000,
};
const LOCATION: TextRule = TextRule {
    field: "locationDescription",
    label: "Location",
    min: 3,
    max: 200,
};
const ORGANIZER: TextRule = TextRule {
    field: "organizerName",
    label: "Organizer name",
    min: 2,
    max: 100,
};
const CATEGORY: TextRule = TextRule {
    field: "category",
    label: "Category",
    min: 2,
    max: 50,
};

const RESOURCE_FIELDS: [&str; 9] = [
    "title",
    "description",
    "scheduledDate",
    "scheduledTime",
    "locationDescription",
    "organizerName",
    "category",
    "tags",
    "externalUrl",
];

// ---------------------------------------------------------------------------
// Typed commands
// ---------------------------------------------------------------------------

/// A validated resource identifier taken from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId(pub String);

impl ResourceId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated batch lookup: unique ids in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchGet {
    pub ids: Vec<String>,
}

/// Raw list parameters as they arrive in the query string.
///
/// Everything is a string so that malformed numbers reach validation and
/// produce field errors instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// Validates list parameters into a [`ListQuery`].
///
/// # Errors
///
/// Returns every invalid parameter keyed by its query-string name.
pub fn validate_list(raw: &RawListParams) -> Result<ListQuery, ValidationFailure> {
    let mut issues = IssueCollector::new();

    let page = match non_blank(raw.page.as_deref()) {
        None => DEFAULT_PAGE,
        Some(s) => match s.parse::<u64>() {
            Ok(n) if n >= 1 => n,
            _ => {
                issues.push(ValidationIssue::field(
                    "page",
                    "Page must be a positive integer",
                ));
                DEFAULT_PAGE
            }
        },
    };

    let limit = match non_blank(raw.limit.as_deref()) {
        None => DEFAULT_LIMIT,
        Some(s) => match s.parse::<u64>() {
            Ok(n) if (1..=MAX_LIMIT).contains(&n) => n,
            _ => {
                issues.push(ValidationIssue::field(
                    "limit",
                    format!("Limit must be an integer between 1 and {MAX_LIMIT}"),
                ));
                DEFAULT_LIMIT
            }
        },
    };

    let start_date = parse_query_date(
        raw.start_date.as_deref(),
        "startDate",
        "Start date",
        &mut issues,
    );
    let end_date = parse_query_date(raw.end_date.as_deref(), "endDate", "End date", &mut issues);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end < start {
            issues.push(ValidationIssue::field(
                "endDate",
                "End date must be on or after start date",
            ));
        }
    }

    let field = match non_blank(raw.sort_by.as_deref()) {
        None => SortSpec::default().field,
        Some(s) => SortField::parse(s).unwrap_or_else(|| {
            let allowed: Vec<_> = SortField::ALL.iter().map(|f| f.as_str()).collect();
            issues.push(ValidationIssue::field(
                "sortBy",
                format!("Sort field must be one of: {}", allowed.join(", ")),
            ));
            SortSpec::default().field
        }),
    };
    let direction = match non_blank(raw.sort_order.as_deref()) {
        None => SortSpec::default().direction,
        Some(s) => SortDirection::parse(s).unwrap_or_else(|| {
            issues.push(ValidationIssue::field(
                "sortOrder",
                "Sort order must be 'asc' or 'desc'",
            ));
            SortSpec::default().direction
        }),
    };

    let search = non_blank(raw.search.as_deref()).map(str::to_string);
    if let Some(term) = &search {
        if term.chars().count() > MAX_SEARCH_LEN {
            issues.push(ValidationIssue::field(
                "search",
                format!("Search term must be at most {MAX_SEARCH_LEN} characters"),
            ));
        }
    }

    let tags = raw
        .tags
        .as_deref()
        .map(split_tag_list)
        .filter(|t| !t.is_empty());

    issues.finish(ListQuery {
        page,
        limit,
        category: non_blank(raw.category.as_deref()).map(str::to_string),
        tags,
        start_date,
        end_date,
        sort: SortSpec { field, direction },
        search,
    })
}

/// Splits a comma-separated tag list, trimming entries and dropping empties.
#[must_use]
pub fn split_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_query_date(
    raw: Option<&str>,
    field: &str,
    label: &str,
    issues: &mut IssueCollector,
) -> Option<NaiveDate> {
    let s = non_blank(raw)?;
    match NaiveDate::parse_from_str(s, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            issues.push(ValidationIssue::field(
                field,
                format!("{label} must be a valid date (YYYY-MM-DD)"),
            ));
            None
        }
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Path ids
// ---------------------------------------------------------------------------

/// Validates a resource id taken from the request path.
///
/// # Errors
///
/// Fails under `id` when the id is blank or implausibly long.
pub fn validate_resource_id(raw: &str) -> Result<ResourceId, ValidationFailure> {
    let id = raw.trim();
    let mut issues = IssueCollector::new();
    if id.is_empty() {
        issues.push(ValidationIssue::field("id", "Event id is required"));
    } else if id.len() > MAX_ID_LEN {
        issues.push(ValidationIssue::field("id", "Event id is not valid"));
    }
    issues.finish(ResourceId(id.to_string()))
}

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ValidationFailure> {
    let value: Value = serde_json::from_slice(body).map_err(|_| ValidationFailure {
        issues: vec![ValidationIssue::general("Request body must be valid JSON")],
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ValidationFailure {
            issues: vec![ValidationIssue::general("Request body must be a JSON object")],
        }),
    }
}

fn reject_unknown_fields(obj: &Map<String, Value>, allowed: &[&str], issues: &mut IssueCollector) {
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            let message = if key == "ownerId" || key == "id" {
                "Field cannot be set by the client"
            } else {
                "Unrecognized field"
            };
            issues.push(ValidationIssue::field(key, message));
        }
    }
}

/// Validates a create body into a [`ResourceDraft`].
///
/// # Errors
///
/// Returns every invalid, missing, or unrecognized field.
pub fn validate_create(body: &[u8]) -> Result<ResourceDraft, ValidationFailure> {
    let obj = parse_object(body)?;
    let mut issues = IssueCollector::new();
    reject_unknown_fields(&obj, &RESOURCE_FIELDS, &mut issues);

    let title = required_text(&obj, &TITLE, &mut issues);
    let description = required_text(&obj, &DESCRIPTION, &mut issues);
    let location = required_text(&obj, &LOCATION, &mut issues);
    let organizer = required_text(&obj, &ORGANIZER, &mut issues);
    let category = required_text(&obj, &CATEGORY, &mut issues);

    let scheduled_date = match obj.get("scheduledDate") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::field(
                "scheduledDate",
                "Scheduled date is required",
            ));
            None
        }
        Some(v) => date_value(v, &mut issues),
    };
    let scheduled_time = match obj.get("scheduledTime") {
        None | Some(Value::Null) => None,
        Some(v) => time_value(v, &mut issues),
    };
    let tags = match obj.get("tags") {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(v) => tags_value(v, &mut issues),
    };
    let external_url = match obj.get("externalUrl") {
        None | Some(Value::Null) => Some(None),
        Some(v) => url_value(v, &mut issues).map(Some),
    };

    issues.finish(())?;

    // Every `None` above pushed an issue, so these are all present here.
    match (
        title,
        description,
        scheduled_date,
        location,
        organizer,
        category,
        tags,
        external_url,
    ) {
        (
            Some(title),
            Some(description),
            Some(scheduled_date),
            Some(location_description),
            Some(organizer_name),
            Some(category),
            Some(tags),
            Some(external_url),
        ) => Ok(ResourceDraft {
            title,
            description,
            scheduled_date,
            scheduled_time,
            location_description,
            organizer_name,
            category,
            tags,
            external_url,
        }),
        _ => Err(ValidationFailure {
            issues: vec![ValidationIssue::general("Request body is incomplete")],
        }),
    }
}

/// Validates a partial-update body into a [`ResourcePatch`].
///
/// # Errors
///
/// Returns every invalid or unrecognized field, or a general issue when the
/// body names no field at all.
pub fn validate_update(body: &[u8]) -> Result<ResourcePatch, ValidationFailure> {
    let obj = parse_object(body)?;
    let mut issues = IssueCollector::new();
    reject_unknown_fields(&obj, &RESOURCE_FIELDS, &mut issues);

    if obj.is_empty() {
        issues.push(ValidationIssue::general(
            "At least one field must be provided",
        ));
    }

    let optional = |rule: &TextRule, issues: &mut IssueCollector| {
        obj.get(rule.field).and_then(|v| text_value(v, rule, issues))
    };

    let patch = ResourcePatch {
        title: optional(&TITLE, &mut issues),
        description: optional(&DESCRIPTION, &mut issues),
        location_description: optional(&LOCATION, &mut issues),
        organizer_name: optional(&ORGANIZER, &mut issues),
        category: optional(&CATEGORY, &mut issues),
        scheduled_date: obj.get("scheduledDate").and_then(|v| date_value(v, &mut issues)),
        scheduled_time: match obj.get("scheduledTime") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(v) => time_value(v, &mut issues).map(Some),
        },
        tags: obj.get("tags").and_then(|v| tags_value(v, &mut issues)),
        external_url: match obj.get("externalUrl") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(v) => url_value(v, &mut issues).map(Some),
        },
    };

    issues.finish(patch)
}

/// Validates a batch lookup body `{ "ids": [...] }`.
///
/// # Errors
///
/// Fails when `ids` is missing, empty, too long, or holds blank or non-string entries.
pub fn validate_batch_get(body: &[u8]) -> Result<BatchGet, ValidationFailure> {
    let obj = parse_object(body)?;
    let mut issues = IssueCollector::new();
    reject_unknown_fields(&obj, &["ids"], &mut issues);

    let mut ids: Vec<String> = Vec::new();
    match obj.get("ids") {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::field("ids", "Ids are required"));
        }
        Some(Value::Array(items)) => {
            if items.is_empty() {
                issues.push(ValidationIssue::field("ids", "At least one id is required"));
            } else if items.len() > MAX_BATCH_IDS {
                issues.push(ValidationIssue::field(
                    "ids",
                    format!("At most {MAX_BATCH_IDS} ids may be requested"),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let index = i.to_string();
                match item.as_str().map(str::trim) {
                    Some(id) if !id.is_empty() => {
                        if !ids.iter().any(|seen| seen == id) {
                            ids.push(id.to_string());
                        }
                    }
                    Some(_) => issues.push(ValidationIssue::at(
                        &["ids", index.as_str()],
                        "Id cannot be empty",
                    )),
                    None => issues.push(ValidationIssue::at(
                        &["ids", index.as_str()],
                        "Expected string",
                    )),
                }
            }
        }
        Some(_) => issues.push(ValidationIssue::field(
            "ids",
            "Ids must be an array of strings",
        )),
    }

    issues.finish(BatchGet { ids })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn required_text(
    obj: &Map<String, Value>,
    rule: &TextRule,
    issues: &mut IssueCollector,
) -> Option<String> {
    match obj.get(rule.field) {
        None | Some(Value::Null) => {
            issues.push(ValidationIssue::field(
                rule.field,
                format!("{} is required", rule.label),
            ));
            None
        }
        Some(v) => text_value(v, rule, issues),
    }
}

fn text_value(value: &Value, rule: &TextRule, issues: &mut IssueCollector) -> Option<String> {
    let Some(s) = value.as_str() else {
        issues.push(ValidationIssue::field(
            rule.field,
            format!("{} must be a string", rule.label),
        ));
        return None;
    };
    let s = s.trim();
    let len = s.chars().count();
    if len < rule.min {
        issues.push(ValidationIssue::field(
            rule.field,
            format!("{} must be at least {} characters", rule.label, rule.min),
        ));
        return None;
    }
    if len > rule.max {
        issues.push(ValidationIssue::field(
            rule.field,
            format!("{} must be at most {} characters", rule.label, rule.max),
        ));
        return None;
    }
    Some(s.to_string())
}

fn date_value(value: &Value, issues: &mut IssueCollector) -> Option<NaiveDate> {
    let parsed = value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok());
    if parsed.is_none() {
        issues.push(ValidationIssue::field(
            "scheduledDate",
            "Scheduled date must be a valid date (YYYY-MM-DD)",
        ));
    }
    parsed
}

fn time_value(value: &Value, issues: &mut IssueCollector) -> Option<NaiveTime> {
    let parsed = value
        .as_str()
        .and_then(|s| NaiveTime::parse_from_str(s.trim(), TIME_FORMAT).ok());
    if parsed.is_none() {
        issues.push(ValidationIssue::field(
            "scheduledTime",
            "Scheduled time must be in HH:MM format",
        ));
    }
    parsed
}

fn tags_value(value: &Value, issues: &mut IssueCollector) -> Option<Vec<String>> {
    let Some(items) = value.as_array() else {
        issues.push(ValidationIssue::field(
            "tags",
            "Tags must be an array of strings",
        ));
        return None;
    };
    if items.len() > MAX_TAGS {
        issues.push(ValidationIssue::field(
            "tags",
            format!("At most {MAX_TAGS} tags are allowed"),
        ));
        return None;
    }
    let mut tags: Vec<String> = Vec::with_capacity(items.len());
    let mut ok = true;
    for (i, item) in items.iter().enumerate() {
        let index = i.to_string();
        match item.as_str().map(str::trim) {
            None => {
                issues.push(ValidationIssue::at(
                    &["tags", index.as_str()],
                    "Tag must be a string",
                ));
                ok = false;
            }
            Some("") => {
                issues.push(ValidationIssue::at(
                    &["tags", index.as_str()],
                    "Tag cannot be empty",
                ));
                ok = false;
            }
            Some(tag) if tag.chars().count() > MAX_TAG_LEN => {
                issues.push(ValidationIssue::at(
                    &["tags", index.as_str()],
                    format!("Tag must be at most {MAX_TAG_LEN} characters"),
                ));
                ok = false;
            }
            Some(tag) => {
                if !tags.iter().any(|t| t == tag) {
                    tags.push(tag.to_string());
                }
            }
        }
    }
    ok.then_some(tags)
}

fn url_value(value: &Value, issues: &mut IssueCollector) -> Option<String> {
    let invalid = |issues: &mut IssueCollector| {
        issues.push(ValidationIssue::field(
            "externalUrl",
            "External URL must be a valid http(s) URL",
        ));
    };
    let Some(raw) = value.as_str().map(str::trim) else {
        invalid(issues);
        return None;
    };
    if raw.len() > MAX_URL_LEN {
        invalid(issues);
        return None;
    }
    match url::Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(raw.to_string()),
        _ => {
            invalid(issues);
            None
        }
    }
}
