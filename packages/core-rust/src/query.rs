//! Query vocabulary: predicate trees, sort specifications, and pages.
//!
//! These types are transport-free. The server's query compiler builds them
//! from a validated [`ListQuery`]; data store implementations interpret them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Resource;

/// Default page number when the client sends none.
pub const DEFAULT_PAGE: u64 = 1;
/// Default page size when the client sends none.
pub const DEFAULT_LIMIT: u64 = 10;
/// Largest page size a client may request.
pub const MAX_LIMIT: u64 = 100;

// ---------------------------------------------------------------------------
// Fields and sorting
// ---------------------------------------------------------------------------

/// Text-valued resource attributes a predicate can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Title,
    Description,
    LocationDescription,
    OrganizerName,
    Category,
}

impl TextField {
    /// Fields covered by free-text search.
    pub const SEARCHABLE: [Self; 5] = [
        Self::Title,
        Self::Description,
        Self::LocationDescription,
        Self::OrganizerName,
        Self::Category,
    ];

    /// Borrows the attribute value from `resource`.
    #[must_use]
    pub fn read(self, resource: &Resource) -> &str {
        match self {
            Self::Title => &resource.title,
            Self::Description => &resource.description,
            Self::LocationDescription => &resource.location_description,
            Self::OrganizerName => &resource.organizer_name,
            Self::Category => &resource.category,
        }
    }
}

/// Sort keys clients may request. Anything else is rejected during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    ScheduledDate,
    Title,
    CreatedAt,
    OrganizerName,
    Category,
}

impl SortField {
    pub const ALL: [Self; 5] = [
        Self::ScheduledDate,
        Self::Title,
        Self::CreatedAt,
        Self::OrganizerName,
        Self::Category,
    ];

    /// Wire name (`scheduledDate`, `title`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ScheduledDate => "scheduledDate",
            Self::Title => "title",
            Self::CreatedAt => "createdAt",
            Self::OrganizerName => "organizerName",
            Self::Category => "category",
        }
    }

    /// Looks up a sort field by its wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == raw)
    }
}

/// Sort direction for query ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// A single-key ordering. There is deliberately no secondary key: rows that
/// share a sort value come back in whatever order the store yields them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// A node in a filter predicate tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateNode {
    /// Every child must match. An empty conjunction matches everything.
    And(Vec<PredicateNode>),
    /// At least one child must match.
    Or(Vec<PredicateNode>),
    /// Exact, case-sensitive equality on a text attribute.
    Eq { field: TextField, value: String },
    /// Case-insensitive substring match. `needle` is stored lower-cased.
    ContainsInsensitive { field: TextField, needle: String },
    /// Resource tag set intersects the given set, ignoring case. `wanted` is
    /// stored trimmed and lower-cased.
    HasAnyTag(Vec<String>),
    /// `scheduled_date >= date`.
    DateOnOrAfter(NaiveDate),
    /// `scheduled_date <= date`.
    DateOnOrBefore(NaiveDate),
}

impl PredicateNode {
    /// Builds a case-insensitive substring predicate, lower-casing `needle`.
    #[must_use]
    pub fn contains(field: TextField, needle: &str) -> Self {
        Self::ContainsInsensitive {
            field,
            needle: needle.to_lowercase(),
        }
    }

    /// Builds a match-any tag predicate, normalising each wanted tag.
    #[must_use]
    pub fn any_tag(tags: &[String]) -> Self {
        Self::HasAnyTag(tags.iter().map(|t| t.trim().to_lowercase()).collect())
    }

    /// Evaluates the predicate against an in-memory resource.
    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.matches(resource)),
            Self::Or(children) => children.iter().any(|c| c.matches(resource)),
            Self::Eq { field, value } => field.read(resource) == value,
            Self::ContainsInsensitive { field, needle } => {
                field
                    .read(resource)
                    .to_lowercase()
                    .contains(needle.as_str())
            }
            Self::HasAnyTag(wanted) => resource
                .tags
                .iter()
                .any(|t| wanted.contains(&t.trim().to_lowercase())),
            Self::DateOnOrAfter(date) => resource.scheduled_date >= *date,
            Self::DateOnOrBefore(date) => resource.scheduled_date <= *date,
        }
    }
}

/// Flat conjunction of predicates. Absent filters contribute nothing, so a
/// filter with no conjuncts matches every resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub conjuncts: Vec<PredicateNode>,
}

impl QueryFilter {
    /// Filter that matches everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn matches(&self, resource: &Resource) -> bool {
        self.conjuncts.iter().all(|p| p.matches(resource))
    }
}

// ---------------------------------------------------------------------------
// List command and page
// ---------------------------------------------------------------------------

/// Typed list command produced by request validation.
///
/// Invariants established upstream: `page >= 1`, `1 <= limit <= MAX_LIMIT`,
/// `tags` contains no empty strings, `search` is trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort: SortSpec,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            category: None,
            tags: None,
            start_date: None,
            end_date: None,
            sort: SortSpec::default(),
            search: None,
        }
    }
}

/// Number of pages needed for `total` items at `limit` per page. Zero items
/// means zero pages.
#[must_use]
pub fn total_pages(total: u64, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit)
}

/// Rows to skip to reach `page` (1-based).
#[must_use]
pub fn skip_for(page: u64, limit: u64) -> u64 {
    page.saturating_sub(1).saturating_mul(limit)
}

/// One page of results plus the totals computed from the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub total_pages: u64,
    pub current_page: u64,
    pub limit: u64,
}

impl<T> Page<T> {
    /// Assembles a page, deriving `total_pages` from the count.
    #[must_use]
    pub fn new(items: Vec<T>, total_count: u64, current_page: u64, limit: u64) -> Self {
        Self {
            items,
            total_count,
            total_pages: total_pages(total_count, limit),
            current_page,
            limit,
        }
    }
}
