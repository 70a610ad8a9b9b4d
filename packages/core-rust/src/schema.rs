//! Validation issue types and the field-keyed error map clients receive.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key under which issues without a field path are collected.
pub const GENERAL_FIELD: &str = "_general";

/// A single schema violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Path segments from the payload root to the offending value.
    /// Empty for payload-level issues.
    pub path: Vec<String>,
    /// Human-readable description of the violation.
    pub message: String,
}

impl ValidationIssue {
    /// Issue attached to a top-level field.
    #[must_use]
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        Self {
            path: vec![name.to_string()],
            message: message.into(),
        }
    }

    /// Issue attached to a nested path, e.g. `["tags", "2"]`.
    #[must_use]
    pub fn at(path: &[&str], message: impl Into<String>) -> Self {
        Self {
            path: path.iter().map(|s| (*s).to_string()).collect(),
            message: message.into(),
        }
    }

    /// Issue not tied to any single field.
    #[must_use]
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            message: message.into(),
        }
    }

    /// Dot-joined path, or [`GENERAL_FIELD`] when the path is empty.
    #[must_use]
    pub fn key(&self) -> String {
        if self.path.is_empty() {
            GENERAL_FIELD.to_string()
        } else {
            self.path.join(".")
        }
    }
}

/// One or more schema violations raised by request validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationFailure {
    /// Converts the issues into the client-facing map, keeping message order.
    #[must_use]
    pub fn field_errors(&self) -> FieldErrorMap {
        let mut map = FieldErrorMap::new();
        for issue in &self.issues {
            map.push(issue.key(), issue.message.clone());
        }
        map
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation issue(s)", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {}: {}", issue.key(), issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Accumulates issues while a payload is walked field by field.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<ValidationIssue>,
}

impl IssueCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns `Ok(value)` when nothing was collected, otherwise the failure.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationFailure`] carrying every collected issue.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationFailure> {
        if self.issues.is_empty() {
            Ok(value)
        } else {
            Err(ValidationFailure {
                issues: self.issues,
            })
        }
    }
}

/// Field path to ordered list of violation messages.
///
/// Ordered by key so responses are stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrorMap(BTreeMap<String, Vec<String>>);

impl FieldErrorMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` under `key`, creating the entry if needed.
    pub fn push(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(message.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}
