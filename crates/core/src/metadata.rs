//! Descriptive fields and the field-exclusion set used when cloning.
//!
//! A field is addressed as `schema.element` or `schema.element.qualifier`.
//! The exclusion set additionally accepts `schema.element.*`, which covers
//! the unqualified field and every qualifier of it.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Wildcard qualifier accepted in exclusion entries.
pub const ANY_QUALIFIER: &str = "*";

/// Field carrying the declared entity-type label of an item.
pub const ENTITY_TYPE_FIELD: &str = "dspace.entity.type";

/// Field carrying the date an item was first installed.
pub const ACCESSION_DATE_FIELD: &str = "dc.date.accessioned";

/// Confidence value used when no authority control applies.
pub const CONFIDENCE_UNSET: i32 = -1;

// ---------------------------------------------------------------------------
// MetadataValue
// ---------------------------------------------------------------------------

/// One descriptive field value attached to an item or bitstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub schema: String,
    pub element: String,
    pub qualifier: Option<String>,
    pub language: Option<String>,
    pub value: String,
    pub authority: Option<String>,
    pub confidence: i32,
    /// Position among the values of the same field, starting at 0.
    pub place: i32,
}

impl MetadataValue {
    /// Create a value without language or authority at place 0.
    pub fn new(
        schema: impl Into<String>,
        element: impl Into<String>,
        qualifier: Option<&str>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            element: element.into(),
            qualifier: qualifier.map(str::to_string),
            language: None,
            value: value.into(),
            authority: None,
            confidence: CONFIDENCE_UNSET,
            place: 0,
        }
    }

    /// Build a value from a dotted field name such as `dc.title` or
    /// `dc.date.accessioned`.
    pub fn parse(field: &str, value: impl Into<String>) -> Result<Self, CoreError> {
        let (schema, element, qualifier) = split_field(field)?;
        if qualifier == Some(ANY_QUALIFIER) {
            return Err(CoreError::Validation(format!(
                "Wildcard field `{field}` cannot carry a value"
            )));
        }
        Ok(Self::new(schema, element, qualifier, value))
    }

    /// Set the position of this value among values of the same field.
    pub fn with_place(mut self, place: i32) -> Self {
        self.place = place;
        self
    }

    /// Set the language tag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// `schema.element`, ignoring any qualifier.
    pub fn unqualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.element)
    }

    /// `schema.element` or `schema.element.qualifier`.
    pub fn field_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}.{q}", self.schema, self.element),
            None => self.unqualified_name(),
        }
    }

    /// `true` if this value belongs to the dotted field `field`.
    pub fn is_field(&self, field: &str) -> bool {
        self.field_name() == field
    }
}

/// First value of `field` in `values`, in place order.
pub fn first_value<'a>(values: &'a [MetadataValue], field: &str) -> Option<&'a str> {
    values
        .iter()
        .filter(|v| v.is_field(field))
        .min_by_key(|v| v.place)
        .map(|v| v.value.as_str())
}

/// Split a dotted field name into its parts.
fn split_field(field: &str) -> Result<(&str, &str, Option<&str>), CoreError> {
    let parts: Vec<&str> = field.split('.').collect();
    let invalid = || {
        CoreError::Validation(format!(
            "Field `{field}` must look like schema.element or schema.element.qualifier"
        ))
    };
    if parts.iter().any(|p| p.trim().is_empty() || p.trim().len() != p.len()) {
        return Err(invalid());
    }
    match parts.as_slice() {
        [schema, element] => Ok((*schema, *element, None)),
        [schema, element, qualifier] => Ok((*schema, *element, Some(*qualifier))),
        _ => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// FieldExclusions
// ---------------------------------------------------------------------------

/// Ordered set of field identifiers that must never be copied between
/// snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldExclusions {
    entries: IndexSet<String>,
}

impl FieldExclusions {
    /// An empty set: every field is copied.
    pub fn none() -> Self {
        Self::default()
    }

    /// Build the set from individual entries, validating each one.
    ///
    /// Duplicates collapse; the first occurrence fixes the order.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = IndexSet::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            split_field(entry)?;
            set.insert(entry.to_string());
        }
        Ok(Self { entries: set })
    }

    /// Parse a comma-separated list, e.g.
    /// `dc.date.accessioned, dc.description.provenance`.
    pub fn parse(list: &str) -> Result<Self, CoreError> {
        Self::from_entries(list.split(','))
    }

    /// `true` when `value` must not be copied.
    ///
    /// Matches the exact field name, or `schema.element.*`.
    pub fn excludes(&self, value: &MetadataValue) -> bool {
        self.entries.contains(&value.field_name())
            || self
                .entries
                .contains(&format!("{}.{ANY_QUALIFIER}", value.unqualified_name()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
