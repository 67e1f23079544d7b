//! # Core Type Definitions
//!
//! This module contains the types shared by every component of the engine:
//! - Entity kinds and identifiers (`Kind`, `RecordId`)
//! - Persisted and incoming records (`Record`, `Fields`, `RawRow`)
//! - Error types (`CurriculumError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where they are used as map keys
//! - Use `BTreeMap` for field storage so iteration order is stable

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// KIND
// =============================================================================

/// One of the eight entity types of the curriculum tree.
///
/// Declaration order is the fixed import/export order: every kind appears
/// after its parent kind.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Curriculum,
    LearningArea,
    Objective,
    ObjectiveDescription,
    SubObjective,
    SubObjectiveDescription,
    Content,
    ContentDescription,
}

impl Kind {
    /// All kinds in import order.
    pub const ALL: [Kind; 8] = [
        Kind::Curriculum,
        Kind::LearningArea,
        Kind::Objective,
        Kind::ObjectiveDescription,
        Kind::SubObjective,
        Kind::SubObjectiveDescription,
        Kind::Content,
        Kind::ContentDescription,
    ];

    /// Snake-case name, also used as table stem and redb table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Kind::Curriculum => "curriculum",
            Kind::LearningArea => "learning_area",
            Kind::Objective => "objective",
            Kind::ObjectiveDescription => "objective_description",
            Kind::SubObjective => "sub_objective",
            Kind::SubObjectiveDescription => "sub_objective_description",
            Kind::Content => "content",
            Kind::ContentDescription => "content_description",
        }
    }

    /// 1-based position in import order.
    #[must_use]
    pub const fn position(self) -> usize {
        self as usize + 1
    }

    /// Parse a snake-case kind name.
    pub fn parse(name: &str) -> Option<Kind> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Storage-assigned identifier of a record.
///
/// Unique per kind, immutable once assigned, never reused.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Get the raw identifier value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// Scalar attribute values of a record, keyed by field name.
///
/// Never contains the `id` field. The parent reference is an ordinary entry
/// (e.g. `curriculum_id`) holding the decimal parent identifier.
pub type Fields = BTreeMap<String, String>;

/// A persisted entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The storage-assigned identifier.
    pub id: RecordId,
    /// Attribute values, including the parent reference.
    pub fields: Fields,
}

impl Record {
    /// Create a new record.
    #[must_use]
    pub fn new(id: RecordId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Get a field value, or `""` when absent.
    #[must_use]
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// Parse a reference column into an identifier.
    #[must_use]
    pub fn reference(&self, name: &str) -> Option<RecordId> {
        self.fields
            .get(name)
            .and_then(|v| v.parse::<u64>().ok())
            .map(RecordId)
    }
}

/// One data row of an input table, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    /// 1-based line number within the table (the header is line 1).
    pub line: usize,
    /// Header name -> cell content.
    pub values: BTreeMap<String, String>,
}

impl RawRow {
    /// Create a raw row from `(header, value)` pairs.
    pub fn new<I, K, V>(line: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            line,
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a cell by header name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the curriculum engine.
///
/// Row-scoped conditions (invalid rows, missing parents, skipped duplicates)
/// are not errors; they are reported as `RowIssue` values. This enum covers
/// archive-level and kind-level failures plus remapper contract violations.
#[derive(Debug, Error)]
pub enum CurriculumError {
    /// One or more expected tables are absent from the archive.
    #[error("Incomplete archive: missing {}", missing.join(", "))]
    IncompleteArchive { missing: Vec<String> },

    /// The archive container or a table could not be parsed.
    #[error("Archive format error: {0}")]
    ArchiveFormat(String),

    /// A source identifier was recorded twice for the same kind in one run.
    #[error("Duplicate source id {source_id} in {kind}")]
    DuplicateSourceId { kind: Kind, source_id: RecordId },

    /// A source identifier has no mapping and no existing record.
    #[error("Unresolved reference to {kind} {source_id}")]
    UnresolvedReference { kind: Kind, source_id: RecordId },

    /// A write would break referential integrity.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The requested record does not exist.
    #[error("{kind} {id} not found")]
    RecordNotFound { kind: Kind, id: RecordId },

    /// The storage engine failed.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Caller-supplied input was rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CurriculumError {
    /// Whether this error is confined to the kind being imported.
    ///
    /// Storage-level failures roll back the kind and the run continues.
    /// Everything else also rolls back, then ends the run.
    #[must_use]
    pub fn is_kind_fatal(&self) -> bool {
        matches!(
            self,
            CurriculumError::StorageFailure(_)
                | CurriculumError::ConstraintViolation(_)
                | CurriculumError::SerializationError(_)
                | CurriculumError::IoError(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
