//! # Storage Collaborators
//!
//! The engine never talks to a database directly; it goes through the
//! [`Store`] trait. Two backends implement it:
//! - [`MemoryStore`]: `BTreeMap` tables with snapshot transactions
//! - [`RedbStore`]: disk-backed tables in a redb database
//!
//! [`Catalog`] wraps either backend behind one type for the application.
//!
//! ## Invariants every backend upholds
//!
//! - Identifiers are issued per kind from a monotonically increasing
//!   counter. Committed identifiers are never reused.
//! - `persist` refuses a non-root record whose parent does not exist.
//! - `delete` cascades to every descendant.
//! - Between `begin()` and `commit()`/`rollback()` all reads observe the
//!   writes of the open transaction; `rollback()` discards them entirely.

mod catalog;
mod memory;
mod redb_store;

pub use catalog::Catalog;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::schema;
use crate::types::{CurriculumError, Fields, Kind, Record, RecordId};

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Relational storage consumed by the import/export engine.
///
/// All fallible operations return `Result<T, CurriculumError>`; failures are
/// reported as `StorageFailure` or `ConstraintViolation` so the importer can
/// roll back the current kind.
pub trait Store {
    /// Find a record of `kind` whose fields equal `filter` exactly.
    fn query_existing(&self, kind: Kind, filter: &Fields)
    -> Result<Option<Record>, CurriculumError>;

    /// Insert a record and return its newly issued identifier.
    fn persist(&mut self, kind: Kind, fields: &Fields) -> Result<RecordId, CurriculumError>;

    /// Check whether a record with this identifier exists.
    fn exists_by_id(&self, kind: Kind, id: RecordId) -> Result<bool, CurriculumError>;

    /// Fetch one record.
    fn get(&self, kind: Kind, id: RecordId) -> Result<Option<Record>, CurriculumError>;

    /// All records of a kind in ascending identifier order.
    fn records(&self, kind: Kind) -> Result<Vec<Record>, CurriculumError>;

    /// Number of records of a kind.
    fn count(&self, kind: Kind) -> Result<usize, CurriculumError>;

    /// Delete a record and all its descendants. Returns the number removed.
    fn delete(&mut self, kind: Kind, id: RecordId) -> Result<usize, CurriculumError>;

    /// Open a transaction. Fails if one is already open.
    fn begin(&mut self) -> Result<(), CurriculumError>;

    /// Make the open transaction durable.
    fn commit(&mut self) -> Result<(), CurriculumError>;

    /// Discard every write of the open transaction.
    fn rollback(&mut self) -> Result<(), CurriculumError>;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool;
}

// =============================================================================
// SHARED HELPERS
// =============================================================================

/// Check that the parent of a new record exists.
///
/// Shared by the backends so both report the same violation text.
pub(crate) fn check_parent<S: Store + ?Sized>(
    store: &S,
    kind: Kind,
    fields: &Fields,
) -> Result<(), CurriculumError> {
    let (Some(parent), Some(column)) = (
        schema::parent_kind_of(kind),
        schema::parent_field_of(kind),
    ) else {
        return Ok(());
    };

    let parent_id = fields
        .get(column)
        .and_then(|v| v.parse::<u64>().ok())
        .map(RecordId)
        .ok_or_else(|| {
            CurriculumError::ConstraintViolation(format!("{kind}.{column} is not an identifier"))
        })?;

    if store.exists_by_id(parent, parent_id)? {
        Ok(())
    } else {
        Err(CurriculumError::ConstraintViolation(format!(
            "{kind}.{column} references missing {parent} {parent_id}"
        )))
    }
}

/// Collect the identifiers of direct children of `(kind, id)`, per child kind.
pub(crate) fn child_ids<S: Store + ?Sized>(
    store: &S,
    kind: Kind,
    id: RecordId,
) -> Result<Vec<(Kind, RecordId)>, CurriculumError> {
    let mut children = Vec::new();
    for child in schema::children_of(kind) {
        let Some(column) = schema::parent_field_of(child) else {
            continue;
        };
        for record in store.records(child)? {
            if record.reference(column) == Some(id) {
                children.push((child, record.id));
            }
        }
    }
    Ok(children)
}
