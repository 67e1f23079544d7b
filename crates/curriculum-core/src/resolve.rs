//! # Foreign-Key Resolver
//!
//! Rewrites the parent reference of a validated row from a source
//! identifier to the identifier issued in this run.

use crate::remap::IdentityRemapper;
use crate::report::MissingDependency;
use crate::schema;
use crate::storage::Store;
use crate::types::{CurriculumError, Kind, RecordId};
use crate::validate::ValidatedRow;

/// Outcome of resolving one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The parent reference now holds the new identifier (roots pass through).
    Resolved(ValidatedRow),
    /// The parent could not be resolved; the row is skipped.
    Missing(MissingDependency),
}

/// Resolve the parent reference of `row`.
///
/// Only store failures are errors; an unresolvable parent is a
/// `Resolution::Missing` value.
pub fn resolve_parent<S: Store + ?Sized>(
    store: &S,
    remapper: &mut IdentityRemapper,
    kind: Kind,
    mut row: ValidatedRow,
) -> Result<Resolution, CurriculumError> {
    let (Some(parent_kind), Some(column)) =
        (schema::parent_kind_of(kind), schema::parent_field_of(kind))
    else {
        return Ok(Resolution::Resolved(row));
    };

    // The validator guarantees a canonical integer here.
    let Some(parent_source_id) = row
        .fields
        .get(column)
        .and_then(|v| v.parse::<u64>().ok())
        .map(RecordId)
    else {
        return Err(CurriculumError::InvalidInput(format!(
            "{kind} row at line {} was not validated",
            row.line
        )));
    };

    match remapper.resolve(store, parent_kind, parent_source_id) {
        Ok(new_id) => {
            row.fields.insert(column.to_string(), new_id.to_string());
            Ok(Resolution::Resolved(row))
        }
        Err(CurriculumError::UnresolvedReference { .. }) => {
            Ok(Resolution::Missing(MissingDependency {
                kind,
                source_id: row.source_id,
                parent_kind,
                parent_source_id,
                line: row.line,
            }))
        }
        Err(e) => Err(e),
    }
}
