//! # Exporter
//!
//! Walks storage in import order and emits one flat table per kind.
//!
//! Each table carries the kind's declared columns followed by one
//! read-only column per strict ancestor holding that ancestor's display
//! name (nearest ancestor first), e.g. a content row also lists its
//! sub-objective, objective, learning area and curriculum. The importer
//! ignores those columns, so an export is directly re-importable.

use crate::archive::{self, Table};
use crate::primitives::ID_FIELD;
use crate::schema;
use crate::storage::Store;
use crate::types::{CurriculumError, Kind, RawRow, Record, RecordId};
use std::collections::BTreeMap;
use tracing::info;

/// Header row of a kind's exported table.
#[must_use]
pub fn export_headers(kind: Kind) -> Vec<String> {
    schema::fields_of(kind)
        .iter()
        .map(|f| f.name.to_string())
        .chain(schema::ancestors_of(kind).into_iter().map(schema::ancestor_column))
        .collect()
}

/// Read every kind into a table, in import order.
pub fn export_tables<S: Store + ?Sized>(store: &S) -> Result<Vec<Table>, CurriculumError> {
    let mut loaded: BTreeMap<Kind, BTreeMap<RecordId, Record>> = BTreeMap::new();
    let mut tables = Vec::with_capacity(Kind::ALL.len());

    for kind in schema::import_order() {
        let records = store.records(*kind)?;
        let mut table = Table::new(*kind, export_headers(*kind));

        for (index, record) in records.iter().enumerate() {
            let mut values: Vec<(String, String)> =
                vec![(ID_FIELD.to_string(), record.id.to_string())];
            values.extend(record.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            values.extend(ancestor_values(&loaded, *kind, record));
            table.rows.push(RawRow::new(index + 2, values));
        }

        info!(kind = %kind, rows = table.len(), "exported table");
        loaded.insert(
            *kind,
            records.into_iter().map(|r| (r.id, r)).collect(),
        );
        tables.push(table);
    }

    Ok(tables)
}

/// Export the whole store as archive bytes.
pub fn export_all<S: Store + ?Sized>(store: &S) -> Result<Vec<u8>, CurriculumError> {
    archive::pack(&export_tables(store)?)
}

/// Display names of the ancestors of `record`, nearest first.
///
/// A dangling reference leaves the remaining ancestor columns empty.
fn ancestor_values(
    loaded: &BTreeMap<Kind, BTreeMap<RecordId, Record>>,
    kind: Kind,
    record: &Record,
) -> Vec<(String, String)> {
    let mut values = Vec::new();
    let mut current_kind = kind;
    let mut current = Some(record);

    for ancestor in schema::ancestors_of(kind) {
        let parent = current.and_then(|r| {
            let column = schema::parent_field_of(current_kind)?;
            let id = r.reference(column)?;
            loaded.get(&ancestor)?.get(&id)
        });
        let name = parent
            .map(|p| p.field(schema::display_field_of(ancestor)).to_string())
            .unwrap_or_default();
        values.push((schema::ancestor_column(ancestor), name));
        current = parent;
        current_kind = ancestor;
    }
    values
}
