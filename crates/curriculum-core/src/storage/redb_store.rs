//! # redb-backed Store
//!
//! A disk-backed store using the redb embedded database, providing:
//! - ACID transactions (one redb write transaction per `begin()`)
//! - Crash safety (copy-on-write B-trees)
//! - Zero configuration
//!
//! ## Layout
//!
//! - One record table per kind: `id (u64) -> postcard(Fields)`
//! - One fingerprint index per kind: `(fingerprint, id) -> ()`, so duplicate
//!   lookups are a range scan instead of a full table scan
//! - A metadata table with the next identifier of every kind
//!
//! Outside an explicit transaction every write commits on its own and
//! reads use a fresh read transaction.

use super::{Store, check_parent, child_ids};
use crate::schema;
use crate::types::{CurriculumError, Fields, Kind, Record, RecordId};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use std::path::Path;

/// Table for identifier counters: kind name -> next id
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn records_table(kind: Kind) -> TableDefinition<'static, u64, &'static [u8]> {
    TableDefinition::new(kind.as_str())
}

fn index_table(kind: Kind) -> TableDefinition<'static, (u64, u64), ()> {
    TableDefinition::new(match kind {
        Kind::Curriculum => "curriculum_fingerprints",
        Kind::LearningArea => "learning_area_fingerprints",
        Kind::Objective => "objective_fingerprints",
        Kind::ObjectiveDescription => "objective_description_fingerprints",
        Kind::SubObjective => "sub_objective_fingerprints",
        Kind::SubObjectiveDescription => "sub_objective_description_fingerprints",
        Kind::Content => "content_fingerprints",
        Kind::ContentDescription => "content_description_fingerprints",
    })
}

fn db_err(e: impl std::fmt::Display) -> CurriculumError {
    CurriculumError::StorageFailure(e.to_string())
}

fn decode(id: u64, bytes: &[u8]) -> Result<Record, CurriculumError> {
    let fields: Fields = postcard::from_bytes(bytes)
        .map_err(|e| CurriculumError::SerializationError(format!("{}: {}", id, e)))?;
    Ok(Record::new(RecordId(id), fields))
}

/// Open tables through the active write transaction, or a fresh read
/// transaction when none is open, and evaluate `$body` with them.
macro_rules! with_tables {
    ($store:expr, $($table:ident = $def:expr;)+ => $body:expr) => {
        match &$store.txn {
            Some(txn) => {
                $(let $table = txn.open_table($def).map_err(db_err)?;)+
                $body
            }
            None => {
                let read = $store.db.begin_read().map_err(db_err)?;
                $(let $table = read.open_table($def).map_err(db_err)?;)+
                $body
            }
        }
    };
}

/// A disk-backed store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// The write transaction opened by `begin()`, if any.
    txn: Option<WriteTransaction>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("in_transaction", &self.txn.is_some())
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CurriculumError> {
        let db = Database::create(path.as_ref()).map_err(db_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(db_err)?;
            let _ = write_txn.open_table(METADATA).map_err(db_err)?;
            for kind in Kind::ALL {
                let _ = write_txn.open_table(records_table(kind)).map_err(db_err)?;
                let _ = write_txn.open_table(index_table(kind)).map_err(db_err)?;
            }
            write_txn.commit().map_err(db_err)?;
        }

        Ok(Self { db, txn: None })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), CurriculumError> {
        if self.txn.is_some() {
            return Err(CurriculumError::StorageFailure(
                "cannot compact inside a transaction".to_string(),
            ));
        }
        self.db.compact().map_err(db_err)?;
        Ok(())
    }

    /// Run `op` inside the open transaction, or inside a transaction of its
    /// own that commits on success.
    fn write<T>(
        &self,
        op: impl FnOnce(&WriteTransaction) -> Result<T, CurriculumError>,
    ) -> Result<T, CurriculumError> {
        if let Some(txn) = &self.txn {
            return op(txn);
        }
        let txn = self.db.begin_write().map_err(db_err)?;
        let value = op(&txn)?;
        txn.commit().map_err(db_err)?;
        Ok(value)
    }
}

impl Store for RedbStore {
    fn query_existing(
        &self,
        kind: Kind,
        filter: &Fields,
    ) -> Result<Option<Record>, CurriculumError> {
        let fp = schema::fingerprint(filter);
        with_tables!(self, index = index_table(kind); records = records_table(kind); => {
            for entry in index.range((fp, 0u64)..=(fp, u64::MAX)).map_err(db_err)? {
                let (key, _) = entry.map_err(db_err)?;
                let (_, id) = key.value();
                if let Some(bytes) = records.get(id).map_err(db_err)? {
                    let record = decode(id, bytes.value())?;
                    if record.fields == *filter {
                        return Ok(Some(record));
                    }
                }
            }
            Ok(None)
        })
    }

    fn persist(&mut self, kind: Kind, fields: &Fields) -> Result<RecordId, CurriculumError> {
        check_parent(&*self, kind, fields)?;

        let bytes = postcard::to_allocvec(fields)
            .map_err(|e| CurriculumError::SerializationError(e.to_string()))?;
        let fp = schema::fingerprint(fields);

        self.write(|txn| {
            let mut meta = txn.open_table(METADATA).map_err(db_err)?;
            let next = meta
                .get(kind.as_str())
                .map_err(db_err)?
                .map(|v| v.value())
                .unwrap_or(1);
            meta.insert(kind.as_str(), next.saturating_add(1))
                .map_err(db_err)?;

            let mut records = txn.open_table(records_table(kind)).map_err(db_err)?;
            records.insert(next, bytes.as_slice()).map_err(db_err)?;

            let mut index = txn.open_table(index_table(kind)).map_err(db_err)?;
            index.insert((fp, next), ()).map_err(db_err)?;

            Ok(RecordId(next))
        })
    }

    fn exists_by_id(&self, kind: Kind, id: RecordId) -> Result<bool, CurriculumError> {
        with_tables!(self, records = records_table(kind); => {
            Ok(records.get(id.0).map_err(db_err)?.is_some())
        })
    }

    fn get(&self, kind: Kind, id: RecordId) -> Result<Option<Record>, CurriculumError> {
        with_tables!(self, records = records_table(kind); => {
            match records.get(id.0).map_err(db_err)? {
                Some(bytes) => Ok(Some(decode(id.0, bytes.value())?)),
                None => Ok(None),
            }
        })
    }

    fn records(&self, kind: Kind) -> Result<Vec<Record>, CurriculumError> {
        with_tables!(self, records = records_table(kind); => {
            let mut out = Vec::new();
            for entry in records.iter().map_err(db_err)? {
                let (key, value) = entry.map_err(db_err)?;
                out.push(decode(key.value(), value.value())?);
            }
            Ok(out)
        })
    }

    fn count(&self, kind: Kind) -> Result<usize, CurriculumError> {
        with_tables!(self, records = records_table(kind); => {
            Ok(records.len().map_err(db_err)? as usize)
        })
    }

    fn delete(&mut self, kind: Kind, id: RecordId) -> Result<usize, CurriculumError> {
        if !self.exists_by_id(kind, id)? {
            return Err(CurriculumError::RecordNotFound { kind, id });
        }

        // Collect the subtree with its fingerprints before touching anything.
        let mut pending = vec![(kind, id)];
        let mut subtree = Vec::new();
        while let Some((k, i)) = pending.pop() {
            pending.extend(child_ids(&*self, k, i)?);
            if let Some(record) = self.get(k, i)? {
                subtree.push((k, i, schema::fingerprint(&record.fields)));
            }
        }

        self.write(|txn| {
            let mut removed = 0;
            for (k, i, fp) in &subtree {
                let mut records = txn.open_table(records_table(*k)).map_err(db_err)?;
                if records.remove(i.0).map_err(db_err)?.is_some() {
                    removed += 1;
                }
                let mut index = txn.open_table(index_table(*k)).map_err(db_err)?;
                index.remove((*fp, i.0)).map_err(db_err)?;
            }
            Ok(removed)
        })
    }

    fn begin(&mut self) -> Result<(), CurriculumError> {
        if self.txn.is_some() {
            return Err(CurriculumError::StorageFailure(
                "transaction already open".to_string(),
            ));
        }
        self.txn = Some(self.db.begin_write().map_err(db_err)?);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CurriculumError> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| CurriculumError::StorageFailure("no open transaction".to_string()))?;
        txn.commit().map_err(db_err)
    }

    fn rollback(&mut self) -> Result<(), CurriculumError> {
        let txn = self
            .txn
            .take()
            .ok_or_else(|| CurriculumError::StorageFailure("no open transaction".to_string()))?;
        txn.abort().map_err(db_err)
    }

    fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}
