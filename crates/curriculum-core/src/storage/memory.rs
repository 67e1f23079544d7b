//! In-memory store.
//!
//! Tables are `BTreeMap`s so record iteration is always in identifier
//! order. A transaction is a snapshot of the whole state taken at `begin()`
//! and restored on `rollback()`.

use super::{Store, check_parent, child_ids};
use crate::types::{CurriculumError, Fields, Kind, Record, RecordId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Tables {
    records: BTreeMap<Kind, BTreeMap<RecordId, Fields>>,
    next_ids: BTreeMap<Kind, u64>,
}

/// A volatile store backed by `BTreeMap`s.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: Kind) -> Option<&BTreeMap<RecordId, Fields>> {
        self.tables.records.get(&kind)
    }

    fn remove_one(&mut self, kind: Kind, id: RecordId) -> usize {
        self.tables
            .records
            .get_mut(&kind)
            .and_then(|t| t.remove(&id))
            .map_or(0, |_| 1)
    }
}

impl Store for MemoryStore {
    fn query_existing(
        &self,
        kind: Kind,
        filter: &Fields,
    ) -> Result<Option<Record>, CurriculumError> {
        Ok(self.table(kind).and_then(|t| {
            t.iter()
                .find(|(_, fields)| *fields == filter)
                .map(|(id, fields)| Record::new(*id, fields.clone()))
        }))
    }

    fn persist(&mut self, kind: Kind, fields: &Fields) -> Result<RecordId, CurriculumError> {
        check_parent(&*self, kind, fields)?;

        let next = self.tables.next_ids.entry(kind).or_insert(1);
        let id = RecordId(*next);
        *next = next.saturating_add(1);

        self.tables
            .records
            .entry(kind)
            .or_default()
            .insert(id, fields.clone());
        Ok(id)
    }

    fn exists_by_id(&self, kind: Kind, id: RecordId) -> Result<bool, CurriculumError> {
        Ok(self.table(kind).is_some_and(|t| t.contains_key(&id)))
    }

    fn get(&self, kind: Kind, id: RecordId) -> Result<Option<Record>, CurriculumError> {
        Ok(self
            .table(kind)
            .and_then(|t| t.get(&id))
            .map(|fields| Record::new(id, fields.clone())))
    }

    fn records(&self, kind: Kind) -> Result<Vec<Record>, CurriculumError> {
        Ok(self
            .table(kind)
            .map(|t| {
                t.iter()
                    .map(|(id, fields)| Record::new(*id, fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count(&self, kind: Kind) -> Result<usize, CurriculumError> {
        Ok(self.table(kind).map_or(0, BTreeMap::len))
    }

    fn delete(&mut self, kind: Kind, id: RecordId) -> Result<usize, CurriculumError> {
        if !self.exists_by_id(kind, id)? {
            return Err(CurriculumError::RecordNotFound { kind, id });
        }

        // Depth-first: collect the subtree, then remove it.
        let mut pending = vec![(kind, id)];
        let mut subtree = Vec::new();
        while let Some((k, i)) = pending.pop() {
            pending.extend(child_ids(&*self, k, i)?);
            subtree.push((k, i));
        }

        Ok(subtree
            .into_iter()
            .map(|(k, i)| self.remove_one(k, i))
            .sum())
    }

    fn begin(&mut self) -> Result<(), CurriculumError> {
        if self.snapshot.is_some() {
            return Err(CurriculumError::StorageFailure(
                "transaction already open".to_string(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CurriculumError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| CurriculumError::StorageFailure("no open transaction".to_string()))
    }

    fn rollback(&mut self) -> Result<(), CurriculumError> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| CurriculumError::StorageFailure("no open transaction".to_string()))?;
        self.tables = snapshot;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}
