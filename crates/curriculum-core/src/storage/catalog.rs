//! # Catalog
//!
//! The storage handle held by the application.
//!
//! ## Storage Backends
//!
//! - `Memory`: `MemoryStore` (fast, volatile)
//! - `Persistent`: `RedbStore` for disk-backed ACID storage

use super::{MemoryStore, RedbStore, Store};
use crate::types::{CurriculumError, Fields, Kind, Record, RecordId};
use std::path::Path;

/// Storage backend of the application.
#[derive(Debug)]
pub enum Catalog {
    /// In-memory tables (fast, volatile).
    Memory(MemoryStore),
    /// Disk-backed tables using redb (ACID, persistent).
    Persistent(RedbStore),
}

// NOTE: Catalog does NOT implement Clone.
// RedbStore owns the database handle and an optional write transaction.

impl Default for Catalog {
    fn default() -> Self {
        Self::Memory(MemoryStore::new())
    }
}

impl Catalog {
    /// Create an empty in-memory catalog.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Open or create a persistent catalog at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CurriculumError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    /// Check if this catalog uses persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }

    /// Record counts of every kind, in import order.
    pub fn counts(&self) -> Result<Vec<(Kind, usize)>, CurriculumError> {
        Kind::ALL
            .into_iter()
            .map(|kind| Ok((kind, self.count(kind)?)))
            .collect()
    }

    fn inner(&self) -> &dyn Store {
        match self {
            Self::Memory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Store {
        match self {
            Self::Memory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

impl Store for Catalog {
    fn query_existing(
        &self,
        kind: Kind,
        filter: &Fields,
    ) -> Result<Option<Record>, CurriculumError> {
        self.inner().query_existing(kind, filter)
    }

    fn persist(&mut self, kind: Kind, fields: &Fields) -> Result<RecordId, CurriculumError> {
        self.inner_mut().persist(kind, fields)
    }

    fn exists_by_id(&self, kind: Kind, id: RecordId) -> Result<bool, CurriculumError> {
        self.inner().exists_by_id(kind, id)
    }

    fn get(&self, kind: Kind, id: RecordId) -> Result<Option<Record>, CurriculumError> {
        self.inner().get(kind, id)
    }

    fn records(&self, kind: Kind) -> Result<Vec<Record>, CurriculumError> {
        self.inner().records(kind)
    }

    fn count(&self, kind: Kind) -> Result<usize, CurriculumError> {
        self.inner().count(kind)
    }

    fn delete(&mut self, kind: Kind, id: RecordId) -> Result<usize, CurriculumError> {
        self.inner_mut().delete(kind, id)
    }

    fn begin(&mut self) -> Result<(), CurriculumError> {
        self.inner_mut().begin()
    }

    fn commit(&mut self) -> Result<(), CurriculumError> {
        self.inner_mut().commit()
    }

    fn rollback(&mut self) -> Result<(), CurriculumError> {
        self.inner_mut().rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner().in_transaction()
    }
}
