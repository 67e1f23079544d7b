//! # Identity Remapper
//!
//! Run-scoped translation of source identifiers (as found in the archive)
//! to identifiers issued by the destination store.
//!
//! One bucket per kind. A bucket is cleared when its kind's import starts
//! and filled as rows of that kind are persisted (or matched to existing
//! records). Children of the next kind resolve their parent references
//! against it. The remapper is owned by a single import invocation and
//! dropped at the end of it; nothing here is persisted.
//!
//! ## Reference fallback
//!
//! An unmapped source identifier still resolves when the store already
//! holds a record of the parent kind with exactly that identifier. This
//! keeps re-importing an archive into the database that produced it
//! working, but it can also attach a child to an unrelated record that
//! merely shares the identifier. Two limits apply:
//! - identifiers that are already the target of another mapping in this
//!   run are never matched
//! - strict mode disables the fallback entirely

use crate::storage::Store;
use crate::types::{CurriculumError, Kind, RecordId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
struct Bucket {
    /// source id -> new id
    forward: BTreeMap<RecordId, RecordId>,
    /// Every new id some source id maps to.
    targets: BTreeSet<RecordId>,
}

/// Per-kind mapping of source identifiers to new identifiers.
#[derive(Debug, Clone, Default)]
pub struct IdentityRemapper {
    buckets: BTreeMap<Kind, Bucket>,
    strict: bool,
}

impl IdentityRemapper {
    /// Create a remapper with the reference fallback enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a remapper without the reference fallback.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            buckets: BTreeMap::new(),
            strict: true,
        }
    }

    /// Whether the reference fallback is disabled.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Clear the mapping of a kind.
    pub fn reset(&mut self, kind: Kind) {
        self.buckets.remove(&kind);
    }

    /// Register `source_id -> new_id` for a kind.
    ///
    /// Fails with `DuplicateSourceId` if the source id was already recorded
    /// for this kind since the last reset.
    pub fn record(
        &mut self,
        kind: Kind,
        source_id: RecordId,
        new_id: RecordId,
    ) -> Result<(), CurriculumError> {
        let bucket = self.buckets.entry(kind).or_default();
        if bucket.forward.contains_key(&source_id) {
            return Err(CurriculumError::DuplicateSourceId { kind, source_id });
        }
        bucket.forward.insert(source_id, new_id);
        bucket.targets.insert(new_id);
        Ok(())
    }

    /// Translate a source identifier of `kind`.
    ///
    /// Falls back to the store when no mapping exists (see module docs); a
    /// successful fallback is registered as the identity mapping. Store
    /// failures propagate unchanged.
    pub fn resolve<S: Store + ?Sized>(
        &mut self,
        store: &S,
        kind: Kind,
        source_id: RecordId,
    ) -> Result<RecordId, CurriculumError> {
        if let Some(new_id) = self.lookup(kind, source_id) {
            return Ok(new_id);
        }

        let unresolved = CurriculumError::UnresolvedReference { kind, source_id };
        if self.strict {
            return Err(unresolved);
        }

        let claimed = self
            .buckets
            .get(&kind)
            .is_some_and(|b| b.targets.contains(&source_id));
        if claimed || !store.exists_by_id(kind, source_id)? {
            return Err(unresolved);
        }

        self.record(kind, source_id, source_id)?;
        Ok(source_id)
    }

    /// Mapping lookup without fallback.
    #[must_use]
    pub fn lookup(&self, kind: Kind, source_id: RecordId) -> Option<RecordId> {
        self.buckets
            .get(&kind)
            .and_then(|b| b.forward.get(&source_id))
            .copied()
    }

    /// Whether a source id is mapped for a kind.
    #[must_use]
    pub fn contains(&self, kind: Kind, source_id: RecordId) -> bool {
        self.lookup(kind, source_id).is_some()
    }

    /// Number of mappings of a kind.
    #[must_use]
    pub fn len(&self, kind: Kind) -> usize {
        self.buckets.get(&kind).map_or(0, |b| b.forward.len())
    }

    /// Whether no kind has any mapping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|b| b.forward.is_empty())
    }
}
