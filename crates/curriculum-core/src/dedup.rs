//! # Duplicate Suppressor
//!
//! Decides whether a resolved row already exists in storage. The filter is
//! every declared non-identifier field, with the parent reference compared
//! by its new identifier, so re-importing an archive never creates a
//! second copy of a subtree.

use crate::storage::Store;
use crate::types::{CurriculumError, Fields, Kind, RecordId};

/// Verdict for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No equal record exists; the row may be persisted.
    Fresh,
    /// An equal record exists under this identifier.
    Duplicate(RecordId),
}

/// Look up an existing record equal to `fields`.
pub fn check_duplicate<S: Store + ?Sized>(
    store: &S,
    kind: Kind,
    fields: &Fields,
) -> Result<Verdict, CurriculumError> {
    Ok(match store.query_existing(kind, fields)? {
        Some(existing) => Verdict::Duplicate(existing.id),
        None => Verdict::Fresh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::storage::test_support::fields;

    #[test]
    fn equal_fields_are_duplicates() {
        let mut store = MemoryStore::new();
        let root = fields(&[("grade_levels", "3"), ("state", "Bavaria"), ("subject", "Math")]);
        let id = store.persist(Kind::Curriculum, &root).expect("persist");

        assert_eq!(
            check_duplicate(&store, Kind::Curriculum, &root).expect("check"),
            Verdict::Duplicate(id)
        );
    }

    #[test]
    fn any_differing_field_is_fresh() {
        let mut store = MemoryStore::new();
        let root = fields(&[("grade_levels", "3"), ("state", "Bavaria"), ("subject", "Math")]);
        store.persist(Kind::Curriculum, &root).expect("persist");

        let other = fields(&[("grade_levels", "4"), ("state", "Bavaria"), ("subject", "Math")]);
        assert_eq!(
            check_duplicate(&store, Kind::Curriculum, &other).expect("check"),
            Verdict::Fresh
        );
    }

    #[test]
    fn same_name_under_other_parent_is_fresh() {
        let mut store = MemoryStore::new();
        let a = store
            .persist(
                Kind::Curriculum,
                &fields(&[("grade_levels", "1"), ("state", "A"), ("subject", "X")]),
            )
            .expect("persist");
        let b = store
            .persist(
                Kind::Curriculum,
                &fields(&[("grade_levels", "2"), ("state", "A"), ("subject", "X")]),
            )
            .expect("persist");

        let a_ref = a.to_string();
        let b_ref = b.to_string();
        let area = |parent: &str| {
            fields(&[
                ("curriculum_id", parent),
                ("number", "1"),
                ("name", "Basics"),
                ("teaching_hours", "10"),
            ])
        };
        store
            .persist(Kind::LearningArea, &area(&a_ref))
            .expect("persist");

        assert!(matches!(
            check_duplicate(&store, Kind::LearningArea, &area(&a_ref)).expect("check"),
            Verdict::Duplicate(_)
        ));
        assert_eq!(
            check_duplicate(&store, Kind::LearningArea, &area(&b_ref)).expect("check"),
            Verdict::Fresh
        );
    }
}
