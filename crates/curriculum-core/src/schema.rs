//! # Schema Registry
//!
//! Static description of the eight entity kinds of the curriculum tree.
//!
//! ```text
//! Curriculum
//!  └─ LearningArea
//!      └─ Objective
//!          ├─ ObjectiveDescription
//!          └─ SubObjective
//!              ├─ SubObjectiveDescription
//!              └─ Content
//!                  └─ ContentDescription
//! ```
//!
//! The registry is resolved at compile time. Nothing here mutates and
//! nothing here fails: every lookup is total over `Kind`.

use crate::primitives::{ANCESTOR_SEPARATOR, ID_FIELD, MAX_NAME_LENGTH};
use crate::types::{Fields, Kind};

// =============================================================================
// FIELD DESCRIPTIONS
// =============================================================================

/// Type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// The record's own identifier (always the first column).
    Identifier,
    /// Identifier of the parent record of the given kind.
    Reference(Kind),
    /// Free text, optionally bounded in characters.
    Text { max_len: Option<usize> },
    /// Non-negative integer.
    Integer,
}

/// One column of a kind's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldSpec {
    const fn id() -> Self {
        Self {
            name: ID_FIELD,
            ty: FieldType::Identifier,
        }
    }

    const fn reference(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            ty: FieldType::Reference(kind),
        }
    }

    const fn name(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Text {
                max_len: Some(MAX_NAME_LENGTH),
            },
        }
    }

    const fn text(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Text { max_len: None },
        }
    }

    const fn integer(name: &'static str) -> Self {
        Self {
            name,
            ty: FieldType::Integer,
        }
    }
}

/// Registry entry for one kind.
#[derive(Debug, Clone, Copy)]
pub struct KindSchema {
    pub kind: Kind,
    /// Human-readable label used in reports.
    pub label: &'static str,
    /// Ordered columns; `id` first, then the parent reference (if any).
    pub fields: &'static [FieldSpec],
    pub parent: Option<Kind>,
    /// Column holding the human-readable name of a record.
    pub display_field: &'static str,
}

// =============================================================================
// REGISTRY
// =============================================================================

const CURRICULUM_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::name("grade_levels"),
    FieldSpec::name("state"),
    FieldSpec::name("subject"),
];

const LEARNING_AREA_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("curriculum_id", Kind::Curriculum),
    FieldSpec::integer("number"),
    FieldSpec::name("name"),
    FieldSpec::integer("teaching_hours"),
];

const OBJECTIVE_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("learning_area_id", Kind::LearningArea),
    FieldSpec::name("name"),
];

const OBJECTIVE_DESCRIPTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("objective_id", Kind::Objective),
    FieldSpec::text("text"),
];

const SUB_OBJECTIVE_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("objective_id", Kind::Objective),
    FieldSpec::name("name"),
];

const SUB_OBJECTIVE_DESCRIPTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("sub_objective_id", Kind::SubObjective),
    FieldSpec::text("text"),
];

const CONTENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("sub_objective_id", Kind::SubObjective),
    FieldSpec::name("name"),
];

const CONTENT_DESCRIPTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::id(),
    FieldSpec::reference("content_id", Kind::Content),
    FieldSpec::text("text"),
];

/// The registry, indexed by `Kind as usize`.
static REGISTRY: [KindSchema; 8] = [
    KindSchema {
        kind: Kind::Curriculum,
        label: "Curriculum",
        fields: CURRICULUM_FIELDS,
        parent: None,
        display_field: "subject",
    },
    KindSchema {
        kind: Kind::LearningArea,
        label: "Learning area",
        fields: LEARNING_AREA_FIELDS,
        parent: Some(Kind::Curriculum),
        display_field: "name",
    },
    KindSchema {
        kind: Kind::Objective,
        label: "Objective",
        fields: OBJECTIVE_FIELDS,
        parent: Some(Kind::LearningArea),
        display_field: "name",
    },
    KindSchema {
        kind: Kind::ObjectiveDescription,
        label: "Objective description",
        fields: OBJECTIVE_DESCRIPTION_FIELDS,
        parent: Some(Kind::Objective),
        display_field: "text",
    },
    KindSchema {
        kind: Kind::SubObjective,
        label: "Sub-objective",
        fields: SUB_OBJECTIVE_FIELDS,
        parent: Some(Kind::Objective),
        display_field: "name",
    },
    KindSchema {
        kind: Kind::SubObjectiveDescription,
        label: "Sub-objective description",
        fields: SUB_OBJECTIVE_DESCRIPTION_FIELDS,
        parent: Some(Kind::SubObjective),
        display_field: "text",
    },
    KindSchema {
        kind: Kind::Content,
        label: "Content",
        fields: CONTENT_FIELDS,
        parent: Some(Kind::SubObjective),
        display_field: "name",
    },
    KindSchema {
        kind: Kind::ContentDescription,
        label: "Content description",
        fields: CONTENT_DESCRIPTION_FIELDS,
        parent: Some(Kind::Content),
        display_field: "text",
    },
];

// =============================================================================
// LOOKUPS
// =============================================================================

/// Registry entry of a kind.
#[must_use]
pub fn schema_of(kind: Kind) -> &'static KindSchema {
    &REGISTRY[kind as usize]
}

/// Ordered columns of a kind, `id` first.
#[must_use]
pub fn fields_of(kind: Kind) -> &'static [FieldSpec] {
    schema_of(kind).fields
}

/// Parent kind, `None` for the root.
#[must_use]
pub fn parent_kind_of(kind: Kind) -> Option<Kind> {
    schema_of(kind).parent
}

/// Name of the parent-reference column, `None` for the root.
#[must_use]
pub fn parent_field_of(kind: Kind) -> Option<&'static str> {
    fields_of(kind)
        .iter()
        .find(|f| matches!(f.ty, FieldType::Reference(_)))
        .map(|f| f.name)
}

/// Column holding the human-readable name of a record.
#[must_use]
pub fn display_field_of(kind: Kind) -> &'static str {
    schema_of(kind).display_field
}

/// Fixed topological order used for both import and export.
#[must_use]
pub fn import_order() -> &'static [Kind; 8] {
    &Kind::ALL
}

/// Kinds whose parent is `kind`.
#[must_use]
pub fn children_of(kind: Kind) -> Vec<Kind> {
    Kind::ALL
        .into_iter()
        .filter(|k| parent_kind_of(*k) == Some(kind))
        .collect()
}

/// Strict ancestors of `kind`, nearest first.
#[must_use]
pub fn ancestors_of(kind: Kind) -> Vec<Kind> {
    let mut ancestors = Vec::new();
    let mut current = parent_kind_of(kind);
    while let Some(k) = current {
        ancestors.push(k);
        current = parent_kind_of(k);
    }
    ancestors
}

/// Column name of a denormalised ancestor field, e.g. `objective__name`.
#[must_use]
pub fn ancestor_column(ancestor: Kind) -> String {
    format!(
        "{}{}{}",
        ancestor.as_str(),
        ANCESTOR_SEPARATOR,
        display_field_of(ancestor)
    )
}

/// Archive entry name of a kind's table, e.g. `3_objective.csv`.
#[must_use]
pub fn table_file_name(kind: Kind) -> String {
    format!("{}_{}.csv", kind.position(), kind.as_str())
}

/// Reverse of [`table_file_name`].
#[must_use]
pub fn kind_for_file_name(name: &str) -> Option<Kind> {
    Kind::ALL
        .into_iter()
        .find(|k| table_file_name(*k) == name)
}

/// Stable 64-bit fingerprint of a field set.
///
/// The first 8 bytes (little endian) of a BLAKE3 digest over every
/// `name 0x1f value 0x1e` pair in field order. Used by persistent stores
/// to index records for duplicate lookups; collisions are resolved by
/// comparing the full field sets.
#[must_use]
pub fn fingerprint(fields: &Fields) -> u64 {
    let mut hasher = blake3::Hasher::new();
    for (name, value) in fields {
        hasher.update(name.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(value.as_bytes());
        hasher.update(&[0x1e]);
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_indexed_by_kind() {
        for kind in Kind::ALL {
            assert_eq!(schema_of(kind).kind, kind);
        }
    }

    #[test]
    fn every_table_starts_with_id() {
        for kind in Kind::ALL {
            assert_eq!(fields_of(kind)[0].name, ID_FIELD);
            assert_eq!(fields_of(kind)[0].ty, FieldType::Identifier);
        }
    }

    #[test]
    fn only_root_has_no_parent() {
        assert_eq!(parent_kind_of(Kind::Curriculum), None);
        assert_eq!(parent_field_of(Kind::Curriculum), None);
        for kind in &Kind::ALL[1..] {
            assert!(parent_kind_of(*kind).is_some());
            assert!(parent_field_of(*kind).is_some());
        }
    }

    #[test]
    fn import_order_is_topological() {
        let order = import_order();
        for (pos, kind) in order.iter().enumerate() {
            if let Some(parent) = parent_kind_of(*kind) {
                let parent_pos = order.iter().position(|k| *k == parent).expect("parent");
                assert!(parent_pos < pos, "{kind} imported before {parent}");
            }
        }
    }

    #[test]
    fn reference_column_matches_parent_kind() {
        for kind in Kind::ALL {
            for field in fields_of(kind) {
                if let FieldType::Reference(target) = field.ty {
                    assert_eq!(Some(target), parent_kind_of(kind));
                }
            }
        }
    }

    #[test]
    fn children_and_ancestors() {
        assert_eq!(
            children_of(Kind::Objective),
            vec![Kind::ObjectiveDescription, Kind::SubObjective]
        );
        assert!(children_of(Kind::ContentDescription).is_empty());
        assert_eq!(
            ancestors_of(Kind::Content),
            vec![
                Kind::SubObjective,
                Kind::Objective,
                Kind::LearningArea,
                Kind::Curriculum
            ]
        );
    }

    #[test]
    fn table_names_carry_position_prefix() {
        assert_eq!(table_file_name(Kind::Curriculum), "1_curriculum.csv");
        assert_eq!(
            table_file_name(Kind::ContentDescription),
            "8_content_description.csv"
        );
        for kind in Kind::ALL {
            assert_eq!(kind_for_file_name(&table_file_name(kind)), Some(kind));
        }
        assert_eq!(kind_for_file_name("9_extra.csv"), None);
    }

    #[test]
    fn ancestor_columns_use_display_field() {
        assert_eq!(ancestor_column(Kind::SubObjective), "sub_objective__name");
        assert_eq!(ancestor_column(Kind::Curriculum), "curriculum__subject");
    }

    #[test]
    fn fingerprint_depends_on_names_and_values() {
        let mut a = Fields::new();
        a.insert("name".into(), "Algebra".into());
        let mut b = Fields::new();
        b.insert("name".into(), "Algebra".into());
        assert_eq!(fingerprint(&a), fingerprint(&b));

        b.insert("name".into(), "Geometry".into());
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let mut c = Fields::new();
        c.insert("nam".into(), "eAlgebra".into());
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn fingerprint_is_the_head_of_the_digest() {
        let mut fields = Fields::new();
        fields.insert("text".into(), "Line one\n".into());

        let digest = blake3::hash(b"text\x1fLine one\n\x1e");
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        assert_eq!(fingerprint(&fields), u64::from_le_bytes(head));

        fields.insert("text".into(), "Line one".into());
        assert_ne!(fingerprint(&fields), u64::from_le_bytes(head));
    }
}
