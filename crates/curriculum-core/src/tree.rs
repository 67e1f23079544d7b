//! # Curriculum Read Views
//!
//! Nested and paginated views over any [`Store`]:
//! - [`curriculum_tree`]: one curriculum with its whole subtree
//! - [`all_trees`]: every curriculum as a tree
//! - [`list_curricula`]: filtered, paginated summaries

use crate::primitives::PAGE_SIZE;
use crate::schema;
use crate::storage::Store;
use crate::types::{CurriculumError, Kind, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// TREE NODES
// =============================================================================

/// A free-text description attached to an objective, sub-objective or content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionNode {
    pub id: RecordId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: RecordId,
    pub name: String,
    pub descriptions: Vec<DescriptionNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubObjectiveNode {
    pub id: RecordId,
    pub name: String,
    pub descriptions: Vec<DescriptionNode>,
    pub contents: Vec<ContentNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveNode {
    pub id: RecordId,
    pub name: String,
    pub descriptions: Vec<DescriptionNode>,
    pub sub_objectives: Vec<SubObjectiveNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningAreaNode {
    pub id: RecordId,
    pub number: u64,
    pub name: String,
    pub teaching_hours: u64,
    pub objectives: Vec<ObjectiveNode>,
}

/// A curriculum with its complete subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumTree {
    pub id: RecordId,
    pub grade_levels: String,
    pub state: String,
    pub subject: String,
    pub learning_areas: Vec<LearningAreaNode>,
}

// =============================================================================
// CHILD INDEX
// =============================================================================

/// Records of every non-root kind grouped by parent identifier.
struct ChildIndex {
    by_parent: BTreeMap<Kind, BTreeMap<RecordId, Vec<Record>>>,
}

impl ChildIndex {
    fn load<S: Store + ?Sized>(store: &S) -> Result<Self, CurriculumError> {
        let mut by_parent: BTreeMap<Kind, BTreeMap<RecordId, Vec<Record>>> = BTreeMap::new();
        for kind in &schema::import_order()[1..] {
            let Some(column) = schema::parent_field_of(*kind) else {
                continue;
            };
            let groups = by_parent.entry(*kind).or_default();
            for record in store.records(*kind)? {
                if let Some(parent) = record.reference(column) {
                    groups.entry(parent).or_default().push(record);
                }
            }
        }
        Ok(Self { by_parent })
    }

    fn children(&self, kind: Kind, parent: RecordId) -> &[Record] {
        self.by_parent
            .get(&kind)
            .and_then(|g| g.get(&parent))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn descriptions(&self, kind: Kind, parent: RecordId) -> Vec<DescriptionNode> {
        self.children(kind, parent)
            .iter()
            .map(|r| DescriptionNode {
                id: r.id,
                text: r.field("text").to_string(),
            })
            .collect()
    }

    fn content(&self, r: &Record) -> ContentNode {
        ContentNode {
            id: r.id,
            name: r.field("name").to_string(),
            descriptions: self.descriptions(Kind::ContentDescription, r.id),
        }
    }

    fn sub_objective(&self, r: &Record) -> SubObjectiveNode {
        SubObjectiveNode {
            id: r.id,
            name: r.field("name").to_string(),
            descriptions: self.descriptions(Kind::SubObjectiveDescription, r.id),
            contents: self
                .children(Kind::Content, r.id)
                .iter()
                .map(|c| self.content(c))
                .collect(),
        }
    }

    fn objective(&self, r: &Record) -> ObjectiveNode {
        ObjectiveNode {
            id: r.id,
            name: r.field("name").to_string(),
            descriptions: self.descriptions(Kind::ObjectiveDescription, r.id),
            sub_objectives: self
                .children(Kind::SubObjective, r.id)
                .iter()
                .map(|s| self.sub_objective(s))
                .collect(),
        }
    }

    fn learning_area(&self, r: &Record) -> LearningAreaNode {
        LearningAreaNode {
            id: r.id,
            number: r.field("number").parse().unwrap_or_default(),
            name: r.field("name").to_string(),
            teaching_hours: r.field("teaching_hours").parse().unwrap_or_default(),
            objectives: self
                .children(Kind::Objective, r.id)
                .iter()
                .map(|o| self.objective(o))
                .collect(),
        }
    }

    fn curriculum(&self, r: &Record) -> CurriculumTree {
        CurriculumTree {
            id: r.id,
            grade_levels: r.field("grade_levels").to_string(),
            state: r.field("state").to_string(),
            subject: r.field("subject").to_string(),
            learning_areas: self
                .children(Kind::LearningArea, r.id)
                .iter()
                .map(|a| self.learning_area(a))
                .collect(),
        }
    }
}

/// One curriculum with its whole subtree, `None` if it does not exist.
pub fn curriculum_tree<S: Store + ?Sized>(
    store: &S,
    id: RecordId,
) -> Result<Option<CurriculumTree>, CurriculumError> {
    let Some(root) = store.get(Kind::Curriculum, id)? else {
        return Ok(None);
    };
    let index = ChildIndex::load(store)?;
    Ok(Some(index.curriculum(&root)))
}

/// Every curriculum as a tree, in identifier order.
pub fn all_trees<S: Store + ?Sized>(store: &S) -> Result<Vec<CurriculumTree>, CurriculumError> {
    let index = ChildIndex::load(store)?;
    Ok(store
        .records(Kind::Curriculum)?
        .iter()
        .map(|r| index.curriculum(r))
        .collect())
}

// =============================================================================
// LIST VIEW
// =============================================================================

/// Exact-match filter for the list view. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumFilter {
    pub state: Option<String>,
    pub subject: Option<String>,
}

impl CurriculumFilter {
    fn matches(&self, record: &Record) -> bool {
        let check = |want: &Option<String>, field: &str| {
            want.as_deref()
                .filter(|w| !w.is_empty())
                .is_none_or(|w| record.field(field) == w)
        };
        check(&self.state, "state") && check(&self.subject, "subject")
    }
}

/// Flat summary of a curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurriculumSummary {
    pub id: RecordId,
    pub grade_levels: String,
    pub state: String,
    pub subject: String,
}

/// One page of a list view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: usize,
    pub current_page: usize,
    pub total_items: usize,
}

/// Filtered curricula, [`PAGE_SIZE`] per page.
///
/// Page numbers are 1-based; zero or past-the-end pages fall back to
/// page 1. An empty result still has one (empty) page.
pub fn list_curricula<S: Store + ?Sized>(
    store: &S,
    filter: &CurriculumFilter,
    page: usize,
) -> Result<Page<CurriculumSummary>, CurriculumError> {
    let matching: Vec<Record> = store
        .records(Kind::Curriculum)?
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();

    let total_items = matching.len();
    let total_pages = total_items.div_ceil(PAGE_SIZE).max(1);
    let current_page = if (1..=total_pages).contains(&page) {
        page
    } else {
        1
    };

    let items = matching
        .into_iter()
        .skip((current_page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .map(|r| CurriculumSummary {
            id: r.id,
            grade_levels: r.field("grade_levels").to_string(),
            state: r.field("state").to_string(),
            subject: r.field("subject").to_string(),
        })
        .collect();

    Ok(Page {
        items,
        total_pages,
        current_page,
        total_items,
    })
}
