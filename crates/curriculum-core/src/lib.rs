//! # curriculum-core
//!
//! The bulk import/export engine for curriculum taxonomies - THE LOGIC.
//!
//! A taxonomy is a strict tree of eight entity kinds (curriculum, learning
//! area, objective, sub-objective, content and their descriptions). This
//! crate exports the whole tree as a portable archive of flat tables and
//! re-imports such an archive into another store, rebuilding the tree under
//! freshly issued identifiers.
//!
//! ## Pipeline
//!
//! ```text
//! archive bytes -> unpack -> per kind, in import order:
//!     validate -> resolve parent -> duplicate check   (dry pass)
//!     validate -> resolve parent -> duplicate check -> persist  (commit pass)
//! -> ImportReport
//! ```
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded: NO async, NO network dependencies
//! - Deterministic: `BTreeMap` everywhere, fixed kind order
//! - Storage is a collaborator behind the [`Store`] trait
//! - Identity mappings live in one [`Importer`] and die with it

// =============================================================================
// MODULES
// =============================================================================

pub mod archive;
pub mod dedup;
pub mod export;
pub mod importer;
pub mod primitives;
pub mod remap;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod storage;
pub mod tree;
pub mod types;
pub mod validate;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{CurriculumError, Fields, Kind, RawRow, Record, RecordId};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use archive::{Archive, Manifest, Table, pack, unpack};
pub use export::{export_all, export_tables};
pub use importer::{ImportOptions, Importer, import_all};
pub use remap::IdentityRemapper;
pub use report::{ImportReport, KindReport, MissingDependency, RowIssue, ValidationError};

// =============================================================================
// RE-EXPORTS: Storage and Views
// =============================================================================

pub use storage::{Catalog, MemoryStore, RedbStore, Store};
pub use tree::{
    CurriculumFilter, CurriculumSummary, CurriculumTree, Page, all_trees, curriculum_tree,
    list_curricula,
};
